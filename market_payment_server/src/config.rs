use std::{env, fmt::Display, net::IpAddr, str::FromStr, time::Duration};

use log::*;
use market_payment_engine::gateways::SimulationSettings;
use mpg_common::helpers::env_flag;

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/market_payments.db";
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_RECONCILE_AFTER_SECS: i64 = 120;
pub const DEFAULT_REQUESTER_HEADER: &str = "X-Requester-Id";

/// Whether payments go to the real providers, or to the in-process simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GatewayMode {
    Live,
    #[default]
    Simulated,
}

impl FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "simulated" | "sim" => Ok(Self::Simulated),
            s => Err(format!("{s} is not a gateway mode. Use 'live' or 'simulated'")),
        }
    }
}

impl Display for GatewayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayMode::Live => write!(f, "live"),
            GatewayMode::Simulated => write!(f, "simulated"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub gateway_mode: GatewayMode,
    /// Upper bound on every call to a payment provider.
    pub gateway_timeout: Duration,
    /// How often the reconciliation worker sweeps for stale payments.
    pub reconcile_interval: Duration,
    /// How long a payment must have been `Processing` before the worker refreshes it.
    pub reconcile_after: chrono::Duration,
    /// The header the authenticating front end puts the customer id in.
    pub requester_header: String,
    /// If supplied, webhook and callback requests are only accepted from these addresses.
    /// To explicitly disable the whitelist, set MPG_WEBHOOK_IP_WHITELIST to "false", "none", or "0".
    pub webhook_whitelist: Option<Vec<IpAddr>>,
    pub simulation: SimulationSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPG_HOST.to_string(),
            port: DEFAULT_MPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            gateway_mode: GatewayMode::default(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            reconcile_after: chrono::Duration::seconds(DEFAULT_RECONCILE_AFTER_SECS),
            requester_header: DEFAULT_REQUESTER_HEADER.to_string(),
            webhook_whitelist: None,
            simulation: SimulationSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = parse_env("MPG_PORT", DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MPG_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let use_x_forwarded_for = env_flag("MPG_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("MPG_USE_FORWARDED", false);
        let gateway_mode = parse_env("MPG_GATEWAY_MODE", GatewayMode::default());
        if gateway_mode == GatewayMode::Simulated {
            warn!("🎭️ Payments are SIMULATED. No money will move. Set MPG_GATEWAY_MODE=live for the real providers.");
        }
        let gateway_timeout = Duration::from_millis(parse_env("MPG_GATEWAY_TIMEOUT_MS", 15_000u64));
        let reconcile_interval = Duration::from_secs(parse_env("MPG_RECONCILE_INTERVAL_SECS", 60u64).max(1));
        let reconcile_after =
            chrono::Duration::seconds(parse_env("MPG_RECONCILE_AFTER_SECS", DEFAULT_RECONCILE_AFTER_SECS).max(0));
        let requester_header = env::var("MPG_REQUESTER_HEADER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REQUESTER_HEADER.to_string());
        let webhook_whitelist = configure_whitelist(env::var("MPG_WEBHOOK_IP_WHITELIST").ok());
        let simulation = configure_simulation();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            gateway_mode,
            gateway_timeout,
            reconcile_interval,
            reconcile_after,
            requester_header,
            webhook_whitelist,
            simulation,
        }
    }
}

/// Reads and parses `name`, logging and falling back to `default` if the variable is missing or invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

fn configure_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let whitelist = value.and_then(|s| {
        if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
            info!(
                "🪛️ Webhook IP whitelist is disabled. If this is not what you want, set MPG_WEBHOOK_IP_WHITELIST to a \
                 comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = s
            .split(',')
            .filter_map(|s| {
                s.trim()
                    .parse::<IpAddr>()
                    .map_err(|e| {
                        warn!("🪛️ Ignoring invalid IP address ({s}) in MPG_WEBHOOK_IP_WHITELIST: {e}");
                    })
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 provider webhooks or callbacks."
            );
        },
        None => {
            info!("🪛️ No webhook IP whitelist is set. Only signature validation will be used.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Webhook IP whitelist: {addrs}");
        },
    }
    whitelist
}

fn configure_simulation() -> SimulationSettings {
    let defaults = SimulationSettings::default();
    let min_delay = parse_env("MPG_SIMULATED_MIN_DELAY_MS", defaults.min_delay.as_millis() as u64);
    let max_delay = parse_env("MPG_SIMULATED_MAX_DELAY_MS", defaults.max_delay.as_millis() as u64);
    let success_rate = parse_env("MPG_SIMULATED_SUCCESS_RATE", defaults.success_rate);
    if !(0.0..=1.0).contains(&success_rate) {
        warn!("🪛️ MPG_SIMULATED_SUCCESS_RATE should be between 0 and 1. {success_rate} will be clamped.");
    }
    SimulationSettings {
        min_delay: Duration::from_millis(min_delay),
        max_delay: Duration::from_millis(max_delay.max(min_delay)),
        success_rate: success_rate.clamp(0.0, 1.0),
        auto_settle: true,
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub requester_header: String,
    pub webhook_whitelist: Option<Vec<IpAddr>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            requester_header: config.requester_header.clone(),
            webhook_whitelist: config.webhook_whitelist.clone(),
        }
    }
}
