//! Provider-side building blocks that do not depend on a real provider: the gateway registry and the simulated
//! provider. Live adapters live with the server, which owns the HTTP clients.
mod registry;
mod simulated;

pub use registry::GatewayRegistry;
pub use simulated::{
    LedgerStatus,
    ProviderLedger,
    SimulatedProvider,
    SimulationSettings,
    SIMULATED_DECLINE_REASON,
};
