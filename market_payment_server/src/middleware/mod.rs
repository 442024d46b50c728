mod provider_whitelist;

pub use provider_whitelist::{ProviderWhitelistFactory, ProviderWhitelistService};
