use std::collections::HashMap;

use crate::{db_types::GatewayProvider, traits::PaymentGateway};

/// The set of configured gateways, keyed by the provider each one talks to.
#[derive(Clone)]
pub struct GatewayRegistry<G> {
    gateways: HashMap<GatewayProvider, G>,
}

impl<G> Default for GatewayRegistry<G> {
    fn default() -> Self {
        Self { gateways: HashMap::new() }
    }
}

impl<G: PaymentGateway> GatewayRegistry<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the gateway, replacing any gateway previously registered for the same provider.
    pub fn with_gateway(mut self, gateway: G) -> Self {
        self.register(gateway);
        self
    }

    pub fn register(&mut self, gateway: G) {
        self.gateways.insert(gateway.provider(), gateway);
    }

    pub fn get(&self, provider: GatewayProvider) -> Option<&G> {
        self.gateways.get(&provider)
    }

    pub fn providers(&self) -> Vec<GatewayProvider> {
        let mut providers = self.gateways.keys().copied().collect::<Vec<_>>();
        providers.sort_by_key(|p| p.to_string());
        providers
    }

    pub fn iter(&self) -> impl Iterator<Item = &G> {
        self.gateways.values()
    }
}
