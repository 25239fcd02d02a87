use std::sync::Arc;
use std::time::Duration;

use aerobook_core::repository::NotificationRepository;
use aerobook_reconcile::{
    FlightStatusService, GatewayRegistry, NotificationDispatcher, ReconciliationEngine,
    Repositories, StripeSignatureVerifier,
};
use aerobook_store::app_config::Config;
use aerobook_store::RealtimeHub;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub flights: Arc<FlightStatusService>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub hub: RealtimeHub,
    /// Absent when no Stripe webhook secret is configured.
    pub stripe_webhook: Option<StripeSignatureVerifier>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        config: &Config,
        repos: Repositories,
        gateways: GatewayRegistry,
        dispatcher: Arc<NotificationDispatcher>,
        hub: RealtimeHub,
    ) -> Self {
        let engine = ReconciliationEngine::new(
            repos.clone(),
            gateways,
            dispatcher.clone(),
            config.payments.currency.clone(),
            Duration::from_secs(config.payments.gateway_timeout_seconds),
        );

        Self {
            engine: Arc::new(engine),
            flights: Arc::new(FlightStatusService::new(repos.clone(), dispatcher)),
            notifications: repos.notifications,
            hub,
            stripe_webhook: config
                .gateways
                .stripe
                .webhook_secret()
                .map(StripeSignatureVerifier::new),
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
            },
        }
    }
}
