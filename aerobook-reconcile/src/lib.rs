pub mod dispatcher;
pub mod flight_status;
pub mod gateways;
pub mod manager;
pub mod messages;
pub mod orchestrator;
pub mod repos;
pub mod webhook;

pub use dispatcher::NotificationDispatcher;
pub use flight_status::FlightStatusService;
pub use gateways::GatewayRegistry;
pub use manager::BookingManager;
pub use orchestrator::{
    ConfirmOutcome, CreateIntent, IntentCreated, PaymentHistory, ReconciliationEngine,
    RefundCommand, RefundOutcome,
};
pub use repos::Repositories;
pub use webhook::{GatewayEvent, StripeSignatureVerifier};
