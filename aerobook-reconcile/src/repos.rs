use std::sync::Arc;

use aerobook_core::repository::{
    BookingRepository, FlightRepository, NotificationRepository, PaymentLedger, UserRepository,
};
use aerobook_store::{
    DbClient, InMemoryStore, PostgresBookingRepository, PostgresFlightRepository,
    PostgresNotificationRepository, PostgresPaymentLedger, PostgresUserRepository,
};

/// The storage handles every service is built from.
#[derive(Clone)]
pub struct Repositories {
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentLedger>,
    pub flights: Arc<dyn FlightRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Repositories {
    pub fn postgres(db: &DbClient) -> Self {
        Self {
            bookings: Arc::new(PostgresBookingRepository::new(db.pool.clone())),
            payments: Arc::new(PostgresPaymentLedger::new(db.pool.clone())),
            flights: Arc::new(PostgresFlightRepository::new(db.pool.clone())),
            users: Arc::new(PostgresUserRepository::new(db.pool.clone())),
            notifications: Arc::new(PostgresNotificationRepository::new(db.pool.clone())),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            bookings: store.clone(),
            payments: store.clone(),
            flights: store.clone(),
            users: store.clone(),
            notifications: store,
        }
    }
}
