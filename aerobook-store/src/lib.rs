pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod flight_repo;
pub mod mailer;
pub mod memory;
pub mod notification_repo;
pub mod payment_repo;
pub mod realtime;
pub mod redis_repo;

pub use booking_repo::PostgresBookingRepository;
pub use database::DbClient;
pub use flight_repo::{PostgresFlightRepository, PostgresUserRepository};
pub use mailer::{LogMailer, SmtpMailer};
pub use memory::InMemoryStore;
pub use notification_repo::PostgresNotificationRepository;
pub use payment_repo::PostgresPaymentLedger;
pub use realtime::RealtimeHub;
pub use redis_repo::RedisClient;
