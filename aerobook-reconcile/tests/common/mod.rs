#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use aerobook_core::booking::{Booking, CabinClass, ContactInfo, NewBooking, Passenger};
use aerobook_core::flight::Flight;
use aerobook_core::notification::{
    Channel, Notification, NotificationTransport, NotificationType, TransportError,
};
use aerobook_core::payment::{BankDetails, Gateway};
use aerobook_core::repository::NotificationRepository;
use aerobook_core::user::User;
use aerobook_reconcile::gateways::{BankTransferGateway, MockGateway};
use aerobook_reconcile::{
    CreateIntent, FlightStatusService, GatewayRegistry, NotificationDispatcher,
    ReconciliationEngine, Repositories,
};
use aerobook_store::{InMemoryStore, RealtimeHub};

/// Transport that remembers what it was asked to send.
pub struct RecordingTransport {
    channel: Channel,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub repos: Repositories,
    pub engine: ReconciliationEngine,
    pub flights: FlightStatusService,
    pub hub: RealtimeHub,
    pub stripe: Arc<MockGateway>,
    pub email: Arc<RecordingTransport>,
    pub sms: Arc<RecordingTransport>,
    pub flight: Flight,
    pub user: User,
}

pub fn flight(number: &str) -> Flight {
    Flight {
        id: Uuid::new_v4(),
        airline: "IndiGo".to_string(),
        flight_number: number.to_string(),
        origin: "DEL".to_string(),
        destination: "BOM".to_string(),
        departure_date: Utc::now() + chrono::Duration::days(7),
        arrival_date: None,
        duration_minutes: Some(130),
        price: dec!(100),
        seats_available: 180,
        cabin_class: CabinClass::Economy,
        status: "scheduled".to_string(),
        created_at: Utc::now(),
    }
}

pub fn passenger(first: &str) -> Passenger {
    Passenger {
        first_name: first.to_string(),
        last_name: "Sharma".to_string(),
        date_of_birth: None,
        gender: None,
    }
}

pub fn bank_details() -> BankDetails {
    BankDetails {
        bank_name: "HDFC Bank".to_string(),
        account_number: "50100012345678".to_string(),
        ifsc_code: "HDFC0001234".to_string(),
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_stripe(MockGateway::live(Gateway::Stripe), Duration::from_secs(5)).await
    }

    pub async fn with_stripe(stripe: MockGateway, timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let user = User {
            id: Uuid::new_v4(),
            name: "Aarav Sharma".to_string(),
            email: "aarav@example.com".to_string(),
            phone: Some("+919800000001".to_string()),
        };
        store.add_user(user.clone()).await;
        let flight = flight("6E-2031");
        store.add_flight(flight.clone()).await;

        let repos = Repositories::in_memory(store.clone());
        let email = Arc::new(RecordingTransport::new(Channel::Email));
        let sms = Arc::new(RecordingTransport::new(Channel::Sms));
        let hub = RealtimeHub::new(None);
        let dispatcher = Arc::new(
            NotificationDispatcher::new(repos.notifications.clone(), repos.users.clone())
                .with_transport(email.clone())
                .with_transport(sms.clone())
                .with_realtime(Arc::new(hub.clone())),
        );

        let stripe = Arc::new(stripe);
        let gateways = GatewayRegistry::new()
            .with(stripe.clone())
            .with(Arc::new(BankTransferGateway::new(bank_details())));

        let engine = ReconciliationEngine::new(
            repos.clone(),
            gateways,
            dispatcher.clone(),
            "INR".to_string(),
            timeout,
        );
        let flights = FlightStatusService::new(repos.clone(), dispatcher);

        Self {
            store,
            repos,
            engine,
            flights,
            hub,
            stripe,
            email,
            sms,
            flight,
            user,
        }
    }

    pub async fn book(&self, passengers: usize, cabin_class: CabinClass) -> Booking {
        let passengers = (0..passengers)
            .map(|i| passenger(&format!("Traveller{}", i + 1)))
            .collect();
        self.engine
            .bookings()
            .create(
                self.flight.id,
                NewBooking {
                    user_id: Some(self.user.id),
                    passengers,
                    cabin_class,
                    contact_info: ContactInfo::default(),
                },
            )
            .await
            .unwrap()
    }

    pub fn intent_for(&self, booking: &Booking, gateway: &str, method: &str) -> CreateIntent {
        CreateIntent {
            booking_id: Some(booking.id.to_string()),
            payment_gateway: Some(gateway.to_string()),
            payment_method: Some(method.to_string()),
            user_id: Some(self.user.id),
            ..CreateIntent::default()
        }
    }

    /// A booking with a stripe payment already succeeded.
    pub async fn paid_booking(&self, cabin_class: CabinClass, passengers: usize) -> (Booking, String) {
        let booking = self.book(passengers, cabin_class).await;
        let created = self
            .engine
            .create_intent(self.intent_for(&booking, "stripe", "credit_card"))
            .await
            .unwrap();
        self.engine
            .confirm(&created.payment_intent_id, Some(booking.id))
            .await
            .unwrap();
        (booking, created.payment_intent_id)
    }

    pub async fn booking(&self, id: Uuid) -> Booking {
        self.engine.bookings().get(id).await.unwrap()
    }

    pub async fn notifications(&self, booking_id: Uuid) -> Vec<Notification> {
        self.repos
            .notifications
            .list_notifications_for_booking(booking_id)
            .await
            .unwrap()
    }

    pub async fn sent_of(&self, booking_id: Uuid, kinds: &[NotificationType], channel: Channel) -> usize {
        self.notifications(booking_id)
            .await
            .iter()
            .filter(|n| kinds.contains(&n.kind) && n.channel == channel && n.sent)
            .count()
    }
}
