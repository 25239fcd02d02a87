use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use aerobook_core::booking::{
    Booking, BookingPaymentStatus, BookingStatus, CabinClass, ContactInfo, NewBooking, Passenger,
};
use aerobook_core::flight::{Flight, FlightDetails};
use aerobook_core::gateway::{
    GatewayError, GatewayResult, IntentRequest, RefundRequest, Verification,
};
use aerobook_core::notification::{Effect, NotificationType};
use aerobook_core::payment::{
    local_refund_id, BankDetails, Gateway, GatewayPayload, Payment, PaymentMethod, PaymentStatus,
    RefundPlan, RefundRecord,
};
use aerobook_core::repository::Settlement;
use aerobook_core::{CoreError, CoreResult};

use crate::dispatcher::NotificationDispatcher;
use crate::gateways::GatewayRegistry;
use crate::manager::BookingManager;
use crate::messages;
use crate::repos::Repositories;
use crate::webhook::GatewayEvent;

const LATE_CAPTURE_REASON: &str = "booking_cancelled_before_capture";

/// Checkout request. Either a booking id, or the flight and passenger
/// fields of a walk-up purchase.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntent {
    pub booking_id: Option<String>,
    pub payment_gateway: Option<String>,
    pub payment_method: Option<String>,
    #[serde(flatten)]
    pub flight: FlightDetails,
    #[serde(default)]
    pub passengers: Vec<Passenger>,
    pub cabin_class: Option<String>,
    #[serde(default)]
    pub contact_info: ContactInfo,
    /// Taken from the bearer token, never from the body.
    #[serde(skip)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub payment_id: Uuid,
    pub payment_gateway: Gateway,
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub bank_details: Option<BankDetails>,
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub success: bool,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundCommand {
    pub booking_id: Option<Uuid>,
    pub payment_intent_id: Option<String>,
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub success: bool,
    pub status: PaymentStatus,
    pub refund_id: String,
    pub refund_amount: Decimal,
    pub total_refunded: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    pub payment: Payment,
    pub history: Vec<Payment>,
}

/// Keeps a booking and its payments in lockstep across client calls and
/// gateway callbacks. Every payment transition is a conditional write, so
/// racing signals settle a payment exactly once.
pub struct ReconciliationEngine {
    repos: Repositories,
    gateways: GatewayRegistry,
    dispatcher: Arc<NotificationDispatcher>,
    manager: BookingManager,
    currency: String,
    gateway_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        repos: Repositories,
        gateways: GatewayRegistry,
        dispatcher: Arc<NotificationDispatcher>,
        currency: String,
        gateway_timeout: Duration,
    ) -> Self {
        let manager = BookingManager::new(repos.clone(), dispatcher.clone());
        Self {
            repos,
            gateways,
            dispatcher,
            manager,
            currency,
            gateway_timeout,
        }
    }

    pub fn bookings(&self) -> &BookingManager {
        &self.manager
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    pub async fn create_intent(&self, request: CreateIntent) -> CoreResult<IntentCreated> {
        let method: PaymentMethod = match request.payment_method.as_deref() {
            Some(m) if !m.trim().is_empty() => m.parse()?,
            _ => {
                return Err(CoreError::ValidationError(
                    "Payment method is required".to_string(),
                ))
            }
        };
        let gateway: Gateway = match request.payment_gateway.as_deref() {
            Some(g) if !g.trim().is_empty() => g.parse()?,
            _ => Gateway::default(),
        };
        let adapter = self.gateways.get(gateway)?;

        let user_id = request.user_id;
        let booking = self.resolve_booking(request).await?;
        booking.ensure_payable()?;

        let intent = self
            .bounded(
                gateway,
                adapter.create_intent(&IntentRequest {
                    booking_id: booking.id,
                    booking_reference: booking.reference.clone(),
                    user_id: user_id.or(booking.user_id),
                    amount: booking.total_price,
                    currency: self.currency.clone(),
                    method,
                }),
            )
            .await?;

        let payment = Payment::new(
            booking.id,
            user_id.or(booking.user_id),
            gateway,
            method,
            intent.external_id.clone(),
            booking.total_price,
            self.currency.clone(),
            intent.payload,
        );
        self.repos.payments.insert_payment(&payment).await?;

        info!(
            "Payment {} created via {} for booking {} ({} {})",
            payment.payment_intent_id, gateway, booking.reference, payment.amount, payment.currency
        );

        Ok(IntentCreated {
            payment_id: payment.id,
            payment_gateway: gateway,
            client_secret: intent.client_secret,
            payment_intent_id: payment.payment_intent_id,
            bank_details: intent.bank_details,
            booking_id: booking.id,
            booking_reference: booking.reference,
            amount: payment.amount,
            currency: payment.currency,
        })
    }

    async fn resolve_booking(&self, request: CreateIntent) -> CoreResult<Booking> {
        let parsed = request
            .booking_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Uuid::parse_str(id).map_err(|_| id.to_string()));

        match parsed {
            Some(Ok(id)) => self.manager.get(id).await,
            _ if request.flight.is_present() => self.walk_up(request).await,
            Some(Err(raw)) => Err(CoreError::ValidationError(format!(
                "Invalid booking ID '{}'",
                raw
            ))),
            None => Err(CoreError::ValidationError(
                "Booking ID is required".to_string(),
            )),
        }
    }

    async fn walk_up(&self, request: CreateIntent) -> CoreResult<Booking> {
        let cabin_class: CabinClass = match request.cabin_class.as_deref() {
            Some(c) if !c.trim().is_empty() => c.parse()?,
            _ => CabinClass::default(),
        };

        let flight_number = request.flight.flight_number.clone().unwrap_or_default();
        let flight = match self.repos.flights.find_by_number(flight_number.trim()).await? {
            Some(flight) => flight,
            None => {
                let flight = Flight::from_details(request.flight, cabin_class)?;
                self.repos.flights.create_flight(&flight).await?
            }
        };

        self.manager
            .create_for_flight(
                &flight,
                NewBooking {
                    user_id: request.user_id,
                    passengers: request.passengers,
                    cabin_class,
                    contact_info: request.contact_info,
                },
            )
            .await
    }

    pub async fn confirm(
        &self,
        payment_intent_id: &str,
        booking_id: Option<Uuid>,
    ) -> CoreResult<ConfirmOutcome> {
        let payment = self.find_payment(payment_intent_id).await?;
        if let Some(booking_id) = booking_id {
            if booking_id != payment.booking_id {
                return Err(CoreError::ValidationError(format!(
                    "Payment {} does not belong to booking {}",
                    payment_intent_id, booking_id
                )));
            }
        }

        if payment.status.is_settled() {
            info!(
                "Payment {} already {}; confirm is a no-op",
                payment_intent_id, payment.status
            );
            return Ok(outcome(payment.status));
        }

        let adapter = self.gateways.get(payment.gateway)?;
        let status = match adapter.verification() {
            Verification::ClientAsserted => {
                self.settle(payment_intent_id, None, NotificationType::BookingConfirm)
                    .await?
            }
            Verification::Live => {
                let reported = self
                    .bounded(payment.gateway, adapter.retrieve_status(payment_intent_id))
                    .await?;
                self.apply_reported(&payment, reported.status, reported.payload)
                    .await?
            }
        };

        Ok(outcome(status.unwrap_or(payment.status)))
    }

    /// Acts on what the gateway says, never on what the client asserted.
    async fn apply_reported(
        &self,
        payment: &Payment,
        reported: PaymentStatus,
        payload: GatewayPayload,
    ) -> CoreResult<Option<PaymentStatus>> {
        let intent = payment.payment_intent_id.as_str();
        match reported {
            PaymentStatus::Succeeded => {
                self.settle(intent, Some(payload), NotificationType::BookingConfirm)
                    .await
            }
            PaymentStatus::Failed => {
                let failed = self
                    .mark(
                        intent,
                        &[PaymentStatus::Created, PaymentStatus::Processing],
                        PaymentStatus::Failed,
                        Some(payload),
                    )
                    .await?;
                Ok(failed)
            }
            PaymentStatus::Processing => {
                self.mark(
                    intent,
                    &[PaymentStatus::Created, PaymentStatus::Failed],
                    PaymentStatus::Processing,
                    Some(payload),
                )
                .await
            }
            PaymentStatus::Created => Ok(None),
            other => {
                warn!(
                    "{} reported {} for unsettled payment {}; ignoring",
                    payment.gateway, other, intent
                );
                Ok(None)
            }
        }
    }

    async fn mark(
        &self,
        intent: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Option<PaymentStatus>> {
        match self.repos.payments.mark_status(intent, from, to, payload).await? {
            Some(payment) => {
                info!("Payment {} marked {}", intent, to);
                Ok(Some(payment.status))
            }
            None => {
                let current = self.repos.payments.find_by_intent(intent).await?;
                Ok(current.map(|p| p.status))
            }
        }
    }

    /// The single settlement path shared by confirm and webhooks.
    async fn settle(
        &self,
        intent: &str,
        payload: Option<GatewayPayload>,
        kind: NotificationType,
    ) -> CoreResult<Option<PaymentStatus>> {
        match self.repos.payments.settle_success(intent, payload).await? {
            Settlement::Applied { payment, booking } => {
                info!("Payment {} settled", intent);
                match booking {
                    Some(booking) => {
                        info!(
                            "Booking {} is {} / {}",
                            booking.reference, booking.status, booking.payment_status
                        );
                        self.dispatcher
                            .dispatch_all(vec![Effect::Notify(messages::settled(kind, &booking))])
                            .await;
                        Ok(Some(payment.status))
                    }
                    None => Ok(Some(self.settled_without_booking(payment).await)),
                }
            }
            Settlement::AlreadySettled(payment) => {
                info!("Payment {} was settled concurrently", intent);
                Ok(Some(payment.status))
            }
            Settlement::NotFound => Ok(None),
        }
    }

    /// Money arrived for a booking that settlement could not touch. A cancelled
    /// booking gets the payment refunded instead of a confirmation.
    async fn settled_without_booking(&self, payment: Payment) -> PaymentStatus {
        let booking = match self.repos.bookings.get_booking(payment.booking_id).await {
            Ok(Some(booking)) => booking,
            Ok(None) => {
                warn!(
                    "Payment {} settled for missing booking {}",
                    payment.payment_intent_id, payment.booking_id
                );
                return payment.status;
            }
            Err(e) => {
                error!(
                    "Payment {} settled but booking {} could not be loaded: {}",
                    payment.payment_intent_id, payment.booking_id, e
                );
                return payment.status;
            }
        };

        if booking.status != BookingStatus::Cancelled {
            warn!(
                "Payment {} settled but booking {} was already {}",
                payment.payment_intent_id, booking.reference, booking.payment_status
            );
            return payment.status;
        }

        warn!(
            "Payment {} captured after booking {} was cancelled; refunding",
            payment.payment_intent_id, booking.reference
        );
        let intent = payment.payment_intent_id.clone();
        let command = RefundCommand {
            booking_id: Some(booking.id),
            payment_intent_id: Some(intent.clone()),
            amount: None,
            reason: Some(LATE_CAPTURE_REASON.to_string()),
        };
        match self.refund_payment(payment.clone(), command).await {
            Ok(refund) => refund.status,
            Err(e) => {
                error!(
                    "Automatic refund of {} for cancelled booking {} failed: {}",
                    intent, booking.reference, e
                );
                payment.status
            }
        }
    }

    pub async fn refund(&self, command: RefundCommand) -> CoreResult<RefundOutcome> {
        let payment = self.refund_target(&command).await?;
        self.refund_payment(payment, command).await
    }

    /// Refund on behalf of a caller; owned bookings are only refundable by their owner.
    pub async fn refund_for(
        &self,
        command: RefundCommand,
        requester: Option<Uuid>,
    ) -> CoreResult<RefundOutcome> {
        let payment = self.refund_target(&command).await?;
        self.manager.get_for(payment.booking_id, requester).await?;
        self.refund_payment(payment, command).await
    }

    async fn refund_payment(
        &self,
        payment: Payment,
        command: RefundCommand,
    ) -> CoreResult<RefundOutcome> {
        let plan = payment.plan_refund(command.amount)?;

        // One refund in flight per payment; the claim precedes any gateway call.
        let claimed = self
            .repos
            .payments
            .claim_refund(payment.id, payment.status, payment.refunded_so_far(), plan.amount)
            .await?;
        if claimed.is_none() {
            warn!(
                "Refund on {} rejected: payment changed or another refund is in flight",
                payment.payment_intent_id
            );
            return Err(CoreError::Conflict(format!(
                "Payment {} is being refunded or has changed; retry",
                payment.payment_intent_id
            )));
        }

        let issued = self.issue_refund(&payment, &plan, command.reason.clone()).await;
        let (refund_id, payload) = match issued {
            Ok(issued) => issued,
            Err(e) => {
                if let Err(release) = self.repos.payments.release_refund(payment.id).await {
                    error!(
                        "Failed to release refund claim on {}: {}",
                        payment.payment_intent_id, release
                    );
                }
                return Err(e);
            }
        };

        let record = RefundRecord {
            refund_id: refund_id.clone(),
            amount: plan.amount,
            total_refunded: plan.total_refunded,
            reason: command.reason,
            refunded_at: Utc::now(),
            full: plan.full,
            payload,
        };

        let (updated, booking) = self
            .repos
            .payments
            .record_refund(payment.id, payment.status, payment.refunded_so_far(), &record)
            .await?
            .ok_or_else(|| {
                error!(
                    "Refund {} issued but payment {} changed underneath its claim",
                    refund_id, payment.payment_intent_id
                );
                CoreError::Conflict(format!(
                    "Payment {} changed while refunding; retry",
                    payment.payment_intent_id
                ))
            })?;

        info!(
            "Refund {} of {} recorded on {} ({} of {} refunded)",
            refund_id, plan.amount, updated.payment_intent_id, plan.total_refunded, updated.amount
        );

        if let Some(booking) = booking {
            self.dispatcher
                .dispatch_all(vec![Effect::Notify(messages::refunded(
                    &booking,
                    plan.amount,
                    plan.full,
                ))])
                .await;
        }

        Ok(RefundOutcome {
            success: true,
            status: updated.status,
            refund_id,
            refund_amount: plan.amount,
            total_refunded: plan.total_refunded,
        })
    }

    /// Gateway refund where one exists, otherwise a locally issued id.
    async fn issue_refund(
        &self,
        payment: &Payment,
        plan: &RefundPlan,
        reason: Option<String>,
    ) -> CoreResult<(String, serde_json::Value)> {
        let refundable = self
            .gateways
            .find(payment.gateway)
            .filter(|adapter| adapter.supports_refunds());
        match refundable {
            Some(adapter) => {
                let refund = self
                    .bounded(
                        payment.gateway,
                        adapter.create_refund(&RefundRequest {
                            external_id: payment.payment_intent_id.clone(),
                            amount: plan.amount,
                            full: plan.full,
                            currency: payment.currency.clone(),
                            reason,
                        }),
                    )
                    .await?;
                Ok((refund.refund_id, refund.payload))
            }
            None => Ok((
                local_refund_id(),
                serde_json::json!({ "gateway": payment.gateway, "source": "local" }),
            )),
        }
    }

    async fn refund_target(&self, command: &RefundCommand) -> CoreResult<Payment> {
        let by_intent = match command.payment_intent_id.as_deref() {
            Some(intent) if !intent.trim().is_empty() => {
                self.repos.payments.find_by_intent(intent.trim()).await?
            }
            _ => None,
        };

        match (by_intent, command.booking_id) {
            (Some(payment), Some(booking_id)) if payment.booking_id != booking_id => {
                Err(CoreError::ValidationError(format!(
                    "Payment {} does not belong to booking {}",
                    payment.payment_intent_id, booking_id
                )))
            }
            (Some(payment), _) => Ok(payment),
            (None, Some(booking_id)) => self
                .repos
                .payments
                .latest_for_booking(booking_id)
                .await?
                .ok_or_else(|| {
                    CoreError::NotFound(format!("No payment for booking {}", booking_id))
                }),
            (None, None) => match &command.payment_intent_id {
                Some(intent) if !intent.trim().is_empty() => {
                    Err(CoreError::NotFound(format!("Payment {}", intent)))
                }
                _ => Err(CoreError::ValidationError(
                    "Booking ID or payment intent ID is required".to_string(),
                )),
            },
        }
    }

    /// Paid bookings are cancelled by refunding what is left; unpaid ones directly.
    pub async fn cancel_booking(&self, id: Uuid, requester: Option<Uuid>) -> CoreResult<Booking> {
        let booking = self.manager.get_for(id, requester).await?;
        booking.ensure_cancellable()?;

        match booking.payment_status {
            BookingPaymentStatus::Paid | BookingPaymentStatus::PartiallyRefunded => {
                self.refund(RefundCommand {
                    booking_id: Some(booking.id),
                    payment_intent_id: booking.payment_intent_id.clone(),
                    amount: None,
                    reason: Some("booking_cancelled".to_string()),
                })
                .await?;
                self.manager.get(id).await
            }
            _ => self.manager.cancel(id).await,
        }
    }

    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> CoreResult<()> {
        match event {
            GatewayEvent::PaymentSucceeded { intent_id, object } => {
                let payload = GatewayPayload::Stripe { object };
                if self
                    .settle(&intent_id, Some(payload), NotificationType::PaymentSuccess)
                    .await?
                    .is_none()
                {
                    warn!("Webhook for unknown payment intent {}", intent_id);
                }
            }
            GatewayEvent::Processing { intent_id, object } => {
                self.mark(
                    &intent_id,
                    &[PaymentStatus::Created],
                    PaymentStatus::Processing,
                    Some(GatewayPayload::Stripe { object }),
                )
                .await?;
            }
            GatewayEvent::PaymentFailed { intent_id, object } => {
                self.mark(
                    &intent_id,
                    &[PaymentStatus::Created, PaymentStatus::Processing],
                    PaymentStatus::Failed,
                    Some(GatewayPayload::Stripe { object }),
                )
                .await?;
            }
            GatewayEvent::Ignored { event_type } => {
                info!("Ignoring webhook event {}", event_type);
            }
        }
        Ok(())
    }

    pub async fn payment_history(
        &self,
        booking_id: Uuid,
        requester: Option<Uuid>,
    ) -> CoreResult<PaymentHistory> {
        self.manager.get_for(booking_id, requester).await?;
        let history = self.repos.payments.history_for_booking(booking_id).await?;
        let payment = history
            .first()
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("No payment for booking {}", booking_id)))?;
        Ok(PaymentHistory { payment, history })
    }

    async fn find_payment(&self, intent: &str) -> CoreResult<Payment> {
        self.repos
            .payments
            .find_by_intent(intent)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Payment {}", intent)))
    }

    async fn bounded<T>(
        &self,
        gateway: Gateway,
        call: impl Future<Output = GatewayResult<T>>,
    ) -> CoreResult<T> {
        let result = match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                gateway,
                seconds: self.gateway_timeout.as_secs(),
            }),
        };
        result.map_err(|e| {
            error!("Gateway call failed: {}", e);
            CoreError::from(e)
        })
    }
}

fn outcome(status: PaymentStatus) -> ConfirmOutcome {
    ConfirmOutcome {
        success: status.is_settled(),
        payment_status: status,
    }
}
