mod common;

use std::time::Duration;

use rust_decimal_macros::dec;
use uuid::Uuid;

use aerobook_core::booking::{BookingPaymentStatus, BookingStatus, CabinClass};
use aerobook_core::flight::{FlightDetails, FlightUpdate};
use aerobook_core::notification::{Channel, NotificationType};
use aerobook_core::payment::{Gateway, PaymentStatus};
use aerobook_core::repository::{FlightRepository, PaymentLedger};
use aerobook_core::CoreError;
use aerobook_reconcile::gateways::MockGateway;
use aerobook_reconcile::{CreateIntent, GatewayEvent, RefundCommand};
use aerobook_shared::models::events::RealtimeEvent;

use common::{passenger, Harness};

const CONFIRMATIONS: &[NotificationType] = &[
    NotificationType::BookingConfirm,
    NotificationType::PaymentSuccess,
];

#[tokio::test]
async fn test_intent_charges_stored_booking_total() {
    let h = Harness::new().await;
    let booking = h.book(2, CabinClass::Business).await;
    assert_eq!(booking.total_price, dec!(300));

    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();

    assert_eq!(created.amount, dec!(300));
    assert_eq!(created.payment_gateway, Gateway::Stripe);
    assert!(created.client_secret.is_some());

    let payment = h
        .repos
        .payments
        .find_by_intent(&created.payment_intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Created);
    assert_eq!(payment.amount, dec!(300));
    assert_eq!(payment.currency, "INR");
    assert_eq!(h.stripe.intents_created(), 1);
}

#[tokio::test]
async fn test_unconfigured_gateway_fails_before_side_effects() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;

    let err = h
        .engine
        .create_intent(h.intent_for(&booking, "razorpay", "upi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayUnavailable(g) if g == "razorpay"));
    assert!(h
        .repos
        .payments
        .history_for_booking(booking.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_method_and_gateway_are_validated() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;

    let mut missing = h.intent_for(&booking, "stripe", "");
    missing.payment_method = None;
    assert!(matches!(
        h.engine.create_intent(missing).await,
        Err(CoreError::ValidationError(_))
    ));

    let bad_method = h.intent_for(&booking, "stripe", "cheque");
    assert!(matches!(
        h.engine.create_intent(bad_method).await,
        Err(CoreError::ValidationError(msg)) if msg.contains("cheque")
    ));

    let bad_gateway = h.intent_for(&booking, "venmo", "wallet");
    assert!(matches!(
        h.engine.create_intent(bad_gateway).await,
        Err(CoreError::ValidationError(_))
    ));
    assert_eq!(h.stripe.intents_created(), 0);
}

#[tokio::test]
async fn test_booking_id_resolution_errors() {
    let h = Harness::new().await;

    let malformed = CreateIntent {
        booking_id: Some("not-a-uuid".to_string()),
        payment_method: Some("credit_card".to_string()),
        ..CreateIntent::default()
    };
    assert!(matches!(
        h.engine.create_intent(malformed).await,
        Err(CoreError::ValidationError(_))
    ));

    let unknown = CreateIntent {
        booking_id: Some(Uuid::new_v4().to_string()),
        payment_method: Some("credit_card".to_string()),
        ..CreateIntent::default()
    };
    assert!(matches!(
        h.engine.create_intent(unknown).await,
        Err(CoreError::NotFound(_))
    ));

    let absent = CreateIntent {
        payment_method: Some("credit_card".to_string()),
        ..CreateIntent::default()
    };
    assert!(matches!(
        h.engine.create_intent(absent).await,
        Err(CoreError::ValidationError(msg)) if msg.contains("required")
    ));
}

#[tokio::test]
async fn test_walk_up_checkout_creates_flight_once() {
    let h = Harness::new().await;
    let departure = chrono::Utc::now() + chrono::Duration::days(10);
    let walk_up = || CreateIntent {
        payment_gateway: Some("bank_transfer".to_string()),
        payment_method: Some("bank_transfer".to_string()),
        flight: FlightDetails {
            flight_number: Some("AI-865".to_string()),
            airline: Some("Air India".to_string()),
            origin: Some("BOM".to_string()),
            destination: Some("DEL".to_string()),
            departure_date: Some(departure),
            arrival_date: None,
            duration_minutes: None,
            price: Some(dec!(5000)),
        },
        passengers: vec![passenger("Isha")],
        cabin_class: Some("first".to_string()),
        ..CreateIntent::default()
    };

    let first = h.engine.create_intent(walk_up()).await.unwrap();
    let second = h.engine.create_intent(walk_up()).await.unwrap();
    assert_eq!(first.amount, dec!(10000));
    assert_ne!(first.booking_id, second.booking_id);

    let flight = h.repos.flights.find_by_number("AI-865").await.unwrap().unwrap();
    assert_eq!(h.booking(first.booking_id).await.flight_id, flight.id);
    assert_eq!(h.booking(second.booking_id).await.flight_id, flight.id);

    let mut incomplete = walk_up();
    incomplete.flight.origin = None;
    incomplete.flight.flight_number = Some("AI-999".to_string());
    assert!(matches!(
        h.engine.create_intent(incomplete).await,
        Err(CoreError::ValidationError(msg)) if msg.contains("origin")
    ));
}

#[tokio::test]
async fn test_double_confirm_notifies_once() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;
    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();

    let first = h
        .engine
        .confirm(&created.payment_intent_id, Some(booking.id))
        .await
        .unwrap();
    let second = h
        .engine
        .confirm(&created.payment_intent_id, Some(booking.id))
        .await
        .unwrap();

    assert!(first.success && second.success);
    assert_eq!(second.payment_status, PaymentStatus::Succeeded);
    assert_eq!(h.stripe.status_checks(), 1);

    let booking = h.booking(booking.id).await;
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
    assert_eq!(
        booking.payment_intent_id.as_deref(),
        Some(created.payment_intent_id.as_str())
    );

    assert_eq!(h.sent_of(booking.id, CONFIRMATIONS, Channel::Email).await, 1);
    assert_eq!(h.email.sent()[0].0, "aarav@example.com");
    assert_eq!(h.sms.sent().len(), 1);
}

#[tokio::test]
async fn test_confirm_and_webhook_race_settles_once() {
    let h = Harness::with_stripe(
        MockGateway::live(Gateway::Stripe).with_delay(Duration::from_millis(20)),
        Duration::from_secs(5),
    )
    .await;
    let booking = h.book(1, CabinClass::Economy).await;
    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();
    let intent = created.payment_intent_id.clone();

    let (confirmed, webhook) = tokio::join!(
        h.engine.confirm(&intent, Some(booking.id)),
        h.engine.handle_gateway_event(GatewayEvent::PaymentSucceeded {
            intent_id: intent.clone(),
            object: serde_json::json!({ "id": intent.clone(), "status": "succeeded" }),
        })
    );

    assert_eq!(confirmed.unwrap().payment_status, PaymentStatus::Succeeded);
    webhook.unwrap();
    assert_eq!(h.sent_of(booking.id, CONFIRMATIONS, Channel::Email).await, 1);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_duplicate_webhooks_are_harmless() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;
    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "debit_card"))
        .await
        .unwrap();

    let event = GatewayEvent::PaymentSucceeded {
        intent_id: created.payment_intent_id.clone(),
        object: serde_json::json!({ "id": created.payment_intent_id }),
    };
    h.engine.handle_gateway_event(event.clone()).await.unwrap();
    h.engine.handle_gateway_event(event).await.unwrap();

    assert_eq!(
        h.sent_of(booking.id, &[NotificationType::PaymentSuccess], Channel::Email)
            .await,
        1
    );
    assert_eq!(h.stripe.status_checks(), 0);

    // Unknown intents are acknowledged without effect.
    h.engine
        .handle_gateway_event(GatewayEvent::PaymentSucceeded {
            intent_id: "pi_unknown".to_string(),
            object: serde_json::json!({ "id": "pi_unknown" }),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_capture_after_cancel_is_refunded_not_confirmed() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;
    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();

    h.engine
        .cancel_booking(booking.id, Some(h.user.id))
        .await
        .unwrap();

    h.engine
        .handle_gateway_event(GatewayEvent::PaymentSucceeded {
            intent_id: created.payment_intent_id.clone(),
            object: serde_json::json!({ "id": created.payment_intent_id }),
        })
        .await
        .unwrap();

    let after = h.booking(booking.id).await;
    assert_eq!(after.status, BookingStatus::Cancelled);
    assert_eq!(after.payment_status, BookingPaymentStatus::Refunded);

    let payment = h
        .repos
        .payments
        .find_by_intent(&created.payment_intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.refund_amount, Some(dec!(100)));
    assert_eq!(h.stripe.refunds_issued(), 1);

    for channel in [Channel::Email, Channel::Sms] {
        assert_eq!(h.sent_of(booking.id, CONFIRMATIONS, channel).await, 0);
    }
    assert_eq!(
        h.sent_of(booking.id, &[NotificationType::BookingRefund], Channel::Email)
            .await,
        1
    );

    // A redelivered webhook neither confirms nor refunds again.
    h.engine
        .handle_gateway_event(GatewayEvent::PaymentSucceeded {
            intent_id: created.payment_intent_id.clone(),
            object: serde_json::json!({ "id": created.payment_intent_id }),
        })
        .await
        .unwrap();
    assert_eq!(h.stripe.refunds_issued(), 1);
    assert_eq!(h.sent_of(booking.id, CONFIRMATIONS, Channel::Email).await, 0);
}

#[tokio::test]
async fn test_failure_webhook_does_not_undo_settlement() {
    let h = Harness::new().await;
    let (booking, intent) = h.paid_booking(CabinClass::Economy, 1).await;

    h.engine
        .handle_gateway_event(GatewayEvent::PaymentFailed {
            intent_id: intent.clone(),
            object: serde_json::json!({ "id": intent }),
        })
        .await
        .unwrap();

    let payment = h.repos.payments.find_by_intent(&intent).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_live_gateway_processing_does_not_confirm() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;
    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();

    h.stripe.report(PaymentStatus::Processing);
    let outcome = h
        .engine
        .confirm(&created.payment_intent_id, None)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.payment_status, PaymentStatus::Processing);

    let still = h.booking(booking.id).await;
    assert_eq!(still.status, BookingStatus::Booked);
    assert_eq!(still.payment_status, BookingPaymentStatus::Pending);
    assert!(h.notifications(booking.id).await.is_empty());

    // A failed attempt can still be settled later.
    h.stripe.report(PaymentStatus::Failed);
    let failed = h.engine.confirm(&created.payment_intent_id, None).await.unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);

    h.stripe.report(PaymentStatus::Succeeded);
    let settled = h.engine.confirm(&created.payment_intent_id, None).await.unwrap();
    assert_eq!(settled.payment_status, PaymentStatus::Succeeded);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_confirm_rejects_foreign_booking() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;
    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();

    assert!(matches!(
        h.engine
            .confirm(&created.payment_intent_id, Some(Uuid::new_v4()))
            .await,
        Err(CoreError::ValidationError(_))
    ));
    assert!(matches!(
        h.engine.confirm("pi_missing", None).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_bank_transfer_is_local_and_client_asserted() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;

    let created = h
        .engine
        .create_intent(h.intent_for(&booking, "bank_transfer", "bank_transfer"))
        .await
        .unwrap();
    assert!(created.payment_intent_id.starts_with("BT-"));
    assert_eq!(created.bank_details.unwrap().ifsc_code, "HDFC0001234");
    assert!(created.client_secret.is_none());

    let outcome = h
        .engine
        .confirm(&created.payment_intent_id, Some(booking.id))
        .await
        .unwrap();
    assert_eq!(outcome.payment_status, PaymentStatus::Succeeded);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);

    let refund = h
        .engine
        .refund(RefundCommand {
            booking_id: Some(booking.id),
            ..RefundCommand::default()
        })
        .await
        .unwrap();
    assert!(refund.refund_id.starts_with("RF-"));
    assert_eq!(refund.status, PaymentStatus::Refunded);

    assert_eq!(h.stripe.intents_created(), 0);
    assert_eq!(h.stripe.status_checks(), 0);
    assert_eq!(h.stripe.refunds_issued(), 0);
}

#[tokio::test]
async fn test_partial_then_full_refund() {
    let h = Harness::new().await;
    let (booking, intent) = h.paid_booking(CabinClass::Business, 2).await;

    let partial = h
        .engine
        .refund(RefundCommand {
            payment_intent_id: Some(intent.clone()),
            amount: Some(dec!(100)),
            reason: Some("schedule change".to_string()),
            ..RefundCommand::default()
        })
        .await
        .unwrap();
    assert_eq!(partial.status, PaymentStatus::PartiallyRefunded);
    assert_eq!(partial.total_refunded, dec!(100));

    let after_partial = h.booking(booking.id).await;
    assert_eq!(after_partial.status, BookingStatus::Confirmed);
    assert_eq!(after_partial.payment_status, BookingPaymentStatus::PartiallyRefunded);

    let too_much = h
        .engine
        .refund(RefundCommand {
            booking_id: Some(booking.id),
            amount: Some(dec!(250)),
            ..RefundCommand::default()
        })
        .await;
    assert!(matches!(too_much, Err(CoreError::ValidationError(_))));

    let rest = h
        .engine
        .refund(RefundCommand {
            booking_id: Some(booking.id),
            ..RefundCommand::default()
        })
        .await
        .unwrap();
    assert_eq!(rest.refund_amount, dec!(200));
    assert_eq!(rest.status, PaymentStatus::Refunded);

    let cancelled = h.booking(booking.id).await;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, BookingPaymentStatus::Refunded);

    let again = h
        .engine
        .refund(RefundCommand {
            booking_id: Some(booking.id),
            ..RefundCommand::default()
        })
        .await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));

    assert_eq!(h.stripe.refunds_issued(), 2);
    assert_eq!(
        h.sent_of(booking.id, &[NotificationType::BookingRefund], Channel::Email)
            .await,
        2
    );

    let history = h
        .engine
        .payment_history(booking.id, Some(h.user.id))
        .await
        .unwrap();
    assert!(matches!(
        h.engine.payment_history(booking.id, None).await,
        Err(CoreError::NotFound(_))
    ));
    assert_eq!(history.payment.refund_amount, Some(dec!(300)));
    assert_eq!(history.payment.metadata["refunds"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_refund_needs_a_target() {
    let h = Harness::new().await;
    assert!(matches!(
        h.engine.refund(RefundCommand::default()).await,
        Err(CoreError::ValidationError(_))
    ));

    let booking = h.book(1, CabinClass::Economy).await;
    h.engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap();
    // Unsettled payments are not refundable.
    assert!(matches!(
        h.engine
            .refund(RefundCommand {
                booking_id: Some(booking.id),
                ..RefundCommand::default()
            })
            .await,
        Err(CoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_gateway_refund_failure_leaves_ledger_untouched() {
    let h = Harness::new().await;
    let (booking, intent) = h.paid_booking(CabinClass::Economy, 1).await;

    h.stripe.fail(true);
    let err = h
        .engine
        .refund(RefundCommand {
            payment_intent_id: Some(intent.clone()),
            ..RefundCommand::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError { .. }));

    let payment = h.repos.payments.find_by_intent(&intent).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.refund_pending, None);
    assert_eq!(h.booking(booking.id).await.payment_status, BookingPaymentStatus::Paid);

    // The failed attempt released its claim, so a retry goes through.
    h.stripe.fail(false);
    let retry = h
        .engine
        .refund(RefundCommand {
            payment_intent_id: Some(intent),
            ..RefundCommand::default()
        })
        .await
        .unwrap();
    assert_eq!(retry.status, PaymentStatus::Refunded);
    assert_eq!(h.stripe.refunds_issued(), 1);
}

#[tokio::test]
async fn test_concurrent_refunds_reach_gateway_once() {
    let h = Harness::with_stripe(
        MockGateway::live(Gateway::Stripe).with_delay(Duration::from_millis(50)),
        Duration::from_secs(5),
    )
    .await;
    let (booking, intent) = h.paid_booking(CabinClass::Business, 2).await;
    assert_eq!(booking.total_price, dec!(300));

    let partial = || RefundCommand {
        payment_intent_id: Some(intent.clone()),
        amount: Some(dec!(100)),
        ..RefundCommand::default()
    };
    let (first, second) = tokio::join!(h.engine.refund(partial()), h.engine.refund(partial()));

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(CoreError::Conflict(_)))));
    assert_eq!(h.stripe.refunds_issued(), 1);

    let payment = h.repos.payments.find_by_intent(&intent).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::PartiallyRefunded);
    assert_eq!(payment.refund_amount, Some(dec!(100)));
    assert_eq!(payment.refund_pending, None);
    assert_eq!(
        h.sent_of(booking.id, &[NotificationType::BookingRefund], Channel::Email)
            .await,
        1
    );

    // The loser can simply retry once the first refund has landed.
    let retry = h.engine.refund(partial()).await.unwrap();
    assert_eq!(retry.total_refunded, dec!(200));
    assert_eq!(h.stripe.refunds_issued(), 2);
}

#[tokio::test]
async fn test_refund_for_requires_booking_owner() {
    let h = Harness::new().await;
    let (booking, intent) = h.paid_booking(CabinClass::Economy, 1).await;

    for requester in [None, Some(Uuid::new_v4())] {
        let err = h
            .engine
            .refund_for(
                RefundCommand {
                    payment_intent_id: Some(intent.clone()),
                    ..RefundCommand::default()
                },
                requester,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
    assert_eq!(h.stripe.refunds_issued(), 0);

    let owned = h
        .engine
        .refund_for(
            RefundCommand {
                booking_id: Some(booking.id),
                ..RefundCommand::default()
            },
            Some(h.user.id),
        )
        .await
        .unwrap();
    assert_eq!(owned.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_slow_gateway_times_out_without_persisting() {
    let h = Harness::with_stripe(
        MockGateway::live(Gateway::Stripe).with_delay(Duration::from_millis(300)),
        Duration::from_millis(50),
    )
    .await;
    let booking = h.book(1, CabinClass::Economy).await;

    let err = h
        .engine
        .create_intent(h.intent_for(&booking, "stripe", "credit_card"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError { message, .. } if message.contains("timed out")));
    assert!(h
        .repos
        .payments
        .history_for_booking(booking.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cancel_paths() {
    let h = Harness::new().await;

    let unpaid = h.book(1, CabinClass::Economy).await;
    let cancelled = h
        .engine
        .cancel_booking(unpaid.id, Some(h.user.id))
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, BookingPaymentStatus::Pending);
    assert_eq!(
        h.sent_of(unpaid.id, &[NotificationType::BookingCancelled], Channel::Email)
            .await,
        1
    );
    assert!(matches!(
        h.engine.cancel_booking(unpaid.id, Some(h.user.id)).await,
        Err(CoreError::Conflict(_))
    ));

    let (paid, _) = h.paid_booking(CabinClass::First, 1).await;
    let refunded = h.engine.cancel_booking(paid.id, Some(h.user.id)).await.unwrap();
    assert_eq!(refunded.status, BookingStatus::Cancelled);
    assert_eq!(refunded.payment_status, BookingPaymentStatus::Refunded);

    // Someone else's booking is invisible.
    let other = h.book(1, CabinClass::Economy).await;
    assert!(matches!(
        h.engine.cancel_booking(other.id, Some(Uuid::new_v4())).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_check_in_requires_confirmation() {
    let h = Harness::new().await;
    let booking = h.book(1, CabinClass::Economy).await;
    let bookings = h.engine.bookings();

    assert!(matches!(
        bookings.check_in(booking.id, Some(h.user.id)).await,
        Err(CoreError::Conflict(_))
    ));

    let (paid, _) = h.paid_booking(CabinClass::Economy, 1).await;
    let checked = bookings.check_in(paid.id, Some(h.user.id)).await.unwrap();
    assert!(checked.checked_in);
    assert_eq!(checked.status, BookingStatus::CheckedIn);

    assert!(matches!(
        bookings.check_in(paid.id, Some(h.user.id)).await,
        Err(CoreError::Conflict(_))
    ));

    // Checked-in bookings can still be cancelled.
    let cancelled = h.engine.cancel_booking(paid.id, Some(h.user.id)).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_flight_update_reaches_active_bookings() {
    let h = Harness::new().await;
    let mut events = h.hub.subscribe();
    let (live, _) = h.paid_booking(CabinClass::Economy, 1).await;
    let dropped = h.book(1, CabinClass::Economy).await;
    h.engine.bookings().cancel(dropped.id).await.unwrap();

    let notified = h
        .flights
        .process_update(FlightUpdate {
            flight_number: h.flight.flight_number.clone(),
            status: Some("delayed".to_string()),
            estimated_departure: None,
            estimated_arrival: None,
        })
        .await
        .unwrap();
    assert_eq!(notified, 1);
    assert_eq!(
        h.sent_of(live.id, &[NotificationType::FlightUpdate], Channel::Email)
            .await,
        1
    );
    assert!(h
        .notifications(dropped.id)
        .await
        .iter()
        .all(|n| n.kind != NotificationType::FlightUpdate));

    let message = events.recv().await.unwrap();
    assert_eq!(message.channel, h.user.id.to_string());
    let RealtimeEvent::FlightUpdate(update) = message.event;
    assert_eq!(update.status, "delayed");
    assert_eq!(update.booking_id, live.id);

    let unknown = h
        .flights
        .process_update(FlightUpdate {
            flight_number: "XX-000".to_string(),
            status: Some("cancelled".to_string()),
            estimated_departure: None,
            estimated_arrival: None,
        })
        .await
        .unwrap();
    assert_eq!(unknown, 0);
}
