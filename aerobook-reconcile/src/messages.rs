//! Customer-facing copy for each notification type.

use rust_decimal::Decimal;

use aerobook_core::booking::Booking;
use aerobook_core::flight::Flight;
use aerobook_core::notification::{NotificationRequest, NotificationType};
use aerobook_core::payment::to_major_string;

pub fn settled(kind: NotificationType, booking: &Booking) -> NotificationRequest {
    let (subject, body) = match kind {
        NotificationType::PaymentSuccess => (
            format!("Payment received: {}", booking.reference),
            format!(
                "We received your payment of {} for booking {}. Your booking is confirmed.",
                to_major_string(booking.total_price),
                booking.reference
            ),
        ),
        _ => (
            format!("Booking confirmed: {}", booking.reference),
            format!(
                "Your booking {} for {} passenger(s) is confirmed. Total paid: {}.",
                booking.reference,
                booking.passengers.len(),
                to_major_string(booking.total_price)
            ),
        ),
    };
    NotificationRequest::for_booking(kind, booking, subject, body).deduplicated()
}

pub fn refunded(booking: &Booking, amount: Decimal, full: bool) -> NotificationRequest {
    let body = if full {
        format!(
            "A refund of {} has been issued for booking {}. The booking is now cancelled.",
            to_major_string(amount),
            booking.reference
        )
    } else {
        format!(
            "A partial refund of {} has been issued for booking {}.",
            to_major_string(amount),
            booking.reference
        )
    };
    NotificationRequest::for_booking(
        NotificationType::BookingRefund,
        booking,
        format!("Refund processed: {}", booking.reference),
        body,
    )
}

pub fn cancelled(booking: &Booking) -> NotificationRequest {
    NotificationRequest::for_booking(
        NotificationType::BookingCancelled,
        booking,
        format!("Booking cancelled: {}", booking.reference),
        format!("Your booking {} has been cancelled.", booking.reference),
    )
    .deduplicated()
}

pub fn flight_changed(booking: &Booking, flight: &Flight) -> NotificationRequest {
    let mut body = format!(
        "Flight {} ({} to {}) is now {}. Departure: {}.",
        flight.flight_number,
        flight.origin,
        flight.destination,
        flight.status,
        flight.departure_date.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(arrival) = flight.arrival_date {
        body.push_str(&format!(" Arrival: {}.", arrival.format("%Y-%m-%d %H:%M UTC")));
    }
    NotificationRequest::for_booking(
        NotificationType::FlightUpdate,
        booking,
        format!("Flight update: {} {}", flight.flight_number, flight.status),
        body,
    )
}
