use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use aerobook_api::middleware::Claims;
use aerobook_api::{app, AppState};
use aerobook_core::booking::CabinClass;
use aerobook_core::flight::Flight;
use aerobook_core::payment::Gateway;
use aerobook_core::user::User;
use aerobook_reconcile::gateways::{BankTransferGateway, MockGateway};
use aerobook_reconcile::webhook::compute_signature;
use aerobook_reconcile::{GatewayRegistry, NotificationDispatcher, Repositories};
use aerobook_store::app_config::{
    AuthConfig, BankConfig, Config, GatewaysConfig, PaymentsConfig, ServerConfig, StripeConfig,
};
use aerobook_store::{InMemoryStore, LogMailer, RealtimeHub};

const JWT_SECRET: &str = "test-jwt-secret";
const WEBHOOK_SECRET: &str = "whsec_integration";

struct TestApp {
    router: Router,
    user: User,
    flight: Flight,
}

fn config(webhook_secret: Option<&str>) -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: Default::default(),
        redis: Default::default(),
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
        },
        payments: PaymentsConfig::default(),
        gateways: GatewaysConfig {
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: webhook_secret.map(str::to_string),
                api_base: None,
            },
            ..Default::default()
        },
        bank: BankConfig::default(),
        smtp: None,
    }
}

async fn test_app(webhook_secret: Option<&str>) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let user = User {
        id: Uuid::new_v4(),
        name: "Riya Menon".to_string(),
        email: "riya@example.com".to_string(),
        phone: None,
    };
    store.add_user(user.clone()).await;

    let flight = Flight {
        id: Uuid::new_v4(),
        airline: "Akasa Air".to_string(),
        flight_number: "QP-1101".to_string(),
        origin: "BLR".to_string(),
        destination: "BOM".to_string(),
        departure_date: Utc::now() + chrono::Duration::days(5),
        arrival_date: None,
        duration_minutes: Some(100),
        price: dec!(100),
        seats_available: 180,
        cabin_class: CabinClass::Economy,
        status: "scheduled".to_string(),
        created_at: Utc::now(),
    };
    store.add_flight(flight.clone()).await;

    let config = config(webhook_secret);
    let repos = Repositories::in_memory(store);
    let hub = RealtimeHub::new(None);
    let dispatcher = Arc::new(
        NotificationDispatcher::new(repos.notifications.clone(), repos.users.clone())
            .with_transport(Arc::new(LogMailer))
            .with_realtime(Arc::new(hub.clone())),
    );
    let gateways = GatewayRegistry::new()
        .with(Arc::new(MockGateway::live(Gateway::Stripe)))
        .with(Arc::new(BankTransferGateway::new(aerobook_core::payment::BankDetails {
            bank_name: "Canara Bank".to_string(),
            account_number: "0000111122223333".to_string(),
            ifsc_code: "CNRB0000001".to_string(),
        })));

    let state = AppState::new(&config, repos, gateways, dispatcher, hub);
    TestApp {
        router: app(state),
        user,
        flight,
    }
}

fn token_for(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: None,
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn create_booking(app: &TestApp, token: &str) -> Value {
    let (status, booking) = send(
        &app.router,
        post_json(
            "/bookings",
            Some(token),
            json!({
                "flightId": app.flight.id,
                "passengers": [
                    {"firstName": "Riya", "lastName": "Menon"},
                    {"firstName": "Dev", "lastName": "Menon"}
                ],
                "cabinClass": "business"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    booking
}

fn signed_webhook(body: &Value, secret: &str) -> Request<Body> {
    let raw = body.to_string();
    let ts = Utc::now().timestamp();
    let signature = compute_signature(secret, ts, raw.as_bytes()).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json")
        .header("stripe-signature", format!("t={},v1={}", ts, signature))
        .body(Body::from(raw))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = test_app(None).await;
    let (status, body) = send(&app.router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_booking_payment_flow() {
    let app = test_app(None).await;
    let token = token_for(app.user.id);

    let booking = create_booking(&app, &token).await;
    assert_eq!(booking["totalPrice"], json!(300.0));
    assert_eq!(booking["status"], "booked");
    assert_eq!(booking["paymentStatus"], "pending");
    assert_eq!(booking["contactInfo"]["email"], "riya@example.com");
    assert_eq!(booking["reference"].as_str().unwrap().len(), 6);
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, intent) = send(
        &app.router,
        post_json(
            "/payments/create-intent",
            Some(&token),
            json!({
                "bookingId": booking_id,
                "paymentGateway": "stripe",
                "paymentMethod": "credit_card"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["paymentGateway"], "stripe");
    assert!(intent["clientSecret"].is_string());
    let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();

    let (status, confirmed) = send(
        &app.router,
        post_json(
            "/payments/confirm",
            None,
            json!({ "paymentIntentId": intent_id, "bookingId": booking_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["success"], true);
    assert_eq!(confirmed["paymentStatus"], "succeeded");

    let (_, booking) = send(&app.router, get(&format!("/bookings/{}", booking_id), Some(&token))).await;
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["paymentStatus"], "paid");

    let (status, _) = send(&app.router, get(&format!("/payments/{}", booking_id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let stranger = token_for(Uuid::new_v4());
    let (status, _) = send(
        &app.router,
        get(&format!("/payments/{}", booking_id), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, history) = send(
        &app.router,
        get(&format!("/payments/{}", booking_id), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["payment"]["status"], "succeeded");
    assert_eq!(history["history"].as_array().unwrap().len(), 1);

    let (status, notifications) = send(
        &app.router,
        get(&format!("/users/{}/notifications", app.user.id), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let notifications = notifications.as_array().unwrap();
    assert!(notifications
        .iter()
        .any(|n| n["type"] == "booking_confirm" && n["channel"] == "email" && n["sent"] == true));

    let (status, checked_in) = send(
        &app.router,
        post_json(&format!("/bookings/{}/check-in", booking_id), Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checked_in["status"], "checked_in");
}

#[tokio::test]
async fn test_error_statuses() {
    let app = test_app(None).await;
    let token = token_for(app.user.id);
    let booking = create_booking(&app, &token).await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/payments/create-intent",
            Some(&token),
            json!({
                "bookingId": booking["id"],
                "paymentGateway": "paypal",
                "paymentMethod": "wallet"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("paypal"));

    let (status, _) = send(
        &app.router,
        post_json(
            "/payments/create-intent",
            Some(&token),
            json!({ "bookingId": "BK-123", "paymentMethod": "upi" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        post_json("/payments/confirm", None, json!({ "paymentIntentId": "pi_nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, get("/bookings", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, get("/bookings", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = token_for(Uuid::new_v4());
    let (status, _) = send(
        &app.router,
        get(&format!("/users/{}/notifications", app.user.id), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app.router,
        post_json(
            &format!("/bookings/{}/check-in", booking["id"].as_str().unwrap()),
            Some(&token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_refund_over_remainder_is_rejected() {
    let app = test_app(None).await;
    let token = token_for(app.user.id);
    let booking = create_booking(&app, &token).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (_, intent) = send(
        &app.router,
        post_json(
            "/payments/create-intent",
            Some(&token),
            json!({
                "bookingId": booking_id,
                "paymentGateway": "bank_transfer",
                "paymentMethod": "bank_transfer"
            }),
        ),
    )
    .await;
    assert!(intent["paymentIntentId"].as_str().unwrap().starts_with("BT-"));
    assert_eq!(intent["bankDetails"]["ifscCode"], "CNRB0000001");
    send(
        &app.router,
        post_json(
            "/payments/confirm",
            None,
            json!({ "paymentIntentId": intent["paymentIntentId"] }),
        ),
    )
    .await;

    // Only the booking holder may refund it.
    let stranger = token_for(Uuid::new_v4());
    for caller in [None, Some(stranger.as_str())] {
        let (status, _) = send(
            &app.router,
            post_json(
                "/payments/refund",
                caller,
                json!({ "bookingId": booking_id, "amount": 120.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, _) = send(
        &app.router,
        post_json(
            "/payments/refund",
            Some(&token),
            json!({ "bookingId": booking_id, "amount": 500.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, refund) = send(
        &app.router,
        post_json(
            "/payments/refund",
            Some(&token),
            json!({ "bookingId": booking_id, "amount": 120.0, "reason": "seat downgrade" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refund["status"], "partially_refunded");
    assert!(refund["refundId"].as_str().unwrap().starts_with("RF-"));

    let (_, booking) = send(&app.router, get(&format!("/bookings/{}", booking_id), Some(&token))).await;
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["paymentStatus"], "partially_refunded");

    let (status, cancelled) = send(
        &app.router,
        post_json(&format!("/bookings/{}/cancel", booking_id), Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["paymentStatus"], "refunded");
}

#[tokio::test]
async fn test_stripe_webhook_verification() {
    let app = test_app(Some(WEBHOOK_SECRET)).await;
    let token = token_for(app.user.id);
    let booking = create_booking(&app, &token).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (_, intent) = send(
        &app.router,
        post_json(
            "/payments/create-intent",
            Some(&token),
            json!({
                "bookingId": booking_id,
                "paymentGateway": "stripe",
                "paymentMethod": "upi"
            }),
        ),
    )
    .await;
    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent["paymentIntentId"], "status": "succeeded" } }
    });

    let unsigned = post_json("/webhooks/stripe", None, event.clone());
    let (status, _) = send(&app.router, unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, signed_webhook(&event, "whsec_wrong")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, booking) = send(&app.router, get(&format!("/bookings/{}", booking_id), Some(&token))).await;
    assert_eq!(booking["status"], "booked");

    for _ in 0..2 {
        let (status, body) = send(&app.router, signed_webhook(&event, WEBHOOK_SECRET)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
    }

    let (_, booking) = send(&app.router, get(&format!("/bookings/{}", booking_id), Some(&token))).await;
    assert_eq!(booking["status"], "confirmed");

    let (_, notifications) = send(
        &app.router,
        get(&format!("/users/{}/notifications", app.user.id), Some(&token)),
    )
    .await;
    let emails = notifications
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["type"] == "payment_success" && n["channel"] == "email")
        .count();
    assert_eq!(emails, 1);
}

#[tokio::test]
async fn test_stripe_webhook_without_secret_is_unavailable() {
    let app = test_app(None).await;
    let event = json!({ "type": "payment_intent.succeeded", "data": { "object": { "id": "pi_1" } } });
    let (status, _) = send(&app.router, signed_webhook(&event, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_airline_update_notifies_booking_holders() {
    let app = test_app(None).await;
    let token = token_for(app.user.id);
    create_booking(&app, &token).await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/webhooks/airline",
            None,
            json!({ "flightNumber": app.flight.flight_number, "status": "delayed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notified"], 1);

    let (_, notifications) = send(
        &app.router,
        get(&format!("/users/{}/notifications", app.user.id), Some(&token)),
    )
    .await;
    assert!(notifications
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["type"] == "flight_update"));
}
