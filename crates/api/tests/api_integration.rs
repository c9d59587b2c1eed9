//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{CheckoutConfig, GatewayMode, InMemoryCollaborators};
use common::ManualClock;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const SEED: &str = r#"{
    "products": [
        {"sku": "X", "price_cents": 1000, "stock": 10},
        {"sku": "Y", "price_cents": 500, "stock": 10},
        {"sku": "SOLO", "price_cents": 2500, "stock": 1}
    ],
    "tax_rates": [{"category": "standard", "basis_points": 1000}],
    "coupons": [{"code": "SAVE10", "kind": {"type": "percentage", "value": 1000}}]
}"#;

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: Router,
    collaborators: InMemoryCollaborators,
    clock: ManualClock,
}

async fn setup() -> TestApp {
    let clock = ManualClock::default();
    let config = CheckoutConfig::default().with_reservation_ttl(chrono::Duration::minutes(5));
    let (state, collaborators) = api::create_default_state(config, Arc::new(clock.clone()));

    let seed: api::seed::Seed = serde_json::from_str(SEED).unwrap();
    seed.apply(&collaborators, "default").await.unwrap();

    TestApp {
        router: api::create_app(state, get_metrics_handle()),
        collaborators,
        clock,
    }
}

enum As<'a> {
    Anonymous,
    User(&'a str),
    Guest(&'a str),
    Both { user: &'a str, guest: &'a str },
}

impl TestApp {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        who: As<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match who {
            As::Anonymous => builder,
            As::User(id) => builder.header("x-user-id", id),
            As::Guest(id) => builder.header("x-guest-session", id),
            As::Both { user, guest } => builder
                .header("x-user-id", user)
                .header("x-guest-session", guest),
        };
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn add(&self, who: As<'_>, sku: &str, quantity: i64) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/cart/items",
            who,
            Some(json!({ "sku": sku, "quantity": quantity })),
        )
        .await
    }

    async fn initiate(&self, user: &str) -> (StatusCode, Value) {
        self.call("POST", "/checkout/initiate", As::User(user), None)
            .await
    }

    async fn pay(&self, user: &str, session_id: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/checkout/pay",
            As::User(user),
            Some(json!({ "session_id": session_id, "payment_method": "card" })),
        )
        .await
    }
}

fn cents(value: &Value) -> i64 {
    value["cents"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;
    let (status, json) = app.call("GET", "/health", As::Anonymous, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

mod cart_endpoints {
    use super::*;

    #[tokio::test]
    async fn test_add_item_and_read_cart() {
        let app = setup().await;
        let (status, json) = app.add(As::User("u1"), "X", 2).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(cents(&json["totals"]["subtotal"]), 2000);

        let (status, json) = app.call("GET", "/cart", As::User("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
        assert!(json["cart_id"].is_string());
    }

    #[tokio::test]
    async fn test_coupon_totals() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 2).await;

        let (status, json) = app
            .call("PUT", "/cart/coupon", As::User("u1"), Some(json!({ "code": "SAVE10" })))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cents(&json["totals"]["subtotal"]), 2000);
        assert_eq!(cents(&json["totals"]["discount"]), 200);
        assert_eq!(cents(&json["totals"]["tax"]), 180);
        assert_eq!(cents(&json["totals"]["total"]), 1980);

        let (_, json) = app.call("DELETE", "/cart/coupon", As::User("u1"), None).await;
        assert!(json["applied_coupon"].is_null());
        assert_eq!(cents(&json["totals"]["total"]), 2200);
    }

    #[tokio::test]
    async fn test_unknown_coupon_is_not_found() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;

        let (status, json) = app
            .call("PUT", "/cart/coupon", As::User("u1"), Some(json!({ "code": "NOPE" })))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "unknown_coupon");
    }

    #[tokio::test]
    async fn test_missing_owner_is_rejected() {
        let app = setup().await;
        let (status, json) = app.add(As::Anonymous, "X", 1).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");
        assert!(json["error"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn test_quantity_validation() {
        let app = setup().await;

        let (status, _) = app.add(As::User("u1"), "X", 0).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.add(As::User("u1"), "X", -3).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = app.add(As::User("u1"), "X", 11).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "out_of_stock");
    }

    #[tokio::test]
    async fn test_update_and_remove_lines() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        app.add(As::User("u1"), "Y", 1).await;

        let (status, json) = app
            .call("PATCH", "/cart/items/X", As::User("u1"), Some(json!({ "quantity": 3 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cents(&json["totals"]["subtotal"]), 3500);

        let (status, json) = app
            .call("PATCH", "/cart/items/Y", As::User("u1"), Some(json!({ "quantity": 0 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);

        let (status, json) = app
            .call("DELETE", "/cart/items/NOPE", As::User("u1"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "line_not_found");

        let (status, json) = app.call("DELETE", "/cart", As::User("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_cart_merges_into_user_cart() {
        let app = setup().await;
        app.add(As::Guest("g1"), "Y", 1).await;
        app.add(As::User("u1"), "Y", 2).await;

        let (status, json) = app
            .call("POST", "/cart/merge", As::Both { user: "u1", guest: "g1" }, None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cart"]["items"][0]["quantity"], 3);
        assert_eq!(json["report"]["merged"].as_array().unwrap().len(), 1);

        let (_, guest_cart) = app.call("GET", "/cart", As::Guest("g1"), None).await;
        assert!(guest_cart["items"].as_array().unwrap().is_empty());

        let (status, _) = app
            .call("POST", "/cart/merge", As::User("u1"), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_guest_cart_in_checkout_is_not_merged() {
        let app = setup().await;
        app.add(As::Guest("g1"), "Y", 1).await;
        let (status, _) = app
            .call("POST", "/checkout/initiate", As::Guest("g1"), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = app
            .call("POST", "/cart/merge", As::Both { user: "u1", guest: "g1" }, None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "session_already_active");
    }
}

mod checkout_endpoints {
    use super::*;

    #[tokio::test]
    async fn test_checkout_flow_finalizes() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 2).await;

        let (status, session) = app.initiate("u1").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session["state"], "RESERVED");
        assert!(session["reservation_id"].is_string());
        let session_id = session["id"].as_str().unwrap().to_string();

        let (status, session) = app.pay("u1", &session_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["state"], "FINALIZED");
        assert!(session["order_id"].is_string());

        let (status, events) = app
            .call("GET", &format!("/checkout/session/{session_id}/events"), As::Anonymous, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let types: Vec<&str> = events
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event_type"].as_str().unwrap())
            .collect();
        assert_eq!(
            types,
            [
                "SessionInitiated",
                "StockReserved",
                "PaymentAuthorized",
                "StockCommitted",
                "SessionFinalized"
            ]
        );

        let (_, cart) = app.call("GET", "/cart", As::User("u1"), None).await;
        assert!(cart["cart_id"].is_null());
        assert!(cart["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_initiate_conflicts() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        app.initiate("u1").await;

        let (status, json) = app.initiate("u1").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "session_already_active");
    }

    #[tokio::test]
    async fn test_initiate_retry_after_catalog_outage() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;

        app.collaborators.catalog.set_fail_lookups(true).await;
        let (status, json) = app.initiate("u1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "service_unavailable");

        app.collaborators.catalog.set_fail_lookups(false).await;
        let (status, session) = app.initiate("u1").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session["state"], "RESERVED");

        let session_id = session["id"].as_str().unwrap();
        let (_, events) = app
            .call("GET", &format!("/checkout/session/{session_id}/events"), As::Anonymous, None)
            .await;
        assert_eq!(events.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_draft_is_abandoned() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;

        app.collaborators.catalog.set_fail_lookups(true).await;
        app.initiate("u1").await;
        app.collaborators.catalog.set_fail_lookups(false).await;

        app.clock.advance(chrono::Duration::hours(1));
        let (status, session) = app.initiate("u1").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session["state"], "RESERVED");
        let session_id = session["id"].as_str().unwrap();
        let (_, events) = app
            .call("GET", &format!("/checkout/session/{session_id}/events"), As::Anonymous, None)
            .await;
        assert_eq!(events.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_check_out() {
        let app = setup().await;
        let (status, json) = app.initiate("u1").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "empty_cart");
    }

    #[tokio::test]
    async fn test_last_unit_goes_to_first_reservation() {
        let app = setup().await;
        app.add(As::User("a"), "SOLO", 1).await;
        app.add(As::User("b"), "SOLO", 1).await;

        let (status, _) = app.initiate("a").await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = app.initiate("b").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "insufficient_stock");
    }

    #[tokio::test]
    async fn test_declined_payment() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        let (_, session) = app.initiate("u1").await;
        let session_id = session["id"].as_str().unwrap().to_string();

        app.collaborators
            .payment
            .set_mode(GatewayMode::Decline("card declined".into()))
            .await;
        let (status, json) = app.pay("u1", &session_id).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(json["code"], "payment_declined");

        let (_, session) = app
            .call("GET", &format!("/checkout/session/{session_id}"), As::Anonymous, None)
            .await;
        assert_eq!(session["state"], "FAILED");
        assert_eq!(session["failure"]["reason"], "payment_declined");
    }

    #[tokio::test]
    async fn test_gateway_error() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        let (_, session) = app.initiate("u1").await;
        let session_id = session["id"].as_str().unwrap().to_string();

        app.collaborators
            .payment
            .set_mode(GatewayMode::Fail("timeout".into()))
            .await;
        let (status, json) = app.pay("u1", &session_id).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["code"], "gateway_error");
    }

    #[tokio::test]
    async fn test_pending_payment_is_settled() {
        let app = setup().await;
        app.add(As::User("u1"), "Y", 2).await;
        let (_, session) = app.initiate("u1").await;
        let session_id = session["id"].as_str().unwrap().to_string();

        app.collaborators.payment.set_mode(GatewayMode::Pending).await;
        let (status, session) = app.pay("u1", &session_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["state"], "RESERVED");
        assert_eq!(session["payment_pending"], true);

        let (status, session) = app
            .call(
                "POST",
                &format!("/checkout/session/{session_id}/payment"),
                As::Anonymous,
                Some(json!({ "approved": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["state"], "FINALIZED");
    }

    #[tokio::test]
    async fn test_payment_after_reservation_lapsed() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        let (_, session) = app.initiate("u1").await;
        let session_id = session["id"].as_str().unwrap().to_string();

        app.clock.advance(chrono::Duration::minutes(6));
        let (status, json) = app.pay("u1", &session_id).await;

        assert_eq!(status, StatusCode::GONE);
        assert_eq!(json["code"], "reservation_expired");
    }

    #[tokio::test]
    async fn test_finalize_retry_after_order_failure() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        let (_, session) = app.initiate("u1").await;
        let session_id = session["id"].as_str().unwrap().to_string();

        app.collaborators.orders.set_fail_on_create(true).await;
        let (status, json) = app.pay("u1", &session_id).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "service_unavailable");

        app.collaborators.orders.set_fail_on_create(false).await;
        let (status, session) = app
            .call(
                "POST",
                &format!("/checkout/session/{session_id}/finalize"),
                As::Anonymous,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["state"], "FINALIZED");
    }

    #[tokio::test]
    async fn test_session_lookup_errors() {
        let app = setup().await;

        let (status, _) = app
            .call("GET", "/checkout/session/not-a-uuid", As::Anonymous, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = common::SessionId::new();
        let (status, json) = app
            .call("GET", &format!("/checkout/session/{unknown}"), As::Anonymous, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "session_not_found");
    }

    #[tokio::test]
    async fn test_pay_requires_session_owner() {
        let app = setup().await;
        app.add(As::User("u1"), "X", 1).await;
        let (_, session) = app.initiate("u1").await;
        let session_id = session["id"].as_str().unwrap().to_string();

        let (status, _) = app.pay("intruder", &session_id).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
