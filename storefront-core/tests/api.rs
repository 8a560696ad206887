use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use storefront_core::auth::Claims;
use storefront_core::payments::vnpay::{canonical_query, order_reference, sign};
use storefront_core::store::MemoryStore;
use storefront_core::{create_router, AppConfig, AppState};

const JWT_SECRET: &str = "test-jwt-secret";
const HASH_SECRET: &str = "test-hash-secret";

struct TestApp {
    router: Router,
    store: MemoryStore,
    token: String,
}

impl TestApp {
    async fn new() -> Self {
        let vars: HashMap<String, String> = [
            ("JWT_SECRET", JWT_SECRET),
            ("VNPAY_HASH_SECRET", HASH_SECRET),
            ("VNPAY_TMN_CODE", "DEMO0001"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = AppConfig::from_vars(vars).unwrap();

        let store = MemoryStore::new();
        let user = store.add_user("clerk@example.com", Some("Hoa Pham")).await;
        let router = create_router(AppState::new(Arc::new(store.clone()), config));

        TestApp {
            router,
            store,
            token: token_for(user.id),
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>, authed: bool) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if authed {
            builder = builder.header("Authorization", format!("Bearer {}", self.token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let error_code = response
            .headers()
            .get("X-Error-Code")
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, error_code, json)
    }
}

fn token_for(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

fn ipn_query(order_id: i64, amount_minor: &str) -> String {
    let fields: HashMap<String, String> = [
        ("vnp_TxnRef", order_reference(order_id, chrono::Utc::now())),
        ("vnp_Amount", amount_minor.to_string()),
        ("vnp_ResponseCode", "00".to_string()),
        ("vnp_TransactionStatus", "00".to_string()),
        ("vnp_TransactionNo", "14226112".to_string()),
        ("vnp_BankCode", "NCB".to_string()),
        ("vnp_OrderInfo", format!("Thanh toan don hang:{order_id}")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let query = canonical_query(&fields);
    let hash = sign(HASH_SECRET, &query).unwrap();
    format!("{query}&vnp_SecureHash={hash}")
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, _, body) = app.send("GET", "/health", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _, _) = app.send("GET", "/health/db", None, false).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = TestApp::new().await;
    let (status, code, _) = app.send("GET", "/api/invoice-requests", None, false).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code.as_deref(), Some("unauthorized"));
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let app = TestApp::new().await;
    let product = app
        .store
        .add_product("Tea set", Decimal::from_str("12.50").unwrap(), 5)
        .await;

    let items = json!({ "items": { product.id.to_string(): 3 } });
    let (status, _, order) = app.send("POST", "/api/orders", Some(items.clone()), true).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total"].as_f64(), Some(37.5));
    assert_eq!(order["status_name"], "pending");
    let order_id = order["id"].as_i64().unwrap();

    let (status, code, body) = app.send("POST", "/api/orders", Some(items), true).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(code.as_deref(), Some("insufficient_stock"));
    assert!(body["message"].as_str().unwrap().contains("available 2"));

    let (status, _, pending) = app.send("GET", "/api/invoice-requests/pending", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["user_name"], "Hoa Pham");

    let (status, _, fetched) = app.send("GET", &format!("/api/orders/{order_id}"), None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_details"].as_array().unwrap().len(), 1);

    let (status, _, _) = app.send("DELETE", &format!("/api/orders/{order_id}"), None, true).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.store.product(product.id).await.unwrap().quantity, 5);

    let (status, code, _) = app.send("GET", &format!("/api/orders/{order_id}"), None, true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn test_review_and_payment_over_http() {
    let app = TestApp::new().await;
    let product = app
        .store
        .add_product("Kettle", Decimal::from_str("750.00").unwrap(), 4)
        .await;

    let items = json!({ "items": { product.id.to_string(): 2 } });
    let (_, _, order) = app.send("POST", "/api/orders", Some(items), true).await;
    let order_id = order["id"].as_i64().unwrap();
    let request_id = app.store.invoice_requests().await[0].id;

    let (status, _, accepted) = app
        .send("POST", &format!("/api/invoice-requests/{request_id}/accept"), None, true)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["invoice"]["total"].as_f64(), Some(1500.0));

    let (status, code, _) = app
        .send("POST", &format!("/api/invoice-requests/{request_id}/accept"), None, true)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(code.as_deref(), Some("invalid_transition"));

    let (status, _, payment) = app
        .send("POST", "/api/payments/vnpay", Some(json!({ "order_id": order_id })), true)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["code"], "00");
    assert!(payment["data"].as_str().unwrap().contains("vnp_Amount=150000"));

    // IPN is public and answered with 200 whatever the outcome.
    let uri = format!("/api/payments/vnpay/ipn?{}", ipn_query(order_id, "150000"));
    let (status, _, ack) = app.send("GET", &uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "RspCode": "00", "Message": "Confirm Success" }));

    let (_, _, ack) = app.send("GET", &uri, None, false).await;
    assert_eq!(ack["RspCode"], "02");
    assert_eq!(app.store.payments().await.len(), 1);

    let tampered = uri.replace("vnp_Amount=150000", "vnp_Amount=100");
    let (status, _, ack) = app.send("GET", &tampered, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["RspCode"], "97");

    let (status, code, _) = app
        .send(
            "PUT",
            &format!("/api/invoice-requests/{request_id}/status"),
            Some(json!({ "statusId": 1 })),
            true,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code.as_deref(), Some("paid_request_immutable"));
}

#[tokio::test]
async fn test_status_update_validation() {
    let app = TestApp::new().await;
    let product = app
        .store
        .add_product("Cup", Decimal::from_str("3.00").unwrap(), 4)
        .await;
    let items = json!({ "items": { product.id.to_string(): 1 } });
    let (_, _, order) = app.send("POST", "/api/orders", Some(items), true).await;
    let order_id = order["id"].as_i64().unwrap();

    let uri = format!("/api/invoice-requests/by-order/{order_id}/status");
    let (status, code, _) = app.send("PUT", &uri, Some(json!({})), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code.as_deref(), Some("bad_request"));

    let (status, code, _) = app.send("PUT", &uri, Some(json!({ "statusId": 4 })), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code.as_deref(), Some("status_out_of_range"));

    let (status, _, view) = app.send("PUT", &uri, Some(json!({ "statusId": 3 })), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status_name"], "approved");

    let (_, _, order) = app.send("GET", &format!("/api/orders/{order_id}"), None, true).await;
    assert_eq!(order["status_id"], 3);
}
