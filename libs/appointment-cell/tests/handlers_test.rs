// HTTP-level tests for the /appointments and /payments surfaces.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::{appointment_routes, payment_routes};
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn config_for(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn appointment_routes_require_authentication() {
    let mock_server = MockServer::start().await;
    let app: Router = appointment_routes(Arc::new(config_for(&mock_server)));

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stranger_cannot_view_an_appointment() {
    let mock_server = MockServer::start().await;
    let config = config_for(&mock_server);
    let app: Router = appointment_routes(Arc::new(config.clone()));

    let user = TestUser::patient("stranger@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();
    // The stored appointment belongs to two other users.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["code"], json!("FORBIDDEN"));
}

#[tokio::test]
async fn participant_reads_their_appointment() {
    let mock_server = MockServer::start().await;
    let config = config_for(&mock_server);
    let app: Router = appointment_routes(Arc::new(config.clone()));

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &user.id,
                &Uuid::new_v4().to_string(),
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["patient_id"], json!(user.id));
    assert_eq!(body["appointment_time"], json!("09:00-09:30"));
}

#[tokio::test]
async fn missing_gateway_keys_fail_fast() {
    let mock_server = MockServer::start().await;
    let mut config = config_for(&mock_server);
    config.razorpay_key_id = String::new();
    config.razorpay_key_secret = String::new();
    let app: Router = payment_routes(Arc::new(config.clone()));

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("POST")
        .uri("/order")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "appointment_id": Uuid::new_v4(),
                "amount": 1000,
                "currency": "INR"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["code"], json!("NOT_CONFIGURED"));
}

#[tokio::test]
async fn cancel_without_reason_is_a_validation_error() {
    let mock_server = MockServer::start().await;
    let config = config_for(&mock_server);
    let app: Router = appointment_routes(Arc::new(config.clone()));

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &user.id,
                &Uuid::new_v4().to_string(),
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/cancel", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({"reason": ""}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
}
