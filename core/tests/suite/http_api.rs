use std::time::Duration;

use cartsync_core::CartApi;
use cartsync_core::CartConfig;
use cartsync_core::CartError;
use cartsync_core::HttpCartApi;
use cartsync_core::ItemId;
use cartsync_core::ProductId;
use cartsync_core::Quantity;
use cartsync_core::api::AddConfirmation;
use cartsync_core::error::ErrorKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn config_for(server: &MockServer, meta_token: Option<&str>) -> CartConfig {
    let mut config = CartConfig {
        base_url: server.uri(),
        ..CartConfig::default()
    };
    config.csrf.meta_token = meta_token.map(str::to_string);
    config
}

fn api_for(server: &MockServer) -> HttpCartApi {
    HttpCartApi::new(&config_for(server, Some("tok"))).expect("build client")
}

fn qty(value: i64) -> Quantity {
    Quantity::new(value).expect("quantity in range")
}

#[tokio::test]
async fn add_posts_form_with_csrf_and_reads_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meals/add-to-cart/7/"))
        .and(header("X-CSRFToken", "tok"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(body_string("csrfmiddlewaretoken=tok&quantity=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "item_id": 42,
            "quantity": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let confirmation = api_for(&server)
        .add_item(&ProductId::new("7"), qty(2))
        .await
        .expect("add succeeds");

    assert_eq!(
        AddConfirmation {
            item_id: Some(ItemId::new("42")),
            quantity: Some(qty(3)),
        },
        confirmation
    );
}

#[tokio::test]
async fn add_confirmation_fields_are_optional() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meals/add-to-cart/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let confirmation = api_for(&server)
        .add_item(&ProductId::new("7"), qty(1))
        .await
        .expect("add succeeds");

    assert_eq!(AddConfirmation::default(), confirmation);
}

#[tokio::test]
async fn update_and_remove_hit_item_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/update-cart-item/9/"))
        .and(body_string("csrfmiddlewaretoken=tok&quantity=5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders/remove-cart-item/9/"))
        .and(body_string("csrfmiddlewaretoken=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let item = ItemId::new("9");
    api.update_item(&item, qty(5)).await.expect("update");
    api.remove_item(&item).await.expect("remove");
}

#[tokio::test]
async fn cart_count_reads_count_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/cart-count/"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 4})))
        .mount(&server)
        .await;

    assert_eq!(4, api_for(&server).cart_count().await.expect("count"));
}

#[tokio::test]
async fn redirect_means_sign_in_required() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meals/add-to-cart/7/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/users/login/?next=/meals/7/"),
        )
        .mount(&server)
        .await;

    let err = api_for(&server)
        .add_item(&ProductId::new("7"), qty(1))
        .await
        .expect_err("redirect is an error");

    assert_eq!(ErrorKind::AuthRequired, err.kind());
    let CartError::AuthRequired { location } = err else {
        panic!("expected AuthRequired, got {err:?}");
    };
    assert_eq!(Some("/users/login/?next=/meals/7/".to_string()), location);
}

#[tokio::test]
async fn refusal_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/update-cart-item/9/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Only 3 left in stock"
        })))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .update_item(&ItemId::new("9"), qty(5))
        .await
        .expect_err("refused");

    assert_eq!(ErrorKind::ApplicationError, err.kind());
    assert_eq!(
        "Only 3 left in stock",
        err.banner_message("Failed to update quantity")
    );
}

#[tokio::test]
async fn refusal_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/remove-cart-item/9/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .remove_item(&ItemId::new("9"))
        .await
        .expect_err("refused");

    assert_eq!(
        "Failed to remove item",
        err.banner_message("Failed to remove item")
    );
}

#[tokio::test]
async fn error_status_with_envelope_is_application_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/update-cart-item/9/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "Invalid quantity"
        })))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .update_item(&ItemId::new("9"), qty(25))
        .await
        .expect_err("bad request");

    assert_eq!(ErrorKind::ApplicationError, err.kind());
    assert_eq!("Invalid quantity", err.to_string());
}

#[tokio::test]
async fn server_error_is_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/update-cart-item/9/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<h1>Server Error</h1>"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .update_item(&ItemId::new("9"), qty(2))
        .await
        .expect_err("500");

    assert!(matches!(err, CartError::Status { status: 500 }), "{err:?}");
    assert_eq!(ErrorKind::NetworkFailure, err.kind());
    assert_eq!(
        "Failed to update quantity",
        err.banner_message("Failed to update quantity")
    );
}

#[tokio::test]
async fn non_json_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/cart-count/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders/remove-cart-item/9/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let count_err = api.cart_count().await.expect_err("not json");
    let remove_err = api.remove_item(&ItemId::new("9")).await.expect_err("not json");

    assert!(matches!(count_err, CartError::Parse(_)), "{count_err:?}");
    assert!(matches!(remove_err, CartError::Parse(_)), "{remove_err:?}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/cart-count/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"count": 1}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server, Some("tok"));
    config.timings.request_timeout_ms = 50;
    let api = HttpCartApi::new(&config).expect("build client");

    let err = api.cart_count().await.expect_err("timed out");
    assert!(matches!(err, CartError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn csrf_cookie_set_by_server_wins_over_meta_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/cart-count/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "csrftoken=fromcookie; Path=/")
                .set_body_json(json!({"count": 0})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders/update-cart-item/9/"))
        .and(header("X-CSRFToken", "fromcookie"))
        .and(body_string("csrfmiddlewaretoken=fromcookie&quantity=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpCartApi::new(&config_for(&server, Some("meta"))).expect("build client");
    api.cart_count().await.expect("count");
    api.update_item(&ItemId::new("9"), qty(2))
        .await
        .expect("update with cookie token");
}

#[tokio::test]
async fn missing_token_still_sends_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/update-cart-item/9/"))
        .and(body_string("csrfmiddlewaretoken=&quantity=1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("CSRF verification failed"))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpCartApi::new(&config_for(&server, None)).expect("build client");
    let err = api
        .update_item(&ItemId::new("9"), qty(1))
        .await
        .expect_err("forbidden");

    assert!(matches!(err, CartError::Status { status: 403 }), "{err:?}");
}

#[test]
fn invalid_base_url_is_rejected() {
    let config = CartConfig {
        base_url: "not a url".to_string(),
        ..CartConfig::default()
    };
    assert!(HttpCartApi::new(&config).is_err());
}
