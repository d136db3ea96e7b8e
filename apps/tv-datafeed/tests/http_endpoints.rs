//! Sign-in and Symbol Search Integration Tests
//!
//! Exercises the HTTP clients against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tv_datafeed::infrastructure::tradingview::{AuthError, SearchError};
use tv_datafeed::{Credentials, SessionToken, SignInClient, SymbolSearch};

const TIMEOUT: Duration = Duration::from_secs(2);

fn credentials() -> Credentials {
    Credentials::new("trader".to_string(), "hunter2".to_string())
}

fn sign_in_client(server: &MockServer) -> SignInClient {
    SignInClient::with_url(format!("{}/accounts/signin/", server.uri()), TIMEOUT).unwrap()
}

#[tokio::test]
async fn sign_in_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/signin/"))
        .and(header("referer", "https://www.tradingview.com"))
        .and(body_string_contains("username=trader"))
        .and(body_string_contains("password=hunter2"))
        .and(body_string_contains("remember=on"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"user": {"username": "trader", "auth_token": "tok-123"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let token = sign_in_client(&server).sign_in(&credentials()).await.unwrap();
    assert_eq!(token, SessionToken::Authenticated("tok-123".into()));
}

#[tokio::test]
async fn rejected_sign_in_falls_back_to_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/signin/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": "Invalid username or password", "code": "invalid_credentials"})),
        )
        .mount(&server)
        .await;

    let client = sign_in_client(&server);
    let err = client.sign_in(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected(_)));

    let token = client.token_or_anonymous(Some(&credentials())).await;
    assert_eq!(token, SessionToken::Anonymous);
}

#[tokio::test]
async fn sign_in_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/signin/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let err = sign_in_client(&server).sign_in(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Status(503)));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {}})))
        .mount(&server)
        .await;
    let err = sign_in_client(&server).sign_in(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingToken));
}

#[tokio::test]
async fn no_credentials_is_anonymous_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let token = sign_in_client(&server).token_or_anonymous(None).await;
    assert_eq!(token.wire_value(), "unauthorized_user_token");
}

#[tokio::test]
async fn search_strips_highlighting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/symbol_search/"))
        .and(query_param("text", "NIFTY"))
        .and(query_param("exchange", "NSE"))
        .and(query_param("hl", "1"))
        .and(query_param("domain", "production"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"symbol":"<em>NIFTY</em>","description":"Nifty 50 Index","type":"index","exchange":"NSE"},
                {"symbol":"<em>NIFTY</em>1!","description":"Nifty 50 Futures","type":"futures","exchange":"NSE","currency_code":"INR"}]"#,
        ))
        .mount(&server)
        .await;

    let search = SymbolSearch::with_url(format!("{}/symbol_search/", server.uri()), TIMEOUT).unwrap();
    let hits = search.search("NIFTY", "NSE").await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].qualified(), "NSE:NIFTY");
    assert_eq!(hits[1].symbol, "NIFTY1!");
    assert_eq!(hits[1].currency_code.as_deref(), Some("INR"));
}

#[tokio::test]
async fn search_reports_bad_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .mount(&server)
        .await;

    let search = SymbolSearch::with_url(format!("{}/symbol_search/", server.uri()), TIMEOUT).unwrap();
    let err = search.search("X", "").await.unwrap_err();
    assert!(matches!(err, SearchError::JsonParse(_)));
}
