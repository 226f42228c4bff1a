//! HTTP-level tests for the API client against a mock server

use serde_json::json;
use spcloud_api::{ApiClient, ApiError, ApiPath, ListParams, Page, Resource, User};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new("spt_test", format!("{}/api/v0", server.uri())).unwrap()
}

#[tokio::test]
async fn get_sends_bearer_token_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/actor"))
        .and(header("authorization", "Bearer spt_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u_1",
            "handle": "alice",
            "display_name": "Alice"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let actor: User = client.get(&ApiPath::actor()).await.unwrap();
    assert_eq!(actor.handle, "alice");
    assert_eq!(actor.extra["display_name"], json!("Alice"));
}

#[tokio::test]
async fn list_passes_limit_cursor_and_where() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/org/acme/workspace/dev/process"))
        .and(query_param("limit", "100"))
        .and(query_param("next_token", "page2"))
        .and(query_param("where", "state = 'running'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "p_1"}],
            "next_token": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut params = ListParams::with_limit(100).with_where("state = 'running'");
    params.next_token = Some("page2".to_string());
    let page: Page<Resource> = client
        .list(&ApiPath::org("acme").join("workspace").join("dev").join("process"), &params)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].str_field("id"), Some("p_1"));
    assert_eq!(page.next_cursor(), None);
    assert_eq!(client.metrics().pages_fetched.get(), 1);
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/user/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v0/user/busy"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v0/user/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let err = client.get::<User>(&ApiPath::user("missing")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.get::<User>(&ApiPath::user("busy")).await.unwrap_err();
    match err {
        ApiError::RateLimited { attempts, message } => {
            assert_eq!(attempts, 1);
            assert_eq!(message, "slow down");
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }

    let err = client.get::<User>(&ApiPath::user("broken")).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, .. }));
    assert_eq!(client.metrics().rate_limited.get(), 1);
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/actor"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get::<User>(&ApiPath::actor()).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}
