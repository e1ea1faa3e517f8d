//! HTTP backend tests against a local mock provider.

use parley_rs_config::{ModelEntry, ProviderKind};
use parley_rs_core::OpenAiCompatibleBackend;
use parley_rs_protocol::{BackendErrorKind, ChatBackend, ChatRequest, HistoryEntry};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(server: &MockServer, provider: ProviderKind) -> ModelEntry {
    let mut entry = ModelEntry::new(provider, format!("{}/v1/", server.uri()), "test-model");
    entry.api_key = Some("sk-test".to_string());
    entry.timeout_secs = 5;
    entry
}

fn request() -> ChatRequest {
    ChatRequest {
        system_prompt: Some("be brief".to_string()),
        history: vec![HistoryEntry::user("hi"), HistoryEntry::assistant("hello")],
        message: "how are you".to_string(),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

/// A successful completion should return the first choice's content.
#[tokio::test]
async fn returns_first_choice_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" },
                { "role": "user", "content": "how are you" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("fine, thanks")))
        .expect(1)
        .mount(&server)
        .await;

    let backend =
        OpenAiCompatibleBackend::from_entry("deepseek", &entry(&server, ProviderKind::Openai))
            .expect("backend");

    assert_eq!(
        backend.endpoint(),
        format!("{}/v1/chat/completions", server.uri())
    );
    let reply = backend.send_chat(&request()).await.expect("reply");
    assert_eq!(reply, "fine, thanks");
}

/// The spark flavor should ask for web search.
#[tokio::test]
async fn spark_flavor_enables_web_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{ "type": "web_search", "web_search": { "enable": true } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "Success",
            "choices": [{ "message": { "role": "assistant", "content": "searched" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::from_entry("spark", &entry(&server, ProviderKind::Spark))
        .expect("backend");

    assert_eq!(backend.send_chat(&request()).await.expect("reply"), "searched");
}

/// A non-zero spark status code is a failure even with HTTP 200.
#[tokio::test]
async fn spark_error_code_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 10013,
            "message": "input contains sensitive content",
            "choices": []
        })))
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::from_entry("spark", &entry(&server, ProviderKind::Spark))
        .expect("backend");

    let err = backend.send_chat(&request()).await.expect_err("code error");
    assert_eq!(err.kind, BackendErrorKind::Unknown);
    assert_eq!(err.message, "input contains sensitive content");
    assert_eq!(err.details, Some(json!({ "code": 10013 })));
}

/// HTTP status codes map onto the backend error kinds.
#[tokio::test]
async fn http_statuses_are_classified() {
    let cases = [
        (401_u16, BackendErrorKind::Auth),
        (403, BackendErrorKind::Auth),
        (429, BackendErrorKind::RateLimit),
        (504, BackendErrorKind::Timeout),
        (500, BackendErrorKind::Unknown),
    ];
    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": { "message": format!("status {status}") }
            })))
            .mount(&server)
            .await;

        let backend =
            OpenAiCompatibleBackend::from_entry("deepseek", &entry(&server, ProviderKind::Openai))
                .expect("backend");
        let err = backend.send_chat(&request()).await.expect_err("http error");

        assert_eq!(err.kind, expected, "status {status}");
        assert_eq!(err.message, format!("status {status}"));
        let details = err.details.expect("details");
        assert_eq!(details["status"], json!(status));
    }
}

/// Bodies without usable content are malformed responses.
#[tokio::test]
async fn empty_or_invalid_bodies_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let backend =
        OpenAiCompatibleBackend::from_entry("deepseek", &entry(&server, ProviderKind::Openai))
            .expect("backend");

    let blank = backend.send_chat(&request()).await.expect_err("blank");
    assert_eq!(blank.kind, BackendErrorKind::Malformed);
    let invalid = backend.send_chat(&request()).await.expect_err("invalid");
    assert_eq!(invalid.kind, BackendErrorKind::Malformed);
}

/// A missing credential fails before any request is sent.
#[tokio::test]
async fn missing_credential_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let mut entry = entry(&server, ProviderKind::Openai);
    entry.api_key = None;
    entry.api_key_env = Some("PARLEY_TEST_UNSET_KEY".to_string());
    let backend = OpenAiCompatibleBackend::from_entry("deepseek", &entry).expect("backend");

    let err = backend.send_chat(&request()).await.expect_err("no key");
    assert_eq!(err.kind, BackendErrorKind::Auth);
}

/// A refused connection is a transient network failure.
#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut entry = ModelEntry::new(
        ProviderKind::Openai,
        format!("http://{addr}/v1/"),
        "test-model",
    );
    entry.api_key = Some("sk-test".to_string());
    entry.timeout_secs = 5;
    let backend = OpenAiCompatibleBackend::from_entry("deepseek", &entry).expect("backend");
    let err = backend.send_chat(&request()).await.expect_err("refused");

    assert_eq!(err.kind, BackendErrorKind::Network);
    assert!(err.kind.is_transient());
}
