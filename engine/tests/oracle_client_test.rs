//! Integration tests for the OpenAI-compatible oracle client
//!
//! Runs against a wiremock server standing in for the chat-completions
//! endpoint: happy paths, HTTP failures, and malformed model answers.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ludo_engine::config::OracleConfig;
use ludo_engine::coordinator::context::ExecutionContext;
use ludo_engine::oracle::openai::OpenAiOracle;
use ludo_engine::oracle::{Oracle, OracleError, Selection};
use protocol::Candidate;

fn oracle_for(server: &MockServer) -> OpenAiOracle {
    OpenAiOracle::new(OracleConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".to_string(),
        timeout_secs: 5,
    })
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            {"message": {"role": "assistant", "content": content}}
        ]
    })
}

#[tokio::test]
async fn test_classify_parses_model_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"intent": "launch_title", "target": "Super Mario World", "system": "SNES"}"#,
        )))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("play super mario world", 4);
    let classification = oracle.classify("play super mario world", &ctx).await.unwrap();

    assert_eq!(classification.intent, "launch_title");
    assert_eq!(classification.target.as_deref(), Some("Super Mario World"));
    assert_eq!(classification.system.as_deref(), Some("SNES"));
}

#[tokio::test]
async fn test_classify_tolerates_fenced_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"intent\": \"recommend\", \"target\": \"racing game\", \"system\": null}\n```",
        )))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("put on a racing game", 4);
    let classification = oracle.classify("put on a racing game", &ctx).await.unwrap();

    assert_eq!(classification.intent, "recommend");
    assert_eq!(classification.system, None);
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("play something", 4);
    let err = oracle.classify("play something", &ctx).await.unwrap_err();

    assert!(matches!(err, OracleError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn test_auth_failure_maps_to_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("play something", 4);
    let err = oracle.classify("play something", &ctx).await.unwrap_err();

    assert!(matches!(err, OracleError::AuthenticationFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_prose_answer_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Sure! Sounds like the user wants to play Super Mario World.",
        )))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("play super mario world", 4);
    let err = oracle.classify("play super mario world", &ctx).await.unwrap_err();

    assert!(matches!(err, OracleError::ParseError(_)), "got {err:?}");
}

#[tokio::test]
async fn test_select_best_returns_chosen_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"found": true, "name": "Super Mario World", "reason": "exact title match"}"#,
        )))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("play super mario world", 4);
    let candidates = vec![
        Candidate::new("Super Mario World", "SNES/smw.sfc"),
        Candidate::new("Super Mario Kart", "SNES/smk.sfc"),
    ];
    let selection = oracle
        .select_best(&candidates, "Super Mario World", &ctx)
        .await
        .unwrap();

    match selection {
        Selection::Chosen { candidate, reason } => {
            assert_eq!(candidate.location, "SNES/smw.sfc");
            assert_eq!(reason, "exact title match");
        }
        other => panic!("expected Chosen, got {other:?}"),
    }
}

#[tokio::test]
async fn test_select_best_none_suitable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"found": false, "reason": "nothing matches a flight sim"}"#,
        )))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("a flight sim", 4);
    let candidates = vec![Candidate::new("Tetris", "GB/tetris.gb")];
    let selection = oracle.select_best(&candidates, "a flight sim", &ctx).await.unwrap();

    assert!(matches!(selection, Selection::NoneSuitable { .. }));
}

#[tokio::test]
async fn test_select_best_rejects_invented_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"found": true, "name": "Mario Galaxy", "reason": "great game"}"#,
        )))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server);
    let ctx = ExecutionContext::new("play mario", 4);
    let candidates = vec![Candidate::new("Super Mario World", "SNES/smw.sfc")];
    let err = oracle
        .select_best(&candidates, "mario", &ctx)
        .await
        .unwrap_err();

    // A name outside the offered set is malformed data, not a pick.
    assert!(matches!(err, OracleError::ParseError(_)), "got {err:?}");
}
