#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use taskdeck_assistant::prompt::EMPTY_REPLY_TEXT;
use taskdeck_assistant::{AssistantGateway, GatewayError, GeminiClient, HistoryTurn};
use taskdeck_core::{AssistantConfig, Project, Role, Task, TaskStatus};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn client_for(server: &MockServer, key: Option<&str>) -> GeminiClient {
    let config = AssistantConfig {
        api_base: format!("{}/v1beta", server.uri()),
        api_key: key.map(str::to_string),
        ..AssistantConfig::default()
    };
    GeminiClient::new(&config).unwrap()
}

fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

async fn only_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

#[tokio::test]
async fn generate_tasks_requests_string_array_and_trims_titles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
            r#"["  Write press release ", "", "Book venue", "   "]"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-key"));
    let titles = client
        .generate_project_tasks("Launch", "Plan a product launch")
        .await
        .unwrap();

    assert_eq!(titles, vec!["Write press release", "Book venue"]);

    let body = only_request_body(&server).await;
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
    assert_eq!(
        body["generationConfig"]["responseSchema"]["items"]["type"],
        "STRING"
    );
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("\"Launch\""));
    assert!(prompt.contains("\"Plan a product launch\""));
}

#[tokio::test]
async fn generate_tasks_with_empty_reply_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let titles = client_for(&server, Some("k"))
        .generate_project_tasks("Launch", "desc")
        .await
        .unwrap();
    assert!(titles.is_empty());
}

#[tokio::test]
async fn generate_tasks_rejects_non_list_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("not json at all")))
        .mount(&server)
        .await;

    let err = client_for(&server, Some("k"))
        .generate_project_tasks("Launch", "desc")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Parse(_)), "{err}");
}

#[tokio::test]
async fn chat_sends_history_as_turns_and_context_as_system_instruction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("Two tasks left.")))
        .expect(1)
        .mount(&server)
        .await;

    let project = Project::new("Launch", "Plan a product launch");
    let tasks = vec![Task::new(project.id.clone(), "Book venue", TaskStatus::InProgress)];
    let history = vec![
        HistoryTurn {
            role: Role::User,
            text: "Hello".to_string(),
        },
        HistoryTurn {
            role: Role::Model,
            text: "Hi! How can I help?".to_string(),
        },
    ];

    let reply = client_for(&server, Some("k"))
        .chat_with_project(&history, "What's our status?", &project, &tasks)
        .await
        .unwrap();
    assert_eq!(reply, "Two tasks left.");

    let body = only_request_body(&server).await;
    let contents = body["contents"].as_array().unwrap();
    let turns: Vec<(&str, &str)> = contents
        .iter()
        .map(|c| {
            (
                c["role"].as_str().unwrap(),
                c["parts"][0]["text"].as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        turns,
        vec![
            ("user", "Hello"),
            ("model", "Hi! How can I help?"),
            ("user", "What's our status?"),
        ]
    );

    let system = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
    assert!(system.contains("Active project: Launch"));
    assert!(system.contains("- Book venue (in progress)"));
}

#[tokio::test]
async fn chat_empty_reply_uses_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("")))
        .mount(&server)
        .await;

    let project = Project::new("Launch", "");
    let reply = client_for(&server, Some("k"))
        .chat_with_project(&[], "hi", &project, &[])
        .await
        .unwrap();
    assert_eq!(reply, EMPTY_REPLY_TEXT);
}

#[tokio::test]
async fn api_error_body_is_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "API key not valid.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    let project = Project::new("Launch", "");
    let err = client_for(&server, Some("bad"))
        .chat_with_project(&[], "hi", &project, &[])
        .await
        .unwrap_err();
    match err {
        GatewayError::ApiResponse {
            status,
            message,
            error_type,
        } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid.");
            assert_eq!(error_type.as_deref(), Some("PERMISSION_DENIED"));
        }
        other => panic!("expected ApiResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn blocked_prompt_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let project = Project::new("Launch", "");
    let err = client_for(&server, Some("k"))
        .chat_with_project(&[], "hi", &project, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Blocked(_)), "{err}");
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("[]")))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    assert!(!client.has_credential());
    let err = client
        .generate_project_tasks("Launch", "desc")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingCredential));
}
