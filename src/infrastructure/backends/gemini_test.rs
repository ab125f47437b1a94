use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use mockito::Matcher;
use test_utils::blocked_prompt_fixture;
use test_utils::generate_content_fixture;
use test_utils::model_metadata_fixture;
use test_utils::silent_server;

use super::model_path;
use super::Gemini;
use crate::configuration::Config;
use crate::domain::models::GenerationError;
use crate::domain::models::Generator;
use crate::domain::models::Prompt;

impl Gemini {
    fn with_url(url: String) -> Gemini {
        let config = Config {
            gemini_url: url,
            gemini_token: "abc".to_string(),
            generation_timeout: Duration::from_millis(500),
            ..Config::default()
        };

        return Gemini::new(&config, "model-1").unwrap();
    }
}

fn prompt() -> Prompt {
    return Prompt::build("When should I plant rice?", "Tamil");
}

#[test]
fn it_prefixes_model_paths_once() {
    assert_eq!(model_path("gemini-pro"), "models/gemini-pro");
    assert_eq!(model_path("models/gemini-pro"), "models/gemini-pro");
}

#[tokio::test]
async fn it_successfully_health_checks() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1")
        .match_header("x-goog-api-key", "abc")
        .with_status(200)
        .with_body(model_metadata_fixture("model-1"))
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_ok());
    mock.assert_async().await;
    return Ok(());
}

#[tokio::test]
async fn it_successfully_health_checks_with_a_trailing_slash() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1")
        .with_status(200)
        .with_body(model_metadata_fixture("model-1"))
        .create_async()
        .await;

    let backend = Gemini::with_url(format!("{}/", server.url()));
    backend.health_check().await?;

    mock.assert_async().await;
    return Ok(());
}

#[tokio::test]
async fn it_fails_health_checks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1")
        .with_status(500)
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_err());
    assert!(res.unwrap_err().to_string().contains("model-1, 500"));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_fails_health_checks_without_a_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = Config {
        gemini_url: server.url(),
        ..Config::default()
    };
    let backend = Gemini::new(&config, "model-1").unwrap();
    let res = backend.health_check().await;

    assert_eq!(res.unwrap_err().to_string(), "Gemini token is not defined");
    mock.assert_async().await;
}

#[tokio::test]
async fn it_generates() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent")
        .match_header("x-goog-api-key", "abc")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "contents": [{ "role": "user" }]
        })))
        .with_status(200)
        .with_body(generate_content_fixture(&[
            "**TOPIC IDENTIFICATION**\n",
            "Rice planting season.",
        ]))
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let text = backend.generate(&prompt()).await?;

    assert_eq!(text, "**TOPIC IDENTIFICATION**\nRice planting season.");
    mock.assert_async().await;
    return Ok(());
}

#[tokio::test]
async fn it_sends_the_prompt_text() -> Result<()> {
    let prompt = prompt();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt.text }] }]
        })))
        .with_status(200)
        .with_body(generate_content_fixture(&["ok"]))
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    assert_eq!(backend.generate(&prompt).await?, "ok");

    mock.assert_async().await;
    return Ok(());
}

#[tokio::test]
async fn it_keeps_the_body_of_failed_requests() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent")
        .with_status(503)
        .with_body("quota exhausted for project 1234")
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let err = backend.generate(&prompt()).await.unwrap_err();

    match &err {
        GenerationError::Status { status, body } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "quota exhausted for project 1234");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!err.to_string().contains("quota"));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_reports_blocked_prompts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent")
        .with_status(200)
        .with_body(blocked_prompt_fixture())
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let err = backend.generate(&prompt()).await.unwrap_err();

    assert!(matches!(err, GenerationError::Blocked { ref reason } if reason == "SAFETY"));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_reports_empty_answers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent")
        .with_status(200)
        .with_body(r#"{"candidates":[]}"#)
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let err = backend.generate(&prompt()).await.unwrap_err();

    assert!(matches!(err, GenerationError::Empty));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_reports_unreadable_answers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent")
        .with_status(200)
        .with_body("<html>bad gateway</html>")
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let err = backend.generate(&prompt()).await.unwrap_err();

    assert!(matches!(err, GenerationError::Malformed(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_times_out_slow_generations() {
    let backend = Gemini::with_url(silent_server().await);

    let started = Instant::now();
    let err = backend.generate(&prompt()).await.unwrap_err();

    assert!(matches!(err, GenerationError::Timeout(_)));
    assert_eq!(err.to_string(), "the generation service timed out");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn it_treats_cut_off_candidates_as_blocked() {
    let res = serde_json::from_str::<super::GenerateContentResponse>(
        r#"{"candidates":[{"content":{"parts":[]},"finishReason":"RECITATION"}]}"#,
    )
    .unwrap();

    let err = res.into_text().unwrap_err();
    assert!(matches!(err, GenerationError::Blocked { ref reason } if reason == "RECITATION"));
}
