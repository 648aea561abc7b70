use std::time::Duration;

use kunitgen_core::{CollaboratorError, GenerationRequest, TestGenerator};
use kunitgen_llm::{ClientConfig, LlmError, OpenAiCompatibleClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one canned HTTP response and hand back the raw request.
async fn stub_server(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&raw).to_string());
    });

    (format!("http://{addr}/v1"), rx)
}

fn request() -> GenerationRequest {
    GenerationRequest {
        unit_name: "amd_gpio_get_value".to_string(),
        unit_body: "static int amd_gpio_get_value(void) {\n  return 0;\n}".to_string(),
        exemplars: vec!["static void ref_test(struct kunit *test) {}".to_string()],
        feedback: Some("error: unknown type name 'u99'".to_string()),
        temperature: 0.2,
        max_tokens: 8192,
    }
}

fn client(base_url: String) -> OpenAiCompatibleClient {
    let config = ClientConfig::new(base_url, "deepseek-ai/deepseek-v3.1", "test-key")
        .with_include_directive("gpio-amdpt.c")
        .with_timeout(Duration::from_secs(10));
    OpenAiCompatibleClient::new(config).unwrap()
}

#[tokio::test]
async fn generate_posts_prompt_and_returns_content() {
    let (url, seen) = stub_server(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"```c\n#include <kunit/test.h>\n```"}}],"usage":{"prompt_tokens":10,"completion_tokens":5}}"#,
    )
    .await;

    let text = client(url).generate(&request()).await.unwrap();
    assert_eq!(text, "```c\n#include <kunit/test.h>\n```");

    let raw = seen.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer test-key"));
    assert!(raw.contains("deepseek-ai/deepseek-v3.1"));
    assert!(raw.contains("amd_gpio_get_value"));
    assert!(raw.contains("unknown type name"));
    assert!(raw.contains("gpio-amdpt.c"));
}

#[tokio::test]
async fn error_status_becomes_collaborator_error() {
    let (url, _seen) = stub_server("503 Service Unavailable", r#"{"error":"overloaded"}"#).await;

    let err = client(url).generate(&request()).await.unwrap_err();
    match err {
        CollaboratorError::Request(msg) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("overloaded"));
        }
        other => panic!("expected Request, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_empty_response() {
    let (url, _seen) = stub_server("200 OK", r#"{"choices":[]}"#).await;

    let err = client(url).generate(&request()).await.unwrap_err();
    assert_eq!(err, CollaboratorError::EmptyResponse);
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
    let (url, _seen) = stub_server("200 OK", "not json").await;

    let err = client(url)
        .complete("hi".to_string(), 0.2, 16)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{addr}/v1"))
        .generate(&request())
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::Request(_)));
}
