//! 텔레그램 전송기와 명령어 봇 HTTP 통합 테스트 (mockito 서버 사용).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use serde_json::json;
use tokio::sync::Mutex;
use xtr_core::{AlertMode, Destination, TimeRange};
use xtr_notification::{
    AlertSender, BotCommandHandler, CommandResponse, DispatchError, NotificationResult,
    TelegramBotHandler, TelegramConfig, TelegramSender,
};

const TOKEN: &str = "123456:test-token";

fn config(base_url: String) -> TelegramConfig {
    TelegramConfig::new(TOKEN).with_api_base_url(base_url)
}

fn temp_artifact(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("xtr-test-{}.svg", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn send_message_posts_html_text() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .match_body(Matcher::PartialJson(json!({
            "chat_id": 42,
            "text": "<b>RSI Alert</b>",
            "parse_mode": "HTML",
        })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .create_async()
        .await;

    let sender = TelegramSender::new(config(server.url()));
    let destination = Destination::new(42);
    sender
        .send(Some(&destination), "<b>RSI Alert</b>", None)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn send_with_artifact_uses_send_document() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123456:test-token/sendDocument")
        .match_header(
            "content-type",
            Matcher::Regex("multipart/form-data; boundary=.*".to_string()),
        )
        .match_body(Matcher::Regex("<svg>chart</svg>".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .create_async()
        .await;

    let path = temp_artifact("<svg>chart</svg>");
    let sender = TelegramSender::new(config(server.url()));
    sender
        .send(Some(&Destination::new(42)), "caption", Some(&path))
        .await
        .unwrap();

    mock.assert_async().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn missing_artifact_is_reported() {
    let server = Server::new_async().await;
    let sender = TelegramSender::new(config(server.url()));
    let missing = std::env::temp_dir().join(format!("xtr-missing-{}.svg", uuid::Uuid::new_v4()));

    let result = sender
        .send(Some(&Destination::new(42)), "caption", Some(&missing))
        .await;

    assert!(matches!(result, Err(DispatchError::ArtifactUnreadable(_))));
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .with_status(429)
        .with_body(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 17","parameters":{"retry_after":17}}"#,
        )
        .create_async()
        .await;

    let sender = TelegramSender::new(config(server.url()));
    let result = sender.send_message(42, "hello").await;

    assert!(matches!(result, Err(DispatchError::RateLimited(17))));
}

#[tokio::test]
async fn api_error_becomes_transport_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .with_status(400)
        .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
        .create_async()
        .await;

    let sender = TelegramSender::new(config(server.url()));
    let err = sender.send_message(42, "hello").await.unwrap_err();

    match err {
        DispatchError::TransportFailure(message) => {
            assert!(message.contains("400"));
            assert!(message.contains("chat not found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// 호출을 기록하는 명령어 핸들러.
#[derive(Default)]
struct RecordingHandler {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl BotCommandHandler for RecordingHandler {
    async fn handle_start(&self, chat: Destination) -> NotificationResult<CommandResponse> {
        self.calls.lock().await.push(format!("start {}", chat.chat_id));
        Ok(CommandResponse::html("started"))
    }

    async fn handle_stop(&self, _chat: &Destination) -> NotificationResult<CommandResponse> {
        self.calls.lock().await.push("stop".to_string());
        Ok(CommandResponse::html("stopped"))
    }

    async fn handle_check(&self, chat: &Destination) -> NotificationResult<CommandResponse> {
        self.calls.lock().await.push(format!("check {}", chat.chat_id));
        Ok(CommandResponse::delivered())
    }

    async fn handle_mode(&self, mode: AlertMode) -> NotificationResult<CommandResponse> {
        self.calls.lock().await.push(format!("mode {}", mode));
        Ok(CommandResponse::html(format!("Alert mode set to: {}", mode)))
    }

    async fn handle_time_range(&self, range: TimeRange) -> NotificationResult<CommandResponse> {
        self.calls.lock().await.push(format!("range {}", range));
        Ok(CommandResponse::html(format!("You chose: {}", range)))
    }

    async fn handle_summary(&self) -> NotificationResult<CommandResponse> {
        self.calls.lock().await.push("summary".to_string());
        Ok(CommandResponse::html("summary"))
    }
}

fn updates_body(chat_id: i64, text: &str) -> String {
    json!({
        "ok": true,
        "result": [{
            "update_id": 1001,
            "message": {
                "message_id": 7,
                "date": 1709260000,
                "chat": {"id": chat_id, "type": "private", "username": "trader"},
                "text": text,
            }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn poll_once_dispatches_command_and_replies() {
    let mut server = Server::new_async().await;
    let updates = server
        .mock("POST", "/bot123456:test-token/getUpdates")
        .match_body(Matcher::PartialJson(json!({"offset": 1})))
        .with_status(200)
        .with_body(updates_body(42, "/mode on"))
        .create_async()
        .await;
    let reply = server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .match_body(Matcher::PartialJson(json!({
            "chat_id": 42,
            "text": "Alert mode set to: on",
        })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .create_async()
        .await;

    let handler = Arc::new(RecordingHandler::default());
    let bot = TelegramBotHandler::new(config(server.url()), handler.clone());

    let processed = bot.poll_once().await.unwrap();

    assert_eq!(processed, 1);
    updates.assert_async().await;
    reply.assert_async().await;
    assert_eq!(*handler.calls.lock().await, vec!["mode on".to_string()]);

    // 다음 폴링은 마지막 update_id 다음부터 요청
    let next = server
        .mock("POST", "/bot123456:test-token/getUpdates")
        .match_body(Matcher::PartialJson(json!({"offset": 1002})))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":[]}"#)
        .create_async()
        .await;
    assert_eq!(bot.poll_once().await.unwrap(), 0);
    next.assert_async().await;
}

#[tokio::test]
async fn disallowed_chat_is_ignored() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/bot123456:test-token/getUpdates")
        .with_status(200)
        .with_body(updates_body(99, "/start"))
        .create_async()
        .await;
    let reply = server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .expect(0)
        .create_async()
        .await;

    let handler = Arc::new(RecordingHandler::default());
    let bot = TelegramBotHandler::new(config(server.url()), handler.clone())
        .with_allowed_chat_ids(vec![42]);

    assert_eq!(bot.poll_once().await.unwrap(), 1);
    reply.assert_async().await;
    assert!(handler.calls.lock().await.is_empty());
}

#[tokio::test]
async fn mode_without_argument_replies_with_menu() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/bot123456:test-token/getUpdates")
        .with_status(200)
        .with_body(updates_body(42, "/mode"))
        .create_async()
        .await;
    let reply = server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .match_body(Matcher::Regex("Choose a mode".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .create_async()
        .await;

    let handler = Arc::new(RecordingHandler::default());
    let bot = TelegramBotHandler::new(config(server.url()), handler.clone());

    bot.poll_once().await.unwrap();

    reply.assert_async().await;
    assert!(handler.calls.lock().await.is_empty());
}

#[tokio::test]
async fn delivered_check_sends_no_extra_reply() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/bot123456:test-token/getUpdates")
        .with_status(200)
        .with_body(updates_body(42, "/check"))
        .create_async()
        .await;
    let reply = server
        .mock("POST", "/bot123456:test-token/sendMessage")
        .expect(0)
        .create_async()
        .await;
    let document = server
        .mock("POST", "/bot123456:test-token/sendDocument")
        .expect(0)
        .create_async()
        .await;

    let handler = Arc::new(RecordingHandler::default());
    let bot = TelegramBotHandler::new(config(server.url()), handler.clone());

    assert_eq!(bot.poll_once().await.unwrap(), 1);

    reply.assert_async().await;
    document.assert_async().await;
    assert_eq!(*handler.calls.lock().await, vec!["check 42".to_string()]);
}
