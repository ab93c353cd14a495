use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use rocketchat_log_sink::error::{DeliveryError, HandlerError, QueueError};
use rocketchat_log_sink::job::{RetryPolicy, SendJob};
use rocketchat_log_sink::queue::{JobQueue, LocalQueue, QueueTarget};
use rocketchat_log_sink::transport::WebhookTransport;
use rocketchat_log_sink::{DeliveryMode, DeliveryTarget, ExceptionInfo, Level, LogRecord, RequestContext, RocketChatHandler};

const API_URL: &str = "https://chat.example.com";

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post_form(&self, url: &str, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().expect("lock").push((url.to_string(), text.to_string()));
        Ok(())
    }
}

struct DownTransport;

#[async_trait]
impl WebhookTransport for DownTransport {
    async fn post_form(&self, url: &str, _text: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::transport(url, "connection reset"))
    }
}

#[derive(Default)]
struct CapturingQueue {
    pushed: Mutex<Vec<(QueueTarget, SendJob, RetryPolicy)>>,
}

impl JobQueue for CapturingQueue {
    fn push(&self, target: &QueueTarget, job: SendJob, policy: RetryPolicy) -> Result<(), QueueError> {
        self.pushed.lock().expect("lock").push((target.clone(), job, policy));
        Ok(())
    }
}

struct ClosedQueue;

impl JobQueue for ClosedQueue {
    fn push(&self, target: &QueueTarget, _job: SendJob, _policy: RetryPolicy) -> Result<(), QueueError> {
        Err(QueueError::Closed { queue: target.to_string() })
    }
}

fn target() -> DeliveryTarget {
    DeliveryTarget::new(API_URL, "T1", "C1")
}

fn inline_handler(transport: Arc<dyn WebhookTransport>) -> RocketChatHandler {
    RocketChatHandler::new(Level::Warning, target(), transport)
}

#[tokio::test]
async fn inline_delivery_truncates_and_builds_url() {
    let transport = Arc::new(RecordingTransport::default());
    let handler = inline_handler(transport.clone());
    let record = LogRecord::new(Level::Error, "app", "ignored").with_formatted("x".repeat(5000));

    handler.handle(&record).await.expect("delivered");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, format!("{}/hooks/{}/{}", API_URL, "C1", "T1"));
    assert_eq!(sent[0].1.chars().count(), 4096);
}

#[tokio::test]
async fn context_overrides_credentials() {
    let transport = Arc::new(RecordingTransport::default());
    let handler = inline_handler(transport.clone());
    let record = LogRecord::new(Level::Error, "app", "moved")
        .with_context("token", "T2")
        .with_context("chat_id", "C2");

    handler.handle(&record).await.expect("delivered");

    let sent = transport.sent();
    assert_eq!(sent[0].0, "https://chat.example.com/hooks/C2/T2");
    assert!(!sent[0].1.contains("T2"));
}

#[tokio::test]
async fn numeric_chat_id_override() {
    let transport = Arc::new(RecordingTransport::default());
    let handler = inline_handler(transport.clone());
    let record = LogRecord::new(Level::Error, "app", "moved").with_context("chat_id", 99);

    handler.handle(&record).await.expect("delivered");

    assert_eq!(transport.sent()[0].0, "https://chat.example.com/hooks/99/T1");
}

#[tokio::test]
async fn unformatted_record_goes_through_formatter() {
    let transport = Arc::new(RecordingTransport::default());
    let handler = inline_handler(transport.clone());
    let record = LogRecord::new(Level::Critical, "billing", "charge declined");

    handler.handle(&record).await.expect("delivered");

    let text = &transport.sent()[0].1;
    assert!(text.starts_with("*CRITICAL* (billing) ["));
    assert!(text.contains("charge declined"));
}

#[tokio::test]
async fn exception_report_is_truncated_too() {
    let transport = Arc::new(RecordingTransport::default());
    let handler = inline_handler(transport.clone());
    let mut request = RequestContext::default();
    request.params.insert("password".to_string(), "hunter2".into());
    request.params.insert("remark".to_string(), "ü".repeat(5000).into());
    let record = LogRecord::new(Level::Error, "app", "crash")
        .with_exception(ExceptionInfo::new("PanicError", "boom"), Some(request));

    handler.handle(&record).await.expect("delivered");

    let text = &transport.sent()[0].1;
    assert_eq!(text.chars().count(), 4096);
    assert!(text.contains("\"password\":\"*\""));
    assert!(!text.contains("hunter2"));
}

#[tokio::test]
async fn records_below_level_are_skipped() {
    let transport = Arc::new(RecordingTransport::default());
    let handler = inline_handler(transport.clone());

    handler.handle(&LogRecord::new(Level::Info, "app", "fine")).await.expect("skipped");

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn inline_failure_reaches_caller() {
    let handler = inline_handler(Arc::new(DownTransport));
    let record = LogRecord::new(Level::Error, "app", "lost");

    match handler.handle(&record).await {
        Err(HandlerError::Delivery(DeliveryError::Transport { url, .. })) => {
            assert_eq!(url, "https://chat.example.com/hooks/C1/T1");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn queued_mode_submits_job_with_retry_policy() {
    let queue = Arc::new(CapturingQueue::default());
    let handler = RocketChatHandler::new(Level::Debug, target(), Arc::new(DownTransport)).with_mode(
        DeliveryMode::Queued {
            target: QueueTarget::new("alerts").on_connection("redis"),
            queue: queue.clone(),
        },
    );

    // A broken transport does not matter: nothing is sent on this path.
    handler
        .handle(&LogRecord::new(Level::Error, "app", "queued").with_formatted("hello"))
        .await
        .expect("queued");

    let pushed = queue.pushed.lock().expect("lock");
    assert_eq!(pushed.len(), 1);
    let (target, job, policy) = &pushed[0];
    assert_eq!(target.queue, "alerts");
    assert_eq!(target.connection.as_deref(), Some("redis"));
    assert_eq!(job.message().url, "https://chat.example.com/hooks/C1/T1");
    assert_eq!(job.message().text, "hello");
    assert_eq!(policy.max_attempts, 2);
    assert_eq!(policy.delay, Duration::from_secs(120));
}

#[tokio::test]
async fn queue_submission_error_is_returned() {
    let handler = RocketChatHandler::new(Level::Debug, target(), Arc::new(RecordingTransport::default()))
        .with_mode(DeliveryMode::Queued { target: QueueTarget::new("alerts"), queue: Arc::new(ClosedQueue) });

    let result = handler.handle(&LogRecord::new(Level::Error, "app", "x")).await;

    assert!(matches!(result, Err(HandlerError::Queue(QueueError::Closed { .. }))));
}

struct ChannelTransport(mpsc::UnboundedSender<String>);

#[async_trait]
impl WebhookTransport for ChannelTransport {
    async fn post_form(&self, _url: &str, text: &str) -> Result<(), DeliveryError> {
        let _ = self.0.send(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn local_queue_delivers_in_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn WebhookTransport> = Arc::new(ChannelTransport(tx));
    let (queue, _worker) = LocalQueue::spawn(Arc::clone(&transport), 32);
    let handler = RocketChatHandler::new(Level::Debug, target(), transport)
        .with_mode(DeliveryMode::Queued { target: QueueTarget::new("alerts"), queue: Arc::new(queue) });

    for n in 0..3 {
        let record = LogRecord::new(Level::Error, "app", "x").with_formatted(format!("message {}", n));
        handler.handle(&record).await.expect("queued");
    }

    for n in 0..3 {
        let text = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("delivered in time")
            .expect("message");
        assert_eq!(text, format!("message {}", n));
    }
}
