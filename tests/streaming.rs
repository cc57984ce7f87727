//! Tests for SSE stream consumption: first-chunk timeout policy, chunk
//! accumulation, and HTTP status mapping.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use trackside::error::TracksideError;
use trackside::generate::consumer::StreamConsumer;
use trackside::generate::http::HttpGenerator;
use trackside::generate::{ChunkStream, GenerationRequest, ResponseChunk};

/// Helper: bind a TCP listener on localhost and return (listener, port).
async fn mock_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Helper: format an SSE data event from a content string.
fn sse_chunk(content: &str) -> String {
    format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n")
}

const SSE_HEADERS: &[u8] = b"HTTP/1.1 200 OK\r\n\
    Content-Type: text/event-stream\r\n\
    Connection: close\r\n\r\n";

const SSE_DONE: &[u8] = b"data: [DONE]\n\n";

fn make_req() -> GenerationRequest {
    GenerationRequest {
        model: "test-model".to_string(),
        prompt: "test".to_string(),
        max_tokens: 100,
    }
}

async fn open_stream(port: u16) -> Result<ChunkStream, TracksideError> {
    let generator = HttpGenerator::new(format!("http://127.0.0.1:{port}/v1/chat"), "fake");
    generator.open_stream(&make_req()).await
}

// ---------------------------------------------------------------------------
// Complete streaming response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn streaming_complete_response() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        socket.write_all(sse_chunk("Hel").as_bytes()).await.unwrap();
        socket.write_all(sse_chunk("lo").as_bytes()).await.unwrap();
        socket.write_all(sse_chunk(" world").as_bytes()).await.unwrap();
        socket.write_all(SSE_DONE).await.unwrap();
    });

    let mut stream = open_stream(port).await.unwrap();
    let result = StreamConsumer::default().consume(&mut stream).await.unwrap();

    assert_eq!(result.text, "Hello world");
    assert_eq!(result.token_estimate, 3);

    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// First-chunk timeout (server hangs after headers)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_chunk_timeout_when_nothing_arrives() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        // Send nothing — model queued but not generating
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let mut stream = open_stream(port).await.unwrap();
    let consumer = StreamConsumer::new(Duration::from_millis(500));

    let start = Instant::now();
    let result = consumer.consume(&mut stream).await;

    let err = result.unwrap_err();
    match err {
        TracksideError::Timeout {
            elapsed_ms,
            budget_ms,
        } => {
            assert_eq!(budget_ms, 500);
            assert!(elapsed_ms >= 500, "elapsed {elapsed_ms}ms below budget");
        }
        other => panic!("expected Timeout, got: {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(5));

    server.abort();
}

// ---------------------------------------------------------------------------
// Delayed first chunk within budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delayed_first_chunk_within_budget_succeeds() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        socket.write_all(sse_chunk("late").as_bytes()).await.unwrap();
        socket.write_all(SSE_DONE).await.unwrap();
    });

    let mut stream = open_stream(port).await.unwrap();
    let consumer = StreamConsumer::new(Duration::from_secs(5));
    let result = consumer.consume(&mut stream).await.unwrap();

    assert_eq!(result.text, "late");
    assert_eq!(result.token_estimate, 1);

    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// Empty [DONE] immediately
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_stream_is_upstream_error() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        socket.write_all(SSE_DONE).await.unwrap();
    });

    let mut stream = open_stream(port).await.unwrap();
    let result = StreamConsumer::default().consume(&mut stream).await;

    let err = result.unwrap_err();
    assert!(
        matches!(err, TracksideError::Upstream { .. }),
        "expected Upstream for empty stream, got: {err:?}"
    );

    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// HTTP status mapping before any chunk
// ---------------------------------------------------------------------------

async fn respond_with_status(status_line: &'static str) -> u16 {
    let (listener, port) = mock_listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        let response =
            format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
    });

    port
}

#[tokio::test]
async fn http_429_maps_to_rate_limited() {
    let port = respond_with_status("429 Too Many Requests").await;
    let err = open_stream(port).await.unwrap_err();

    assert!(matches!(err, TracksideError::RateLimited), "got: {err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn http_401_maps_to_auth_failed() {
    let port = respond_with_status("401 Unauthorized").await;
    let err = open_stream(port).await.unwrap_err();

    assert!(
        matches!(err, TracksideError::AuthFailed { .. }),
        "got: {err:?}"
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn http_500_maps_to_retryable_upstream() {
    let port = respond_with_status("500 Internal Server Error").await;
    let err = open_stream(port).await.unwrap_err();

    match &err {
        TracksideError::Upstream { status, .. } => assert_eq!(*status, Some(500)),
        other => panic!("expected Upstream, got: {other:?}"),
    }
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Unparseable SSE events are silently ignored (keepalives, metadata)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn streaming_ignores_unparseable_events() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        // Keepalive / comment
        socket.write_all(b": keepalive\n\n").await.unwrap();
        // Valid chunk
        socket.write_all(sse_chunk("good").as_bytes()).await.unwrap();
        // Malformed JSON
        socket.write_all(b"data: {not valid json}\n\n").await.unwrap();
        // Another valid chunk
        socket.write_all(sse_chunk(" data").as_bytes()).await.unwrap();
        socket.write_all(SSE_DONE).await.unwrap();
    });

    let mut stream = open_stream(port).await.unwrap();
    let result = StreamConsumer::default().consume(&mut stream).await.unwrap();

    assert_eq!(result.text, "good data");
    assert_eq!(result.token_estimate, 2);

    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// Chunks without a text fragment still count toward the estimate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fragmentless_chunks_count_toward_estimate() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        // Role-only delta, as sent at the start of a real stream
        socket
            .write_all(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n")
            .await
            .unwrap();
        socket.write_all(sse_chunk("text").as_bytes()).await.unwrap();
        socket.write_all(SSE_DONE).await.unwrap();
    });

    let mut stream = open_stream(port).await.unwrap();
    let result = StreamConsumer::default().consume(&mut stream).await.unwrap();

    assert_eq!(result.text, "text");
    assert_eq!(result.token_estimate, 2);

    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// Stream ending without [DONE] is exhaustion, not an error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_end_without_done_returns_accumulated_text() {
    let (listener, port) = mock_listener().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;

        socket.write_all(SSE_HEADERS).await.unwrap();
        socket.write_all(sse_chunk("saved ").as_bytes()).await.unwrap();
        socket.write_all(sse_chunk("data").as_bytes()).await.unwrap();
        // Close cleanly without [DONE]
        drop(socket);
    });

    let mut stream = open_stream(port).await.unwrap();
    let result = StreamConsumer::default().consume(&mut stream).await.unwrap();

    assert_eq!(result.text, "saved data");
    assert_eq!(result.token_estimate, 2);

    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// Channel-level consumer behavior (no network)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mid_stream_error_propagates() {
    let (tx, mut stream) = ChunkStream::channel();

    tokio::spawn(async move {
        tx.send(Ok(ResponseChunk {
            delta: Some("partial".to_string()),
        }))
        .await
        .unwrap();
        tx.send(Err(TracksideError::Upstream {
            message: "connection reset".to_string(),
            status: None,
        }))
        .await
        .unwrap();
    });

    let result = StreamConsumer::default().consume(&mut stream).await;

    let err = result.unwrap_err();
    assert!(
        matches!(err, TracksideError::Upstream { .. }),
        "mid-stream errors must not be swallowed, got: {err:?}"
    );
}

#[tokio::test]
async fn closed_channel_before_first_chunk_is_upstream_error() {
    let (tx, mut stream) = ChunkStream::channel();
    drop(tx);

    let result = StreamConsumer::default().consume(&mut stream).await;

    assert!(matches!(
        result.unwrap_err(),
        TracksideError::Upstream { .. }
    ));
}

// ---------------------------------------------------------------------------
// Operator-facing error messages do not leak internals
// ---------------------------------------------------------------------------

#[test]
fn timeout_message_reports_elapsed_and_budget() {
    let err = TracksideError::Timeout {
        elapsed_ms: 180_123,
        budget_ms: 180_000,
    };
    let msg = err.user_message();

    assert!(msg.contains("180123"), "got: {msg}");
    assert!(msg.contains("180000"), "got: {msg}");
    assert!(!msg.contains("http://"), "should not leak URLs, got: {msg}");
}

#[test]
fn schema_parse_message_does_not_leak_payload() {
    // SchemaParse bodies may quote raw payloads; the operator message must not.
    let err = TracksideError::SchemaParse("unexpected token at line 1".to_string());
    let msg = err.user_message();

    assert!(!msg.contains("unexpected token"), "got: {msg}");
}
