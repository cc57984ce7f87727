use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use crate::error::TracksideError;
use crate::generate::{ChunkStream, GenerationRequest, ResponseChunk};

const MAX_ERROR_BODY_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Streaming chat-completions transport. One instance per pipeline; the
/// underlying `reqwest` client pools connections across calls.
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct StreamCompletion {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Send a streaming request and hand back the chunk sequence.
    ///
    /// Fails before any chunk on auth, rate-limit, or other non-success
    /// statuses. Mid-stream transport errors surface through the stream
    /// itself as `Upstream`. Streaming keeps the transport from timing out
    /// on long generations; the first-chunk policy lives in the consumer.
    pub async fn open_stream(
        &self,
        req: &GenerationRequest,
    ) -> Result<ChunkStream, TracksideError> {
        let body = serde_json::json!({
            "model": req.model,
            "messages": [{"role": "user", "content": req.prompt}],
            "max_tokens": req.max_tokens,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TracksideError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TracksideError::AuthFailed {
                message: format!("{status}"),
            });
        }

        // Catch-all for any non-success status (4xx, 5xx, 3xx that wasn't followed)
        // Cap error body reads to MAX_ERROR_BODY_BYTES to prevent memory exhaustion
        if !status.is_success() {
            let error_bytes = response.bytes().await.unwrap_or_default();
            let truncated = &error_bytes[..error_bytes.len().min(MAX_ERROR_BODY_BYTES)];
            let text = String::from_utf8_lossy(truncated);
            return Err(TracksideError::Upstream {
                message: format!("{status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        let (tx, stream) = ChunkStream::channel();
        let mut events = response.bytes_stream().eventsource();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data.trim() == "[DONE]" {
                            break;
                        }
                        // Keepalives and provider metadata events don't parse as
                        // completion chunks. Skip them without failing the stream.
                        let Ok(completion) =
                            serde_json::from_str::<StreamCompletion>(&event.data)
                        else {
                            tracing::trace!("skipping non-chunk SSE event");
                            continue;
                        };
                        let delta = completion
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.delta.content);
                        if tx.send(Ok(ResponseChunk { delta })).await.is_err() {
                            // Consumer dropped the stream
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(TracksideError::Upstream {
                                message: format!("SSE stream error: {e}"),
                                status: None,
                            }))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(stream)
    }
}
