use std::time::{Duration, Instant};

use crate::error::TracksideError;
use crate::generate::{ChunkPoll, ChunkStream, GenerationResult};

/// Interval between non-blocking polls while waiting for the first chunk.
pub const FIRST_CHUNK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default budget for the first chunk. Time-to-first-token is the risky
/// latency window; total stream time scales with output length and is
/// deliberately unbounded here.
pub const DEFAULT_FIRST_CHUNK_TIMEOUT: Duration = Duration::from_secs(180);

/// Drains a chunk stream into the final accumulated result, enforcing the
/// first-chunk timeout.
pub struct StreamConsumer {
    first_chunk_timeout: Duration,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_CHUNK_TIMEOUT)
    }
}

impl StreamConsumer {
    pub fn new(first_chunk_timeout: Duration) -> Self {
        Self {
            first_chunk_timeout,
        }
    }

    /// Consume the stream to completion.
    ///
    /// The first chunk is waited for with repeated non-blocking polls at
    /// `FIRST_CHUNK_POLL_INTERVAL`; exceeding the budget is a `Timeout`.
    /// Once streaming has started the remote side is assumed to keep
    /// going, so the rest of the stream is consumed without a guard.
    /// A stream that ends before any chunk arrives is an upstream failure,
    /// not an empty result.
    pub async fn consume(
        &self,
        stream: &mut ChunkStream,
    ) -> Result<GenerationResult, TracksideError> {
        let start = Instant::now();

        let first = loop {
            match stream.poll_chunk()? {
                ChunkPoll::Ready(chunk) => break chunk,
                ChunkPoll::NotYetAvailable => {
                    let elapsed = start.elapsed();
                    if elapsed > self.first_chunk_timeout {
                        return Err(TracksideError::Timeout {
                            elapsed_ms: elapsed.as_millis() as u64,
                            budget_ms: self.first_chunk_timeout.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(FIRST_CHUNK_POLL_INTERVAL).await;
                }
                ChunkPoll::Exhausted => {
                    return Err(TracksideError::Upstream {
                        message: "stream ended before any chunk arrived".to_string(),
                        status: None,
                    });
                }
            }
        };

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "first chunk received"
        );

        // An absent fragment still counts toward the token estimate.
        let mut text = first.delta.unwrap_or_default();
        let mut token_estimate: u64 = 1;

        while let Some(chunk) = stream.next_chunk().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.delta {
                text.push_str(&delta);
            }
            token_estimate += 1;
            if token_estimate % 32 == 0 {
                tracing::debug!(chunks = token_estimate, "streaming response");
            }
        }

        tracing::debug!(
            chunks = token_estimate,
            chars = text.len(),
            "stream complete"
        );

        Ok(GenerationResult {
            text,
            token_estimate,
        })
    }
}
