pub mod consumer;
pub mod http;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::TracksideError;

/// Capacity of the chunk forwarding channel. The SSE reader task blocks
/// once the consumer falls this far behind.
pub const CHUNK_CHANNEL_CAPACITY: usize = 256;

/// A single generation call. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u64,
}

/// One incremental unit of a streamed response.
#[derive(Debug, Clone, Default)]
pub struct ResponseChunk {
    /// Text fragment carried by this chunk. Absent on role-only deltas and
    /// usually on the final chunk.
    pub delta: Option<String>,
}

/// Final accumulated generation output.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Concatenation of every fragment, in arrival order.
    pub text: String,
    /// Approximate token usage: one per received chunk. System and special
    /// tokens never appear in the stream, so this is an estimate only.
    pub token_estimate: u64,
}

/// Outcome of a single non-blocking poll of a chunk stream.
#[derive(Debug)]
pub enum ChunkPoll {
    /// A chunk is available.
    Ready(ResponseChunk),
    /// Nothing has arrived yet; the stream is still open.
    NotYetAvailable,
    /// The stream has ended; no further chunks will arrive.
    Exhausted,
}

/// Channel-backed lazy sequence of response chunks.
///
/// The producing side (the SSE reader in `http`, or a test fixture) sends
/// `Result<ResponseChunk, _>` items; a mid-stream transport error travels
/// in-band and surfaces on the next poll.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<Result<ResponseChunk, TracksideError>>,
}

pub type ChunkSender = mpsc::Sender<Result<ResponseChunk, TracksideError>>;

impl ChunkStream {
    /// Create a stream plus the sender that feeds it.
    pub fn channel() -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        (tx, Self { rx })
    }

    /// Non-blocking poll. `NotYetAvailable` means the producer is still
    /// running but hasn't sent anything; it is not an error.
    pub fn poll_chunk(&mut self) -> Result<ChunkPoll, TracksideError> {
        match self.rx.try_recv() {
            Ok(Ok(chunk)) => Ok(ChunkPoll::Ready(chunk)),
            Ok(Err(e)) => Err(e),
            Err(TryRecvError::Empty) => Ok(ChunkPoll::NotYetAvailable),
            Err(TryRecvError::Disconnected) => Ok(ChunkPoll::Exhausted),
        }
    }

    /// Await the next chunk. `None` means the stream is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<ResponseChunk, TracksideError>> {
        self.rx.recv().await
    }
}
