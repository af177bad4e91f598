use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// The status code an encoder reports when it gave up waiting for input.
pub const TIMEOUT_CODE: i32 = -60;

/// A message from a running encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// A terminal status code. [`TIMEOUT_CODE`] means timeout, anything else
    /// means the stream ended.
    Code(i32),
    /// Informational output; never terminal.
    Other(String),
}

/// Everything an encoder needs to know to run one session.
#[derive(Debug, Clone, Serialize)]
pub struct EncoderParams {
    pub stream_id: String,
    pub protocol: String,
    pub listen_uri: String,
    #[serde(serialize_with = "as_secs")]
    pub timeout: Duration,
    pub rtmp: Vec<String>,
    pub mpegts: Vec<String>,
}

fn as_secs<S: serde::Serializer>(timeout: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(timeout.as_secs())
}

/// A running (or ready to run) streaming encoder.
///
/// Implement this trait to plug a different encoder into the supervisor.
#[async_trait]
pub trait Encoder: Send {
    /// Starts encoding. On failure the encoder cleans up after itself.
    async fn start(&mut self) -> Result<()>;

    /// Asks the encoder to stop. Returns without waiting.
    fn cancel(&mut self);

    /// Resolves once the encoder has released all of its resources.
    async fn wait(&mut self);

    /// Receives the next status message, or `None` once the channel is closed.
    async fn recv_status(&mut self) -> Option<Status>;
}

/// Builds encoders from session parameters.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, params: &EncoderParams) -> Result<Box<dyn Encoder>>;
}
