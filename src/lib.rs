//! # streamvisor: supervise a single streaming encoder session
//!
//! This library finds a local address to expose an ingest endpoint on, formats
//! the endpoint as a protocol URI, hands it to an encoder and supervises that
//! encoder until it finishes, is cancelled, or times out.
//!
//! ## Key Concepts
//!
//! - **Address selection** (`net`): picks the first private or loopback IPv4
//!   address reported by the host interfaces.
//!
//! - **`listen_resource`**: formats `protocol://host:port`, adding
//!   `?mode=listener` for SRT.
//!
//! - **`Encoder` / `EncoderFactory`**: the seam between the supervisor and
//!   whatever actually encodes. [`ProcessEncoderFactory`] runs an external
//!   command (ffmpeg by default) described by an [`EncoderConfig`].
//!
//! - **`Supervisor`**: starts the encoder and waits for the first of a
//!   cancellation or a terminal status code.
//!
//! - **`LoopbackListener`**: a TCP listener on a loopback address and an
//!   OS-assigned port, for local control channels.
//!
//! ## Quickstart Example
//!
//! ```no_run
//! use std::time::Duration;
//! use streamvisor::{cancel, net, listen_resource, ProcessEncoderFactory, Supervisor, TaskConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ip = net::private_ipv4()?;
//!     let listen_uri = listen_resource("srt", &ip.to_string(), 9000);
//!
//!     let (canceller, signal) = cancel::channel();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         canceller.cancel();
//!     });
//!
//!     let supervisor = Supervisor::new(ProcessEncoderFactory::default());
//!     supervisor
//!         .run(TaskConfig {
//!             stream_id: "std".to_string(),
//!             protocol: "srt".to_string(),
//!             listen_uri,
//!             rtmp: vec!["rtmp://example.com/live/key".to_string()],
//!             mpegts: Vec::new(),
//!             timeout: Duration::from_secs(10),
//!             cancel: signal,
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod encoder;
mod error;
pub mod listener;
pub mod log;
pub mod net;
pub mod process;
mod resource;
pub mod supervisor;
pub mod version;

// Re-export public-facing components.
pub use config::EncoderConfig;
pub use encoder::{Encoder, EncoderFactory, EncoderParams, Status, TIMEOUT_CODE};
pub use error::{Error, Result};
pub use listener::LoopbackListener;
pub use net::AddressClass;
pub use process::ProcessEncoderFactory;
pub use resource::{LISTENER_MODE_PROTOCOL, listen_resource};
pub use supervisor::{Supervisor, TaskConfig};
pub use version::BuildInfo;
