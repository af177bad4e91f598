use crate::cancel::CancelSignal;
use crate::encoder::{EncoderFactory, EncoderParams, Status, TIMEOUT_CODE};
use crate::{Error, Result};

use std::time::Duration;

/// One streaming session, fixed before supervision begins.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub stream_id: String,
    pub protocol: String,
    pub listen_uri: String,
    pub rtmp: Vec<String>,
    pub mpegts: Vec<String>,
    /// Passed to the encoder; zero disables it.
    pub timeout: Duration,
    pub cancel: CancelSignal,
}

enum Event {
    Cancelled,
    Status(Option<Status>),
}

/// Drives a single encoder from start to a terminal result.
pub struct Supervisor<F> {
    factory: F,
}

impl<F: EncoderFactory> Supervisor<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Runs the session to completion.
    ///
    /// Returns `Ok(())` when the encoder reports a non-timeout status code,
    /// [`Error::Timeout`] for [`TIMEOUT_CODE`], and [`Error::Canceled`] once a
    /// cancellation has been handled. On cancellation the encoder is always
    /// cancelled and then waited on before this returns.
    pub async fn run(&self, config: TaskConfig) -> Result<()> {
        let TaskConfig {
            stream_id,
            protocol,
            listen_uri,
            rtmp,
            mpegts,
            timeout,
            mut cancel,
        } = config;

        // Either sink kind counts; an MPEG-TS-only session is valid.
        if !rtmp.iter().chain(&mpegts).any(|dst| !dst.is_empty()) {
            return Err(Error::NoDestination);
        }

        let params = EncoderParams {
            stream_id,
            protocol,
            listen_uri,
            timeout,
            rtmp,
            mpegts,
        };

        let mut encoder = self.factory.create(&params)?;
        encoder.start().await?;

        let stream = params.stream_id.as_str();
        tracing::info!(%stream, listen = %params.listen_uri, "session running");

        let res = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => Event::Cancelled,
                status = encoder.recv_status() => Event::Status(status),
            };

            match event {
                Event::Cancelled => {
                    tracing::info!(%stream, "session canceled, stopping encoder");
                    encoder.cancel();
                    encoder.wait().await;
                    break Err(Error::Canceled);
                }
                Event::Status(Some(Status::Code(TIMEOUT_CODE))) => break Err(Error::Timeout),
                Event::Status(Some(Status::Code(code))) => {
                    tracing::debug!(%stream, code, "encoder finished");
                    break Ok(());
                }
                Event::Status(Some(Status::Other(msg))) => {
                    tracing::trace!(%stream, %msg, "encoder");
                }
                Event::Status(None) => break Err(Error::StatusClosed),
            }
        };

        match &res {
            Ok(()) => tracing::info!(%stream, "session ended"),
            Err(err) => tracing::warn!(%stream, %err, "session ended"),
        }
        res
    }
}
