use crate::cancel::{self, CancelSignal, Canceller};
use crate::config::EncoderConfig;
use crate::encoder::{Encoder, EncoderFactory, EncoderParams, Status, TIMEOUT_CODE};

use anyhow::{Context, Result};
use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Launches an external encoder command per session.
///
/// Templates in the [`EncoderConfig`] are rendered in strict mode against:
///
/// - `stream_id`, `protocol`, `listen_uri`
/// - `timeout` (whole seconds, `0` when disabled)
/// - `rtmp`, `mpegts` (the destination lists)
/// - `destination` (only inside `rtmp_args` / `mpegts_args`)
///
/// Arguments that render to an empty string are dropped, so conditionals can
/// remove a flag entirely.
#[derive(Debug, Clone, Default)]
pub struct ProcessEncoderFactory {
    config: EncoderConfig,
}

/// A fully rendered command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl ProcessEncoderFactory {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, params: &EncoderParams) -> Result<CommandLine> {
        let mut reg = Handlebars::new();
        reg.set_strict_mode(true);
        reg.register_escape_fn(handlebars::no_escape);

        let mut ctx = serde_json::to_value(params)?;

        let program = reg
            .render_template(&self.config.command, &ctx)
            .context("encoder command template")?;

        let mut envs = Vec::with_capacity(self.config.envs.len());
        for (k, tpl) in &self.config.envs {
            let v = reg
                .render_template(tpl, &ctx)
                .with_context(|| format!("env template for '{}'", k))?;
            envs.push((k.clone(), v));
        }
        envs.sort();

        let mut args = render_args(&reg, &self.config.args, &ctx)?;

        let sinks = [
            (&self.config.rtmp_args, &params.rtmp),
            (&self.config.mpegts_args, &params.mpegts),
        ];
        for (templates, destinations) in sinks {
            for destination in destinations.iter().filter(|d| !d.is_empty()) {
                if let Some(obj) = ctx.as_object_mut() {
                    obj.insert("destination".to_string(), json!(destination));
                }
                args.extend(render_args(&reg, templates, &ctx)?);
            }
        }

        Ok(CommandLine {
            program,
            args,
            envs,
        })
    }
}

fn render_args(
    reg: &Handlebars<'_>,
    templates: &[String],
    ctx: &serde_json::Value,
) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(templates.len());
    for tpl in templates {
        let arg = reg
            .render_template(tpl, ctx)
            .with_context(|| format!("argument template '{}'", tpl))?;
        if !arg.is_empty() {
            out.push(arg);
        }
    }
    Ok(out)
}

impl EncoderFactory for ProcessEncoderFactory {
    fn create(&self, params: &EncoderParams) -> Result<Box<dyn Encoder>> {
        let line = self.render(params)?;
        tracing::debug!(stream = %params.stream_id, program = %line.program, args = ?line.args, "encoder command");
        Ok(Box::new(ProcessEncoder::new(line, params.timeout)))
    }
}

/// An encoder backed by a child process.
///
/// Each stderr line, ended by `\n` or `\r`, becomes [`Status::Other`]. The exit
/// code becomes [`Status::Code`] once the remaining output has been forwarded.
/// When `timeout` is non-zero and stderr produces no bytes for that long, the
/// child is killed and [`TIMEOUT_CODE`] is reported.
pub struct ProcessEncoder {
    line: CommandLine,
    timeout: Duration,
    status_tx: Option<mpsc::UnboundedSender<Status>>,
    status_rx: mpsc::UnboundedReceiver<Status>,
    canceller: Canceller,
    cancelled: CancelSignal,
    monitor: Option<JoinHandle<()>>,
}

impl ProcessEncoder {
    pub fn new(line: CommandLine, timeout: Duration) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (canceller, cancelled) = cancel::channel();
        Self {
            line,
            timeout,
            status_tx: Some(status_tx),
            status_rx,
            canceller,
            cancelled,
            monitor: None,
        }
    }
}

#[async_trait]
impl Encoder for ProcessEncoder {
    async fn start(&mut self) -> Result<()> {
        if self.monitor.is_some() {
            anyhow::bail!("encoder already started");
        }

        let mut child = Command::new(&self.line.program)
            .args(&self.line.args)
            .envs(self.line.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn encoder '{}'", self.line.program))?;

        let stderr = child.stderr.take().context("encoder stderr not captured")?;
        let status_tx = self
            .status_tx
            .take()
            .context("encoder status channel already handed out")?;

        tracing::info!(program = %self.line.program, pid = ?child.id(), "encoder started");

        self.monitor = Some(tokio::spawn(monitor(
            child,
            stderr,
            self.timeout,
            status_tx,
            self.cancelled.clone(),
        )));
        Ok(())
    }

    fn cancel(&mut self) {
        self.canceller.cancel();
    }

    async fn wait(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            if let Err(err) = monitor.await {
                tracing::warn!(%err, "encoder monitor task failed");
            }
        }
    }

    async fn recv_status(&mut self) -> Option<Status> {
        self.status_rx.recv().await
    }
}

impl Drop for ProcessEncoder {
    fn drop(&mut self) {
        // Lets a detached monitor kill and reap the child.
        self.canceller.cancel();
    }
}

/// Upper bound on reading leftover stderr after the child has exited.
///
/// A grandchild that inherited stderr can keep the pipe open indefinitely.
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Splits encoder output into lines on `\n` and `\r`.
///
/// ffmpeg ends progress updates with a bare `\r`, so both count as a line end.
#[derive(Debug, Default)]
struct OutputSplitter {
    pending: Vec<u8>,
}

impl OutputSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(b);
            }
        }
        lines
    }

    /// Whatever was left without a line ending.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

fn forward(status: &mpsc::UnboundedSender<Status>, lines: impl IntoIterator<Item = String>) {
    for line in lines {
        let _ = status.send(Status::Other(line));
    }
}

async fn drain(
    stderr: &mut ChildStderr,
    splitter: &mut OutputSplitter,
    status: &mpsc::UnboundedSender<Status>,
) {
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => forward(status, splitter.push(&buf[..n])),
            Err(err) => {
                tracing::debug!(%err, "encoder stderr unreadable");
                break;
            }
        }
    }
}

async fn monitor(
    mut child: Child,
    mut stderr: ChildStderr,
    timeout: Duration,
    status: mpsc::UnboundedSender<Status>,
    mut cancelled: CancelSignal,
) {
    let mut splitter = OutputSplitter::default();
    let mut buf = [0u8; 4096];
    let mut stderr_open = true;

    loop {
        let silence = async {
            if timeout.is_zero() {
                std::future::pending::<()>().await
            } else {
                tokio::time::sleep(timeout).await
            }
        };

        tokio::select! {
            biased;
            _ = cancelled.cancelled() => {
                tracing::debug!("stopping encoder");
                if let Err(err) = child.kill().await {
                    tracing::warn!(%err, "failed to kill encoder");
                }
                return;
            }
            read = stderr.read(&mut buf), if stderr_open => match read {
                Ok(0) => {
                    stderr_open = false;
                    forward(&status, splitter.finish());
                }
                Ok(n) => forward(&status, splitter.push(&buf[..n])),
                Err(err) => {
                    tracing::debug!(%err, "encoder stderr unreadable");
                    stderr_open = false;
                }
            },
            res = child.wait() => {
                let code = match res {
                    Ok(exit) => exit.code().unwrap_or(-1),
                    Err(err) => {
                        tracing::warn!(%err, "failed to wait for encoder");
                        -1
                    }
                };
                if stderr_open {
                    let drained = drain(&mut stderr, &mut splitter, &status);
                    if tokio::time::timeout(DRAIN_LIMIT, drained).await.is_err() {
                        tracing::debug!("encoder stderr still open after exit");
                    }
                }
                forward(&status, splitter.finish());

                tracing::info!(code, "encoder exited");
                let _ = status.send(Status::Code(code));
                return;
            }
            _ = silence => {
                tracing::warn!(?timeout, "encoder went silent");
                if let Err(err) = child.kill().await {
                    tracing::warn!(%err, "failed to kill encoder");
                }
                let _ = status.send(Status::Code(TIMEOUT_CODE));
                return;
            }
        }
    }
}
