use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use streamvisor::{
    BuildInfo, EncoderConfig, ProcessEncoderFactory, Supervisor, TaskConfig, cancel,
    listen_resource, net,
};

#[derive(Parser, Clone, Debug)]
#[command(name = "streamvisor", disable_version_flag = true)]
pub struct Cli {
    /// RTMP destination, e.g. rtmp://<ip>:<port>/appid. May be repeated.
    #[arg(long)]
    rtmp: Vec<String>,

    /// MPEG-TS destination, e.g. udp://<ip>:<port>. May be repeated.
    #[arg(long)]
    mpegts: Vec<String>,

    /// The protocol the encoder listens with: rtp | tcp | srt | rtmp.
    #[arg(long, default_value = "rtmp")]
    protocol: String,

    /// The port the encoder listens on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    #[arg(long, default_value = "std")]
    stream_id: String,

    /// Seconds of encoder silence before giving up; 0 disables it.
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    /// A TOML file describing the encoder command. Defaults to ffmpeg.
    #[arg(long)]
    encoder_config: Option<PathBuf>,

    /// Print the version and exit.
    #[arg(long)]
    version: bool,

    #[command(flatten)]
    log: streamvisor::log::Log,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let build = BuildInfo::current();

    if cli.version {
        println!("{}", build.short());
        return ExitCode::SUCCESS;
    }

    println!("{}\n-", build.banner());
    cli.log.init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<streamvisor::Error>()
                .map_or(1, streamvisor::Error::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let encoder = match &cli.encoder_config {
        Some(path) => EncoderConfig::load(path)?,
        None => EncoderConfig::default(),
    };

    let ip = net::private_ipv4()?;
    let listen_uri = listen_resource(&cli.protocol, &ip.to_string(), cli.port);

    tracing::info!(listen = %listen_uri, "listening");
    tracing::info!(rtmp = ?cli.rtmp, mpegts = ?cli.mpegts, "destinations");

    let (canceller, signal) = cancel::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            canceller.cancel();
        }
    });

    let supervisor = Supervisor::new(ProcessEncoderFactory::new(encoder));
    supervisor
        .run(TaskConfig {
            stream_id: cli.stream_id,
            protocol: cli.protocol,
            listen_uri,
            rtmp: cli.rtmp,
            mpegts: cli.mpegts,
            timeout: Duration::from_secs(cli.timeout),
            cancel: signal,
        })
        .await
        .context("session failed")
}
