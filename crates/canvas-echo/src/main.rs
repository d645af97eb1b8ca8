//! Canvas echo publisher entry point.
//!
//! Loads the configuration, applies the command-line overrides, wires the
//! infrastructure into a [`Session`] and runs it until the user stops it.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config (+ CLI / env overrides)
//!  └─ Session::new(EchoTransport, ConsoleView)
//!  └─ Session::start(SyntheticCamera, FileOverlayLoader)
//!  └─ Session::run
//!       ├─ transport events  (EchoTransport channel)
//!       └─ control commands  (stdin reader task, Ctrl-C task)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use canvas_echo::application::session::{ControlCommand, Session};
use canvas_echo::application::signaling::Transport;
use canvas_echo::infrastructure::assets::FileOverlayLoader;
use canvas_echo::infrastructure::capture::synthetic::SyntheticCamera;
use canvas_echo::infrastructure::console::spawn_stdin_reader;
use canvas_echo::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig, ConfigError,
};
use canvas_echo::infrastructure::transport::echo::EchoTransport;
use canvas_echo::infrastructure::view::ConsoleView;

/// Command-line options.  Every option overrides the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "canvas-echo",
    version,
    about = "Composites camera, watermark and caption into a live stream and echoes it back"
)]
struct Cli {
    /// Configuration file (default: the platform config directory).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Preferred audio codec, e.g. `opus`.
    #[arg(long, env = "CANVAS_ACODEC")]
    acodec: Option<String>,

    /// Preferred video codec, e.g. `vp8`, `h264`.
    #[arg(long, env = "CANVAS_VCODEC")]
    vcodec: Option<String>,

    /// Preferred video codec profile.
    #[arg(long, env = "CANVAS_VPROFILE")]
    vprofile: Option<String>,

    /// Compositor frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Watermark image.
    #[arg(long, value_name = "PATH")]
    overlay: Option<String>,

    /// Ask the echo server to offer simulcast layers.
    #[arg(long)]
    simulcast: bool,
}

impl Cli {
    /// Writes the given options over `config`.  Empty strings count as absent.
    fn apply_to(&self, config: &mut AppConfig) {
        fn present(value: &Option<String>) -> Option<String> {
            value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
        }

        if let Some(codec) = present(&self.acodec) {
            config.negotiation.audio_codec = Some(codec);
        }
        if let Some(codec) = present(&self.vcodec) {
            config.negotiation.video_codec = Some(codec);
        }
        if let Some(profile) = present(&self.vprofile) {
            config.negotiation.video_profile = Some(profile);
        }
        if let Some(fps) = self.fps {
            config.compositor.fps = fps;
        }
        if let Some(path) = present(&self.overlay) {
            config.overlay.path = path;
        }
        if self.simulcast {
            config.simulcast.enabled = true;
        }
    }

    fn load_config(&self) -> Result<AppConfig, ConfigError> {
        match &self.config {
            Some(path) => load_config_from(path),
            None => match load_config() {
                Err(ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
                other => other,
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = cli.load_config().context("failed to load configuration")?;
    cli.apply_to(&mut config);

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    let result = runtime.block_on(run(config));
    // A pending stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();
    result
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("canvas-echo starting");
    let settings = config
        .session_settings()
        .context("invalid configuration")?;
    let caption = config
        .initial_caption()
        .context("invalid caption configuration")?;

    let (transport, events) = EchoTransport::new(config.echo_settings());
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let mut session = Session::new(settings, caption, transport, Box::new(ConsoleView::new()));
    info!("session {}", session.opaque_id());

    let camera = SyntheticCamera::new();
    session
        .start(&camera, &FileOverlayLoader)
        .await
        .context("session failed to start")?;

    let (commands_tx, commands) = mpsc::channel(16);
    let _stdin = spawn_stdin_reader(commands_tx.clone());

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            if commands_tx.send(ControlCommand::Stop).await.is_err() {
                warn!("session already gone");
            }
        }
    });

    info!("ready: text | color | font | pos <x> <y> | sl <n> | tl <n> | audio | video | bitrate <kbps> | stop");
    session.run(events, commands).await.context("session failed")?;

    info!("canvas-echo stopped");
    Ok(())
}
