use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use panda_tutor::{
    create_router, AppState, AudioBackendFactory, AudioBridge, AudioDevices, AudioSource,
    BridgeConfig, Config, GeminiClient, GeminiLiveTransport, LessonService, LiveTransport,
    MixerOutput, OutputSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "panda-tutor", version, about = "Chinese learning companion for kids")]
struct Cli {
    /// Configuration file (TOML, extension optional)
    #[arg(long, short, global = true, default_value = "config/panda-tutor")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Talk to Panda Laoshi from the terminal until Ctrl-C
    Talk {
        /// Replay a WAV file instead of the microphone
        #[arg(long)]
        input: Option<PathBuf>,
        /// Record the tutor's voice to a WAV file instead of the speaker
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config).context("Failed to load configuration")?;

    info!("Panda Tutor v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Talk { input, output } => talk(cfg, input, output).await,
    }
}

fn live_transport(cfg: &Config) -> Arc<dyn LiveTransport> {
    Arc::new(GeminiLiveTransport::new(
        cfg.live.url.clone(),
        cfg.gemini.api_key.clone(),
    ))
}

async fn serve(cfg: Config) -> Result<()> {
    let client = GeminiClient::new(&cfg.gemini).context("Failed to create Gemini client")?;
    let lessons = Arc::new(LessonService::new(Arc::new(client), &cfg.gemini));
    let transport = live_transport(&cfg);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(cfg, lessons, transport, AudioDevices::default());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")
}

async fn talk(cfg: Config, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::from(&cfg);

    let source = input.map(AudioSource::File).unwrap_or(AudioSource::Microphone);
    let sink = output.map(OutputSink::WavFile).unwrap_or(OutputSink::Speaker);

    let microphone = AudioBackendFactory::create(source, config.capture())?;
    let speaker = Box::new(MixerOutput::new(sink, config.output_sample_rate));
    let mut bridge = AudioBridge::new(config, live_transport(&cfg), microphone, speaker);

    bridge.connect().await.context("Failed to start speaking session")?;
    info!("Say 你好 to Panda Laoshi! Press Ctrl-C to stop.");

    let mut status = bridge.status();
    let monitor = tokio::spawn(async move {
        let mut speaking = false;
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            if snapshot.is_speaking != speaking {
                speaking = snapshot.is_speaking;
                info!("Panda Laoshi is {}", if speaking { "speaking" } else { "listening" });
            }
        }
    });

    bridge
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    let summary = bridge.snapshot();
    drop(bridge);
    let _ = monitor.await;

    info!(
        "Session {} ended: {} frames sent, {} chunks played, {} interruptions",
        summary.session_id, summary.frames_sent, summary.chunks_received, summary.interruptions
    );
    if let Some(error) = summary.last_error {
        anyhow::bail!("Session ended with error: {}", error);
    }
    Ok(())
}
