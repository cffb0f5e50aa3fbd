use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use realtime_voice::core::audio::list_devices;
use realtime_voice::{
    CpalDevices, LevelMeter, RealtimeProvider, SessionEnd, VoiceConfig, VoiceSession,
    create_provider_adapter,
};

/// Real-time voice conversation with a speech-to-speech AI provider
#[derive(Parser, Debug)]
#[command(name = "realtime-voice")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Provider to talk to (overrides the configuration)
    #[arg(short = 'p', long = "provider", global = true)]
    provider: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio input and output devices
    Devices,

    /// List the voices a provider offers
    Voices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let provider_override = cli
        .provider
        .as_deref()
        .map(|name| {
            RealtimeProvider::parse(name).ok_or_else(|| anyhow!("Unknown provider '{}'", name))
        })
        .transpose()?;

    if let Some(command) = cli.command {
        match command {
            Commands::Devices => {
                let devices = list_devices()?;
                println!("Input devices:");
                for name in &devices.inputs {
                    let marker = if devices.default_input.as_ref() == Some(name) { "*" } else { " " };
                    println!(" {marker} {name}");
                }
                println!("Output devices:");
                for name in &devices.outputs {
                    let marker = if devices.default_output.as_ref() == Some(name) { "*" } else { " " };
                    println!(" {marker} {name}");
                }
            }
            Commands::Voices => {
                let provider = provider_override.unwrap_or_default();
                println!("Voices for {provider}:");
                for voice in provider.known_voices() {
                    println!("  {voice}");
                }
            }
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            VoiceConfig::from_file(path)
        }
        None => VoiceConfig::from_env(),
    }
    .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    if let Some(provider) = provider_override {
        config.provider = provider;
    }

    let api_key = config.api_key()?.to_string();
    let adapter = create_provider_adapter(config.provider, &config.provider_config())?;

    let meter = LevelMeter::new();
    let devices = Arc::new(CpalDevices::with_level_meter(meter.clone()));
    let mut session =
        VoiceSession::new(adapter, config.session_config(), devices).with_level_meter(meter);
    session.init(api_key);
    session
        .on_state_change(|state| info!(%state, "State changed"))
        .on_status_update(|status| info!("Status: {}", status))
        .on_error(|message| warn!("Session error: {}", message))
        .on_transcript(|role, text| {
            if !text.is_empty() {
                info!(%role, "{}", text);
            }
        });

    info!(provider = %config.provider, "Starting voice session, press Ctrl-C to stop");
    session.start().await?;

    let end = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down");
            SessionEnd::Stopped
        }
        end = session.wait_ended() => end,
    };
    session.stop().await;

    let transcript = session.transcript();
    if !transcript.is_empty() {
        println!("user: {}", transcript.user());
        println!("ai:   {}", transcript.ai());
    }

    match end {
        SessionEnd::Stopped => Ok(()),
        SessionEnd::Failed(message) => Err(anyhow!("Voice session ended: {}", message)),
    }
}
