use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use jarvis::bridge::UiBridge;
use jarvis::channel::{ChannelRegistry, ImageRequest, MicrophoneFlag};
use jarvis::config::Config;
use jarvis::dispatch::{self, CommandCapability, DispatchReport, Dispatcher};
use jarvis::services::{Backend, ImageWorker, StdinSource};
use jarvis::text_processing::TextProcessor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Jarvis: a personal-assistant shell coordinated through shared channel files.
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the directory holding the channel files.
    #[arg(long)]
    channel_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for microphone requests and dispatch the commands read from stdin.
    Backend,

    /// Serve the JSON bridge for browser front ends.
    Web,

    /// Run the image capability whenever an image request is triggered.
    ImageWorker,

    /// Dispatch one batch of commands and print the outcomes.
    Dispatch {
        /// Print outcomes and the summary as JSON.
        #[arg(long)]
        json: bool,

        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Toggle the microphone flag, as the UI button does.
    ToggleMic,

    /// Print the current value of every channel.
    State,

    /// Follow the status and response channels.
    Watch,

    /// Ask the image worker to generate images for a prompt.
    RequestImage { prompt: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jarvis=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = cli.channel_dir {
        config.channel_dir = Some(dir);
    }
    config.validate()?;

    let channels = Arc::new(ChannelRegistry::open(config.channel_dir()?)?);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
            cancel.cancel();
        }
    });

    match cli.command.unwrap_or(Command::Backend) {
        Command::Backend => run_backend(&config, channels, cancel).await,
        Command::Web => {
            let bridge = Arc::new(ui_bridge(&config, channels));
            jarvis::web::serve(bridge, &config.web_host, config.web_port, cancel).await
        }
        Command::ImageWorker => run_image_worker(&config, channels, cancel).await,
        Command::Dispatch { json, commands } => run_dispatch(&config, commands, json).await,
        Command::ToggleMic => toggle_mic(&config, channels, cancel).await,
        Command::State => {
            for channel in channels.channels() {
                println!("{:<18} {}", channel.name(), channel.read());
            }
            Ok(())
        }
        Command::Watch => watch(&config, channels, cancel).await,
        Command::RequestImage { prompt } => {
            channels.set_image_request(&ImageRequest::pending(prompt))?;
            tracing::info!("Image request published");
            Ok(())
        }
    }
}

fn ui_bridge(config: &Config, channels: Arc<ChannelRegistry>) -> UiBridge {
    UiBridge::new(channels, config.safety_window()).with_poll_interval(config.mic_poll_interval())
}

async fn run_backend(
    config: &Config,
    channels: Arc<ChannelRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    let dispatcher = Dispatcher::new(dispatch::actions_from_config(config)?);
    let text_processor = TextProcessor::new(&config.word_overrides, &config.command_separator)?;
    let bridge = Arc::new(ui_bridge(config, channels));

    Backend::new(
        bridge,
        dispatcher,
        text_processor,
        Box::new(StdinSource::new()),
        config.mic_poll_interval(),
        cancel,
    )
    .run()
    .await
}

async fn run_image_worker(
    config: &Config,
    channels: Arc<ChannelRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    let argv = config
        .image_command
        .clone()
        .context("image_command is not configured")?;
    let generator = Arc::new(CommandCapability::new("image", argv)?);

    ImageWorker::new(channels, generator, config.status_poll_interval(), cancel)
        .run()
        .await
}

async fn run_dispatch(config: &Config, commands: Vec<String>, json: bool) -> Result<()> {
    let dispatcher = Dispatcher::new(dispatch::actions_from_config(config)?);
    let outcomes = dispatcher.run(commands).await;
    let report = DispatchReport::from_outcomes(&outcomes);

    if json {
        let body = serde_json::json!({ "outcomes": outcomes, "report": report });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    for outcome in &outcomes {
        println!("{:<8} {:<30} {}", outcome.verb, outcome.command, outcome.outcome);
    }
    println!("{}", dispatch::outcome::render(&outcomes));
    if let Some(ratio) = report.success_ratio() {
        println!("Success ratio: {:.0}%", ratio * 100.0);
    }
    Ok(())
}

/// Toggle the flag, then stay alive until the request is handled or
/// superseded, so the safety timer can still reset it.
async fn toggle_mic(
    config: &Config,
    channels: Arc<ChannelRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    let bridge = ui_bridge(config, Arc::clone(&channels));
    let flag = bridge.toggle_microphone()?;
    println!("mic: {}", flag.encode());
    if flag != MicrophoneFlag::Requested {
        return Ok(());
    }

    let requested_at = channels.microphone_channel().revision();
    let mut microphone = Box::pin(
        channels
            .microphone_channel()
            .poll(config.mic_poll_interval(), cancel),
    );
    while let Some(snapshot) = microphone.next().await {
        if snapshot.revision != requested_at {
            println!("mic: {}", snapshot.value);
            break;
        }
    }
    Ok(())
}

async fn watch(
    config: &Config,
    channels: Arc<ChannelRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    let bridge = ui_bridge(config, channels);
    let interval = config.status_poll_interval();

    let status = bridge
        .watch_status(interval, cancel.clone())
        .map(|snapshot| format!("[status #{}] {}", snapshot.revision, snapshot.value));
    let responses = bridge
        .watch_responses(interval, cancel)
        .map(|snapshot| format!("[response #{}] {}", snapshot.revision, snapshot.value));

    let mut updates = futures::stream::select(Box::pin(status), Box::pin(responses));
    while let Some(line) = updates.next().await {
        println!("{line}");
    }
    Ok(())
}
