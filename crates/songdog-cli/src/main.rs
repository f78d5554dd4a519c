mod input;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{broadcast, mpsc};

use songdog_core::engine::Engine;
use songdog_core::leaderboard::{DisabledGateway, Gateway};
use songdog_core::playback::{NullDevice, PlaybackDevice, SilentDevice};
use songdog_core::{GameBroadcast, GameCore, GameEvent};
use songdog_proto::catalog::Catalog;
use songdog_proto::config::Config;
use songdog_proto::protocol::{GameCommand, Mode};
use songdog_proto::state::PreferenceStore;

use crate::input::Input;

#[derive(Parser, Debug)]
#[command(name = "songdog", version, about = "Name the song from ever longer clips")]
struct Args {
    /// Config file (default: ~/.config/songdog/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Track list to play from, overriding `[catalog] path`
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Seed for track selection
    #[arg(long)]
    seed: Option<u64>,

    /// Start in casual mode
    #[arg(long)]
    casual: bool,

    /// No playback clock; rounds are guess-only
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = songdog_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("songdog.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("songdog log: {}", log_path.display());
    tracing::info!("songdog starting…");

    // ── Config and catalog ───────────────────────────────────────────────────
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("config: falling back to defaults: {}", e);
            Config::default()
        }),
    };

    let catalog_path = args
        .catalog
        .clone()
        .unwrap_or_else(|| config.catalog.path.clone());
    let catalog = Arc::new(Catalog::load(&catalog_path)?);
    if catalog.is_empty() {
        anyhow::bail!("catalog {} has no tracks", catalog_path.display());
    }

    let mode = if args.casual {
        Mode::Casual
    } else {
        config.game.start_mode
    };
    let genres = config.game.default_genres.clone();
    let engine = match args.seed {
        Some(seed) => Engine::with_seed(Arc::clone(&catalog), mode, genres, seed),
        None => Engine::new(Arc::clone(&catalog), mode, genres),
    };

    let device: Box<dyn PlaybackDevice> = if args.mute {
        Box::new(NullDevice)
    } else {
        Box::new(SilentDevice::default())
    };

    let gateway = Gateway::from_config(&config.leaderboard).unwrap_or_else(|e| {
        tracing::warn!("leaderboard: disabled: {:#}", e);
        Gateway::Disabled(DisabledGateway)
    });
    let prefs = PreferenceStore::open(config.paths.prefs_file.clone());

    // ── Channels ─────────────────────────────────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<GameBroadcast>(1024);
    let (event_tx, event_rx) = mpsc::channel::<GameEvent>(1024);

    let core = GameCore::new(
        &config,
        engine,
        device,
        Arc::new(gateway),
        prefs,
        broadcast_tx,
        event_tx.clone(),
    );
    let printer = tokio::spawn(render::print_broadcasts(broadcast_rx));
    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("GameCore exited with error: {}", e);
        }
    });

    println!("{}", input::HELP);
    event_tx
        .send(GameEvent::Command(GameCommand::NewRound))
        .await
        .context("game loop stopped")?;

    // ── Read commands ────────────────────────────────────────────────────────
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match input::parse_line(&line) {
            Ok(Input::Command(GameCommand::Guess { text })) => GameCommand::Guess {
                text: input::complete_guess(&catalog, &text),
            },
            Ok(Input::Command(cmd)) => cmd,
            Ok(Input::Search(query)) => {
                let matches = catalog.suggest(&query);
                for option in matches.iter().take(10) {
                    println!("  {option}");
                }
                if matches.len() > 10 {
                    println!("  … {} more", matches.len() - 10);
                }
                continue;
            }
            Ok(Input::Genres) => {
                println!("{}", catalog.genres().join(", "));
                continue;
            }
            Ok(Input::Help) => {
                println!("{}", input::HELP);
                continue;
            }
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => continue,
            Err(e) => {
                println!("! {e}");
                continue;
            }
        };
        event_tx
            .send(GameEvent::Command(cmd))
            .await
            .context("game loop stopped")?;
    }

    let _ = event_tx.send(GameEvent::Shutdown).await;
    core_task.await?;
    printer.abort();
    tracing::info!("songdog exiting");
    Ok(())
}
