#![deny(warnings)]

//! Headless runner: loads city data, plays one session and reports KPIs.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use courier_core::{Difficulty, SimConfig};
use courier_runtime::{Courier, GameState, Session, SessionEvent};
use data_pipeline::{
    load_session_data, load_session_data_strict, JsonDirProvider, ProviderChain,
};
use persistence::{HighScore, ScoreBoard, SlotStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SCORES_FILE: &str = "highscores.json";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    load_slot: Option<usize>,
    seconds: Option<f32>,
    seed: Option<u64>,
    difficulty: Option<Difficulty>,
    autopilot: Option<Difficulty>,
    name: Option<String>,
    strict: bool,
    json: bool,
    version: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next().map(PathBuf::from),
            "--data-dir" => args.data_dir = it.next().map(PathBuf::from),
            "--cache-dir" => args.cache_dir = it.next().map(PathBuf::from),
            "--save-dir" => args.save_dir = it.next().map(PathBuf::from),
            "--load" => args.load_slot = it.next().and_then(|s| s.parse().ok()),
            "--seconds" => args.seconds = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--difficulty" => args.difficulty = it.next().and_then(|s| s.parse().ok()),
            "--autopilot" => args.autopilot = it.next().and_then(|s| s.parse().ok()),
            "--name" => args.name = it.next(),
            "--strict" => args.strict = true,
            "--json" => args.json = true,
            "--version" | "-V" => args.version = true,
            _ => {}
        }
    }
    args
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.rng_seed = seed;
    }
    if let Some(d) = args.difficulty {
        cfg.difficulty = d;
    }
    Ok(cfg)
}

fn provider(args: &Args) -> ProviderChain {
    let mut chain = ProviderChain::new();
    if let Some(dir) = &args.cache_dir {
        chain = chain.with(JsonDirProvider::new(dir).with_max_age(Duration::hours(24)));
    }
    if let Some(dir) = &args.data_dir {
        chain = chain.with(JsonDirProvider::new(dir));
    }
    chain
}

/// `RUST_LOG` directives when given and parseable, otherwise "info".
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() -> Result<()> {
    // Logging setup
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    if args.version {
        println!(
            "courier-sim {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }

    let cfg = load_config(&args)?;
    let chain = provider(&args);
    info!(sources = chain.len(), seed = cfg.rng_seed, difficulty = ?cfg.difficulty, "starting CLI");
    let data = if args.strict {
        load_session_data_strict(&chain, cfg.game_start)?
    } else {
        load_session_data(&chain, cfg.game_start)
    };

    let seconds = args.seconds.unwrap_or(cfg.game_duration_secs);
    let mut session = Session::new(cfg, data)
        .with_player_name(args.name.clone().unwrap_or_else(|| "player".to_string()));
    if let Some(d) = args.autopilot {
        session = session.with_autopilot(d);
    }

    let slots = args.save_dir.as_ref().map(SlotStore::new);
    if let Some(slot) = args.load_slot {
        let store = slots.as_ref().context("--load needs --save-dir")?;
        let save = store.load(slot).with_context(|| format!("loading slot {slot}"))?;
        session.load_game(&save);
    }

    let state = session.run_seconds(seconds);
    let events = session.drain_events();
    let delivered = |who: Courier| {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Delivered { who: w, .. } if *w == who))
            .count()
    };
    let snap = session.snapshot();
    let score = session.final_score();

    println!(
        "Session {:?} | elapsed: {:.1}s | weather: {} (x{:.2}) | \
         open orders: {} | pending: {} | closed: {}",
        state,
        snap.elapsed,
        snap.weather,
        snap.weather_multiplier,
        snap.available_orders,
        snap.pending_orders,
        snap.closed_orders
    );
    for (label, k, who) in [
        ("Player", &snap.player, Courier::Player),
        ("Rival", &snap.rival, Courier::Rival),
    ] {
        println!(
            "{label} | at: {} | income: ${} | reputation: {} | stamina: {:.1} | \
             carried: {} ({} kg) | delivered: {} | penalties: {}",
            k.position,
            k.income,
            k.reputation,
            k.stamina,
            k.carried,
            k.carried_weight,
            delivered(who),
            k.penalties
        );
    }
    println!("Score | {score}");
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    }

    if let Some(store) = &slots {
        if state == GameState::Running {
            let slot = store.auto_save(&session.save_game())?;
            println!("Saved | slot {slot}");
        } else {
            let board = ScoreBoard::new(store.dir().join(SCORES_FILE));
            let entry = HighScore {
                name: session.player_name().to_string(),
                score,
                income: snap.player.income,
                reputation: snap.player.reputation,
                date: Utc::now(),
            };
            if let Some(rank) = board.record(entry)? {
                println!("High score | rank {}", rank + 1);
            }
        }
    }

    Ok(())
}
