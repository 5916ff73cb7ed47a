#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line runner for Merge Defence.
//!
//! Loads a level configuration, lets a scripted player buy and merge
//! defenders, and advances the world tick by tick until the run is won, lost
//! or the tick budget runs out.

mod autoplay;
mod wallet;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use merge_defence_core::{Command, Event, GameConfig, SfxPlayer};
use merge_defence_world::{
    self as world,
    query::{self, Phase},
    World,
};
use tracing_subscriber::EnvFilter;

use crate::{autoplay::Autoplay, wallet::Wallet};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const REVIVE_HEALTH_FRACTION: f32 = 0.5;

/// Command-line arguments accepted by the runner.
#[derive(Debug, Parser)]
#[command(name = "merge-defence", about = "Plays a headless Merge Defence run")]
struct Args {
    /// TOML game configuration; the bundled level is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for gem drops and random placement.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    dt_ms: u64,
    /// Upper bound on simulated ticks.
    #[arg(long, default_value_t = 20_000)]
    max_ticks: u64,
    /// Revives granted after a game over.
    #[arg(long, default_value_t = 1)]
    revives: u32,
    /// Coins available before the first wave.
    #[arg(long, default_value_t = 30)]
    starting_coins: u32,
    /// Coins charged per defender purchase.
    #[arg(long, default_value_t = 10)]
    defender_cost: u32,
    /// Log filter directives, overriding `RUST_LOG`.
    #[arg(long)]
    log: Option<String>,
}

/// Entry point for the Merge Defence command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let summary = run(&config, &args)?;
    println!("{summary}");
    Ok(())
}

fn init_tracing(directives: Option<&str>) -> Result<()> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter `{directives}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow!(error))
}

fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    let config: GameConfig = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => toml::from_str(DEFAULT_CONFIG).context("failed to parse the bundled level")?,
    };
    config
        .validate()
        .context("configuration is inconsistent")?;
    Ok(config)
}

fn run(config: &GameConfig, args: &Args) -> Result<Summary> {
    let wallet = Wallet::with_coins(args.starting_coins);
    let mut world = World::new(config, args.seed)
        .context("failed to build the world")?
        .with_currency(Box::new(wallet.clone()))
        .with_audio(Box::new(LoggedSfx));
    let mut autoplay = Autoplay::new(config, args.defender_cost);
    let dt = Duration::from_millis(args.dt_ms.max(1));
    let mut revives_left = args.revives;
    let mut commands = Vec::new();
    let mut events = Vec::new();

    world::apply(&mut world, Command::StartRun, &mut events);
    report(&mut events);

    for _ in 0..args.max_ticks {
        autoplay.plan(&world, &wallet, &mut commands);
        commands.push(Command::Tick { dt });
        for command in commands.drain(..) {
            world::apply(&mut world, command, &mut events);
        }
        autoplay.settle(&events, &wallet);
        report(&mut events);

        match query::phase(&world) {
            Phase::Victory => break,
            Phase::GameOver if revives_left > 0 => {
                revives_left -= 1;
                tracing::info!(revives_left, "reviving");
                world::apply(
                    &mut world,
                    Command::Revive {
                        health_fraction: REVIVE_HEALTH_FRACTION,
                    },
                    &mut events,
                );
                report(&mut events);
            }
            Phase::GameOver => break,
            Phase::Idle | Phase::WaveActive | Phase::Intermission => {}
        }
    }

    let state = query::wave_state(&world);
    if !matches!(state.phase, Phase::Victory | Phase::GameOver) {
        tracing::warn!(max_ticks = args.max_ticks, "tick budget exhausted");
    }

    Ok(Summary {
        phase: state.phase,
        wave: state.current_wave,
        total_waves: state.total_waves,
        health: state.player_health,
        max_health: state.max_player_health,
        coins: wallet.coins(),
        gems: wallet.gems(),
        defenders: query::defender_view(&world).iter().count(),
        ticks: query::tick_index(&world),
        elapsed: query::elapsed(&world),
    })
}

fn report(events: &mut Vec<Event>) {
    for event in events.drain(..) {
        match event {
            // The wave scheduler logs run transitions itself.
            Event::TimeAdvanced { .. }
            | Event::RunStarted { .. }
            | Event::WaveStarted { .. }
            | Event::WaveCompleted { .. }
            | Event::LevelCompleted { .. }
            | Event::LevelFailed { .. } => {}
            Event::PlayerHealthChanged { current, max } => {
                tracing::info!(current, max, "player health changed");
            }
            Event::EnemySpawned { enemy, kind, wave } => {
                tracing::debug!(?enemy, %kind, wave, "enemy spawned");
            }
            Event::EnemyDefeated {
                enemy,
                kind,
                coins,
                gems,
            } => {
                tracing::debug!(?enemy, %kind, coins, gems, "enemy defeated");
            }
            Event::EnemyReachedEnd { enemy, kind, damage } => {
                tracing::debug!(?enemy, %kind, damage, "enemy reached the end");
            }
            Event::DefenderPlaced {
                defender,
                kind,
                level,
                cell,
            } => {
                tracing::debug!(?defender, %kind, level, ?cell, "defender placed");
            }
            Event::DefenderMerged {
                defender,
                kind,
                level,
            } => {
                tracing::info!(?defender, %kind, level, "defenders merged");
            }
            Event::DefenderMoved { defender, from, to } => {
                tracing::debug!(?defender, ?from, ?to, "defender moved");
            }
            Event::DefendersSwapped { dragged, displaced } => {
                tracing::debug!(?dragged, ?displaced, "defenders swapped");
            }
            Event::DefenderRemoved { defender, cell } => {
                tracing::debug!(?defender, ?cell, "defender removed");
            }
            Event::PlacementRejected { kind, reason } => {
                tracing::warn!(%kind, %reason, "placement rejected");
            }
            Event::MergeRejected {
                source,
                target,
                reason,
            } => {
                tracing::warn!(?source, ?target, %reason, "merge rejected");
            }
        }
    }
}

/// Sound collaborator that records clips in the trace log.
#[derive(Debug)]
struct LoggedSfx;

impl SfxPlayer for LoggedSfx {
    fn play_sfx_one_shot(&mut self, clip: &str) {
        tracing::trace!(clip, "sfx");
    }
}

/// Final tallies printed when the runner exits.
#[derive(Debug)]
struct Summary {
    phase: Phase,
    wave: u32,
    total_waves: u32,
    health: u32,
    max_health: u32,
    coins: u32,
    gems: u32,
    defenders: usize,
    ticks: u64,
    elapsed: Duration,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.phase {
            Phase::Victory => "victory",
            Phase::GameOver => "defeat",
            Phase::Idle | Phase::WaveActive | Phase::Intermission => "unfinished",
        };
        write!(
            f,
            "{outcome}: wave {}/{}, health {}/{}, {} coins, {} gems, {} defenders, {} ticks ({:.1}s simulated)",
            self.wave,
            self.total_waves,
            self.health,
            self.max_health,
            self.coins,
            self.gems,
            self.defenders,
            self.ticks,
            self.elapsed.as_secs_f32(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_level_is_valid() {
        let config = load_config(None).expect("bundled level");
        assert_eq!(config.level.id.as_str(), "meadow");
        assert_eq!(config.balance.total_waves, 10);
        assert!(config.level.boss.is_some());
    }

    #[test]
    fn missing_config_file_reports_its_path() {
        let error = load_config(Some(Path::new("/nonexistent/level.toml")))
            .expect_err("file does not exist");
        assert!(error.to_string().contains("/nonexistent/level.toml"));
    }

    #[test]
    fn runs_stop_within_the_tick_budget() {
        let args = Args::parse_from(["merge-defence", "--max-ticks", "300", "--seed", "11"]);
        let config = load_config(None).expect("bundled level");
        let summary = run(&config, &args).expect("run completes");
        assert!(summary.ticks <= 300);
        assert!(summary.wave >= 1);
        assert!(summary.defenders >= 1);
    }

    #[test]
    fn identical_arguments_replay_identically() {
        let args = Args::parse_from(["merge-defence", "--max-ticks", "400"]);
        let config = load_config(None).expect("bundled level");
        let first = run(&config, &args).expect("first run").to_string();
        let second = run(&config, &args).expect("second run").to_string();
        assert_eq!(first, second);
    }
}
