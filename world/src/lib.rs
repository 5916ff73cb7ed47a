#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative simulation context for Merge Defence.
//!
//! [`World`] owns the enemy registry, the defender grid, projectiles in
//! flight and the wave scheduler. Every mutation goes through [`apply`];
//! read access goes through the [`query`] module.

use std::{fmt, time::Duration};

use merge_defence_core::{
    Command, ConfigError, CurrencyLedger, Event, GameConfig, SfxPlayer,
};
use merge_defence_system_defenders::{Attack, Impact, Projectiles};
use merge_defence_system_enemies::{EnemyRegistry, Resolution};
use merge_defence_system_grid::{DropOutcome, Grid};
use merge_defence_system_waves::{Phase, SpawnRequest, WaveScheduler};

const GRID_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Represents the authoritative Merge Defence world state.
pub struct World {
    enemies: EnemyRegistry,
    grid: Grid,
    projectiles: Projectiles,
    waves: WaveScheduler,
    currency: Option<Box<dyn CurrencyLedger>>,
    audio: Option<Box<dyn SfxPlayer>>,
    elapsed: Duration,
    tick_index: u64,
    spawns: Vec<SpawnRequest>,
    resolutions: Vec<Resolution>,
    attacks: Vec<Attack>,
    impacts: Vec<Impact>,
}

impl World {
    /// Validates `config` and builds an idle world seeded with `seed`.
    pub fn new(config: &GameConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            enemies: EnemyRegistry::new(config, seed),
            grid: Grid::new(config, seed ^ GRID_SEED_SALT),
            projectiles: Projectiles::new(config.balance.projectile_hit_radius),
            waves: WaveScheduler::new(config)?,
            currency: None,
            audio: None,
            elapsed: Duration::ZERO,
            tick_index: 0,
            spawns: Vec::new(),
            resolutions: Vec::new(),
            attacks: Vec::new(),
            impacts: Vec::new(),
        })
    }

    /// Credits enemy rewards to the provided ledger.
    #[must_use]
    pub fn with_currency(mut self, currency: Box<dyn CurrencyLedger>) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Plays attack, hit and death sounds through the provided player.
    #[must_use]
    pub fn with_audio(mut self, audio: Box<dyn SfxPlayer>) -> Self {
        self.audio = Some(audio);
        self
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        self.elapsed = self.elapsed.saturating_add(dt);
        out_events.push(Event::TimeAdvanced { dt });

        if self.is_defeated() {
            return;
        }

        self.waves.tick(dt, out_events, &mut self.spawns);
        self.honour_spawns(out_events);

        self.enemies.tick(dt, &mut self.resolutions);
        self.relay_resolutions(out_events);
        if self.is_defeated() {
            return;
        }

        for defender in self.grid.defenders_mut() {
            defender.tick(dt, &self.enemies, &mut self.attacks);
        }
        for attack in self.attacks.drain(..) {
            if let Some(clip) = &attack.sfx {
                play(&mut self.audio, clip);
            }
            self.projectiles.fire(&attack, &mut self.impacts);
        }
        self.land_impacts(out_events);

        self.projectiles.tick(dt, &self.enemies, &mut self.impacts);
        self.land_impacts(out_events);
    }

    /// Combat freezes from the moment the player runs out of health.
    fn is_defeated(&self) -> bool {
        self.waves.state().phase == Phase::GameOver
    }

    fn honour_spawns(&mut self, out_events: &mut Vec<Event>) {
        for request in self.spawns.drain(..) {
            match self
                .enemies
                .spawn_delayed(&request.kind, request.wave, request.delay)
            {
                Ok(enemy) => out_events.push(Event::EnemySpawned {
                    enemy,
                    kind: request.kind,
                    wave: request.wave,
                }),
                Err(error) => {
                    tracing::warn!(%error, wave = request.wave, "spawn request not honoured");
                    self.waves.spawn_discarded(request.wave, out_events);
                }
            }
        }
    }

    fn land_impacts(&mut self, out_events: &mut Vec<Event>) {
        for impact in self.impacts.drain(..) {
            let hit_sfx = self
                .enemies
                .get(impact.target)
                .and_then(|enemy| enemy.config().hit_sfx.clone());
            if !self
                .enemies
                .damage(impact.target, impact.damage, &mut self.resolutions)
            {
                continue;
            }
            if let Some(clip) = hit_sfx {
                play(&mut self.audio, &clip);
            }
            if let Some(effect) = impact.on_hit {
                let _ = self.enemies.apply_status(impact.target, effect);
            }
        }
        self.relay_resolutions(out_events);
    }

    fn relay_resolutions(&mut self, out_events: &mut Vec<Event>) {
        for resolution in self.resolutions.drain(..) {
            match resolution {
                Resolution::Killed {
                    enemy,
                    kind,
                    wave,
                    coins,
                    gems,
                    death_sfx,
                } => {
                    if let Some(clip) = death_sfx {
                        play(&mut self.audio, &clip);
                    }
                    if let Some(currency) = self.currency.as_mut() {
                        if coins > 0 {
                            currency.add_coins(coins);
                        }
                        if gems > 0 {
                            currency.add_gems(gems);
                        }
                    }
                    out_events.push(Event::EnemyDefeated {
                        enemy,
                        kind,
                        coins,
                        gems,
                    });
                    self.waves.enemy_killed(wave, out_events);
                }
                Resolution::ReachedEnd {
                    enemy,
                    kind,
                    wave,
                    damage,
                } => {
                    out_events.push(Event::EnemyReachedEnd {
                        enemy,
                        kind,
                        damage,
                    });
                    self.waves.enemy_reached_end(wave, damage, out_events);
                }
            }
        }
    }

    fn clear_battlefield(&mut self) {
        let enemies = self.enemies.clear_all();
        let projectiles = self.projectiles.clear();
        tracing::debug!(enemies, projectiles, "battlefield cleared");
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("waves", self.waves.state())
            .field("enemies", &self.enemies.live_count())
            .field("defenders", &self.grid.len())
            .field("projectiles", &self.projectiles.len())
            .field("elapsed", &self.elapsed)
            .field("tick_index", &self.tick_index)
            .finish_non_exhaustive()
    }
}

fn play(audio: &mut Option<Box<dyn SfxPlayer>>, clip: &str) {
    if let Some(audio) = audio.as_mut() {
        audio.play_sfx_one_shot(clip);
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::StartRun => {
            world.clear_battlefield();
            world.waves.start_run(out_events, &mut world.spawns);
            world.honour_spawns(out_events);
        }
        Command::StartNextWave => {
            world.waves.start_next_wave(out_events, &mut world.spawns);
            world.honour_spawns(out_events);
        }
        Command::SkipWave => {
            if world.waves.state().is_wave_active {
                world.clear_battlefield();
                let _ = world.waves.skip_wave(out_events);
            }
        }
        Command::Revive { health_fraction } => {
            let _ = world
                .waves
                .revive(health_fraction, out_events, &mut world.spawns);
            world.honour_spawns(out_events);
        }
        Command::ResetRun => {
            world.clear_battlefield();
            let removed = world.grid.clear();
            world.waves.reset();
            tracing::info!(removed, "run reset");
        }
        Command::PlaceDefender { kind, cell, level } => {
            match world.grid.place(&kind, cell, level) {
                Ok(placed) => out_events.push(Event::DefenderPlaced {
                    defender: placed.defender,
                    kind,
                    level,
                    cell: placed.cell,
                }),
                Err(reason) => out_events.push(Event::PlacementRejected { kind, reason }),
            }
        }
        Command::MergeDefenders { source, target } => match world.grid.try_merge(source, target) {
            Ok(merged) => out_events.push(Event::DefenderMerged {
                defender: merged.defender,
                kind: merged.kind,
                level: merged.level,
            }),
            Err(reason) => {
                tracing::debug!(%reason, "merge rejected");
                out_events.push(Event::MergeRejected {
                    source,
                    target,
                    reason,
                });
            }
        },
        Command::BeginDrag { cell } => {
            if world.grid.begin_drag(cell).is_none() {
                tracing::debug!(column = cell.column(), row = cell.row(), "nothing to drag");
            }
        }
        Command::CancelDrag { cell } => {
            let _ = world.grid.cancel_drag(cell);
        }
        Command::DropDefender { from, at } => match world.grid.drop_at(from, at) {
            Some(DropOutcome::Merged(merged)) => out_events.push(Event::DefenderMerged {
                defender: merged.defender,
                kind: merged.kind,
                level: merged.level,
            }),
            Some(DropOutcome::Swapped { dragged, displaced }) => {
                out_events.push(Event::DefendersSwapped { dragged, displaced });
            }
            Some(DropOutcome::Moved { defender, from, to }) => {
                out_events.push(Event::DefenderMoved { defender, from, to });
            }
            Some(DropOutcome::Returned { .. }) | None => {}
        },
        Command::RemoveDefender { cell } => {
            if let Some(defender) = world.grid.remove(cell) {
                out_events.push(Event::DefenderRemoved {
                    defender: defender.id(),
                    cell,
                });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use merge_defence_core::{CellCoord, EnemyHandle, LevelId, Vec2};
    pub use merge_defence_system_defenders::{Defender, DefenderState, ProjectileSnapshot};
    pub use merge_defence_system_enemies::{Enemy, EnemySnapshot, EnemyView};
    pub use merge_defence_system_grid::{DefenderSnapshot, DefenderView};
    pub use merge_defence_system_waves::{Phase, WaveState};

    use super::World;

    /// Current wave counters and player health.
    #[must_use]
    pub fn wave_state(world: &World) -> &WaveState {
        world.waves.state()
    }

    /// Coarse stage of the run.
    #[must_use]
    pub fn phase(world: &World) -> Phase {
        world.waves.state().phase
    }

    /// Level the world simulates.
    #[must_use]
    pub fn level(world: &World) -> &LevelId {
        world.waves.level()
    }

    /// Time left before the pending intermission ends.
    #[must_use]
    pub fn intermission_remaining(world: &World) -> Option<Duration> {
        world.waves.intermission_remaining()
    }

    /// Path enemies follow.
    #[must_use]
    pub fn path(world: &World) -> &[Vec2] {
        world.enemies.path()
    }

    /// Captures a read-only view of the live enemies.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        world.enemies.view()
    }

    /// Enemy behind the handle, including corpses awaiting release.
    #[must_use]
    pub fn enemy(world: &World, handle: EnemyHandle) -> Option<&Enemy> {
        world.enemies.get(handle)
    }

    /// Number of live enemies.
    #[must_use]
    pub fn live_enemy_count(world: &World) -> usize {
        world.enemies.live_count()
    }

    /// Captures a read-only view of the placed defenders.
    #[must_use]
    pub fn defender_view(world: &World) -> DefenderView {
        world.grid.view()
    }

    /// Defender occupying the cell.
    #[must_use]
    pub fn defender_at(world: &World, cell: CellCoord) -> Option<&Defender> {
        world.grid.occupant(cell)
    }

    /// Grid dimensions as `(width, height)` in cells.
    #[must_use]
    pub fn grid_size(world: &World) -> (u32, u32) {
        (world.grid.width(), world.grid.height())
    }

    /// Highest level a defender can reach by merging.
    #[must_use]
    pub fn max_merge_level(world: &World) -> u32 {
        world.grid.max_level()
    }

    /// Number of empty grid cells.
    #[must_use]
    pub fn empty_cell_count(world: &World) -> usize {
        world.grid.empty_count()
    }

    /// Maps a world position onto the grid cell containing it.
    #[must_use]
    pub fn cell_at(world: &World, position: Vec2) -> Option<CellCoord> {
        world.grid.world_to_cell(position)
    }

    /// World position of a cell's centre.
    #[must_use]
    pub fn cell_center(world: &World, cell: CellCoord) -> Vec2 {
        world.grid.cell_to_world(cell)
    }

    /// Verifies that grid occupancy and the empty-cell list agree.
    #[must_use]
    pub fn grid_is_consistent(world: &World) -> bool {
        world.grid.is_consistent()
    }

    /// Snapshots of every projectile in flight.
    #[must_use]
    pub fn projectiles(world: &World) -> Vec<ProjectileSnapshot> {
        world.projectiles.snapshots()
    }

    /// Total simulated time.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}
