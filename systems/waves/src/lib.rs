#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave scheduler: paces spawns, counts resolved enemies and drives the run
//! through intermissions to victory or defeat.
//!
//! The scheduler never touches enemies directly. It appends
//! [`SpawnRequest`] values for the world to honour and learns about outcomes
//! through [`WaveScheduler::enemy_killed`],
//! [`WaveScheduler::enemy_reached_end`] and
//! [`WaveScheduler::spawn_discarded`].

use std::time::Duration;

use merge_defence_core::{ConfigError, EnemyTypeId, Event, FailureReason, GameConfig, LevelId};
use merge_defence_system_timers::{TimerId, Timers};

/// Coarse stage of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No run has started yet.
    Idle,
    /// A wave is spawning or waiting for its enemies to resolve.
    WaveActive,
    /// A wave completed and the next one has not started.
    Intermission,
    /// The final wave was cleared.
    Victory,
    /// Player health reached zero.
    GameOver,
}

/// Counters describing the current wave and the player's health.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WaveState {
    /// One-based index of the current wave, zero before the first wave.
    pub current_wave: u32,
    /// Waves the level defines.
    pub total_waves: u32,
    /// Enemies of the current wave not yet spawned.
    pub enemies_remaining_to_spawn: u32,
    /// Enemies of the current wave not yet resolved.
    pub enemies_remaining_alive: u32,
    /// Whether the current wave is still in progress.
    pub is_wave_active: bool,
    /// Whether the current wave still has spawns pending.
    pub is_spawning: bool,
    /// Remaining player health.
    pub player_health: u32,
    /// Player health at the start of a run.
    pub max_player_health: u32,
    /// Coarse stage of the run.
    pub phase: Phase,
}

/// Request for the world to spawn an enemy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Enemy type to spawn.
    pub kind: EnemyTypeId,
    /// Wave the enemy belongs to.
    pub wave: u32,
    /// Whether the request substitutes the level boss.
    pub boss: bool,
    /// Part of the current tick that had elapsed when the spawn fired.
    pub delay: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaveTimer {
    SpawnNext,
    Intermission,
}

/// Run state machine owning every wave counter.
#[derive(Debug)]
pub struct WaveScheduler {
    level: LevelId,
    roster: Vec<EnemyTypeId>,
    boss: Option<EnemyTypeId>,
    base_enemies: u32,
    increase_per_wave: u32,
    spawn_interval: Duration,
    intermission: Duration,
    state: WaveState,
    spawned_in_wave: u32,
    damage_taken_in_wave: bool,
    interrupted: bool,
    timers: Timers<WaveTimer>,
    tick_start: Duration,
    spawn_timer: Option<TimerId>,
    intermission_timer: Option<TimerId>,
}

impl WaveScheduler {
    /// Creates an idle scheduler for the configured level.
    pub fn new(config: &GameConfig) -> Result<Self, ConfigError> {
        let balance = &config.balance;
        if balance.total_waves == 0 {
            return Err(ConfigError::ZeroWaves);
        }
        if balance.max_player_health == 0 {
            return Err(ConfigError::ZeroPlayerHealth);
        }
        if config.level.enemy_roster.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }

        Ok(Self {
            level: config.level.id.clone(),
            roster: config.level.enemy_roster.clone(),
            boss: config.level.boss.clone(),
            base_enemies: balance.base_enemies_per_wave,
            increase_per_wave: balance.enemies_increase_per_wave,
            spawn_interval: balance.spawn_interval(),
            intermission: balance.intermission(),
            state: idle_state(balance.total_waves, balance.max_player_health),
            spawned_in_wave: 0,
            damage_taken_in_wave: false,
            interrupted: false,
            timers: Timers::new(),
            tick_start: Duration::ZERO,
            spawn_timer: None,
            intermission_timer: None,
        })
    }

    /// Current counters.
    #[must_use]
    pub fn state(&self) -> &WaveState {
        &self.state
    }

    /// Level the scheduler runs.
    #[must_use]
    pub fn level(&self) -> &LevelId {
        &self.level
    }

    /// Number of enemies wave `wave` consists of.
    #[must_use]
    pub fn enemies_for_wave(&self, wave: u32) -> u32 {
        self.base_enemies
            .saturating_add(wave.saturating_sub(1).saturating_mul(self.increase_per_wave))
    }

    /// Time left before the pending intermission ends.
    #[must_use]
    pub fn intermission_remaining(&self) -> Option<Duration> {
        self.timers.remaining(self.intermission_timer?)
    }

    /// Cancels every timer and returns to [`Phase::Idle`] with full health.
    pub fn reset(&mut self) {
        self.timers.clear();
        self.spawn_timer = None;
        self.intermission_timer = None;
        self.spawned_in_wave = 0;
        self.damage_taken_in_wave = false;
        self.interrupted = false;
        self.state = idle_state(self.state.total_waves, self.state.max_player_health);
    }

    /// Resets the run and launches the first wave.
    pub fn start_run(&mut self, events: &mut Vec<Event>, spawns: &mut Vec<SpawnRequest>) {
        self.reset();
        tracing::info!(level = %self.level, total_waves = self.state.total_waves, "run started");
        events.push(Event::RunStarted {
            level: self.level.clone(),
            total_waves: self.state.total_waves,
        });
        self.start_next_wave(events, spawns);
    }

    /// Starts the next wave, or declares victory once every wave is cleared.
    ///
    /// Does nothing while a wave is active or after the run ended.
    pub fn start_next_wave(&mut self, events: &mut Vec<Event>, spawns: &mut Vec<SpawnRequest>) {
        match self.state.phase {
            Phase::WaveActive | Phase::Victory | Phase::GameOver => {
                tracing::debug!(phase = ?self.state.phase, "start next wave ignored");
                return;
            }
            Phase::Idle | Phase::Intermission => {}
        }

        if let Some(timer) = self.intermission_timer.take() {
            let _ = self.timers.cancel(timer);
        }

        if self.state.current_wave >= self.state.total_waves {
            self.declare_victory(events);
            return;
        }

        let wave = self.state.current_wave + 1;
        let enemies = self.enemies_for_wave(wave);
        self.state.current_wave = wave;
        self.state.enemies_remaining_to_spawn = enemies;
        self.state.enemies_remaining_alive = enemies;
        self.state.is_wave_active = true;
        self.state.is_spawning = enemies > 0;
        self.state.phase = Phase::WaveActive;
        self.spawned_in_wave = 0;
        self.damage_taken_in_wave = false;
        self.interrupted = false;

        tracing::info!(wave, enemies, "wave started");
        events.push(Event::WaveStarted {
            wave,
            total_waves: self.state.total_waves,
        });

        if self.state.is_spawning {
            self.spawn_next(spawns);
        }
        self.check_completion(events);
    }

    /// Advances spawn and intermission timers by `dt`.
    ///
    /// Spawns firing partway through the tick carry the elapsed offset in
    /// [`SpawnRequest::delay`].
    pub fn tick(&mut self, dt: Duration, events: &mut Vec<Event>, spawns: &mut Vec<SpawnRequest>) {
        self.tick_start = self.timers.now();
        self.timers.advance_by(dt);
        while let Some((id, timer)) = self.timers.pop_due() {
            match timer {
                WaveTimer::SpawnNext => {
                    if self.spawn_timer != Some(id) {
                        continue;
                    }
                    self.spawn_timer = None;
                    if self.state.is_wave_active && self.state.is_spawning {
                        self.spawn_next(spawns);
                        self.check_completion(events);
                    }
                }
                WaveTimer::Intermission => {
                    if self.intermission_timer != Some(id) {
                        continue;
                    }
                    self.intermission_timer = None;
                    self.start_next_wave(events, spawns);
                }
            }
        }
        self.tick_start = self.timers.now();
    }

    /// Records that an enemy of `wave` died.
    pub fn enemy_killed(&mut self, wave: u32, events: &mut Vec<Event>) {
        self.resolve(wave, events);
    }

    /// Records that an enemy of `wave` reached the end, dealing `damage`.
    ///
    /// After a defeat the leak is still counted against an interrupted wave,
    /// but no further damage is applied.
    pub fn enemy_reached_end(&mut self, wave: u32, damage: u32, events: &mut Vec<Event>) {
        match self.state.phase {
            Phase::Victory => return,
            Phase::GameOver => {
                let _ = self.discount(wave);
                return;
            }
            Phase::Idle | Phase::WaveActive | Phase::Intermission => {}
        }

        if damage > 0 {
            self.state.player_health = self.state.player_health.saturating_sub(damage);
            self.damage_taken_in_wave = true;
            events.push(Event::PlayerHealthChanged {
                current: self.state.player_health,
                max: self.state.max_player_health,
            });
            if self.state.player_health == 0 {
                let _ = self.discount(wave);
                self.game_over(events);
                return;
            }
        }

        self.resolve(wave, events);
    }

    /// Records that a spawn request for `wave` could not be honoured.
    pub fn spawn_discarded(&mut self, wave: u32, events: &mut Vec<Event>) {
        tracing::warn!(wave, "spawn request discarded");
        self.resolve(wave, events);
    }

    /// Ends the active wave. Calling it again has no effect.
    pub fn complete_wave(&mut self, events: &mut Vec<Event>) {
        if !self.state.is_wave_active {
            return;
        }

        self.state.is_wave_active = false;
        self.state.is_spawning = false;
        if let Some(timer) = self.spawn_timer.take() {
            let _ = self.timers.cancel(timer);
        }

        let wave = self.state.current_wave;
        let perfect = !self.damage_taken_in_wave;
        tracing::info!(wave, perfect, "wave completed");
        events.push(Event::WaveCompleted { wave, perfect });

        if wave >= self.state.total_waves {
            self.declare_victory(events);
        } else {
            self.state.phase = Phase::Intermission;
            self.intermission_timer = Some(self.timers.schedule(self.intermission, WaveTimer::Intermission));
        }
    }

    /// Ends the run in defeat. Only the first call per defeat publishes.
    pub fn game_over(&mut self, events: &mut Vec<Event>) {
        if self.state.phase == Phase::GameOver {
            return;
        }

        self.timers.clear();
        self.spawn_timer = None;
        self.intermission_timer = None;
        self.interrupted = self.state.is_wave_active;
        self.state.is_wave_active = false;
        self.state.is_spawning = false;
        self.state.phase = Phase::GameOver;

        let reason = FailureReason::HealthDepleted;
        tracing::info!(level = %self.level, wave = self.state.current_wave, %reason, "level failed");
        events.push(Event::LevelFailed {
            level: self.level.clone(),
            reason,
        });
    }

    /// Restores health after a defeat and resumes play.
    ///
    /// Health becomes `max(1, round(fraction * max))`. The next wave starts,
    /// except after losing the final wave, which resumes where it stopped.
    /// Returns `false` when the run is not in [`Phase::GameOver`].
    pub fn revive(
        &mut self,
        health_fraction: f32,
        events: &mut Vec<Event>,
        spawns: &mut Vec<SpawnRequest>,
    ) -> bool {
        if self.state.phase != Phase::GameOver {
            tracing::warn!(phase = ?self.state.phase, "revive ignored outside of game over");
            return false;
        }

        let fraction = if health_fraction.is_nan() {
            0.0
        } else {
            health_fraction.clamp(0.0, 1.0)
        };
        let restored = (fraction * self.state.max_player_health as f32).round() as u32;
        self.state.player_health = restored.clamp(1, self.state.max_player_health);
        tracing::info!(health = self.state.player_health, "player revived");
        events.push(Event::PlayerHealthChanged {
            current: self.state.player_health,
            max: self.state.max_player_health,
        });

        let final_wave = self.state.current_wave >= self.state.total_waves;
        if final_wave && self.interrupted {
            self.resume_interrupted_wave(events);
        } else {
            self.state.phase = Phase::Intermission;
            self.start_next_wave(events, spawns);
        }
        true
    }

    /// Force-completes the active wave, dropping its pending spawns.
    ///
    /// The caller clears enemies and projectiles beforehand.
    pub fn skip_wave(&mut self, events: &mut Vec<Event>) -> bool {
        if !self.state.is_wave_active {
            return false;
        }

        if let Some(timer) = self.spawn_timer.take() {
            let _ = self.timers.cancel(timer);
        }
        self.state.enemies_remaining_to_spawn = 0;
        self.state.enemies_remaining_alive = 0;
        self.state.is_spawning = false;
        tracing::info!(wave = self.state.current_wave, "wave skipped");
        self.complete_wave(events);
        true
    }

    fn spawn_next(&mut self, spawns: &mut Vec<SpawnRequest>) {
        let wave = self.state.current_wave;
        let last = self.state.enemies_remaining_to_spawn == 1;
        let boss_kind = if last && wave == self.state.total_waves {
            self.boss.clone()
        } else {
            None
        };
        let boss = boss_kind.is_some();
        let rotation = self.spawned_in_wave as usize % self.roster.len().max(1);

        match boss_kind.or_else(|| self.roster.get(rotation).cloned()) {
            Some(kind) => {
                let delay = self.timers.now().saturating_sub(self.tick_start);
                tracing::debug!(%kind, wave, boss, ?delay, "spawn requested");
                spawns.push(SpawnRequest {
                    kind,
                    wave,
                    boss,
                    delay,
                });
            }
            None => {
                tracing::error!(wave, "enemy roster is empty");
                self.state.enemies_remaining_alive = self.state.enemies_remaining_alive.saturating_sub(1);
            }
        }

        self.spawned_in_wave += 1;
        self.state.enemies_remaining_to_spawn = self.state.enemies_remaining_to_spawn.saturating_sub(1);
        if self.state.enemies_remaining_to_spawn == 0 {
            self.state.is_spawning = false;
        } else {
            self.spawn_timer = Some(self.timers.schedule(self.spawn_interval, WaveTimer::SpawnNext));
        }
    }

    fn resume_interrupted_wave(&mut self, events: &mut Vec<Event>) {
        self.interrupted = false;
        self.state.phase = Phase::WaveActive;
        self.state.is_wave_active = true;
        self.state.is_spawning = self.state.enemies_remaining_to_spawn > 0;
        if self.state.is_spawning {
            self.spawn_timer = Some(self.timers.schedule(self.spawn_interval, WaveTimer::SpawnNext));
        }
        tracing::info!(wave = self.state.current_wave, "wave resumed");
        self.check_completion(events);
    }

    fn resolve(&mut self, wave: u32, events: &mut Vec<Event>) {
        if self.discount(wave) {
            self.check_completion(events);
        }
    }

    /// Counts one resolved enemy of `wave`.
    ///
    /// Enemies of a wave interrupted by a defeat keep counting so the wave can
    /// complete once resumed.
    fn discount(&mut self, wave: u32) -> bool {
        let counting = self.state.is_wave_active
            || (self.state.phase == Phase::GameOver && self.interrupted);
        if !counting || wave != self.state.current_wave {
            return false;
        }
        self.state.enemies_remaining_alive = self.state.enemies_remaining_alive.saturating_sub(1);
        true
    }

    fn check_completion(&mut self, events: &mut Vec<Event>) {
        if self.state.is_wave_active
            && self.state.enemies_remaining_alive == 0
            && !self.state.is_spawning
        {
            self.complete_wave(events);
        }
    }

    fn declare_victory(&mut self, events: &mut Vec<Event>) {
        self.timers.clear();
        self.spawn_timer = None;
        self.intermission_timer = None;
        self.state.phase = Phase::Victory;
        tracing::info!(level = %self.level, waves = self.state.total_waves, "level completed");
        events.push(Event::LevelCompleted {
            level: self.level.clone(),
            waves: self.state.total_waves,
        });
    }
}

fn idle_state(total_waves: u32, max_player_health: u32) -> WaveState {
    WaveState {
        current_wave: 0,
        total_waves,
        enemies_remaining_to_spawn: 0,
        enemies_remaining_alive: 0,
        is_wave_active: false,
        is_spawning: false,
        player_health: max_player_health,
        max_player_health,
        phase: Phase::Idle,
    }
}
