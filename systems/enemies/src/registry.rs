//! Pooled arena owning every enemy in play.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use merge_defence_core::{
    EnemyConfig, EnemyHandle, EnemyQuery, EnemyTypeId, GameConfig, StatusEffect, Vec2,
};
use merge_defence_system_timers::Timers;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::actor::{Enemy, Fate};

/// Terminal outcome of an enemy, reported exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The enemy died and dropped its rewards.
    Killed {
        /// Handle of the dead enemy.
        enemy: EnemyHandle,
        /// Configured type of the enemy.
        kind: EnemyTypeId,
        /// Wave the enemy belonged to.
        wave: u32,
        /// Coins dropped.
        coins: u32,
        /// Gems dropped, zero when the roll failed.
        gems: u32,
        /// Death sound to play, if configured.
        death_sfx: Option<String>,
    },
    /// The enemy walked off the end of the path.
    ReachedEnd {
        /// Handle of the escaped enemy.
        enemy: EnemyHandle,
        /// Configured type of the enemy.
        kind: EnemyTypeId,
        /// Wave the enemy belonged to.
        wave: u32,
        /// Damage dealt to the player.
        damage: u32,
    },
}

impl Resolution {
    /// Handle of the resolved enemy.
    #[must_use]
    pub fn enemy(&self) -> EnemyHandle {
        match self {
            Self::Killed { enemy, .. } | Self::ReachedEnd { enemy, .. } => *enemy,
        }
    }

    /// Wave the resolved enemy belonged to.
    #[must_use]
    pub fn wave(&self) -> u32 {
        match self {
            Self::Killed { wave, .. } | Self::ReachedEnd { wave, .. } => *wave,
        }
    }
}

/// Errors raised when a spawn request cannot be honoured.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// The requested enemy type has no configuration.
    #[error("enemy type `{0}` is not configured")]
    UnknownEnemy(EnemyTypeId),
}

#[derive(Clone, Debug)]
enum Occupant {
    Vacant,
    Live(Enemy),
    Dying(Enemy),
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    occupant: Occupant,
}

/// Generational arena of enemies with a free list for slot reuse.
///
/// Handles carry the slot generation; once a slot is recycled every older
/// handle resolves to nothing.
#[derive(Debug)]
pub struct EnemyRegistry {
    catalog: BTreeMap<EnemyTypeId, Arc<EnemyConfig>>,
    path: Vec<Vec2>,
    waypoint_epsilon: f32,
    death_release_delay: Duration,
    slots: Vec<Slot>,
    free: Vec<u32>,
    releases: Timers<EnemyHandle>,
    rng: ChaCha8Rng,
    next_sequence: u64,
}

impl EnemyRegistry {
    /// Builds a registry for the level described by `config`.
    #[must_use]
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        let catalog = config
            .enemies
            .iter()
            .map(|enemy| (enemy.id.clone(), Arc::new(enemy.clone())))
            .collect();

        Self {
            catalog,
            path: config.level.waypoints.clone(),
            waypoint_epsilon: config.balance.waypoint_epsilon,
            death_release_delay: config.balance.death_release_delay(),
            slots: Vec::new(),
            free: Vec::new(),
            releases: Timers::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_sequence: 0,
        }
    }

    /// Path every enemy follows.
    #[must_use]
    pub fn path(&self) -> &[Vec2] {
        &self.path
    }

    /// Spawns an enemy of `kind` at the path start with stats for `wave`.
    pub fn spawn(&mut self, kind: &EnemyTypeId, wave: u32) -> Result<EnemyHandle, SpawnError> {
        self.spawn_delayed(kind, wave, Duration::ZERO)
    }

    /// Like [`EnemyRegistry::spawn`], for an enemy that appeared `delay` into
    /// the current tick. It only moves for the rest of that tick.
    pub fn spawn_delayed(
        &mut self,
        kind: &EnemyTypeId,
        wave: u32,
        delay: Duration,
    ) -> Result<EnemyHandle, SpawnError> {
        let Some(config) = self.catalog.get(kind).cloned() else {
            tracing::error!(%kind, "spawn requested for unconfigured enemy type");
            return Err(SpawnError::UnknownEnemy(kind.clone()));
        };

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    occupant: Occupant::Vacant,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let enemy = Enemy::spawn(config, wave, sequence, &self.path).with_spawn_delay(delay);

        let slot = &mut self.slots[index as usize];
        slot.occupant = Occupant::Live(enemy);
        let handle = EnemyHandle::new(index, slot.generation);
        tracing::debug!(%kind, wave, index, generation = slot.generation, "enemy spawned");
        Ok(handle)
    }

    /// Advances release timers and every live enemy by `dt`.
    ///
    /// Enemies are visited in slot order; each resolution is appended to `out`.
    pub fn tick(&mut self, dt: Duration, out: &mut Vec<Resolution>) {
        self.releases.advance_by(dt);
        while let Some((_, handle)) = self.releases.pop_due() {
            let pending = self
                .slot(handle)
                .is_some_and(|slot| matches!(slot.occupant, Occupant::Dying(_)));
            if pending {
                self.release(handle.index());
            }
        }

        for index in 0..self.slots.len() {
            let fate = match &mut self.slots[index].occupant {
                Occupant::Live(enemy) => enemy.tick(dt, &self.path, self.waypoint_epsilon),
                Occupant::Vacant | Occupant::Dying(_) => None,
            };

            match fate {
                Some(Fate::Killed) => self.finish_kill(index as u32, out),
                Some(Fate::ReachedEnd) => self.finish_escape(index as u32, out),
                None => {}
            }
        }
    }

    /// Deals `amount` damage to a live enemy.
    ///
    /// Returns `false` when the handle no longer refers to a live enemy. A
    /// killing hit appends the resulting [`Resolution`] to `out`.
    pub fn damage(&mut self, enemy: EnemyHandle, amount: f32, out: &mut Vec<Resolution>) -> bool {
        let Some(live) = self.live_mut(enemy) else {
            return false;
        };
        if live.take_damage(amount) {
            self.finish_kill(enemy.index(), out);
        }
        true
    }

    /// Applies a status effect to a live enemy, returning whether it landed.
    pub fn apply_status(&mut self, enemy: EnemyHandle, effect: StatusEffect) -> bool {
        match self.live_mut(enemy) {
            Some(live) => {
                live.apply_status(effect);
                true
            }
            None => false,
        }
    }

    /// Releases every slot without producing resolutions.
    ///
    /// Returns the number of live enemies that were removed.
    pub fn clear_all(&mut self) -> usize {
        let mut cleared = 0;
        for slot in &mut self.slots {
            if matches!(slot.occupant, Occupant::Live(_)) {
                cleared += 1;
            }
            if !matches!(slot.occupant, Occupant::Vacant) {
                slot.occupant = Occupant::Vacant;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.releases.clear();
        if cleared > 0 {
            tracing::debug!(cleared, "cleared all enemies");
        }
        cleared
    }

    /// Enemy behind the handle, live or awaiting release.
    #[must_use]
    pub fn get(&self, enemy: EnemyHandle) -> Option<&Enemy> {
        match &self.slot(enemy)?.occupant {
            Occupant::Live(enemy) | Occupant::Dying(enemy) => Some(enemy),
            Occupant::Vacant => None,
        }
    }

    /// Number of live enemies.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Live enemies within `range` of `origin`, in spawn order.
    #[must_use]
    pub fn in_range(&self, origin: Vec2, range: f32) -> Vec<EnemyHandle> {
        let mut found: Vec<(u64, EnemyHandle)> = self
            .live()
            .filter(|(_, enemy)| origin.distance(enemy.position()) <= range)
            .map(|(handle, enemy)| (enemy.sequence(), handle))
            .collect();
        found.sort_unstable();
        found.into_iter().map(|(_, handle)| handle).collect()
    }

    /// Captures an immutable snapshot of every live enemy.
    #[must_use]
    pub fn view(&self) -> EnemyView {
        EnemyView::from_snapshots(
            self.live()
                .map(|(handle, enemy)| EnemySnapshot {
                    handle,
                    kind: enemy.kind().clone(),
                    sequence: enemy.sequence(),
                    wave: enemy.wave(),
                    position: enemy.position(),
                    health: enemy.health(),
                    max_health: enemy.max_health(),
                    move_speed: enemy.move_speed(),
                    slowed: enemy.status().is_slowed(),
                    stunned: enemy.status().is_stunned(),
                    poisoned: enemy.status().is_poisoned(),
                })
                .collect(),
        )
    }

    fn live(&self) -> impl Iterator<Item = (EnemyHandle, &Enemy)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.occupant {
                Occupant::Live(enemy) => {
                    Some((EnemyHandle::new(index as u32, slot.generation), enemy))
                }
                Occupant::Vacant | Occupant::Dying(_) => None,
            })
    }

    fn slot(&self, handle: EnemyHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn live_mut(&mut self, handle: EnemyHandle) -> Option<&mut Enemy> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())?;
        match &mut slot.occupant {
            Occupant::Live(enemy) => Some(enemy),
            Occupant::Vacant | Occupant::Dying(_) => None,
        }
    }

    fn finish_kill(&mut self, index: u32, out: &mut Vec<Resolution>) {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return;
        };
        let Occupant::Live(enemy) = std::mem::replace(&mut slot.occupant, Occupant::Vacant) else {
            return;
        };

        let handle = EnemyHandle::new(index, slot.generation);
        let config = enemy.config();
        let coins = config.coins;
        let gems = roll_gems(&mut self.rng, config);
        let resolution = Resolution::Killed {
            enemy: handle,
            kind: enemy.kind().clone(),
            wave: enemy.wave(),
            coins,
            gems,
            death_sfx: config.death_sfx.clone(),
        };
        tracing::debug!(kind = %enemy.kind(), wave = enemy.wave(), coins, gems, "enemy killed");

        slot.occupant = Occupant::Dying(enemy);
        let _ = self.releases.schedule(self.death_release_delay, handle);
        out.push(resolution);
    }

    fn finish_escape(&mut self, index: u32, out: &mut Vec<Resolution>) {
        let Some(slot) = self.slots.get(index as usize) else {
            return;
        };
        let Occupant::Live(enemy) = &slot.occupant else {
            return;
        };

        let resolution = Resolution::ReachedEnd {
            enemy: EnemyHandle::new(index, slot.generation),
            kind: enemy.kind().clone(),
            wave: enemy.wave(),
            damage: enemy.damage(),
        };
        tracing::debug!(kind = %enemy.kind(), wave = enemy.wave(), damage = enemy.damage(), "enemy reached the end");
        self.release(index);
        out.push(resolution);
    }

    fn release(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.occupant = Occupant::Vacant;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
    }
}

impl EnemyQuery for EnemyRegistry {
    fn closest_in_range(&self, origin: Vec2, range: f32) -> Option<EnemyHandle> {
        let mut best: Option<Candidate> = None;
        for (handle, enemy) in self.live() {
            let distance = origin.distance(enemy.position());
            if distance > range {
                continue;
            }

            let current = Candidate {
                distance,
                sequence: enemy.sequence(),
                handle,
            };
            match &mut best {
                Some(existing) => {
                    if current.precedes(existing) {
                        *existing = current;
                    }
                }
                None => best = Some(current),
            }
        }
        best.map(|candidate| candidate.handle)
    }

    fn position(&self, enemy: EnemyHandle) -> Option<Vec2> {
        match &self.slot(enemy)?.occupant {
            Occupant::Live(enemy) => Some(enemy.position()),
            Occupant::Vacant | Occupant::Dying(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    distance: f32,
    sequence: u64,
    handle: EnemyHandle,
}

impl Candidate {
    fn precedes(&self, other: &Self) -> bool {
        if self.distance != other.distance {
            return self.distance < other.distance;
        }
        self.sequence < other.sequence
    }
}

fn roll_gems(rng: &mut ChaCha8Rng, config: &EnemyConfig) -> u32 {
    let chance = f64::from(config.gem_chance);
    if config.gems == 0 || chance.is_nan() || chance <= 0.0 {
        return 0;
    }
    if rng.gen_bool(chance.min(1.0)) {
        config.gems
    } else {
        0
    }
}

/// Immutable snapshot of a live enemy.
#[derive(Clone, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Handle of the enemy.
    pub handle: EnemyHandle,
    /// Configured type.
    pub kind: EnemyTypeId,
    /// Spawn order.
    pub sequence: u64,
    /// Wave the enemy belongs to.
    pub wave: u32,
    /// World position.
    pub position: Vec2,
    /// Remaining health.
    pub health: f32,
    /// Health at spawn.
    pub max_health: f32,
    /// Movement speed after status modifiers.
    pub move_speed: f32,
    /// Whether a slow is active.
    pub slowed: bool,
    /// Whether a stun is active.
    pub stunned: bool,
    /// Whether a poison is active.
    pub poisoned: bool,
}

/// Read-only collection of enemy snapshots ordered by spawn sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a view from snapshots, sorting them by spawn sequence.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.sequence);
        Self { snapshots }
    }

    /// Iterates over the captured snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured enemies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no enemies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, returning the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}
