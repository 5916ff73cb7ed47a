//! Path-following enemy actor.

use std::{sync::Arc, time::Duration};

use merge_defence_core::{EnemyConfig, EnemyTypeId, StatusEffect, Vec2};

use crate::status::StatusEffects;

/// Lifecycle stage of an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnemyState {
    /// Walking the path, possibly under status effects.
    Moving,
    /// Health reached zero.
    Dead,
    /// Walked past the final waypoint.
    ReachedEnd,
}

/// Terminal outcome produced by a single enemy tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fate {
    /// Poison drained the remaining health.
    Killed,
    /// The final waypoint was reached.
    ReachedEnd,
}

/// Single enemy walking the level path.
#[derive(Clone, Debug)]
pub struct Enemy {
    config: Arc<EnemyConfig>,
    sequence: u64,
    wave: u32,
    max_health: f32,
    health: f32,
    damage: u32,
    base_move_speed: f32,
    move_speed: f32,
    waypoint_index: usize,
    position: Vec2,
    status: StatusEffects,
    state: EnemyState,
    spawn_delay: Duration,
}

impl Enemy {
    /// Creates an enemy at the first waypoint with stats scaled to `wave`.
    #[must_use]
    pub fn spawn(config: Arc<EnemyConfig>, wave: u32, sequence: u64, path: &[Vec2]) -> Self {
        let health = config.health.evaluate(wave);
        let max_health = if health.is_finite() && health > 0.0 {
            health
        } else {
            1.0
        };
        let damage = config.damage.evaluate(wave).round().max(0.0) as u32;
        let base_move_speed = config.speed.evaluate(wave).max(0.0);

        Self {
            config,
            sequence,
            wave,
            max_health,
            health: max_health,
            damage,
            base_move_speed,
            move_speed: base_move_speed,
            waypoint_index: 1,
            position: path.first().copied().unwrap_or(Vec2::ZERO),
            status: StatusEffects::new(),
            state: EnemyState::Moving,
            spawn_delay: Duration::ZERO,
        }
    }

    /// Holds the enemy still for the first `delay` of its next tick.
    ///
    /// Used for enemies spawned partway through a tick.
    #[must_use]
    pub fn with_spawn_delay(mut self, delay: Duration) -> Self {
        self.spawn_delay = delay;
        self
    }

    /// Advances status timers, poison and movement by `dt`.
    ///
    /// Returns the fate reached during this tick, if any. Resolved enemies
    /// never report a fate again.
    pub fn tick(&mut self, dt: Duration, path: &[Vec2], waypoint_epsilon: f32) -> Option<Fate> {
        if self.state != EnemyState::Moving {
            return None;
        }

        let dt = dt.saturating_sub(std::mem::take(&mut self.spawn_delay));
        self.status.decay(dt);
        self.refresh_speed();

        let poison = self.status.poison_damage(dt);
        if poison > 0.0 && self.take_damage(poison) {
            return Some(Fate::Killed);
        }

        if self.status.is_stunned() {
            return None;
        }

        let Some(&waypoint) = path.get(self.waypoint_index) else {
            self.state = EnemyState::ReachedEnd;
            return Some(Fate::ReachedEnd);
        };

        self.position = move_towards(self.position, waypoint, self.move_speed * dt.as_secs_f32());
        if self.position.distance(waypoint) < waypoint_epsilon {
            self.waypoint_index += 1;
            if self.waypoint_index >= path.len() {
                self.state = EnemyState::ReachedEnd;
                return Some(Fate::ReachedEnd);
            }
        }

        None
    }

    /// Subtracts `amount` from health, flooring at zero.
    ///
    /// Returns `true` only for the hit that kills the enemy. Resolved enemies
    /// and non-positive or non-finite amounts are ignored.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        if self.state != EnemyState::Moving || !amount.is_finite() || amount <= 0.0 {
            return false;
        }

        self.health = (self.health - amount).max(0.0);
        if self.health > 0.0 {
            return false;
        }

        self.state = EnemyState::Dead;
        self.move_speed = 0.0;
        true
    }

    /// Applies a status effect unless the enemy is already resolved.
    pub fn apply_status(&mut self, effect: StatusEffect) {
        if self.state != EnemyState::Moving {
            return;
        }
        self.status.apply(effect);
        self.refresh_speed();
    }

    fn refresh_speed(&mut self) {
        self.move_speed = self.base_move_speed * self.status.speed_multiplier();
    }

    /// Configured type of the enemy.
    #[must_use]
    pub fn kind(&self) -> &EnemyTypeId {
        &self.config.id
    }

    /// Static configuration the enemy was spawned from.
    #[must_use]
    pub fn config(&self) -> &EnemyConfig {
        &self.config
    }

    /// Spawn order across the registry's lifetime.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wave the enemy belongs to.
    #[must_use]
    pub fn wave(&self) -> u32 {
        self.wave
    }

    /// Remaining health.
    #[must_use]
    pub fn health(&self) -> f32 {
        self.health
    }

    /// Health at spawn.
    #[must_use]
    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Damage dealt to the player on reaching the end.
    #[must_use]
    pub fn damage(&self) -> u32 {
        self.damage
    }

    /// Movement speed after status modifiers.
    #[must_use]
    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Movement speed without status modifiers.
    #[must_use]
    pub fn base_move_speed(&self) -> f32 {
        self.base_move_speed
    }

    /// Index of the waypoint the enemy is walking towards.
    #[must_use]
    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    /// Current world position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Active status effects.
    #[must_use]
    pub fn status(&self) -> &StatusEffects {
        &self.status
    }

    /// Lifecycle stage.
    #[must_use]
    pub fn state(&self) -> EnemyState {
        self.state
    }

    /// Reports whether health remains above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

fn move_towards(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let delta = to - from;
    let distance = delta.length();
    if distance <= max_step || distance <= f32::EPSILON {
        to
    } else {
        from + delta / distance * max_step
    }
}

#[cfg(test)]
mod tests {
    use merge_defence_core::Curve;

    use super::*;

    fn config(health: f32, speed: f32) -> Arc<EnemyConfig> {
        Arc::new(EnemyConfig {
            id: EnemyTypeId::new("slime"),
            health: Curve::Linear {
                base: health,
                per_step: 10.0,
            },
            damage: Curve::Constant { value: 4.6 },
            speed: Curve::Constant { value: speed },
            boss: false,
            coins: 1,
            gem_chance: 0.0,
            gems: 0,
            death_sfx: None,
            hit_sfx: None,
        })
    }

    fn path() -> Vec<Vec2> {
        vec![Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(4.0, 4.0)]
    }

    #[test]
    fn stats_scale_with_wave() {
        let enemy = Enemy::spawn(config(100.0, 2.0), 3, 0, &path());
        assert_eq!(enemy.max_health(), 120.0);
        assert_eq!(enemy.health(), 120.0);
        assert_eq!(enemy.damage(), 5);
        assert_eq!(enemy.position(), Vec2::ZERO);
        assert_eq!(enemy.waypoint_index(), 1);
    }

    #[test]
    fn walks_waypoints_then_reaches_end() {
        let path = path();
        let mut enemy = Enemy::spawn(config(10.0, 2.0), 1, 0, &path);

        assert_eq!(enemy.tick(Duration::from_secs(1), &path, 0.1), None);
        assert_eq!(enemy.position(), Vec2::new(2.0, 0.0));

        assert_eq!(enemy.tick(Duration::from_secs(1), &path, 0.1), None);
        assert_eq!(enemy.waypoint_index(), 2);

        assert_eq!(enemy.tick(Duration::from_secs(1), &path, 0.1), None);
        assert_eq!(
            enemy.tick(Duration::from_secs(1), &path, 0.1),
            Some(Fate::ReachedEnd)
        );
        assert_eq!(enemy.state(), EnemyState::ReachedEnd);
        assert_eq!(enemy.tick(Duration::from_secs(1), &path, 0.1), None);
    }

    #[test]
    fn delayed_spawns_only_move_for_the_rest_of_their_first_tick() {
        let path = path();
        let mut enemy = Enemy::spawn(config(10.0, 2.0), 1, 0, &path)
            .with_spawn_delay(Duration::from_millis(750));

        assert_eq!(enemy.tick(Duration::from_secs(1), &path, 0.1), None);
        assert_eq!(enemy.position(), Vec2::new(0.5, 0.0));

        assert_eq!(enemy.tick(Duration::from_secs(1), &path, 0.1), None);
        assert_eq!(enemy.position(), Vec2::new(2.5, 0.0));
    }

    #[test]
    fn health_never_increases_and_floors_at_zero() {
        let mut enemy = Enemy::spawn(config(10.0, 1.0), 1, 0, &path());
        let mut previous = enemy.health();
        for amount in [3.0, -5.0, f32::NAN, 0.0, 2.5] {
            let _ = enemy.take_damage(amount);
            assert!(enemy.health() <= previous);
            previous = enemy.health();
        }
        assert!(enemy.is_alive());

        assert!(enemy.take_damage(50.0));
        assert_eq!(enemy.health(), 0.0);
        assert!(!enemy.is_alive());
        assert!(!enemy.take_damage(1.0), "only the killing hit reports death");
    }

    #[test]
    fn stun_blocks_movement_and_slow_scales_speed() {
        let path = path();
        let mut enemy = Enemy::spawn(config(10.0, 2.0), 1, 0, &path);
        enemy.apply_status(StatusEffect::Stun { duration_secs: 1.0 });
        let _ = enemy.tick(Duration::from_millis(500), &path, 0.1);
        assert_eq!(enemy.position(), Vec2::ZERO);

        enemy.apply_status(StatusEffect::Slow {
            factor: 0.5,
            duration_secs: 10.0,
        });
        assert_eq!(enemy.move_speed(), 1.0);
        let _ = enemy.tick(Duration::from_millis(500), &path, 0.1);
        assert_eq!(
            enemy.position(),
            Vec2::new(0.5, 0.0),
            "timers decay before movement"
        );
        let _ = enemy.tick(Duration::from_secs(1), &path, 0.1);
        assert_eq!(enemy.position(), Vec2::new(1.5, 0.0));
    }

    #[test]
    fn lethal_poison_short_circuits_movement() {
        let path = path();
        let mut enemy = Enemy::spawn(config(10.0, 2.0), 1, 0, &path);
        enemy.apply_status(StatusEffect::Poison {
            damage_per_second: 20.0,
            duration_secs: 5.0,
        });

        assert_eq!(
            enemy.tick(Duration::from_secs(1), &path, 0.1),
            Some(Fate::Killed)
        );
        assert_eq!(enemy.position(), Vec2::ZERO);
        assert_eq!(enemy.state(), EnemyState::Dead);
        assert_eq!(enemy.move_speed(), 0.0);
    }
}
