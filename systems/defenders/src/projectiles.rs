//! Homing projectiles carrying defender attacks to their targets.

use std::time::Duration;

use merge_defence_core::{DefenderId, EnemyHandle, EnemyQuery, StatusEffect, Vec2};

use crate::actor::Attack;

/// Damage landing on an enemy, either instantly or on projectile arrival.
#[derive(Clone, Debug, PartialEq)]
pub struct Impact {
    /// Defender that caused the impact.
    pub source: DefenderId,
    /// Enemy receiving the damage.
    pub target: EnemyHandle,
    /// Damage dealt.
    pub damage: f32,
    /// Status effect applied together with the damage.
    pub on_hit: Option<StatusEffect>,
}

impl Attack {
    /// Converts the attack into an impact on its target.
    #[must_use]
    pub fn impact(&self) -> Impact {
        Impact {
            source: self.defender,
            target: self.target,
            damage: self.damage,
            on_hit: self.on_hit,
        }
    }
}

/// Immutable snapshot of a projectile in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileSnapshot {
    /// Defender that fired the projectile.
    pub source: DefenderId,
    /// Enemy the projectile homes on.
    pub target: EnemyHandle,
    /// Current world position.
    pub position: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
struct Projectile {
    impact: Impact,
    position: Vec2,
    speed: f32,
}

/// Projectiles in flight.
#[derive(Clone, Debug, Default)]
pub struct Projectiles {
    hit_radius: f32,
    flying: Vec<Projectile>,
}

impl Projectiles {
    /// Creates an empty set of projectiles that hit within `hit_radius`.
    #[must_use]
    pub fn new(hit_radius: f32) -> Self {
        Self {
            hit_radius,
            flying: Vec::new(),
        }
    }

    /// Launches the attack's projectile, or resolves it into `impacts` at once
    /// when the attacker fires no projectile.
    pub fn fire(&mut self, attack: &Attack, impacts: &mut Vec<Impact>) {
        match attack.projectile {
            Some(projectile) => self.flying.push(Projectile {
                impact: attack.impact(),
                position: attack.origin,
                speed: projectile.speed.max(0.0),
            }),
            None => impacts.push(attack.impact()),
        }
    }

    /// Moves every projectile towards its target.
    ///
    /// Arrivals are appended to `out`; projectiles whose target is gone vanish
    /// without an impact.
    pub fn tick(&mut self, dt: Duration, enemies: &impl EnemyQuery, out: &mut Vec<Impact>) {
        let hit_radius = self.hit_radius;
        self.flying.retain_mut(|projectile| {
            let Some(target) = enemies.position(projectile.impact.target) else {
                return false;
            };

            let delta = target - projectile.position;
            let distance = delta.length();
            let step = projectile.speed * dt.as_secs_f32();
            projectile.position = if distance <= step || distance <= f32::EPSILON {
                target
            } else {
                projectile.position + delta / distance * step
            };

            if projectile.position.distance(target) <= hit_radius {
                out.push(projectile.impact.clone());
                return false;
            }
            true
        });
    }

    /// Drops every projectile, returning how many were in flight.
    pub fn clear(&mut self) -> usize {
        let count = self.flying.len();
        self.flying.clear();
        count
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flying.len()
    }

    /// Reports whether no projectile is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flying.is_empty()
    }

    /// Snapshots of every projectile in launch order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ProjectileSnapshot> {
        self.flying
            .iter()
            .map(|projectile| ProjectileSnapshot {
                source: projectile.impact.source,
                target: projectile.impact.target,
                position: projectile.position,
            })
            .collect()
    }
}
