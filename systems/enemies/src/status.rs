//! Timed slow, stun and poison modifiers carried by a single enemy.

use std::time::Duration;

use merge_defence_core::StatusEffect;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Slow {
    factor: f32,
    remaining: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Poison {
    damage_per_second: f32,
    remaining: Duration,
}

/// Independent countdowns for every effect kind.
///
/// Re-applying a kind that is already active keeps the stronger magnitude and
/// the longer remaining duration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusEffects {
    slow: Option<Slow>,
    stun: Option<Duration>,
    poison: Option<Poison>,
}

impl StatusEffects {
    /// Creates an empty effect set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies or refreshes an effect. Zero-length and malformed effects are ignored.
    pub fn apply(&mut self, effect: StatusEffect) {
        let duration = effect.duration();
        if duration.is_zero() {
            return;
        }

        match effect {
            StatusEffect::Slow { factor, .. } => {
                if !factor.is_finite() {
                    return;
                }
                let factor = factor.clamp(0.0, 1.0);
                self.slow = Some(match self.slow {
                    Some(current) => Slow {
                        factor: current.factor.max(factor),
                        remaining: current.remaining.max(duration),
                    },
                    None => Slow {
                        factor,
                        remaining: duration,
                    },
                });
            }
            StatusEffect::Stun { .. } => {
                self.stun = Some(self.stun.map_or(duration, |current| current.max(duration)));
            }
            StatusEffect::Poison {
                damage_per_second, ..
            } => {
                if !damage_per_second.is_finite() || damage_per_second <= 0.0 {
                    return;
                }
                self.poison = Some(match self.poison {
                    Some(current) => Poison {
                        damage_per_second: current.damage_per_second.max(damage_per_second),
                        remaining: current.remaining.max(duration),
                    },
                    None => Poison {
                        damage_per_second,
                        remaining: duration,
                    },
                });
            }
        }
    }

    /// Counts every active timer down by `dt`, clearing those that run out.
    pub fn decay(&mut self, dt: Duration) {
        if let Some(slow) = &mut self.slow {
            slow.remaining = slow.remaining.saturating_sub(dt);
            if slow.remaining.is_zero() {
                self.slow = None;
            }
        }

        if let Some(remaining) = &mut self.stun {
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                self.stun = None;
            }
        }

        if let Some(poison) = &mut self.poison {
            poison.remaining = poison.remaining.saturating_sub(dt);
            if poison.remaining.is_zero() {
                self.poison = None;
            }
        }
    }

    /// Poison damage accrued over `dt`, zero while unpoisoned.
    #[must_use]
    pub fn poison_damage(&self, dt: Duration) -> f32 {
        self.poison
            .map_or(0.0, |poison| poison.damage_per_second * dt.as_secs_f32())
    }

    /// Multiplier applied to the base movement speed.
    #[must_use]
    pub fn speed_multiplier(&self) -> f32 {
        self.slow.map_or(1.0, |slow| 1.0 - slow.factor)
    }

    /// Reports whether a slow is active.
    #[must_use]
    pub fn is_slowed(&self) -> bool {
        self.slow.is_some()
    }

    /// Reports whether a stun is active.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.stun.is_some()
    }

    /// Reports whether a poison is active.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poison.is_some()
    }

    /// Removes every effect.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
