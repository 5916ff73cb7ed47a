//! Externally authored balance, level, enemy and defender tables.
//!
//! Every table derives [`Deserialize`], so adapters can load them from any
//! serde format. Call [`GameConfig::validate`] before handing a configuration
//! to the world; systems assume a validated configuration and only guard
//! against missing entries at runtime.

use std::{collections::HashSet, time::Duration};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{seconds, DefenderTypeId, EnemyTypeId, LevelId, StatusEffect};

/// Stat curve evaluated at a one-based step (wave number or defender level).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Curve {
    /// Same value at every step.
    Constant {
        /// Value returned for every step.
        value: f32,
    },
    /// `base + per_step * (step - 1)`.
    Linear {
        /// Value at step one.
        base: f32,
        /// Increment added per additional step.
        per_step: f32,
    },
    /// `base * growth^(step - 1)`.
    Exponential {
        /// Value at step one.
        base: f32,
        /// Multiplier applied per additional step.
        growth: f32,
    },
    /// Explicit per-step values; steps past the end reuse the last entry.
    Table {
        /// Values for steps `1..=values.len()`.
        values: Vec<f32>,
    },
}

impl Curve {
    /// Evaluates the curve. Step zero is treated as step one.
    #[must_use]
    pub fn evaluate(&self, step: u32) -> f32 {
        let offset = step.max(1) - 1;
        match self {
            Self::Constant { value } => *value,
            Self::Linear { base, per_step } => base + per_step * offset as f32,
            Self::Exponential { base, growth } => {
                let exponent = i32::try_from(offset).unwrap_or(i32::MAX);
                base * growth.powi(exponent)
            }
            Self::Table { values } => {
                let index = usize::try_from(offset).unwrap_or(usize::MAX);
                values
                    .get(index)
                    .or_else(|| values.last())
                    .copied()
                    .unwrap_or(0.0)
            }
        }
    }

    fn is_well_formed(&self) -> bool {
        match self {
            Self::Constant { value } => value.is_finite(),
            Self::Linear { base, per_step } => base.is_finite() && per_step.is_finite(),
            Self::Exponential { base, growth } => base.is_finite() && growth.is_finite(),
            Self::Table { values } => {
                !values.is_empty() && values.iter().all(|value| value.is_finite())
            }
        }
    }
}

/// Static description of an enemy type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyConfig {
    /// Identifier referenced by level rosters.
    pub id: EnemyTypeId,
    /// Maximum health as a function of wave number.
    pub health: Curve,
    /// Damage dealt to the player on reaching the end, by wave number.
    pub damage: Curve,
    /// Movement speed in world units per second, by wave number.
    pub speed: Curve,
    /// Marks the enemy as a boss.
    #[serde(default)]
    pub boss: bool,
    /// Coins dropped on death.
    #[serde(default)]
    pub coins: u32,
    /// Probability in `[0, 1]` that the enemy drops gems on death.
    #[serde(default)]
    pub gem_chance: f32,
    /// Gems dropped when the gem roll succeeds.
    #[serde(default)]
    pub gems: u32,
    /// Sound played when the enemy dies.
    #[serde(default)]
    pub death_sfx: Option<String>,
    /// Sound played when the enemy takes a hit.
    #[serde(default)]
    pub hit_sfx: Option<String>,
}

/// Travelling projectile fired by a defender.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileConfig {
    /// Flight speed in world units per second.
    pub speed: f32,
}

/// Static description of a defender type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefenderConfig {
    /// Identifier of the defender type; merges require matching identifiers.
    pub id: DefenderTypeId,
    /// Damage per attack as a function of level.
    pub damage: Curve,
    /// Attacks per second as a function of level.
    pub attack_speed: Curve,
    /// Targeting range in world units as a function of level.
    pub range: Curve,
    /// Projectile fired per attack; attacks hit instantly when absent.
    #[serde(default)]
    pub projectile: Option<ProjectileConfig>,
    /// Status effect applied together with each hit.
    #[serde(default)]
    pub on_hit: Option<StatusEffect>,
    /// Sprite names per level; levels past the end reuse the last sprite.
    #[serde(default)]
    pub sprites: Vec<String>,
    /// Sound played when the defender attacks.
    #[serde(default)]
    pub attack_sfx: Option<String>,
}

impl DefenderConfig {
    /// Sprite shown for the provided level.
    #[must_use]
    pub fn sprite_for(&self, level: u32) -> Option<&str> {
        let index = usize::try_from(level.max(1) - 1).unwrap_or(usize::MAX);
        self.sprites
            .get(index)
            .or_else(|| self.sprites.last())
            .map(String::as_str)
    }
}

/// Global balance constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Highest level a defender can reach through merges.
    pub max_merge_level: u32,
    /// Enemies in the first wave.
    pub base_enemies_per_wave: u32,
    /// Additional enemies per subsequent wave.
    pub enemies_increase_per_wave: u32,
    /// Waves in the level; clearing the last one wins the run.
    pub total_waves: u32,
    /// Seconds between consecutive spawns within a wave.
    pub spawn_interval_secs: f32,
    /// Seconds between a wave completing and the next one starting.
    pub intermission_secs: f32,
    /// Player health at the start of a run.
    pub max_player_health: u32,
    /// Seconds a dead enemy lingers before returning to the pool.
    pub death_release_delay_secs: f32,
    /// Distance under which an enemy counts as having reached a waypoint.
    pub waypoint_epsilon: f32,
    /// Distance under which a projectile counts as having hit its target.
    pub projectile_hit_radius: f32,
}

impl BalanceConfig {
    /// Spawn cadence as a [`Duration`].
    #[must_use]
    pub fn spawn_interval(&self) -> Duration {
        seconds(self.spawn_interval_secs)
    }

    /// Intermission length as a [`Duration`].
    #[must_use]
    pub fn intermission(&self) -> Duration {
        seconds(self.intermission_secs)
    }

    /// Death release delay as a [`Duration`].
    #[must_use]
    pub fn death_release_delay(&self) -> Duration {
        seconds(self.death_release_delay_secs)
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            max_merge_level: 5,
            base_enemies_per_wave: 5,
            enemies_increase_per_wave: 2,
            total_waves: 10,
            spawn_interval_secs: 1.0,
            intermission_secs: 5.0,
            max_player_health: 100,
            death_release_delay_secs: 0.5,
            waypoint_epsilon: 0.1,
            projectile_hit_radius: 0.2,
        }
    }
}

/// Placement grid layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Side length of a cell in world units.
    pub cell_size: f32,
    /// World position of the grid's lower-left corner.
    #[serde(default)]
    pub origin: Vec2,
}

/// Level layout and enemy roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Identifier reported in completion and failure events.
    pub id: LevelId,
    /// Path enemies follow, starting at the spawn point.
    pub waypoints: Vec<Vec2>,
    /// Enemy types spawned in rotation within each wave.
    pub enemy_roster: Vec<EnemyTypeId>,
    /// Enemy substituted for the last spawn of the final wave.
    #[serde(default)]
    pub boss: Option<EnemyTypeId>,
    /// Placement grid.
    pub grid: GridConfig,
}

/// Complete configuration consumed by the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Global balance constants.
    #[serde(default)]
    pub balance: BalanceConfig,
    /// Level layout.
    pub level: LevelConfig,
    /// Enemy type tables.
    #[serde(default)]
    pub enemies: Vec<EnemyConfig>,
    /// Defender type tables.
    #[serde(default)]
    pub defenders: Vec<DefenderConfig>,
}

impl GameConfig {
    /// Looks up the configuration of an enemy type.
    #[must_use]
    pub fn enemy(&self, id: &EnemyTypeId) -> Option<&EnemyConfig> {
        self.enemies.iter().find(|config| &config.id == id)
    }

    /// Looks up the configuration of a defender type.
    #[must_use]
    pub fn defender(&self, id: &DefenderTypeId) -> Option<&DefenderConfig> {
        self.defenders.iter().find(|config| &config.id == id)
    }

    /// Checks the configuration for inconsistencies systems cannot recover from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let balance = &self.balance;
        if balance.max_merge_level == 0 {
            return Err(ConfigError::ZeroMaxMergeLevel);
        }
        if balance.total_waves == 0 {
            return Err(ConfigError::ZeroWaves);
        }
        if balance.max_player_health == 0 {
            return Err(ConfigError::ZeroPlayerHealth);
        }
        require_positive("spawn_interval_secs", balance.spawn_interval_secs)?;
        require_non_negative("intermission_secs", balance.intermission_secs)?;
        require_non_negative("death_release_delay_secs", balance.death_release_delay_secs)?;
        require_positive("waypoint_epsilon", balance.waypoint_epsilon)?;
        require_positive("projectile_hit_radius", balance.projectile_hit_radius)?;

        let grid = &self.level.grid;
        if grid.width == 0 || grid.height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: grid.width,
                height: grid.height,
            });
        }
        require_positive("grid.cell_size", grid.cell_size)?;

        if self.level.waypoints.len() < 2 {
            return Err(ConfigError::PathTooShort(self.level.waypoints.len()));
        }
        if self.level.waypoints.iter().any(|point| !point.is_finite()) {
            return Err(ConfigError::InvalidNumber {
                field: "level.waypoints",
                value: f32::NAN,
            });
        }

        let mut enemy_ids = HashSet::new();
        for enemy in &self.enemies {
            if !enemy_ids.insert(&enemy.id) {
                return Err(ConfigError::DuplicateEnemy(enemy.id.clone()));
            }
            for (name, curve) in [
                ("health", &enemy.health),
                ("damage", &enemy.damage),
                ("speed", &enemy.speed),
            ] {
                if !curve.is_well_formed() {
                    return Err(ConfigError::InvalidCurve {
                        owner: enemy.id.to_string(),
                        curve: name,
                    });
                }
            }
            if !(0.0..=1.0).contains(&enemy.gem_chance) {
                return Err(ConfigError::InvalidGemChance(enemy.id.clone()));
            }
        }

        let mut defender_ids = HashSet::new();
        for defender in &self.defenders {
            if !defender_ids.insert(&defender.id) {
                return Err(ConfigError::DuplicateDefender(defender.id.clone()));
            }
            for (name, curve) in [
                ("damage", &defender.damage),
                ("attack_speed", &defender.attack_speed),
                ("range", &defender.range),
            ] {
                if !curve.is_well_formed() {
                    return Err(ConfigError::InvalidCurve {
                        owner: defender.id.to_string(),
                        curve: name,
                    });
                }
            }
            if let Some(projectile) = defender.projectile {
                require_positive("projectile.speed", projectile.speed)?;
            }
        }

        if self.level.enemy_roster.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        for id in self.level.enemy_roster.iter().chain(self.level.boss.iter()) {
            if !enemy_ids.contains(id) {
                return Err(ConfigError::UnknownEnemy(id.clone()));
            }
        }

        Ok(())
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidNumber { field, value })
    }
}

fn require_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidNumber { field, value })
    }
}

/// Inconsistencies detected by [`GameConfig::validate`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// `max_merge_level` was zero.
    #[error("max merge level must be at least 1")]
    ZeroMaxMergeLevel,
    /// `total_waves` was zero.
    #[error("a level needs at least one wave")]
    ZeroWaves,
    /// `max_player_health` was zero.
    #[error("max player health must be at least 1")]
    ZeroPlayerHealth,
    /// A numeric setting was out of range.
    #[error("`{field}` is out of range: {value}")]
    InvalidNumber {
        /// Name of the offending setting.
        field: &'static str,
        /// Value found in the configuration.
        value: f32,
    },
    /// The grid has no cells.
    #[error("grid must contain at least one cell, got {width}x{height}")]
    EmptyGrid {
        /// Configured column count.
        width: u32,
        /// Configured row count.
        height: u32,
    },
    /// The path has fewer than two waypoints.
    #[error("enemy path needs at least two waypoints, got {0}")]
    PathTooShort(usize),
    /// The level has no enemy types to spawn.
    #[error("enemy roster is empty")]
    EmptyRoster,
    /// A roster or boss entry names an unconfigured enemy type.
    #[error("enemy type `{0}` has no configuration")]
    UnknownEnemy(EnemyTypeId),
    /// Two enemy tables share an identifier.
    #[error("enemy type `{0}` is configured twice")]
    DuplicateEnemy(EnemyTypeId),
    /// Two defender tables share an identifier.
    #[error("defender type `{0}` is configured twice")]
    DuplicateDefender(DefenderTypeId),
    /// A curve holds non-finite values or an empty table.
    #[error("curve `{curve}` of `{owner}` is malformed")]
    InvalidCurve {
        /// Enemy or defender owning the curve.
        owner: String,
        /// Name of the curve.
        curve: &'static str,
    },
    /// A gem drop probability lies outside `[0, 1]`.
    #[error("gem chance of `{0}` must lie within [0, 1]")]
    InvalidGemChance(EnemyTypeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GameConfig {
        toml::from_str(
            r#"
            [balance]
            total_waves = 3

            [level]
            id = "meadow"
            waypoints = [[0.0, 0.0], [10.0, 0.0]]
            enemy_roster = ["slime"]
            boss = "ogre"

            [level.grid]
            width = 4
            height = 3
            cell_size = 1.5

            [[enemies]]
            id = "slime"
            health = { kind = "linear", base = 10.0, per_step = 5.0 }
            damage = { kind = "constant", value = 5.0 }
            speed = { kind = "constant", value = 2.0 }
            coins = 3

            [[enemies]]
            id = "ogre"
            boss = true
            health = { kind = "exponential", base = 100.0, growth = 1.5 }
            damage = { kind = "constant", value = 25.0 }
            speed = { kind = "constant", value = 1.0 }

            [[defenders]]
            id = "archer"
            damage = { kind = "table", values = [2.0, 4.0, 7.0] }
            attack_speed = { kind = "constant", value = 1.0 }
            range = { kind = "linear", base = 3.0, per_step = 0.5 }
            sprites = ["archer_1", "archer_2"]
            "#,
        )
        .expect("parse sample configuration")
    }

    #[test]
    fn sample_configuration_validates() {
        let config = sample();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.balance.total_waves, 3);
        assert_eq!(config.balance.base_enemies_per_wave, 5, "defaults fill gaps");
        assert_eq!(config.level.grid.origin, Vec2::ZERO);
    }

    #[test]
    fn curves_evaluate_per_step() {
        let linear = Curve::Linear {
            base: 10.0,
            per_step: 5.0,
        };
        assert_eq!(linear.evaluate(0), 10.0);
        assert_eq!(linear.evaluate(1), 10.0);
        assert_eq!(linear.evaluate(3), 20.0);

        let exponential = Curve::Exponential {
            base: 100.0,
            growth: 2.0,
        };
        assert_eq!(exponential.evaluate(4), 800.0);

        let table = Curve::Table {
            values: vec![2.0, 4.0, 7.0],
        };
        assert_eq!(table.evaluate(2), 4.0);
        assert_eq!(table.evaluate(9), 7.0, "steps past the table clamp");
    }

    #[test]
    fn sprites_clamp_to_last_entry() {
        let config = sample();
        let archer = config
            .defender(&DefenderTypeId::new("archer"))
            .expect("archer configured");
        assert_eq!(archer.sprite_for(1), Some("archer_1"));
        assert_eq!(archer.sprite_for(5), Some("archer_2"));
    }

    #[test]
    fn unknown_roster_entry_is_rejected() {
        let mut config = sample();
        config.level.enemy_roster.push(EnemyTypeId::new("ghost"));
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownEnemy(EnemyTypeId::new("ghost")))
        );
    }

    #[test]
    fn short_path_and_empty_grid_are_rejected() {
        let mut config = sample();
        config.level.waypoints.truncate(1);
        assert_eq!(config.validate(), Err(ConfigError::PathTooShort(1)));

        let mut config = sample();
        config.level.grid.height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyGrid { width: 4, height: 0 })
        ));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let mut config = sample();
        config.balance.spawn_interval_secs = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNumber {
                field: "spawn_interval_secs",
                ..
            })
        ));

        let mut config = sample();
        config.enemies[0].gem_chance = 1.5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidGemChance(EnemyTypeId::new("slime")))
        );

        let mut config = sample();
        config.defenders[0].damage = Curve::Table { values: Vec::new() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCurve { curve: "damage", .. })
        ));
    }

    #[test]
    fn duplicate_defenders_are_rejected() {
        let mut config = sample();
        let duplicate = config.defenders[0].clone();
        config.defenders.push(duplicate);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateDefender(DefenderTypeId::new("archer")))
        );
    }
}
