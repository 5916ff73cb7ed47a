//! Stationary defender with level-scaled stats, targeting and cooldown.

use std::{sync::Arc, time::Duration};

use merge_defence_core::{
    CellCoord, DefenderConfig, DefenderId, DefenderTypeId, EnemyHandle, EnemyQuery,
    ProjectileConfig, StatusEffect, Vec2,
};

/// Behaviour stage of a defender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefenderState {
    /// No target in range.
    Idle,
    /// Holding a target and waiting for the cooldown.
    Targeting,
    /// Picked up by the player; combat logic is suspended.
    Dragging,
}

/// Attack released by a defender whose cooldown elapsed.
#[derive(Clone, Debug, PartialEq)]
pub struct Attack {
    /// Defender that attacked.
    pub defender: DefenderId,
    /// Enemy being attacked.
    pub target: EnemyHandle,
    /// World position the attack originates from.
    pub origin: Vec2,
    /// Damage carried by the attack.
    pub damage: f32,
    /// Projectile to launch; `None` hits instantly.
    pub projectile: Option<ProjectileConfig>,
    /// Status effect applied together with the damage.
    pub on_hit: Option<StatusEffect>,
    /// Attack sound to play, if configured.
    pub sfx: Option<String>,
}

/// Defender occupying a single grid cell.
#[derive(Clone, Debug)]
pub struct Defender {
    id: DefenderId,
    kind: DefenderTypeId,
    config: Option<Arc<DefenderConfig>>,
    level: u32,
    cell: CellCoord,
    position: Vec2,
    damage: f32,
    attack_speed: f32,
    range: f32,
    sprite: Option<String>,
    cooldown: Duration,
    target: Option<EnemyHandle>,
    dragging: bool,
}

impl Defender {
    /// Creates a defender with stats for `level`.
    #[must_use]
    pub fn new(
        id: DefenderId,
        kind: DefenderTypeId,
        config: Option<Arc<DefenderConfig>>,
        level: u32,
        cell: CellCoord,
        position: Vec2,
    ) -> Self {
        let mut defender = Self {
            id,
            kind,
            config,
            level,
            cell,
            position,
            damage: 0.0,
            attack_speed: 0.0,
            range: 0.0,
            sprite: None,
            cooldown: Duration::ZERO,
            target: None,
            dragging: false,
        };
        defender.set_level(level);
        defender
    }

    /// Changes the level and recomputes stats and sprite.
    ///
    /// The cooldown timer and the current target are kept.
    pub fn set_level(&mut self, level: u32) {
        self.level = level;
        let Some(config) = &self.config else {
            tracing::error!(kind = %self.kind, id = self.id.get(), "defender has no configuration");
            self.damage = 0.0;
            self.attack_speed = 0.0;
            self.range = 0.0;
            self.sprite = None;
            return;
        };

        self.damage = config.damage.evaluate(level).max(0.0);
        self.attack_speed = config.attack_speed.evaluate(level).max(0.0);
        self.range = config.range.evaluate(level).max(0.0);
        self.sprite = config.sprite_for(level).map(str::to_owned);
    }

    /// Advances the cooldown, re-validates the target and attacks when ready.
    pub fn tick(&mut self, dt: Duration, enemies: &impl EnemyQuery, out: &mut Vec<Attack>) {
        if self.dragging {
            return;
        }
        let Some(config) = &self.config else {
            return;
        };

        self.cooldown = self.cooldown.saturating_add(dt);

        let holds_target = self
            .target
            .and_then(|target| enemies.position(target))
            .is_some_and(|position| self.position.distance(position) <= self.range);
        if !holds_target {
            self.target = enemies.closest_in_range(self.position, self.range);
        }

        let Some(target) = self.target else {
            return;
        };
        let Some(interval) = attack_interval(self.attack_speed) else {
            return;
        };
        if self.cooldown < interval {
            return;
        }

        self.cooldown = Duration::ZERO;
        tracing::debug!(defender = self.id.get(), kind = %self.kind, enemy = target.index(), damage = self.damage, "defender attacked");
        out.push(Attack {
            defender: self.id,
            target,
            origin: self.position,
            damage: self.damage,
            projectile: config.projectile,
            on_hit: config.on_hit,
            sfx: config.attack_sfx.clone(),
        });
    }

    /// Suspends combat logic while the player drags the defender.
    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    /// Resumes combat logic after a drag.
    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// Moves the defender to another cell.
    pub fn relocate(&mut self, cell: CellCoord, position: Vec2) {
        self.cell = cell;
        self.position = position;
    }

    /// Current behaviour stage.
    #[must_use]
    pub fn state(&self) -> DefenderState {
        if self.dragging {
            DefenderState::Dragging
        } else if self.target.is_some() {
            DefenderState::Targeting
        } else {
            DefenderState::Idle
        }
    }

    /// Identifier of the defender.
    #[must_use]
    pub fn id(&self) -> DefenderId {
        self.id
    }

    /// Type of the defender.
    #[must_use]
    pub fn kind(&self) -> &DefenderTypeId {
        &self.kind
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Cell the defender occupies.
    #[must_use]
    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    /// World position of the defender.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Damage per attack.
    #[must_use]
    pub fn damage(&self) -> f32 {
        self.damage
    }

    /// Attacks per second.
    #[must_use]
    pub fn attack_speed(&self) -> f32 {
        self.attack_speed
    }

    /// Targeting range.
    #[must_use]
    pub fn range(&self) -> f32 {
        self.range
    }

    /// Sprite for the current level.
    #[must_use]
    pub fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }

    /// Time accumulated since the last attack.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Enemy currently targeted.
    #[must_use]
    pub fn target(&self) -> Option<EnemyHandle> {
        self.target
    }

    /// Reports whether the defender is being dragged.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}

fn attack_interval(attack_speed: f32) -> Option<Duration> {
    if !attack_speed.is_finite() || attack_speed <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f32(attack_speed.recip()).ok()
}
