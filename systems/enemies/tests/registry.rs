use std::time::Duration;

use merge_defence_core::{
    BalanceConfig, Curve, EnemyConfig, EnemyQuery, EnemyTypeId, GameConfig, GridConfig, LevelConfig,
    LevelId, StatusEffect, Vec2,
};
use merge_defence_system_enemies::{EnemyRegistry, Resolution};

fn enemy(id: &str, health: f32, speed: f32) -> EnemyConfig {
    EnemyConfig {
        id: EnemyTypeId::new(id),
        health: Curve::Constant { value: health },
        damage: Curve::Constant { value: 7.0 },
        speed: Curve::Constant { value: speed },
        boss: false,
        coins: 3,
        gem_chance: 1.0,
        gems: 2,
        death_sfx: Some("pop".to_owned()),
        hit_sfx: None,
    }
}

fn config() -> GameConfig {
    GameConfig {
        balance: BalanceConfig::default(),
        level: LevelConfig {
            id: LevelId::new("meadow"),
            waypoints: vec![Vec2::ZERO, Vec2::new(10.0, 0.0)],
            enemy_roster: vec![EnemyTypeId::new("slime")],
            boss: None,
            grid: GridConfig {
                width: 3,
                height: 3,
                cell_size: 1.0,
                origin: Vec2::ZERO,
            },
        },
        enemies: vec![
            enemy("slime", 10.0, 0.0),
            enemy("runner", 10.0, 5.0),
            EnemyConfig {
                gem_chance: 0.0,
                ..enemy("miser", 10.0, 0.0)
            },
        ],
        defenders: Vec::new(),
    }
}

fn slime() -> EnemyTypeId {
    EnemyTypeId::new("slime")
}

#[test]
fn killing_hit_resolves_once_and_releases_after_delay() {
    let mut registry = EnemyRegistry::new(&config(), 7);
    let handle = registry.spawn(&slime(), 2).expect("slime configured");
    let mut out = Vec::new();

    assert!(registry.damage(handle, 4.0, &mut out));
    assert!(out.is_empty());
    assert!(registry.damage(handle, 40.0, &mut out));
    assert_eq!(
        out,
        vec![Resolution::Killed {
            enemy: handle,
            kind: slime(),
            wave: 2,
            coins: 3,
            gems: 2,
            death_sfx: Some("pop".to_owned()),
        }]
    );

    assert!(!registry.damage(handle, 1.0, &mut out), "dead enemies ignore hits");
    assert_eq!(out.len(), 1);
    assert!(!registry.is_alive(handle));
    assert_eq!(registry.live_count(), 0);

    let corpse = registry.get(handle).expect("corpse lingers until release");
    assert_eq!(corpse.health(), 0.0);
    assert!(!corpse.is_alive());

    registry.tick(Duration::from_millis(400), &mut out);
    assert!(registry.get(handle).is_some());
    registry.tick(Duration::from_millis(100), &mut out);
    assert!(registry.get(handle).is_none());
    assert_eq!(out.len(), 1);
}

#[test]
fn recycled_slots_do_not_alias_stale_handles() {
    let mut registry = EnemyRegistry::new(&config(), 7);
    let mut out = Vec::new();
    let first = registry.spawn(&EnemyTypeId::new("runner"), 1).expect("spawn");

    registry.tick(Duration::from_secs(2), &mut out);
    assert!(matches!(
        out.as_slice(),
        [Resolution::ReachedEnd { damage: 7, wave: 1, .. }]
    ));
    assert_eq!(out[0].enemy(), first);

    let second = registry.spawn(&slime(), 1).expect("spawn");
    assert_eq!(second.index(), first.index(), "slot reused");
    assert_ne!(second.generation(), first.generation());
    assert_eq!(registry.position(first), None);
    assert_eq!(registry.position(second), Some(Vec2::ZERO));
    assert!(!registry.apply_status(
        first,
        StatusEffect::Stun { duration_secs: 1.0 }
    ));
}

#[test]
fn targeting_range_is_inclusive_and_ties_break_by_spawn_order() {
    let mut registry = EnemyRegistry::new(&config(), 7);
    let mut out = Vec::new();

    let doomed = registry.spawn(&slime(), 1).expect("spawn");
    let older = registry.spawn(&slime(), 1).expect("spawn");
    assert!(registry.damage(doomed, 100.0, &mut out));
    registry.tick(Duration::from_secs(1), &mut out);

    let newer = registry.spawn(&slime(), 1).expect("spawn");
    assert!(newer.index() < older.index());

    assert_eq!(registry.closest_in_range(Vec2::new(3.5, 0.0), 3.0), None);
    assert_eq!(
        registry.closest_in_range(Vec2::new(2.9, 0.0), 3.0),
        Some(older)
    );
    assert_eq!(
        registry.closest_in_range(Vec2::new(3.0, 0.0), 3.0),
        Some(older)
    );
    assert_eq!(registry.in_range(Vec2::ZERO, 0.5), vec![older, newer]);

    let view = registry.view();
    let order: Vec<_> = view.iter().map(|snapshot| snapshot.handle).collect();
    assert_eq!(order, vec![older, newer]);
}

#[test]
fn slow_restores_speed_after_its_duration() {
    let mut registry = EnemyRegistry::new(&config(), 7);
    let mut out = Vec::new();
    let runner = registry
        .spawn(&EnemyTypeId::new("runner"), 1)
        .expect("spawn");

    assert!(registry.apply_status(
        runner,
        StatusEffect::Slow {
            factor: 0.4,
            duration_secs: 0.5,
        }
    ));
    let slowed = registry.get(runner).expect("live");
    assert!((slowed.move_speed() - 3.0).abs() < 1e-5);

    registry.tick(Duration::from_millis(250), &mut out);
    assert!(registry.get(runner).expect("live").status().is_slowed());
    registry.tick(Duration::from_millis(250), &mut out);
    let restored = registry.get(runner).expect("live");
    assert_eq!(restored.move_speed(), restored.base_move_speed());
    assert!(out.is_empty());
}

#[test]
fn clear_all_drops_everything_without_resolutions() {
    let mut registry = EnemyRegistry::new(&config(), 7);
    let mut out = Vec::new();
    let handles: Vec<_> = (0..3)
        .map(|_| registry.spawn(&slime(), 1).expect("spawn"))
        .collect();
    assert!(registry.damage(handles[0], 100.0, &mut out));
    out.clear();

    assert_eq!(registry.clear_all(), 2);
    assert_eq!(registry.live_count(), 0);
    assert!(handles.iter().all(|handle| registry.get(*handle).is_none()));

    registry.tick(Duration::from_secs(5), &mut out);
    assert!(out.is_empty());
    assert!(registry.view().is_empty());
}

#[test]
fn gem_drops_follow_configured_chance() {
    let mut registry = EnemyRegistry::new(&config(), 99);
    let mut out = Vec::new();
    let miser = registry.spawn(&EnemyTypeId::new("miser"), 1).expect("spawn");
    assert!(registry.damage(miser, 100.0, &mut out));
    assert!(matches!(
        out.as_slice(),
        [Resolution::Killed { gems: 0, coins: 3, .. }]
    ));

    assert!(registry.spawn(&EnemyTypeId::new("ghost"), 1).is_err());
}
