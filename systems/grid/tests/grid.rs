use merge_defence_core::{
    BalanceConfig, CellCoord, Curve, DefenderConfig, DefenderTypeId, EnemyTypeId, GameConfig,
    GridConfig, LevelConfig, LevelId, MergeError, PlacementError, Vec2,
};
use merge_defence_system_grid::{DropOutcome, Grid};

fn defender(id: &str) -> DefenderConfig {
    DefenderConfig {
        id: DefenderTypeId::new(id),
        damage: Curve::Linear {
            base: 10.0,
            per_step: 10.0,
        },
        attack_speed: Curve::Constant { value: 1.0 },
        range: Curve::Linear {
            base: 2.0,
            per_step: 0.5,
        },
        projectile: None,
        on_hit: None,
        sprites: Vec::new(),
        attack_sfx: None,
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
                width: 4,
                height: 3,
                cell_size: 2.0,
                origin: Vec2::new(10.0, 20.0),
            },
        },
        enemies: Vec::new(),
        defenders: vec![defender("archer"), defender("mage")],
    }
}

fn archer() -> DefenderTypeId {
    DefenderTypeId::new("archer")
}

fn mage() -> DefenderTypeId {
    DefenderTypeId::new("mage")
}

#[test]
fn world_and_grid_coordinates_round_trip_through_cell_centres() {
    let grid = Grid::new(&config(), 1);
    let cell = CellCoord::new(2, 1);
    let centre = grid.cell_to_world(cell);
    assert_eq!(centre, Vec2::new(15.0, 23.0));
    assert_eq!(grid.world_to_cell(centre), Some(cell));
    assert_eq!(grid.world_to_cell(Vec2::new(10.0, 20.0)), Some(CellCoord::new(0, 0)));
    assert_eq!(grid.world_to_cell(Vec2::new(9.9, 21.0)), None);
    assert_eq!(grid.world_to_cell(Vec2::new(18.0, 21.0)), None);
}

#[test]
fn equal_defenders_merge_into_the_next_level() {
    let mut grid = Grid::new(&config(), 1);
    let a = CellCoord::new(0, 0);
    let b = CellCoord::new(1, 0);
    let source = grid.place(&archer(), Some(a), 3).expect("place source");
    let target = grid.place(&archer(), Some(b), 3).expect("place target");

    let merged = grid.try_merge(a, b).expect("merge");
    assert_eq!(merged.defender, target.defender);
    assert_eq!(merged.consumed, source.defender);
    assert_eq!(merged.level, 4);
    assert_eq!(merged.kind, archer());

    assert!(grid.occupant(a).is_none());
    let survivor = grid.occupant(b).expect("target survives");
    assert_eq!(survivor.id(), target.defender);
    assert_eq!(survivor.level(), 4);
    assert_eq!(survivor.damage(), 40.0);
    assert!(grid.defender(source.defender).is_none());
    assert!(grid.is_consistent());
}

#[test]
fn rejected_merges_change_nothing() {
    let mut grid = Grid::new(&config(), 1);
    let a = CellCoord::new(0, 0);
    let b = CellCoord::new(1, 0);
    let c = CellCoord::new(2, 0);
    let d = CellCoord::new(3, 0);
    let _ = grid.place(&archer(), Some(a), 3).expect("place");
    let _ = grid.place(&mage(), Some(b), 3).expect("place");
    let _ = grid.place(&archer(), Some(c), 2).expect("place");
    let _ = grid.place(&archer(), Some(d), 5).expect("place");
    let before = grid.view();

    assert_eq!(grid.try_merge(a, b), Err(MergeError::KindMismatch));
    assert_eq!(grid.try_merge(a, c), Err(MergeError::LevelMismatch));
    assert_eq!(grid.try_merge(a, a), Err(MergeError::SameCell));
    assert_eq!(
        grid.try_merge(CellCoord::new(0, 2), a),
        Err(MergeError::EmptySource)
    );
    assert_eq!(
        grid.try_merge(a, CellCoord::new(0, 2)),
        Err(MergeError::EmptyTarget)
    );

    let top = CellCoord::new(0, 1);
    let _ = grid.place(&archer(), Some(top), 5).expect("place");
    assert_eq!(grid.try_merge(top, d), Err(MergeError::MaxLevel));
    let _ = grid.remove(top).expect("remove");

    assert_eq!(grid.view(), before);
    assert!(grid.is_consistent());
}

#[test]
fn placement_validates_requests() {
    let mut grid = Grid::new(&config(), 1);
    let cell = CellCoord::new(0, 0);
    let _ = grid.place(&archer(), Some(cell), 1).expect("place");

    assert_eq!(
        grid.place(&archer(), Some(cell), 1),
        Err(PlacementError::Occupied)
    );
    assert_eq!(
        grid.place(&archer(), Some(CellCoord::new(4, 0)), 1),
        Err(PlacementError::OutOfBounds)
    );
    assert_eq!(
        grid.place(&DefenderTypeId::new("ghost"), None, 1),
        Err(PlacementError::UnknownDefender)
    );
    assert_eq!(grid.place(&archer(), None, 0), Err(PlacementError::InvalidLevel));
    assert_eq!(grid.place(&archer(), None, 6), Err(PlacementError::InvalidLevel));
}

#[test]
fn random_placement_fills_every_cell_exactly_once() {
    let mut grid = Grid::new(&config(), 42);
    let mut cells = Vec::new();
    for _ in 0..12 {
        let placed = grid.place(&archer(), None, 1).expect("room left");
        cells.push(placed.cell);
        assert!(grid.is_consistent());
    }
    cells.sort();
    cells.dedup();
    assert_eq!(cells.len(), 12);
    assert_eq!(grid.empty_count(), 0);
    assert_eq!(grid.random_empty_cell(), None);
    assert_eq!(grid.place(&archer(), None, 1), Err(PlacementError::NoEmptyCell));

    let _ = grid.remove(CellCoord::new(1, 1)).expect("occupied");
    assert_eq!(grid.random_empty_cell(), Some(CellCoord::new(1, 1)));
    assert_eq!(grid.clear(), 11);
    assert_eq!(grid.empty_count(), 12);
    assert!(grid.is_consistent());
}

#[test]
fn random_placement_is_seeded() {
    let place_all = |seed| {
        let mut grid = Grid::new(&config(), seed);
        (0..6)
            .map(|_| grid.place(&archer(), None, 1).expect("room").cell)
            .collect::<Vec<_>>()
    };
    assert_eq!(place_all(7), place_all(7));
}

#[test]
fn drops_merge_swap_move_or_return() {
    let mut grid = Grid::new(&config(), 1);
    let a = CellCoord::new(0, 0);
    let b = CellCoord::new(1, 0);
    let c = CellCoord::new(2, 0);
    let first = grid.place(&archer(), Some(a), 1).expect("place").defender;
    let second = grid.place(&mage(), Some(b), 1).expect("place").defender;

    assert_eq!(grid.begin_drag(a), Some(first));
    assert!(grid.occupant(a).expect("dragged").is_dragging());
    let outcome = grid.drop_at(a, grid.cell_to_world(b));
    assert_eq!(
        outcome,
        Some(DropOutcome::Swapped {
            dragged: first,
            displaced: second,
        })
    );
    assert_eq!(grid.occupant(b).map(|d| d.id()), Some(first));
    assert_eq!(grid.occupant(a).map(|d| d.id()), Some(second));
    assert_eq!(grid.occupant(a).map(|d| d.position()), Some(grid.cell_to_world(a)));
    assert!(!grid.occupant(b).expect("dropped").is_dragging());

    let _ = grid.begin_drag(b);
    let outcome = grid.drop_at(b, grid.cell_to_world(c));
    assert_eq!(
        outcome,
        Some(DropOutcome::Moved {
            defender: first,
            from: b,
            to: c,
        })
    );
    assert!(grid.occupant(b).is_none());

    let _ = grid.begin_drag(c);
    assert_eq!(
        grid.drop_at(c, Vec2::new(-50.0, 0.0)),
        Some(DropOutcome::Returned { defender: first })
    );
    assert_eq!(
        grid.drop_at(c, grid.cell_to_world(c)),
        Some(DropOutcome::Returned { defender: first })
    );

    let third = grid.place(&archer(), Some(b), 1).expect("place").defender;
    let _ = grid.begin_drag(b);
    let Some(DropOutcome::Merged(merged)) = grid.drop_at(b, grid.cell_to_world(c)) else {
        panic!("compatible drop should merge");
    };
    assert_eq!(merged.defender, first);
    assert_eq!(merged.consumed, third);
    assert_eq!(merged.level, 2);

    assert_eq!(grid.drop_at(CellCoord::new(3, 2), Vec2::ZERO), None);
    assert!(grid.is_consistent());
}

#[test]
fn cancelled_drag_resumes_in_place() {
    let mut grid = Grid::new(&config(), 1);
    let cell = CellCoord::new(3, 2);
    let id = grid.place(&archer(), Some(cell), 2).expect("place").defender;
    let _ = grid.begin_drag(cell);
    assert_eq!(grid.cancel_drag(cell), Some(id));
    let defender = grid.occupant(cell).expect("still placed");
    assert!(!defender.is_dragging());
    assert_eq!(defender.range(), 2.5);
    assert_eq!(grid.begin_drag(CellCoord::new(0, 0)), None);
}
