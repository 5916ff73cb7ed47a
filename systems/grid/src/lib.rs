#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placement grid owning every defender, with merge and drag-and-drop rules.

use std::{collections::BTreeMap, sync::Arc};

use merge_defence_core::{
    CellCoord, DefenderConfig, DefenderId, DefenderTypeId, GameConfig, MergeError,
    PlacementError, Vec2,
};
use merge_defence_system_defenders::{Defender, DefenderState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Defender created by a successful placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placed {
    /// Identifier of the new defender.
    pub defender: DefenderId,
    /// Cell the defender occupies.
    pub cell: CellCoord,
}

/// Defender that gained a level through a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merged {
    /// Identifier of the surviving defender.
    pub defender: DefenderId,
    /// Identifier of the consumed defender.
    pub consumed: DefenderId,
    /// Type of the merged defender.
    pub kind: DefenderTypeId,
    /// Level reached by the merge.
    pub level: u32,
}

/// Result of dropping a dragged defender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// The drop landed on a compatible defender and merged into it.
    Merged(Merged),
    /// The drop landed on an incompatible defender and the two swapped cells.
    Swapped {
        /// Defender that was dragged.
        dragged: DefenderId,
        /// Defender that occupied the drop cell.
        displaced: DefenderId,
    },
    /// The drop landed on an empty cell.
    Moved {
        /// Defender that moved.
        defender: DefenderId,
        /// Cell the defender left.
        from: CellCoord,
        /// Cell the defender now occupies.
        to: CellCoord,
    },
    /// The drop landed outside the grid or on the original cell.
    Returned {
        /// Defender that went back to its cell.
        defender: DefenderId,
    },
}

/// Fixed grid of cells, each holding at most one defender.
///
/// An empty-cell list mirrors occupancy so a uniformly random empty cell can
/// be drawn in constant time.
#[derive(Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    cell_size: f32,
    origin: Vec2,
    max_level: u32,
    catalog: BTreeMap<DefenderTypeId, Arc<DefenderConfig>>,
    defenders: BTreeMap<DefenderId, Defender>,
    cells: Vec<Option<DefenderId>>,
    empty: Vec<usize>,
    empty_slot: Vec<Option<usize>>,
    rng: ChaCha8Rng,
    next_id: u32,
}

impl Grid {
    /// Creates an empty grid laid out by the level configuration.
    #[must_use]
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        let layout = &config.level.grid;
        let len = layout.width as usize * layout.height as usize;
        let catalog = config
            .defenders
            .iter()
            .map(|defender| (defender.id.clone(), Arc::new(defender.clone())))
            .collect();

        Self {
            width: layout.width,
            height: layout.height,
            cell_size: layout.cell_size,
            origin: layout.origin,
            max_level: config.balance.max_merge_level,
            catalog,
            defenders: BTreeMap::new(),
            cells: vec![None; len],
            empty: (0..len).collect(),
            empty_slot: (0..len).map(Some).collect(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Highest level a merge can reach.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Maps a world position onto the cell containing it.
    #[must_use]
    pub fn world_to_cell(&self, position: Vec2) -> Option<CellCoord> {
        let local = (position - self.origin) / self.cell_size;
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let column = local.x.floor() as u32;
        let row = local.y.floor() as u32;
        let cell = CellCoord::new(column, row);
        self.contains(cell).then_some(cell)
    }

    /// World position of the cell's centre.
    #[must_use]
    pub fn cell_to_world(&self, cell: CellCoord) -> Vec2 {
        self.origin
            + Vec2::new(cell.column() as f32 + 0.5, cell.row() as f32 + 0.5) * self.cell_size
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.width && cell.row() < self.height
    }

    /// Draws a uniformly random empty cell.
    pub fn random_empty_cell(&mut self) -> Option<CellCoord> {
        if self.empty.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..self.empty.len());
        Some(self.coord(self.empty[pick]))
    }

    /// Places a new defender on `cell`, or on a random empty cell when `None`.
    pub fn place(
        &mut self,
        kind: &DefenderTypeId,
        cell: Option<CellCoord>,
        level: u32,
    ) -> Result<Placed, PlacementError> {
        let Some(config) = self.catalog.get(kind).cloned() else {
            tracing::warn!(%kind, "placement rejected: unknown defender type");
            return Err(PlacementError::UnknownDefender);
        };
        if level == 0 || level > self.max_level {
            return Err(PlacementError::InvalidLevel);
        }

        let cell = match cell {
            Some(cell) => {
                let index = self.index(cell).ok_or(PlacementError::OutOfBounds)?;
                if self.cells[index].is_some() {
                    return Err(PlacementError::Occupied);
                }
                cell
            }
            None => self
                .random_empty_cell()
                .ok_or(PlacementError::NoEmptyCell)?,
        };
        let index = self.index(cell).ok_or(PlacementError::OutOfBounds)?;

        let id = DefenderId::new(self.next_id);
        self.next_id += 1;
        let defender = Defender::new(
            id,
            kind.clone(),
            Some(config),
            level,
            cell,
            self.cell_to_world(cell),
        );
        let _ = self.defenders.insert(id, defender);
        self.occupy(index, id);
        tracing::debug!(%kind, level, column = cell.column(), row = cell.row(), "defender placed");
        Ok(Placed { defender: id, cell })
    }

    /// Merges the defender on `source` into the defender on `target`.
    ///
    /// On failure nothing changes. On success the source defender is removed
    /// and the target keeps its identifier, cooldown and target while gaining
    /// one level.
    pub fn try_merge(&mut self, source: CellCoord, target: CellCoord) -> Result<Merged, MergeError> {
        if source == target {
            return Err(MergeError::SameCell);
        }
        let source_index = self.index(source).ok_or(MergeError::EmptySource)?;
        let target_index = self.index(target).ok_or(MergeError::EmptyTarget)?;
        let source_id = self.cells[source_index].ok_or(MergeError::EmptySource)?;
        let target_id = self.cells[target_index].ok_or(MergeError::EmptyTarget)?;

        let (source_defender, target_defender) =
            match (self.defenders.get(&source_id), self.defenders.get(&target_id)) {
                (Some(source), Some(target)) => (source, target),
                (None, _) => return Err(MergeError::EmptySource),
                (_, None) => return Err(MergeError::EmptyTarget),
            };
        if source_defender.kind() != target_defender.kind() {
            return Err(MergeError::KindMismatch);
        }
        if source_defender.level() != target_defender.level() {
            return Err(MergeError::LevelMismatch);
        }
        let level = target_defender.level() + 1;
        if level > self.max_level {
            return Err(MergeError::MaxLevel);
        }

        let _ = self.defenders.remove(&source_id);
        self.vacate(source_index);
        let Some(survivor) = self.defenders.get_mut(&target_id) else {
            return Err(MergeError::EmptyTarget);
        };
        survivor.set_level(level);
        let kind = survivor.kind().clone();
        tracing::debug!(%kind, level, "defenders merged");

        Ok(Merged {
            defender: target_id,
            consumed: source_id,
            kind,
            level,
        })
    }

    /// Picks up the defender on `cell`, suspending its combat logic.
    pub fn begin_drag(&mut self, cell: CellCoord) -> Option<DefenderId> {
        let id = self.occupant_id(cell)?;
        self.defenders.get_mut(&id)?.begin_drag();
        Some(id)
    }

    /// Ends a drag without moving the defender.
    pub fn cancel_drag(&mut self, cell: CellCoord) -> Option<DefenderId> {
        let id = self.occupant_id(cell)?;
        self.defenders.get_mut(&id)?.end_drag();
        Some(id)
    }

    /// Drops the defender picked up from `from` at the world position `at`.
    ///
    /// Returns `None` when `from` holds no defender. Every drop ends the drag.
    pub fn drop_at(&mut self, from: CellCoord, at: Vec2) -> Option<DropOutcome> {
        let dragged = self.occupant_id(from)?;
        self.defenders.get_mut(&dragged)?.end_drag();

        let Some(to) = self.world_to_cell(at).filter(|to| *to != from) else {
            return Some(DropOutcome::Returned { defender: dragged });
        };

        match self.occupant_id(to) {
            Some(displaced) => match self.try_merge(from, to) {
                Ok(merged) => Some(DropOutcome::Merged(merged)),
                Err(reason) => {
                    tracing::debug!(%reason, "drop fell back to a swap");
                    self.swap(from, to);
                    Some(DropOutcome::Swapped { dragged, displaced })
                }
            },
            None => {
                self.relocate(from, to);
                Some(DropOutcome::Moved {
                    defender: dragged,
                    from,
                    to,
                })
            }
        }
    }

    /// Removes the defender on `cell`, freeing the cell.
    pub fn remove(&mut self, cell: CellCoord) -> Option<Defender> {
        let index = self.index(cell)?;
        let id = self.cells[index]?;
        self.vacate(index);
        self.defenders.remove(&id)
    }

    /// Removes every defender, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.defenders.len();
        let occupied: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| cell.map(|_| index))
            .collect();
        for index in occupied {
            self.vacate(index);
        }
        self.defenders.clear();
        removed
    }

    /// Defender occupying `cell`.
    #[must_use]
    pub fn occupant(&self, cell: CellCoord) -> Option<&Defender> {
        self.defenders.get(&self.occupant_id(cell)?)
    }

    /// Defender with the provided identifier.
    #[must_use]
    pub fn defender(&self, id: DefenderId) -> Option<&Defender> {
        self.defenders.get(&id)
    }

    /// Iterates over defenders in identifier order.
    pub fn defenders(&self) -> impl Iterator<Item = &Defender> {
        self.defenders.values()
    }

    /// Iterates mutably over defenders in identifier order.
    pub fn defenders_mut(&mut self) -> impl Iterator<Item = &mut Defender> {
        self.defenders.values_mut()
    }

    /// Number of placed defenders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defenders.len()
    }

    /// Reports whether no defender is placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defenders.is_empty()
    }

    /// Number of empty cells.
    #[must_use]
    pub fn empty_count(&self) -> usize {
        self.empty.len()
    }

    /// Verifies that occupancy, the empty-cell list and defender cells agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let occupancy_matches = self.cells.iter().enumerate().all(|(index, cell)| {
            let listed = self.empty_slot[index]
                .is_some_and(|slot| self.empty.get(slot) == Some(&index));
            match cell {
                Some(id) => {
                    !listed
                        && self
                            .defenders
                            .get(id)
                            .is_some_and(|defender| defender.cell() == self.coord(index))
                }
                None => listed,
            }
        });
        occupancy_matches
            && self.empty.len() + self.defenders.len() == self.cells.len()
    }

    /// Captures an immutable snapshot of every defender.
    #[must_use]
    pub fn view(&self) -> DefenderView {
        DefenderView::from_snapshots(
            self.defenders
                .values()
                .map(|defender| DefenderSnapshot {
                    id: defender.id(),
                    kind: defender.kind().clone(),
                    level: defender.level(),
                    cell: defender.cell(),
                    position: defender.position(),
                    range: defender.range(),
                    sprite: defender.sprite().map(str::to_owned),
                    state: defender.state(),
                })
                .collect(),
        )
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.row() as usize * self.width as usize + cell.column() as usize)
    }

    fn coord(&self, index: usize) -> CellCoord {
        let width = self.width as usize;
        CellCoord::new((index % width) as u32, (index / width) as u32)
    }

    fn occupant_id(&self, cell: CellCoord) -> Option<DefenderId> {
        self.cells[self.index(cell)?]
    }

    fn occupy(&mut self, index: usize, id: DefenderId) {
        self.cells[index] = Some(id);
        if let Some(slot) = self.empty_slot[index].take() {
            let _ = self.empty.swap_remove(slot);
            if let Some(&moved) = self.empty.get(slot) {
                self.empty_slot[moved] = Some(slot);
            }
        }
    }

    fn vacate(&mut self, index: usize) {
        self.cells[index] = None;
        if self.empty_slot[index].is_none() {
            self.empty_slot[index] = Some(self.empty.len());
            self.empty.push(index);
        }
    }

    fn swap(&mut self, a: CellCoord, b: CellCoord) {
        let (Some(a_index), Some(b_index)) = (self.index(a), self.index(b)) else {
            return;
        };
        self.cells.swap(a_index, b_index);
        for (index, cell) in [(a_index, a), (b_index, b)] {
            let position = self.cell_to_world(cell);
            if let Some(defender) = self.cells[index].and_then(|id| self.defenders.get_mut(&id)) {
                defender.relocate(cell, position);
            }
        }
    }

    fn relocate(&mut self, from: CellCoord, to: CellCoord) {
        let (Some(from_index), Some(to_index)) = (self.index(from), self.index(to)) else {
            return;
        };
        let Some(id) = self.cells[from_index] else {
            return;
        };
        self.vacate(from_index);
        self.occupy(to_index, id);
        let position = self.cell_to_world(to);
        if let Some(defender) = self.defenders.get_mut(&id) {
            defender.relocate(to, position);
        }
    }
}

/// Immutable snapshot of a placed defender.
#[derive(Clone, Debug, PartialEq)]
pub struct DefenderSnapshot {
    /// Identifier of the defender.
    pub id: DefenderId,
    /// Type of the defender.
    pub kind: DefenderTypeId,
    /// Current level.
    pub level: u32,
    /// Occupied cell.
    pub cell: CellCoord,
    /// World position.
    pub position: Vec2,
    /// Targeting range.
    pub range: f32,
    /// Sprite for the current level.
    pub sprite: Option<String>,
    /// Behaviour stage.
    pub state: DefenderState,
}

/// Read-only collection of defender snapshots ordered by identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DefenderView {
    snapshots: Vec<DefenderSnapshot>,
}

impl DefenderView {
    /// Creates a view from snapshots, sorting them by identifier.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<DefenderSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterates over the captured snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &DefenderSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, returning the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<DefenderSnapshot> {
        self.snapshots
    }
}
