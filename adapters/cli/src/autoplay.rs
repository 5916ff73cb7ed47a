use merge_defence_core::{Command, DefenderTypeId, Event, GameConfig};
use merge_defence_world::{
    query::{self, DefenderState, Phase},
    World,
};

use crate::wallet::Wallet;

/// Scripted player that buys defenders and merges matching pairs.
#[derive(Debug)]
pub(crate) struct Autoplay {
    roster: Vec<DefenderTypeId>,
    next: usize,
    cost: u32,
}

impl Autoplay {
    /// Creates a policy buying every configured defender type in turn.
    pub(crate) fn new(config: &GameConfig, cost: u32) -> Self {
        Self {
            roster: config.defenders.iter().map(|defender| defender.id.clone()).collect(),
            next: 0,
            cost,
        }
    }

    /// Appends the commands the policy wants to issue before the next tick.
    ///
    /// At most one merge and one purchase are planned per call. Purchases are
    /// paid up front and refunded by [`Autoplay::settle`] when rejected.
    pub(crate) fn plan(&mut self, world: &World, wallet: &Wallet, out: &mut Vec<Command>) {
        if matches!(query::phase(world), Phase::GameOver | Phase::Victory) {
            return;
        }

        if let Some(command) = self.merge_candidate(world) {
            out.push(command);
        }

        if self.roster.is_empty() || query::empty_cell_count(world) == 0 {
            return;
        }
        if !wallet.spend(self.cost) {
            return;
        }
        let kind = self.roster[self.next % self.roster.len()].clone();
        self.next = self.next.wrapping_add(1);
        tracing::debug!(%kind, cost = self.cost, "buying defender");
        out.push(Command::PlaceDefender {
            kind,
            cell: None,
            level: 1,
        });
    }

    /// Refunds purchases the world rejected.
    pub(crate) fn settle(&self, events: &[Event], wallet: &Wallet) {
        for event in events {
            if let Event::PlacementRejected { kind, reason } = event {
                tracing::warn!(%kind, %reason, "purchase refunded");
                wallet.refund(self.cost);
            }
        }
    }

    fn merge_candidate(&self, world: &World) -> Option<Command> {
        let max_level = query::max_merge_level(world);
        let defenders = query::defender_view(world).into_vec();
        for (index, target) in defenders.iter().enumerate() {
            if target.level >= max_level || target.state == DefenderState::Dragging {
                continue;
            }
            let source = defenders[index + 1..].iter().find(|candidate| {
                candidate.kind == target.kind
                    && candidate.level == target.level
                    && candidate.state != DefenderState::Dragging
            });
            if let Some(source) = source {
                return Some(Command::MergeDefenders {
                    source: source.cell,
                    target: target.cell,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use merge_defence_core::CellCoord;
    use merge_defence_world as world;

    use super::*;

    fn setup() -> (GameConfig, World) {
        let config = crate::load_config(None).expect("bundled configuration");
        let world = World::new(&config, 5).expect("valid configuration");
        (config, world)
    }

    fn place(world: &mut World, kind: &str, cell: CellCoord) {
        let mut events = Vec::new();
        world::apply(
            world,
            Command::PlaceDefender {
                kind: DefenderTypeId::new(kind),
                cell: Some(cell),
                level: 1,
            },
            &mut events,
        );
        assert!(matches!(events.as_slice(), [Event::DefenderPlaced { .. }]));
    }

    #[test]
    fn buys_defenders_in_rotation_while_affordable() {
        let (config, world) = setup();
        let mut autoplay = Autoplay::new(&config, 10);
        let wallet = Wallet::with_coins(25);
        let mut commands = Vec::new();

        autoplay.plan(&world, &wallet, &mut commands);
        autoplay.plan(&world, &wallet, &mut commands);
        autoplay.plan(&world, &wallet, &mut commands);

        let bought: Vec<_> = commands
            .iter()
            .filter_map(|command| match command {
                Command::PlaceDefender { kind, .. } => Some(kind.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(bought, vec!["archer", "frost_mage"]);
        assert_eq!(wallet.coins(), 5);
    }

    #[test]
    fn merges_the_first_matching_pair() {
        let (config, mut world) = setup();
        place(&mut world, "archer", CellCoord::new(0, 0));
        place(&mut world, "hammer", CellCoord::new(1, 0));
        place(&mut world, "archer", CellCoord::new(2, 1));
        let autoplay = Autoplay::new(&config, 10);

        assert_eq!(
            autoplay.merge_candidate(&world),
            Some(Command::MergeDefenders {
                source: CellCoord::new(2, 1),
                target: CellCoord::new(0, 0),
            })
        );
    }

    #[test]
    fn fully_merged_defenders_are_left_alone() {
        let (config, mut world) = setup();
        let top = query::max_merge_level(&world);
        for cell in [CellCoord::new(0, 0), CellCoord::new(1, 0)] {
            let mut events = Vec::new();
            world::apply(
                &mut world,
                Command::PlaceDefender {
                    kind: DefenderTypeId::new("archer"),
                    cell: Some(cell),
                    level: top,
                },
                &mut events,
            );
        }
        let autoplay = Autoplay::new(&config, 10);
        assert_eq!(autoplay.merge_candidate(&world), None);
    }

    #[test]
    fn rejected_purchases_are_refunded() {
        let (config, _) = setup();
        let autoplay = Autoplay::new(&config, 10);
        let wallet = Wallet::with_coins(0);
        autoplay.settle(
            &[Event::PlacementRejected {
                kind: DefenderTypeId::new("archer"),
                reason: merge_defence_core::PlacementError::NoEmptyCell,
            }],
            &wallet,
        );
        assert_eq!(wallet.coins(), 10);
    }
}
