use std::collections::BTreeSet;

use tracing::debug;

use crate::client::SlotOptions;
use crate::registry::{Registry, MAX_CHEST_CHECKS};
use crate::rng::Rng64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChestKind {
    Wooden,
    Normal,
}

impl ChestKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wooden" | "wood" => Some(Self::Wooden),
            "normal" | "living" | "ornate" | "gilded" => Some(Self::Normal),
            _ => None,
        }
    }

    fn weight(self, o: &SlotOptions) -> f32 {
        match self {
            ChestKind::Wooden => o.wooden_chest_weight,
            ChestKind::Normal => o.normal_chest_weight,
        }
    }
}

/// Vault chests that can award one of the seed's chest checks.
///
/// A roll only decides whether the chest carries a check; the check itself is
/// counted once it has been reported through the check path.
#[derive(Debug)]
pub struct ChestPool {
    found: BTreeSet<i64>,
    rng: Rng64,
}

impl ChestPool {
    pub fn new(rng: Rng64) -> Self {
        Self {
            found: BTreeSet::new(),
            rng,
        }
    }

    /// Roll an opened chest. Returns the chest check it awards, if any.
    pub fn roll(&mut self, options: &SlotOptions, kind: ChestKind) -> Option<i64> {
        let remaining = self.remaining_ids(options);
        if remaining.is_empty() {
            return None;
        }
        let weight = kind.weight(options);
        if weight <= 0.0 || self.rng.unit_f32() >= weight {
            return None;
        }
        let id = remaining[self.rng.below(remaining.len())];
        debug!(kind=?kind, location = id, "chest carries a check");
        Some(id)
    }

    pub fn mark_found(&mut self, id: i64) -> bool {
        self.found.insert(id)
    }

    pub fn remaining(&self, options: &SlotOptions) -> usize {
        self.remaining_ids(options).len()
    }

    fn remaining_ids(&self, options: &SlotOptions) -> Vec<i64> {
        (0..options.vault_chest_checks.min(MAX_CHEST_CHECKS))
            .filter_map(Registry::chest_location)
            .filter(|id| !self.found.contains(id))
            .collect()
    }
}
