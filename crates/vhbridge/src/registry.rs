use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::capability::{CapabilityKind, CapabilityName};
use crate::tables;

/// Every category owns a contiguous block of this many ids.
pub const RANGE_WIDTH: i64 = 100;

pub const MILESTONE_BASE: i64 = 43400;
pub const QUEST_BASE: i64 = 43500;
pub const MAX_QUESTS: u32 = 99;
pub const COLLECTIBLE_BASE: i64 = 43600;
pub const CHEST_BASE: i64 = 44000;
pub const MAX_CHEST_CHECKS: u32 = 1000;
pub const FILLER_BASE: i64 = 33700;

fn location_table(kind: CapabilityKind) -> &'static [&'static str] {
    match kind {
        CapabilityKind::Skill => tables::SKILL_LOCATIONS,
        CapabilityKind::Talent => tables::TALENTS,
        CapabilityKind::Expertise => tables::EXPERTISES,
        CapabilityKind::ModResearch => tables::MOD_RESEARCH,
    }
}

fn item_table(kind: CapabilityKind) -> &'static [&'static str] {
    match kind {
        CapabilityKind::Skill => tables::SKILL_ITEMS,
        other => location_table(other),
    }
}

/// Talents leave offsets 42..45 reserved after the static table.
const TALENT_FIRST_DYNAMIC: i64 = 45;

fn first_dynamic_offset(kind: CapabilityKind) -> i64 {
    let table = location_table(kind).len() as i64;
    match kind {
        CapabilityKind::Talent => table.max(TALENT_FIRST_DYNAMIC),
        _ => table,
    }
}

fn kind_for_id(id: i64) -> Option<CapabilityKind> {
    CapabilityKind::ALL.iter().copied().find(|k| {
        let base = k.info().location_base;
        (base..base + RANGE_WIDTH).contains(&id)
    })
}

#[derive(Debug)]
struct DynamicIds {
    ids: HashMap<CapabilityName, i64>,
    next_offset: [i64; 4],
}

/// Capability name <-> protocol id mapping.
///
/// Static tables cover every capability the randomizer knows about. A host
/// may still report something newer (a mod update adds a talent); those get
/// the next free id in their kind's block, stable for the process lifetime.
#[derive(Debug)]
pub struct Registry {
    dynamic: Mutex<DynamicIds>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut next_offset = [0; 4];
        for k in CapabilityKind::ALL {
            next_offset[k.index()] = first_dynamic_offset(*k);
        }
        Self {
            dynamic: Mutex::new(DynamicIds {
                ids: HashMap::new(),
                next_offset,
            }),
        }
    }

    pub fn static_location_id(name: &CapabilityName) -> Option<i64> {
        let kind = name.kind();
        location_table(kind)
            .iter()
            .position(|n| *n == name.bare())
            .map(|i| kind.info().location_base + i as i64)
    }

    /// Location id for a capability, registering unseen names.
    ///
    /// Returns `None` only when the kind's block is exhausted.
    pub fn location_id(&self, name: &CapabilityName) -> Option<i64> {
        if let Some(id) = Self::static_location_id(name) {
            return Some(id);
        }

        let mut d = self.dynamic.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(id) = d.ids.get(name) {
            return Some(*id);
        }

        let kind = name.kind();
        let off = d.next_offset[kind.index()];
        if off >= RANGE_WIDTH {
            warn!(name=%name, "no free location ids left for kind");
            return None;
        }
        d.next_offset[kind.index()] = off + 1;

        let id = kind.info().location_base + off;
        d.ids.insert(name.clone(), id);
        info!(name=%name, id, "registered dynamic location id");
        Some(id)
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .ids
            .len()
    }

    /// Capability granted by a received item id, if the id is in a
    /// capability block and names a known entry.
    pub fn item_capability(item_id: i64) -> Option<CapabilityName> {
        let kind = kind_for_id(item_id)?;
        let off = (item_id - kind.info().location_base) as usize;
        item_table(kind)
            .get(off)
            .map(|n| CapabilityName::new(kind, n))
    }

    pub fn level_milestone_location(level: u32) -> Option<i64> {
        tables::LEVEL_MILESTONES
            .iter()
            .position(|m| *m == level)
            .map(|i| MILESTONE_BASE + i as i64)
    }

    pub fn vault_milestone_location(completed: u32) -> Option<i64> {
        tables::VAULT_MILESTONES
            .iter()
            .position(|m| *m == completed)
            .map(|i| MILESTONE_BASE + (tables::LEVEL_MILESTONES.len() + i) as i64)
    }

    /// "Quest Completion N", 1-based.
    pub fn quest_location(n: u32) -> Option<i64> {
        if n == 0 || n > MAX_QUESTS {
            return None;
        }
        Some(QUEST_BASE + i64::from(n - 1))
    }

    pub fn collectible_location(name: &str) -> Option<i64> {
        let want = name.trim();
        tables::COLLECTIBLES
            .iter()
            .position(|c| c.eq_ignore_ascii_case(want))
            .map(|i| COLLECTIBLE_BASE + i as i64)
    }

    /// Chest check `index`, 0-based.
    pub fn chest_location(index: u32) -> Option<i64> {
        if index >= MAX_CHEST_CHECKS {
            return None;
        }
        Some(CHEST_BASE + i64::from(index))
    }

    /// Reverse lookup for logs and status output.
    ///
    /// Linear over every table; fine at a few hundred entries.
    pub fn location_name(&self, id: i64) -> Option<String> {
        if let Some(kind) = kind_for_id(id) {
            let off = (id - kind.info().location_base) as usize;
            if let Some(n) = location_table(kind).get(off) {
                return Some(CapabilityName::new(kind, n).to_string());
            }
            let d = self.dynamic.lock().unwrap_or_else(|p| p.into_inner());
            return d
                .ids
                .iter()
                .find(|(_, v)| **v == id)
                .map(|(k, _)| k.to_string());
        }

        if let Some(m) = usize::try_from(id - MILESTONE_BASE)
            .ok()
            .and_then(|i| tables::MILESTONES.get(i))
        {
            return Some(format!("milestone:{m}"));
        }
        if (QUEST_BASE..QUEST_BASE + i64::from(MAX_QUESTS)).contains(&id) {
            return Some(format!("Quest Completion {}", id - QUEST_BASE + 1));
        }
        if let Some(c) = usize::try_from(id - COLLECTIBLE_BASE)
            .ok()
            .and_then(|i| tables::COLLECTIBLES.get(i))
        {
            return Some(format!("Trinket: {c}"));
        }
        if (CHEST_BASE..CHEST_BASE + i64::from(MAX_CHEST_CHECKS)).contains(&id) {
            return Some(format!("Chest Check {}", id - CHEST_BASE + 1));
        }
        None
    }
}
