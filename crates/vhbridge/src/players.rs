use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use crate::capability::{CapabilityKind, CapabilityName};

/// Host-side player identity (the host's 128-bit UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u128);

impl PlayerId {
    pub fn random() -> Self {
        Self(u128::from_le_bytes(crate::rng::random_128()))
    }

    pub fn short(self) -> u64 {
        // Good enough for logs: XOR high/low halves.
        (self.0 as u64) ^ ((self.0 >> 64) as u64)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.short())
    }
}

/// Last observed host state for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressionSnapshot {
    pub level: u32,
    active: [BTreeSet<CapabilityName>; 4],
}

impl ProgressionSnapshot {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            active: Default::default(),
        }
    }

    pub fn active(&self, kind: CapabilityKind) -> &BTreeSet<CapabilityName> {
        &self.active[kind.index()]
    }

    pub fn set_active(&mut self, kind: CapabilityKind, names: BTreeSet<CapabilityName>) {
        self.active[kind.index()] = names;
    }

    /// Names active now that were not active in `prev`.
    pub fn added_since<'a>(
        &'a self,
        prev: &'a ProgressionSnapshot,
        kind: CapabilityKind,
    ) -> impl Iterator<Item = &'a CapabilityName> + 'a {
        self.active(kind).difference(prev.active(kind))
    }
}

#[derive(Debug, Default)]
struct PlayerSession {
    snapshot: Option<ProgressionSnapshot>,
    warned: HashSet<CapabilityName>,
}

/// Per-player working state shared by the tracker and the enforcer.
///
/// Every method takes the lock for its own duration only and never calls out,
/// so callers may hold no other locks safely.
#[derive(Debug, Default)]
pub struct PlayerSessions {
    inner: Mutex<HashMap<PlayerId, PlayerSession>>,
}

impl PlayerSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut HashMap<PlayerId, PlayerSession>) -> R) -> R {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut g)
    }

    pub fn snapshot(&self, player: PlayerId) -> Option<ProgressionSnapshot> {
        self.with(|m| m.get(&player).and_then(|s| s.snapshot.clone()))
    }

    pub fn store_snapshot(&self, player: PlayerId, snap: ProgressionSnapshot) {
        self.with(|m| m.entry(player).or_default().snapshot = Some(snap));
    }

    pub fn is_warned(&self, player: PlayerId, name: &CapabilityName) -> bool {
        self.with(|m| m.get(&player).is_some_and(|s| s.warned.contains(name)))
    }

    /// Returns true the first time `name` is warned for `player`.
    pub fn warn(&self, player: PlayerId, name: CapabilityName) -> bool {
        self.with(|m| m.entry(player).or_default().warned.insert(name))
    }

    pub fn warned_count(&self, player: PlayerId) -> usize {
        self.with(|m| m.get(&player).map(|s| s.warned.len()).unwrap_or(0))
    }

    /// Drop everything held for `player` (logout).
    pub fn forget(&self, player: PlayerId) {
        self.with(|m| {
            m.remove(&player);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_diff_reports_only_new_names() {
        let k = CapabilityKind::Talent;
        let mut prev = ProgressionSnapshot::new(5);
        prev.set_active(k, [CapabilityName::new(k, "speed")].into_iter().collect());

        let mut cur = ProgressionSnapshot::new(6);
        cur.set_active(
            k,
            [CapabilityName::new(k, "speed"), CapabilityName::new(k, "haste")]
                .into_iter()
                .collect(),
        );

        let added: Vec<_> = cur.added_since(&prev, k).map(|n| n.as_str()).collect();
        assert_eq!(added, vec!["talent:haste"]);
        assert_eq!(prev.added_since(&cur, k).count(), 0);
    }

    #[test]
    fn warnings_and_forget() {
        let s = PlayerSessions::new();
        let p = PlayerId(7);
        let n = CapabilityName::new(CapabilityKind::Skill, "nova");

        assert!(!s.is_warned(p, &n));
        assert!(s.warn(p, n.clone()));
        assert!(!s.warn(p, n.clone()));
        assert!(s.is_warned(p, &n));
        assert_eq!(s.warned_count(p), 1);

        s.store_snapshot(p, ProgressionSnapshot::new(3));
        assert_eq!(s.snapshot(p).map(|x| x.level), Some(3));

        s.forget(p);
        assert!(s.snapshot(p).is_none());
        assert_eq!(s.warned_count(p), 0);
    }
}
