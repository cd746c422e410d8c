use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityKind, CapabilityName};
use crate::host::{HostAdapter, Notice};
use crate::players::PlayerId;

/// Authorized names for one player, per kind.
#[derive(Debug, Clone, Default)]
struct UnlockRecord {
    sets: [BTreeSet<CapabilityName>; 4],
}

/// Read-only view pushed to the presentation layer after every grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnlockView {
    pub skills: Vec<String>,
    pub talents: Vec<String>,
    pub expertises: Vec<String>,
    pub mod_research: Vec<String>,
}

impl UnlockView {
    pub fn names(&self, kind: CapabilityKind) -> &[String] {
        match kind {
            CapabilityKind::Skill => &self.skills,
            CapabilityKind::Talent => &self.talents,
            CapabilityKind::Expertise => &self.expertises,
            CapabilityKind::ModResearch => &self.mod_research,
        }
    }
}

/// Presentation sync hook.
pub trait UnlockObserver: Send + Sync {
    fn unlocks_changed(&self, player: PlayerId, view: &UnlockView);
}

/// Authorization queries. The enforcer and the tracker only ever see this.
pub trait UnlockQuery: Send + Sync {
    fn allows(&self, player: PlayerId, name: &CapabilityName) -> bool;

    fn is_unlocked_silent(&self, player: PlayerId, kind: CapabilityKind, raw: &str) -> bool {
        self.allows(player, &CapabilityName::new(kind, raw))
    }
}

/// Network-granted authority over what each player may use.
#[derive(Default)]
pub struct UnlockStore {
    records: RwLock<HashMap<PlayerId, UnlockRecord>>,
    debug_bypass: AtomicBool,
    observer: RwLock<Option<Arc<dyn UnlockObserver>>>,
}

impl UnlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_observer(&self, observer: Arc<dyn UnlockObserver>) {
        *self.observer.write().unwrap_or_else(|p| p.into_inner()) = Some(observer);
    }

    pub fn set_debug_bypass(&self, on: bool) {
        let was = self.debug_bypass.swap(on, Ordering::SeqCst);
        if was != on {
            warn!(on, "authorization debug bypass changed");
        }
    }

    pub fn debug_bypass(&self) -> bool {
        self.debug_bypass.load(Ordering::SeqCst)
    }

    /// Authorize `raw` for `player`. Returns true if it was newly added.
    pub fn unlock(&self, player: PlayerId, kind: CapabilityKind, raw: &str) -> bool {
        let name = CapabilityName::new(kind, raw);
        let view = {
            let mut g = self.records.write().unwrap_or_else(|p| p.into_inner());
            let rec = g.entry(player).or_default();
            if !rec.sets[kind.index()].insert(name.clone()) {
                debug!(player=%player, name=%name, "already unlocked");
                return false;
            }
            view_of(rec)
        };
        info!(player=%player, name=%name, "unlocked");

        let observer = self
            .observer
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(o) = observer {
            o.unlocks_changed(player, &view);
        }
        true
    }

    /// Like [`UnlockQuery::is_unlocked_silent`] but tells the player on denial.
    pub fn is_unlocked(
        &self,
        player: PlayerId,
        kind: CapabilityKind,
        raw: &str,
        host: &mut dyn HostAdapter,
    ) -> bool {
        let name = CapabilityName::new(kind, raw);
        if self.allows(player, &name) {
            return true;
        }
        host.notify(player, &Notice::Locked(name));
        false
    }

    /// Sorted bare names authorized for `player`, for read-only UI.
    pub fn unlocked(&self, player: PlayerId, kind: CapabilityKind) -> Vec<String> {
        let g = self.records.read().unwrap_or_else(|p| p.into_inner());
        g.get(&player)
            .map(|r| {
                r.sets[kind.index()]
                    .iter()
                    .map(|n| n.bare().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn view(&self, player: PlayerId) -> UnlockView {
        let g = self.records.read().unwrap_or_else(|p| p.into_inner());
        g.get(&player).map(view_of).unwrap_or_default()
    }

    pub fn count(&self, player: PlayerId) -> usize {
        let g = self.records.read().unwrap_or_else(|p| p.into_inner());
        g.get(&player)
            .map(|r| r.sets.iter().map(|s| s.len()).sum())
            .unwrap_or(0)
    }

    pub fn clear(&self, player: PlayerId) {
        let removed = self
            .records
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&player)
            .is_some();
        if removed {
            info!(player=%player, "cleared unlocks");
        }
    }
}

impl UnlockQuery for UnlockStore {
    fn allows(&self, player: PlayerId, name: &CapabilityName) -> bool {
        if self.debug_bypass() {
            return true;
        }
        let g = self.records.read().unwrap_or_else(|p| p.into_inner());
        g.get(&player)
            .is_some_and(|r| r.sets[name.kind().index()].contains(name))
    }
}

fn view_of(rec: &UnlockRecord) -> UnlockView {
    let names = |k: CapabilityKind| {
        rec.sets[k.index()]
            .iter()
            .map(|n| n.bare().to_string())
            .collect::<Vec<_>>()
    };
    UnlockView {
        skills: names(CapabilityKind::Skill),
        talents: names(CapabilityKind::Talent),
        expertises: names(CapabilityKind::Expertise),
        mod_research: names(CapabilityKind::ModResearch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_host::MemoryHost;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(PlayerId, UnlockView)>>);

    impl UnlockObserver for Recorder {
        fn unlocks_changed(&self, player: PlayerId, view: &UnlockView) {
            self.0.lock().unwrap().push((player, view.clone()));
        }
    }

    #[test]
    fn unlock_normalizes_and_is_idempotent() {
        let s = UnlockStore::new();
        let p = PlayerId(1);
        assert!(s.unlock(p, CapabilityKind::Skill, "Ice Bolt"));
        assert!(!s.unlock(p, CapabilityKind::Skill, "ice_bolt"));
        assert!(!s.unlock(p, CapabilityKind::Skill, "skill:ice_bolt"));

        assert!(s.is_unlocked_silent(p, CapabilityKind::Skill, "ICE BOLT"));
        assert!(!s.is_unlocked_silent(p, CapabilityKind::Talent, "ice bolt"));
        assert!(!s.is_unlocked_silent(PlayerId(2), CapabilityKind::Skill, "ice bolt"));
        assert_eq!(s.unlocked(p, CapabilityKind::Skill), vec!["ice_bolt"]);
        assert_eq!(s.count(p), 1);
    }

    #[test]
    fn observer_sees_each_new_grant_once() {
        let s = UnlockStore::new();
        let rec = Arc::new(Recorder::default());
        s.set_observer(rec.clone());
        let p = PlayerId(3);

        s.unlock(p, CapabilityKind::Talent, "Haste");
        s.unlock(p, CapabilityKind::Talent, "haste");
        s.unlock(p, CapabilityKind::ModResearch, "Botania");

        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].1.talents, vec!["haste"]);
        assert_eq!(seen[1].1.mod_research, vec!["botania"]);
    }

    #[test]
    fn loud_query_notifies_only_on_denial() {
        let s = UnlockStore::new();
        let p = PlayerId(4);
        let mut host = MemoryHost::new();
        host.join(p, "Alice");

        assert!(!s.is_unlocked(p, CapabilityKind::Skill, "nova", &mut host));
        s.unlock(p, CapabilityKind::Skill, "nova");
        assert!(s.is_unlocked(p, CapabilityKind::Skill, "nova", &mut host));

        assert_eq!(
            host.messages(p),
            vec!["[AP] Nova is locked! You need to receive it from Archipelago first."]
        );
    }

    #[test]
    fn debug_bypass_allows_everything() {
        let s = UnlockStore::new();
        let p = PlayerId(5);
        s.set_debug_bypass(true);
        for k in CapabilityKind::ALL {
            assert!(s.is_unlocked_silent(p, *k, "anything at all"));
        }
        s.set_debug_bypass(false);
        assert!(!s.is_unlocked_silent(p, CapabilityKind::Skill, "nova"));
    }

    #[test]
    fn clear_drops_player() {
        let s = UnlockStore::new();
        let p = PlayerId(6);
        s.unlock(p, CapabilityKind::Expertise, "Divine");
        s.clear(p);
        assert!(!s.is_unlocked_silent(p, CapabilityKind::Expertise, "divine"));
        assert_eq!(s.view(p), UnlockView::default());
    }
}
