use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capability::{CapabilityKind, CapabilityName};
use crate::host::{HostAdapter, HostError, Notice};
use crate::players::{PlayerId, PlayerSessions};
use crate::unlocks::UnlockQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    Allow,
    Deny,
}

/// Synchronous pre-action check the host calls before a capability upgrade
/// takes effect.
pub trait UpgradeGate: Send + Sync {
    fn before_upgrade(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> UpgradeDecision;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforceReport {
    pub removed: Vec<CapabilityName>,
    pub failed: Vec<CapabilityName>,
    pub refunded: u32,
    /// Kinds whose host data could not be read this pass.
    pub skipped_kinds: usize,
}

impl EnforceReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Revokes capabilities the host shows as active but the network never
/// granted.
pub struct Enforcer {
    unlocks: Arc<dyn UnlockQuery>,
    sessions: Arc<PlayerSessions>,
}

impl Enforcer {
    pub fn new(unlocks: Arc<dyn UnlockQuery>, sessions: Arc<PlayerSessions>) -> Self {
        Self { unlocks, sessions }
    }

    pub fn enforce(&self, host: &mut dyn HostAdapter, player: PlayerId) -> EnforceReport {
        let mut report = EnforceReport::default();

        for kind in CapabilityKind::ALL.iter().copied() {
            let active = match host.active_capabilities(player, kind) {
                Ok(v) => v,
                Err(HostError::NotReady) => {
                    report.skipped_kinds += 1;
                    continue;
                }
                Err(e) => {
                    debug!(player=%player, kind=%kind, err=%e, "enforce: host read failed");
                    report.skipped_kinds += 1;
                    continue;
                }
            };

            // Keyed by normalized name; the raw host name is what reset needs.
            let mut unauthorized: BTreeMap<CapabilityName, String> = BTreeMap::new();
            for raw in active {
                let name = CapabilityName::new(kind, &raw);
                if !self.unlocks.allows(player, &name) {
                    unauthorized.entry(name).or_insert(raw);
                }
            }

            for (name, raw) in unauthorized {
                if self.sessions.is_warned(player, &name) {
                    continue;
                }
                match self.revoke(host, player, kind, &raw, &name) {
                    Ok(refunded) => {
                        report.refunded += refunded;
                        report.removed.push(name);
                    }
                    Err(e) => {
                        if self.sessions.warn(player, name.clone()) {
                            warn!(player=%player, name=%name, err=%e, "failed to remove locked capability");
                        }
                        report.failed.push(name);
                    }
                }
            }
        }

        report
    }

    fn revoke(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        kind: CapabilityKind,
        raw: &str,
        name: &CapabilityName,
    ) -> Result<u32, HostError> {
        let cost = match host.capability_cost(player, kind, raw) {
            Ok(c) => c,
            Err(e) => {
                debug!(name=%name, err=%e, "cost lookup failed; assuming 1");
                1
            }
        };

        let hooks = kind.info().recompute_hooks;
        if hooks {
            if let Err(e) = host.before_reset(player, kind, raw) {
                warn!(name=%name, err=%e, "pre-reset hook failed");
            }
        }
        host.reset_capability(player, kind, raw)?;
        if hooks {
            if let Err(e) = host.after_reset(player, kind, raw) {
                warn!(name=%name, err=%e, "post-reset hook failed");
            }
        }

        info!(player=%player, name=%name, cost, "removed locked capability");
        host.notify(player, &Notice::Removed(name.clone()));

        if cost == 0 {
            return Ok(0);
        }
        let resource = kind.info().refund;
        let delta = i32::try_from(cost).unwrap_or(i32::MAX);
        match host.adjust_resource(player, resource, delta) {
            Ok(()) => {
                host.notify(
                    player,
                    &Notice::Refunded {
                        resource,
                        amount: cost,
                    },
                );
                Ok(cost)
            }
            Err(e) => {
                warn!(player=%player, name=%name, cost, err=%e, "refund failed");
                Ok(0)
            }
        }
    }

    pub fn authorize_upgrade(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        kind: CapabilityKind,
        raw: &str,
    ) -> UpgradeDecision {
        let name = CapabilityName::new(kind, raw);
        if self.unlocks.allows(player, &name) {
            return UpgradeDecision::Allow;
        }
        debug!(player=%player, name=%name, "blocked upgrade");
        host.notify(player, &Notice::Locked(name));
        UpgradeDecision::Deny
    }
}

impl UpgradeGate for Enforcer {
    fn before_upgrade(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> UpgradeDecision {
        self.authorize_upgrade(host, player, kind, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Resource;
    use crate::memory_host::MemoryHost;
    use crate::unlocks::UnlockStore;

    struct Fixture {
        unlocks: Arc<UnlockStore>,
        sessions: Arc<PlayerSessions>,
        enforcer: Enforcer,
        host: MemoryHost,
        p: PlayerId,
    }

    fn fixture() -> Fixture {
        let unlocks = Arc::new(UnlockStore::new());
        let sessions = Arc::new(PlayerSessions::new());
        let enforcer = Enforcer::new(unlocks.clone(), sessions.clone());
        let mut host = MemoryHost::new();
        let p = PlayerId(0xabc);
        host.join(p, "Alice");
        Fixture {
            unlocks,
            sessions,
            enforcer,
            host,
            p,
        }
    }

    #[test]
    fn removes_unauthorized_talent_and_refunds() {
        let mut f = fixture();
        f.host.learn(f.p, CapabilityKind::Talent, "Haste");
        f.host.set_cost(CapabilityKind::Talent, "haste", 2);

        let r = f.enforcer.enforce(&mut f.host, f.p);

        assert_eq!(
            r.removed,
            vec![CapabilityName::new(CapabilityKind::Talent, "haste")]
        );
        assert_eq!(r.refunded, 2);
        assert!(!f.host.has(f.p, CapabilityKind::Talent, "haste"));
        assert_eq!(f.host.balance(f.p, Resource::SkillPoints), 2);
        assert_eq!(
            f.host.messages(f.p),
            vec![
                "[AP] Haste is locked! It has been removed.",
                "[AP] Refunded 2 skill points"
            ]
        );
        assert_eq!(
            f.host.hook_log(),
            &["remove talent:haste".to_string(), "add talent:haste".to_string()]
        );
        assert_eq!(f.sessions.warned_count(f.p), 0);
    }

    #[test]
    fn authorized_and_bypassed_are_left_alone() {
        let mut f = fixture();
        f.host.learn(f.p, CapabilityKind::Skill, "Nova");
        f.unlocks.unlock(f.p, CapabilityKind::Skill, "nova");
        assert!(f.enforcer.enforce(&mut f.host, f.p).is_clean());

        f.host.learn(f.p, CapabilityKind::Expertise, "Divine");
        f.unlocks.set_debug_bypass(true);
        assert!(f.enforcer.enforce(&mut f.host, f.p).is_clean());
        assert!(f.host.has(f.p, CapabilityKind::Expertise, "divine"));
    }

    #[test]
    fn reacquired_capability_is_removed_again() {
        let mut f = fixture();
        f.host.set_cost(CapabilityKind::Skill, "nova", 1);
        for _ in 0..2 {
            f.host.learn(f.p, CapabilityKind::Skill, "Nova");
            let r = f.enforcer.enforce(&mut f.host, f.p);
            assert_eq!(r.removed.len(), 1);
        }
        assert_eq!(f.host.balance(f.p, Resource::SkillPoints), 2);
    }

    #[test]
    fn failed_reset_is_warned_once_and_not_refunded() {
        let mut f = fixture();
        f.host.learn(f.p, CapabilityKind::ModResearch, "Create");
        f.host.fail_reset(CapabilityKind::ModResearch, "create");

        let r1 = f.enforcer.enforce(&mut f.host, f.p);
        assert_eq!(r1.failed.len(), 1);
        assert_eq!(r1.refunded, 0);
        assert_eq!(f.sessions.warned_count(f.p), 1);

        let r2 = f.enforcer.enforce(&mut f.host, f.p);
        assert!(r2.is_clean());
        assert_eq!(f.host.balance(f.p, Resource::Knowledge), 0);
        assert!(f.host.messages(f.p).is_empty());
    }

    #[test]
    fn failed_refund_still_removes_and_is_not_retried() {
        let mut f = fixture();
        f.host.learn(f.p, CapabilityKind::Talent, "Haste");
        f.host.set_cost(CapabilityKind::Talent, "haste", 3);
        f.host.fail_adjust(true);

        let r = f.enforcer.enforce(&mut f.host, f.p);
        assert_eq!(r.removed.len(), 1);
        assert!(r.failed.is_empty());
        assert_eq!(r.refunded, 0);
        assert!(!f.host.has(f.p, CapabilityKind::Talent, "haste"));
        assert_eq!(
            f.host.messages(f.p),
            vec!["[AP] Haste is locked! It has been removed."]
        );
        assert_eq!(f.sessions.warned_count(f.p), 0);

        // Nothing left to retry once the host accepts adjustments again.
        f.host.fail_adjust(false);
        assert!(f.enforcer.enforce(&mut f.host, f.p).is_clean());
        assert_eq!(f.host.balance(f.p, Resource::SkillPoints), 0);
    }

    #[test]
    fn missing_cost_falls_back_to_one() {
        let mut f = fixture();
        f.host.learn(f.p, CapabilityKind::Expertise, "Jeweler");
        let r = f.enforcer.enforce(&mut f.host, f.p);
        assert_eq!(r.refunded, 1);
        assert_eq!(f.host.balance(f.p, Resource::ExpertisePoints), 1);
        // Expertise resets skip the recompute hooks.
        assert!(f.host.hook_log().is_empty());
    }

    #[test]
    fn not_ready_host_is_skipped_quietly() {
        let mut f = fixture();
        f.host.learn(f.p, CapabilityKind::Skill, "Nova");
        f.host.set_ready(f.p, false);
        let r = f.enforcer.enforce(&mut f.host, f.p);
        assert!(r.is_clean());
        assert_eq!(r.skipped_kinds, CapabilityKind::ALL.len());
    }

    #[test]
    fn upgrade_gate_allows_or_denies_with_notice() {
        let mut f = fixture();
        let gate: &dyn UpgradeGate = &f.enforcer;
        assert_eq!(
            gate.before_upgrade(&mut f.host, f.p, CapabilityKind::Skill, "Ice Bolt"),
            UpgradeDecision::Deny
        );
        f.unlocks.unlock(f.p, CapabilityKind::Skill, "ice_bolt");
        assert_eq!(
            gate.before_upgrade(&mut f.host, f.p, CapabilityKind::Skill, "Ice Bolt"),
            UpgradeDecision::Allow
        );
        assert_eq!(
            f.host.messages(f.p),
            vec!["[AP] Ice Bolt is locked! You need to receive it from Archipelago first."]
        );
    }
}
