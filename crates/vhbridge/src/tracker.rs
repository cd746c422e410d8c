use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capability::{CapabilityKind, CapabilityName};
use crate::enforcer::{EnforceReport, Enforcer};
use crate::host::{HostAdapter, HostError, Notice};
use crate::players::{PlayerId, PlayerSessions, ProgressionSnapshot};
use crate::registry::Registry;
use crate::tables::{LEVEL_MILESTONES, VAULT_MILESTONES};

/// Host ticks between polls (20 ticks per second on a stock server).
pub const DEFAULT_POLL_INTERVAL_TICKS: u32 = 100;

/// Where reached locations and goal progress go. The protocol client is the
/// real implementation; it dedupes and handles connection state.
pub trait ProgressSink: Send + Sync {
    fn location_reached(&self, location_id: i64);

    fn goal_level(&self) -> u32;

    /// Returns true the first time the goal is reported.
    fn goal_reached(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Host data unavailable; nothing recorded.
    NotReady,
    /// First observation; snapshot seeded, no events.
    ColdStart,
    Diffed {
        new_capabilities: Vec<CapabilityName>,
        milestones: Vec<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub player: PlayerId,
    pub status: PollStatus,
    pub enforcement: Option<EnforceReport>,
}

/// Diffs host state against the last poll and reports what changed.
pub struct ProgressionTracker {
    registry: Arc<Registry>,
    sessions: Arc<PlayerSessions>,
    enforcer: Arc<Enforcer>,
    sink: Arc<dyn ProgressSink>,
    interval_ticks: u32,
    ticks: u64,
    quests_completed: u32,
}

impl ProgressionTracker {
    pub fn new(
        registry: Arc<Registry>,
        sessions: Arc<PlayerSessions>,
        enforcer: Arc<Enforcer>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            registry,
            sessions,
            enforcer,
            sink,
            interval_ticks: DEFAULT_POLL_INTERVAL_TICKS,
            ticks: 0,
            quests_completed: 0,
        }
    }

    pub fn interval_ticks(mut self, ticks: u32) -> Self {
        self.interval_ticks = ticks.max(1);
        self
    }

    /// Call once per host tick. Polls every `interval_ticks`.
    pub fn on_tick(&mut self, host: &mut dyn HostAdapter) -> Option<Vec<PollOutcome>> {
        self.ticks += 1;
        if self.ticks % u64::from(self.interval_ticks) != 0 {
            return None;
        }
        Some(self.poll_all(host))
    }

    /// Poll every online player, then run the enforcement backstop for any
    /// player the poll itself did not enforce.
    pub fn poll_all(&mut self, host: &mut dyn HostAdapter) -> Vec<PollOutcome> {
        let players = host.online_players();
        let mut out = Vec::with_capacity(players.len());
        for player in players {
            let mut outcome = self.poll_player(host, player);
            if outcome.enforcement.is_none() {
                outcome.enforcement = Some(self.enforcer.enforce(host, player));
            }
            out.push(outcome);
        }
        out
    }

    pub fn poll_player(&self, host: &mut dyn HostAdapter, player: PlayerId) -> PollOutcome {
        let cur = match read_snapshot(host, player) {
            Ok(s) => s,
            Err(HostError::NotReady) => {
                debug!(player=%player, "player data not ready; skipping poll");
                return PollOutcome {
                    player,
                    status: PollStatus::NotReady,
                    enforcement: None,
                };
            }
            Err(e) => {
                warn!(player=%player, err=%e, "host data unreadable; skipping poll");
                return PollOutcome {
                    player,
                    status: PollStatus::NotReady,
                    enforcement: None,
                };
            }
        };

        let Some(prev) = self.sessions.snapshot(player) else {
            debug!(player=%player, level = cur.level, "seeding progression snapshot");
            self.sessions.store_snapshot(player, cur);
            return PollOutcome {
                player,
                status: PollStatus::ColdStart,
                enforcement: None,
            };
        };

        let mut new_capabilities = Vec::new();
        for kind in CapabilityKind::ALL.iter().copied() {
            for name in cur.added_since(&prev, kind) {
                match self.registry.location_id(name) {
                    Some(id) => {
                        info!(player=%player, name=%name, location = id, "new capability detected");
                        self.sink.location_reached(id);
                    }
                    None => warn!(player=%player, name=%name, "no location id for capability"),
                }
                new_capabilities.push(name.clone());
            }
        }

        let milestones = milestones_crossed(prev.level, cur.level);
        for m in &milestones {
            if let Some(id) = Registry::level_milestone_location(*m) {
                info!(player=%player, milestone = *m, location = id, "level milestone reached");
                self.sink.location_reached(id);
            }
        }

        if cur.level != prev.level && cur.level >= self.sink.goal_level() && self.sink.goal_reached()
        {
            info!(player=%player, level = cur.level, "goal level reached");
            host.notify(player, &Notice::GoalComplete);
        }

        let enforcement = if new_capabilities.is_empty() {
            None
        } else {
            Some(self.enforcer.enforce(host, player))
        };

        self.sessions.store_snapshot(player, cur);

        PollOutcome {
            player,
            status: PollStatus::Diffed {
                new_capabilities,
                milestones,
            },
            enforcement,
        }
    }

    /// Progressive quest counter: the Nth completion checks "Quest Completion N".
    pub fn on_quest_completed(&mut self, player: PlayerId) -> Option<i64> {
        self.quests_completed += 1;
        let n = self.quests_completed;
        let id = Registry::quest_location(n);
        match id {
            Some(id) => {
                info!(player=%player, quest = n, location = id, "quest completed");
                self.sink.location_reached(id);
            }
            None => debug!(player=%player, quest = n, "quest beyond tracked range"),
        }
        id
    }

    pub fn quests_completed(&self) -> u32 {
        self.quests_completed
    }

    pub fn on_collectible_found(&self, player: PlayerId, name: &str) -> Option<i64> {
        let id = Registry::collectible_location(name);
        match id {
            Some(id) => {
                info!(player=%player, collectible = name, location = id, "collectible found");
                self.sink.location_reached(id);
            }
            None => debug!(player=%player, collectible = name, "not a tracked collectible"),
        }
        id
    }

    /// `total` is the player's lifetime vault completions.
    pub fn on_vault_completed(&self, player: PlayerId, total: u32) -> Vec<i64> {
        let ids: Vec<i64> = VAULT_MILESTONES
            .iter()
            .filter(|m| **m <= total)
            .filter_map(|m| Registry::vault_milestone_location(*m))
            .collect();
        for id in &ids {
            self.sink.location_reached(*id);
        }
        debug!(player=%player, total, milestones = ids.len(), "vault completed");
        ids
    }

    pub fn on_logout(&self, player: PlayerId) {
        self.sessions.forget(player);
    }
}

/// Thresholds in `(prev, cur]`, ascending.
pub fn milestones_crossed(prev: u32, cur: u32) -> Vec<u32> {
    LEVEL_MILESTONES
        .iter()
        .copied()
        .filter(|m| prev < *m && *m <= cur)
        .collect()
}

fn read_snapshot(
    host: &mut dyn HostAdapter,
    player: PlayerId,
) -> Result<ProgressionSnapshot, HostError> {
    let mut snap = ProgressionSnapshot::new(host.level(player)?);
    for kind in CapabilityKind::ALL.iter().copied() {
        let names: BTreeSet<CapabilityName> = host
            .active_capabilities(player, kind)?
            .iter()
            .map(|raw| CapabilityName::new(kind, raw))
            .collect();
        snap.set_active(kind, names);
    }
    Ok(snap)
}
