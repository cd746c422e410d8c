//! In-process host used by the simulator binary and the test suites.

use std::collections::{HashMap, HashSet};

use crate::capability::{CapabilityKind, CapabilityName, Resource};
use crate::host::{GameRule, HostAdapter, HostError, Notice, Reward};
use crate::players::PlayerId;

#[derive(Debug, Default)]
struct PlayerState {
    name: String,
    level: u32,
    ready: bool,
    schema_broken: bool,
    active: [Vec<String>; 4],
    resources: HashMap<Resource, i64>,
    messages: Vec<String>,
    rewards: Vec<Reward>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    order: Vec<PlayerId>,
    players: HashMap<PlayerId, PlayerState>,
    costs: HashMap<CapabilityName, u32>,
    failing_resets: HashSet<CapabilityName>,
    failing_adjust: bool,
    rules: HashMap<&'static str, &'static str>,
    hook_log: Vec<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, player: PlayerId, name: &str) {
        if !self.players.contains_key(&player) {
            self.order.push(player);
        }
        let st = self.players.entry(player).or_default();
        st.name = name.to_string();
        st.ready = true;
    }

    pub fn leave(&mut self, player: PlayerId) {
        self.order.retain(|p| *p != player);
        self.players.remove(&player);
    }

    pub fn player_name(&self, player: PlayerId) -> Option<&str> {
        self.players.get(&player).map(|p| p.name.as_str())
    }

    pub fn find_player(&self, name: &str) -> Option<PlayerId> {
        self.order
            .iter()
            .copied()
            .find(|p| self.player_name(*p).is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn set_level(&mut self, player: PlayerId, level: u32) {
        if let Some(p) = self.players.get_mut(&player) {
            p.level = level;
        }
    }

    pub fn set_ready(&mut self, player: PlayerId, ready: bool) {
        if let Some(p) = self.players.get_mut(&player) {
            p.ready = ready;
        }
    }

    pub fn set_schema_broken(&mut self, player: PlayerId, broken: bool) {
        if let Some(p) = self.players.get_mut(&player) {
            p.schema_broken = broken;
        }
    }

    /// Host-side acquisition, bypassing any gate.
    pub fn learn(&mut self, player: PlayerId, kind: CapabilityKind, name: &str) {
        if let Some(p) = self.players.get_mut(&player) {
            let want = CapabilityName::new(kind, name);
            let list = &mut p.active[kind.index()];
            if !list.iter().any(|n| CapabilityName::new(kind, n) == want) {
                list.push(name.to_string());
            }
        }
    }

    pub fn has(&self, player: PlayerId, kind: CapabilityKind, name: &str) -> bool {
        let want = CapabilityName::new(kind, name);
        self.players.get(&player).is_some_and(|p| {
            p.active[kind.index()]
                .iter()
                .any(|n| CapabilityName::new(kind, n) == want)
        })
    }

    pub fn set_cost(&mut self, kind: CapabilityKind, name: &str, cost: u32) {
        self.costs.insert(CapabilityName::new(kind, name), cost);
    }

    pub fn fail_reset(&mut self, kind: CapabilityKind, name: &str) {
        self.failing_resets.insert(CapabilityName::new(kind, name));
    }

    /// Make every resource adjustment fail.
    pub fn fail_adjust(&mut self, on: bool) {
        self.failing_adjust = on;
    }

    pub fn balance(&self, player: PlayerId, resource: Resource) -> i64 {
        self.players
            .get(&player)
            .and_then(|p| p.resources.get(&resource).copied())
            .unwrap_or(0)
    }

    pub fn messages(&self, player: PlayerId) -> Vec<String> {
        self.players
            .get(&player)
            .map(|p| p.messages.clone())
            .unwrap_or_default()
    }

    pub fn take_messages(&mut self, player: PlayerId) -> Vec<String> {
        self.players
            .get_mut(&player)
            .map(|p| std::mem::take(&mut p.messages))
            .unwrap_or_default()
    }

    pub fn rewards(&self, player: PlayerId) -> Vec<Reward> {
        self.players
            .get(&player)
            .map(|p| p.rewards.clone())
            .unwrap_or_default()
    }

    pub fn rule(&self, key: &str) -> Option<&'static str> {
        self.rules.get(key).copied()
    }

    pub fn hook_log(&self) -> &[String] {
        &self.hook_log
    }

    fn readable(&self, player: PlayerId) -> Result<&PlayerState, HostError> {
        let p = self.players.get(&player).ok_or(HostError::NotReady)?;
        if p.schema_broken {
            return Err(HostError::Schema("ability tree missing".into()));
        }
        if !p.ready {
            return Err(HostError::NotReady);
        }
        Ok(p)
    }
}

impl HostAdapter for MemoryHost {
    fn online_players(&self) -> Vec<PlayerId> {
        self.order.clone()
    }

    fn level(&self, player: PlayerId) -> Result<u32, HostError> {
        Ok(self.readable(player)?.level)
    }

    fn active_capabilities(
        &self,
        player: PlayerId,
        kind: CapabilityKind,
    ) -> Result<Vec<String>, HostError> {
        Ok(self.readable(player)?.active[kind.index()].clone())
    }

    fn capability_cost(
        &self,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<u32, HostError> {
        self.readable(player)?;
        self.costs
            .get(&CapabilityName::new(kind, name))
            .copied()
            .ok_or_else(|| HostError::Schema(format!("no cost for {name}")))
    }

    fn before_reset(
        &mut self,
        _player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<(), HostError> {
        self.hook_log
            .push(format!("remove {}", CapabilityName::new(kind, name)));
        Ok(())
    }

    fn reset_capability(
        &mut self,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<(), HostError> {
        let want = CapabilityName::new(kind, name);
        if self.failing_resets.contains(&want) {
            return Err(HostError::Rejected(format!("{want} is pinned")));
        }
        let p = self.players.get_mut(&player).ok_or(HostError::NotReady)?;
        p.active[kind.index()].retain(|n| CapabilityName::new(kind, n) != want);
        Ok(())
    }

    fn after_reset(
        &mut self,
        _player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<(), HostError> {
        self.hook_log.push(format!("add {}", CapabilityName::new(kind, name)));
        Ok(())
    }

    fn resource_balance(&self, player: PlayerId, resource: Resource) -> Result<i64, HostError> {
        self.readable(player)?;
        Ok(self.balance(player, resource))
    }

    fn adjust_resource(
        &mut self,
        player: PlayerId,
        resource: Resource,
        delta: i32,
    ) -> Result<(), HostError> {
        if self.failing_adjust {
            return Err(HostError::Rejected(format!("{} is frozen", resource.as_str())));
        }
        let p = self.players.get_mut(&player).ok_or(HostError::NotReady)?;
        *p.resources.entry(resource).or_insert(0) += i64::from(delta);
        Ok(())
    }

    fn grant_reward(&mut self, player: PlayerId, reward: &Reward) -> Result<(), HostError> {
        let p = self.players.get_mut(&player).ok_or(HostError::NotReady)?;
        p.rewards.push(reward.clone());
        Ok(())
    }

    fn set_game_rule(&mut self, rule: GameRule) -> Result<(), HostError> {
        self.rules.insert(rule.key(), rule.value());
        Ok(())
    }

    fn notify(&mut self, player: PlayerId, notice: &Notice) {
        if let Some(p) = self.players.get_mut(&player) {
            p.messages.push(notice.to_string());
        }
    }
}
