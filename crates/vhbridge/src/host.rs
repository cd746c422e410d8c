//! The narrow surface the bridge needs from the host game.
//!
//! A concrete host binding implements [`HostAdapter`]. All of its methods are
//! called on the host's own simulation thread: directly from the tick hook,
//! or from tasks posted through [`crate::host_queue::HostHandle`].

use std::fmt;

use crate::capability::{CapabilityKind, CapabilityName, Resource};
use crate::players::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Player data is not loaded yet (joining, dimension change). Retry later.
    NotReady,
    /// Host data did not have the expected shape; likely a host version change.
    Schema(String),
    /// The host refused a mutation.
    Rejected(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::NotReady => write!(f, "host data not ready"),
            HostError::Schema(s) => write!(f, "unexpected host data: {s}"),
            HostError::Rejected(s) => write!(f, "host rejected change: {s}"),
        }
    }
}

impl std::error::Error for HostError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XpRate {
    Normal,
    Double,
    Triple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LootRate {
    Normal,
    Plenty,
    Extreme,
}

/// Global rules a received item can switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameRule {
    Experience(XpRate),
    Loot(LootRate),
}

impl GameRule {
    pub fn key(self) -> &'static str {
        match self {
            GameRule::Experience(_) => "vaultExperience",
            GameRule::Loot(_) => "vaultLoot",
        }
    }

    pub fn value(self) -> &'static str {
        match self {
            GameRule::Experience(XpRate::Normal) | GameRule::Loot(LootRate::Normal) => "NORMAL",
            GameRule::Experience(XpRate::Double) => "DOUBLE",
            GameRule::Experience(XpRate::Triple) => "TRIPLE",
            GameRule::Loot(LootRate::Plenty) => "PLENTY",
            GameRule::Loot(LootRate::Extreme) => "EXTREME",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GearSlot {
    Helmet,
    Chestplate,
    Leggings,
    Boots,
}

impl GearSlot {
    pub fn from_item(item: &str) -> Option<Self> {
        match item.rsplit(':').next()? {
            "helmet" => Some(GearSlot::Helmet),
            "chestplate" => Some(GearSlot::Chestplate),
            "leggings" => Some(GearSlot::Leggings),
            "boots" => Some(GearSlot::Boots),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GearSlot::Helmet => "helmet",
            GearSlot::Chestplate => "chestplate",
            GearSlot::Leggings => "leggings",
            GearSlot::Boots => "boots",
        }
    }
}

/// Something physical handed to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reward {
    Stack { item: String, count: u32 },
    Gear { slot: GearSlot, level: u32 },
}

impl fmt::Display for Reward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reward::Stack { item, count } => {
                let short = item.rsplit(':').next().unwrap_or(item);
                write!(f, "{count}x {short}")
            }
            Reward::Gear { slot, level } => write!(f, "Vault {} (Level {level})", slot.as_str()),
        }
    }
}

/// Player-facing messages. `Display` renders the chat text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connected { slot_name: String },
    Disconnected,
    Relay(String),
    Unlocked(CapabilityName),
    /// Attempted use of something not yet received.
    Locked(CapabilityName),
    /// Forced removal by the enforcer.
    Removed(CapabilityName),
    Refunded { resource: Resource, amount: u32 },
    Received(String),
    GoalComplete,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connected { slot_name } => write!(f, "[AP] Connected as {slot_name}"),
            Notice::Disconnected => write!(f, "[AP] Disconnected"),
            Notice::Relay(text) => write!(f, "[AP] {text}"),
            Notice::Unlocked(n) => {
                write!(f, "[AP] Unlocked {}: {}", n.kind().info().label, n.title())
            }
            Notice::Locked(n) => write!(
                f,
                "[AP] {} is locked! You need to receive it from Archipelago first.",
                n.title()
            ),
            Notice::Removed(n) => write!(f, "[AP] {} is locked! It has been removed.", n.title()),
            Notice::Refunded { resource, amount } => {
                write!(f, "[AP] Refunded {amount} {}", resource.label(*amount))
            }
            Notice::Received(what) => write!(f, "[AP] Received: {what}"),
            Notice::GoalComplete => write!(f, "ARCHIPELAGO GOAL COMPLETE!"),
        }
    }
}

pub trait HostAdapter {
    /// Players currently in the session, in join order.
    fn online_players(&self) -> Vec<PlayerId>;

    /// Recipient of items and relayed server text.
    fn active_player(&self) -> Option<PlayerId> {
        self.online_players().into_iter().next()
    }

    fn level(&self, player: PlayerId) -> Result<u32, HostError>;

    /// Raw display names of capabilities the player currently has.
    fn active_capabilities(
        &self,
        player: PlayerId,
        kind: CapabilityKind,
    ) -> Result<Vec<String>, HostError>;

    /// Points spent on `name`, refunded on forced removal.
    fn capability_cost(
        &self,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<u32, HostError>;

    /// Runs before a forced reset so the host can tear down derived state.
    fn before_reset(
        &mut self,
        _player: PlayerId,
        _kind: CapabilityKind,
        _name: &str,
    ) -> Result<(), HostError> {
        Ok(())
    }

    /// Return `name` to its baseline (unlearned) state.
    fn reset_capability(
        &mut self,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> Result<(), HostError>;

    /// Runs after a forced reset so the host can rebuild derived state.
    fn after_reset(
        &mut self,
        _player: PlayerId,
        _kind: CapabilityKind,
        _name: &str,
    ) -> Result<(), HostError> {
        Ok(())
    }

    fn resource_balance(&self, player: PlayerId, resource: Resource) -> Result<i64, HostError>;

    fn adjust_resource(
        &mut self,
        player: PlayerId,
        resource: Resource,
        delta: i32,
    ) -> Result<(), HostError>;

    fn grant_reward(&mut self, player: PlayerId, reward: &Reward) -> Result<(), HostError>;

    fn set_game_rule(&mut self, rule: GameRule) -> Result<(), HostError>;

    fn notify(&mut self, player: PlayerId, notice: &Notice);

    fn notify_all(&mut self, notice: &Notice) {
        for p in self.online_players() {
            self.notify(p, notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_text() {
        let n = CapabilityName::new(CapabilityKind::Talent, "haste");
        assert_eq!(
            Notice::Removed(n.clone()).to_string(),
            "[AP] Haste is locked! It has been removed."
        );
        assert_eq!(
            Notice::Locked(n.clone()).to_string(),
            "[AP] Haste is locked! You need to receive it from Archipelago first."
        );
        assert_eq!(Notice::Unlocked(n).to_string(), "[AP] Unlocked Talent: Haste");
        assert_eq!(
            Notice::Refunded {
                resource: Resource::SkillPoints,
                amount: 1
            }
            .to_string(),
            "[AP] Refunded 1 skill point"
        );
        assert_eq!(
            Notice::Connected {
                slot_name: "Hunter".into()
            }
            .to_string(),
            "[AP] Connected as Hunter"
        );
    }

    #[test]
    fn rule_and_reward_text() {
        assert_eq!(GameRule::Loot(LootRate::Plenty).value(), "PLENTY");
        assert_eq!(GameRule::Experience(XpRate::Triple).key(), "vaultExperience");
        assert_eq!(GearSlot::from_item("the_vault:leggings"), Some(GearSlot::Leggings));
        assert_eq!(GearSlot::from_item("the_vault:mod_box"), None);
        assert_eq!(
            Reward::Stack {
                item: "the_vault:vault_gold".into(),
                count: 4
            }
            .to_string(),
            "4x vault_gold"
        );
        assert_eq!(
            Reward::Gear {
                slot: GearSlot::Boots,
                level: 42
            }
            .to_string(),
            "Vault boots (Level 42)"
        );
    }
}
