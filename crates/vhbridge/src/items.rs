use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::capability::{CapabilityName, Resource};
use crate::host::{GameRule, GearSlot, HostAdapter, HostError, LootRate, Notice, Reward, XpRate};
use crate::players::PlayerId;
use crate::registry::{Registry, FILLER_BASE, RANGE_WIDTH};
use crate::rng::Rng64;
use crate::tables::{FILLER, FILLER_PLACEHOLDER};
use crate::unlocks::UnlockStore;

pub const ITEM_SKILL_POINT: i64 = 43500;
pub const ITEM_EXPERTISE_POINT: i64 = 43501;
pub const ITEM_KNOWLEDGE_STAR: i64 = 43502;
pub const ITEM_VAULT_BRONZE: i64 = 43503;
pub const ITEM_VAULT_SILVER: i64 = 43504;
pub const ITEM_VAULT_GOLD: i64 = 43505;
pub const ITEM_XP_NORMAL: i64 = 43510;
pub const ITEM_XP_DOUBLE: i64 = 43511;
pub const ITEM_XP_TRIPLE: i64 = 43512;
pub const ITEM_LOOT_NORMAL: i64 = 43520;
pub const ITEM_LOOT_PLENTY: i64 = 43521;
pub const ITEM_LOOT_EXTREME: i64 = 43522;

/// Filler counts are scaled by one of these, in quarters (1.0x .. 2.0x).
const FILLER_QUARTERS: [u32; 5] = [4, 5, 6, 7, 8];

/// What a received item id does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemGrant {
    Capability(CapabilityName),
    Points(Resource),
    Currency(&'static str),
    Rule(GameRule),
    Filler(usize),
    Unknown,
}

impl ItemGrant {
    pub fn classify(item_id: i64) -> Self {
        if let Some(name) = Registry::item_capability(item_id) {
            return ItemGrant::Capability(name);
        }
        match item_id {
            ITEM_SKILL_POINT => ItemGrant::Points(Resource::SkillPoints),
            ITEM_EXPERTISE_POINT => ItemGrant::Points(Resource::ExpertisePoints),
            ITEM_KNOWLEDGE_STAR => ItemGrant::Points(Resource::Knowledge),
            ITEM_VAULT_BRONZE => ItemGrant::Currency("the_vault:vault_bronze"),
            ITEM_VAULT_SILVER => ItemGrant::Currency("the_vault:vault_silver"),
            ITEM_VAULT_GOLD => ItemGrant::Currency("the_vault:vault_gold"),
            ITEM_XP_NORMAL => ItemGrant::Rule(GameRule::Experience(XpRate::Normal)),
            ITEM_XP_DOUBLE => ItemGrant::Rule(GameRule::Experience(XpRate::Double)),
            ITEM_XP_TRIPLE => ItemGrant::Rule(GameRule::Experience(XpRate::Triple)),
            ITEM_LOOT_NORMAL => ItemGrant::Rule(GameRule::Loot(LootRate::Normal)),
            ITEM_LOOT_PLENTY => ItemGrant::Rule(GameRule::Loot(LootRate::Plenty)),
            ITEM_LOOT_EXTREME => ItemGrant::Rule(GameRule::Loot(LootRate::Extreme)),
            id if (FILLER_BASE..FILLER_BASE + RANGE_WIDTH).contains(&id) => {
                let idx = (id - FILLER_BASE) as usize;
                if idx < FILLER.len() {
                    ItemGrant::Filler(idx)
                } else {
                    ItemGrant::Unknown
                }
            }
            _ => ItemGrant::Unknown,
        }
    }
}

/// Turns received items into host effects. Runs on the host thread only.
pub struct ItemApplier {
    unlocks: Arc<UnlockStore>,
    rules: Mutex<HashMap<&'static str, GameRule>>,
    rng: Mutex<Rng64>,
}

impl ItemApplier {
    pub fn new(unlocks: Arc<UnlockStore>) -> Self {
        Self::with_rng(unlocks, Rng64::from_entropy())
    }

    pub fn with_rng(unlocks: Arc<UnlockStore>, rng: Rng64) -> Self {
        Self {
            unlocks,
            rules: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    pub fn apply(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        item_id: i64,
    ) -> Result<ItemGrant, HostError> {
        let grant = ItemGrant::classify(item_id);
        match &grant {
            ItemGrant::Capability(name) => {
                if self.unlocks.unlock(player, name.kind(), name.bare()) {
                    host.notify(player, &Notice::Unlocked(name.clone()));
                }
            }
            ItemGrant::Points(resource) => {
                host.adjust_resource(player, *resource, 1)?;
                info!(player=%player, resource = resource.as_str(), "granted point");
                host.notify(player, &Notice::Received(format!("1 {}", resource.label(1))));
            }
            ItemGrant::Currency(item) => {
                let reward = Reward::Stack {
                    item: item.to_string(),
                    count: 1,
                };
                host.grant_reward(player, &reward)?;
                host.notify(player, &Notice::Received(reward.to_string()));
            }
            ItemGrant::Rule(rule) => self.apply_rule(host, player, *rule)?,
            ItemGrant::Filler(idx) => self.apply_filler(host, player, *idx)?,
            ItemGrant::Unknown => {
                warn!(item_id, "received unknown item id");
            }
        }
        Ok(grant)
    }

    fn apply_rule(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        rule: GameRule,
    ) -> Result<(), HostError> {
        let mut rules = self.rules.lock().unwrap_or_else(|p| p.into_inner());
        if rules.get(rule.key()) == Some(&rule) {
            debug!(rule = rule.key(), value = rule.value(), "game rule already set");
            return Ok(());
        }
        host.set_game_rule(rule)?;
        rules.insert(rule.key(), rule);
        info!(rule = rule.key(), value = rule.value(), "game rule changed");
        host.notify(
            player,
            &Notice::Received(format!("{} set to {}", rule.key(), rule.value())),
        );
        Ok(())
    }

    fn apply_filler(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        idx: usize,
    ) -> Result<(), HostError> {
        if idx == FILLER_PLACEHOLDER {
            warn!(idx, "filler slot is a placeholder; nothing granted");
            return Ok(());
        }
        let Some(entry) = FILLER.get(idx) else {
            return Ok(());
        };

        let reward = match GearSlot::from_item(entry.item) {
            Some(slot) => {
                let level = host.level(player).unwrap_or(0);
                Reward::Gear { slot, level }
            }
            None => {
                let quarters = {
                    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                    FILLER_QUARTERS[rng.below(FILLER_QUARTERS.len())]
                };
                Reward::Stack {
                    item: entry.item.to_string(),
                    count: (entry.base_count * quarters / 4).max(1),
                }
            }
        };

        host.grant_reward(player, &reward)?;
        info!(player=%player, reward=%reward, "granted filler");
        host.notify(player, &Notice::Received(reward.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityKind;
    use crate::memory_host::MemoryHost;
    use crate::unlocks::UnlockQuery;

    fn setup() -> (ItemApplier, Arc<UnlockStore>, MemoryHost, PlayerId) {
        let unlocks = Arc::new(UnlockStore::new());
        let applier = ItemApplier::with_rng(unlocks.clone(), Rng64::from_seed(1));
        let mut host = MemoryHost::new();
        let p = PlayerId(11);
        host.join(p, "Alice");
        (applier, unlocks, host, p)
    }

    #[test]
    fn classify_ranges() {
        assert_eq!(
            ItemGrant::classify(43000),
            ItemGrant::Capability(CapabilityName::new(CapabilityKind::Skill, "nova"))
        );
        assert_eq!(
            ItemGrant::classify(43501),
            ItemGrant::Points(Resource::ExpertisePoints)
        );
        assert_eq!(
            ItemGrant::classify(43521),
            ItemGrant::Rule(GameRule::Loot(LootRate::Plenty))
        );
        assert_eq!(ItemGrant::classify(33700), ItemGrant::Filler(0));
        assert_eq!(ItemGrant::classify(33758), ItemGrant::Filler(58));
        assert_eq!(ItemGrant::classify(33759), ItemGrant::Unknown);
        assert_eq!(ItemGrant::classify(43099), ItemGrant::Unknown);
        assert_eq!(ItemGrant::classify(1), ItemGrant::Unknown);
    }

    #[test]
    fn capability_item_unlocks_and_notifies_once() {
        let (a, unlocks, mut host, p) = setup();
        a.apply(&mut host, p, 43101).unwrap();
        a.apply(&mut host, p, 43101).unwrap();
        assert!(unlocks.is_unlocked_silent(p, CapabilityKind::Talent, "haste"));
        assert_eq!(host.messages(p), vec!["[AP] Unlocked Talent: Haste"]);
    }

    #[test]
    fn points_and_rules() {
        let (a, _, mut host, p) = setup();
        a.apply(&mut host, p, ITEM_SKILL_POINT).unwrap();
        a.apply(&mut host, p, ITEM_KNOWLEDGE_STAR).unwrap();
        assert_eq!(host.balance(p, Resource::SkillPoints), 1);
        assert_eq!(host.balance(p, Resource::Knowledge), 1);

        a.apply(&mut host, p, ITEM_XP_DOUBLE).unwrap();
        a.apply(&mut host, p, ITEM_XP_DOUBLE).unwrap();
        assert_eq!(host.rule("vaultExperience"), Some("DOUBLE"));
        let rule_msgs = host
            .messages(p)
            .into_iter()
            .filter(|m| m.contains("vaultExperience"))
            .count();
        assert_eq!(rule_msgs, 1);
    }

    #[test]
    fn filler_scales_count_and_gear_uses_level() {
        let (a, _, mut host, p) = setup();
        host.set_level(p, 37);

        a.apply(&mut host, p, FILLER_BASE + 4).unwrap(); // 50 emeralds
        a.apply(&mut host, p, FILLER_BASE + 29).unwrap(); // helmet
        a.apply(&mut host, p, FILLER_BASE + FILLER_PLACEHOLDER as i64)
            .unwrap();

        let rewards = host.rewards(p);
        assert_eq!(rewards.len(), 2);
        match &rewards[0] {
            Reward::Stack { item, count } => {
                assert_eq!(item, "minecraft:emerald");
                assert!((50..=100).contains(count));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            rewards[1],
            Reward::Gear {
                slot: GearSlot::Helmet,
                level: 37
            }
        );
    }
}
