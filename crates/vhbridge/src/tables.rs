//! Static id tables. Offsets into these slices are protocol ids
//! (`base + index`); reordering an entry breaks network compatibility.

/// Skill locations, 43000 + i.
pub const SKILL_LOCATIONS: &[&str] = &[
    "nova",
    "fireball",
    "javelin",
    "stonefall",
    "ice_bolt",
    "implode",
    "shield_bash",
    "arcane",
    "earthquake",
    "lightning_strike",
    "chaos_cube",
    "vein_miner",
    "ghost_walk",
    "heal",
    "dash",
    "hunter",
    "mega_jump",
    "mana_shield",
    "taunt",
    "battle_cry",
    "smite",
    "empower",
    "rejuvenation_totem",
    "shell",
    "rampage",
    "storm_arrow",
];

/// Skill items, 43000 + i. Item order differs from location order.
pub const SKILL_ITEMS: &[&str] = &[
    "nova",
    "fireball",
    "javelin",
    "stonefall",
    "ice_bolt",
    "implode",
    "shield_bash",
    "arcane",
    "earthquake",
    "lightning_strike",
    "dash",
    "vein_miner",
    "ghost_walk",
    "rampage",
    "mega_jump",
    "shell",
    "taunt",
    "heal",
    "angel",
    "empower",
    "hunter",
    "smite",
    "storm_arrow",
    "battle_cry",
    "rejuvenation_totem",
    "mana_shield",
    "chaos_cube",
];

/// Talents, 43100 + i (items and locations).
pub const TALENTS: &[&str] = &[
    "speed",
    "haste",
    "strength",
    "intelligence",
    "nucleus",
    "daze",
    "last_stand",
    "berserking",
    "sorcery",
    "witchery",
    "frozen_impact",
    "frostbite",
    "methodical",
    "depleted",
    "prudent",
    "stoneskin",
    "blight",
    "toxic_reaction",
    "arcana",
    "blazing",
    "lucky_momentum",
    "frenzy",
    "lightning_finesse",
    "lightning_mastery",
    "prime_amplification",
    "hunter's_instinct",
    "purist",
    "farmer_twerker",
    "bountiful_harvest",
    "treasure_seeker",
    "horde_mastery",
    "champion_mastery",
    "assassin_mastery",
    "dungeon_mastery",
    "fatal_strike",
    "mana_steal",
    "life_leech",
    "cleave",
    "throw_power",
    "damage",
    "conduct",
    "ethereal",
];

/// Mod research, 43200 + i (items and locations).
pub const MOD_RESEARCH: &[&str] = &[
    "colossal_chests",
    "simple_storage_network",
    "drawers",
    "mekanism_qio",
    "refined_storage",
    "applied_energistics",
    "stack_upgrading",
    "auto_refill",
    "auto_feeding",
    "double_pouches",
    "belts",
    "backpacks",
    "big_backpacks",
    "soul_harvester",
    "junk_management",
    "iron_generators",
    "powah",
    "flux_networks",
    "thermal_dynamos",
    "mekanism_generators",
    "botania_flux_field",
    "building_gadgets",
    "weirding_gadgets",
    "mining_gadgets",
    "laser_bridges",
    "digital_miner",
    "entangled",
    "botania",
    "mekanism",
    "thermal_expansion",
    "create",
    "waystones",
    "torchmaster",
    "trashcans",
    "elevators",
    "altar_automation",
    "xnet",
    "modular_routers",
    "pipez",
    "iron_furnaces",
    "vault_filters",
    "dark_utilities",
    "automatic_genius",
    "easy_villagers",
    "easy_piglins",
    "botany_pots",
    "snad",
    "cagerium",
    "mob_spawners",
    "phytogenic_insulator",
    "potions",
    "mixtures",
    "brews",
    "vault_compass",
    "map_markers",
    "vault_map",
    "vault_decks",
];

/// Expertises, 43300 + i (items and locations).
pub const EXPERTISES: &[&str] = &[
    "lucky_altar",
    "fortuitous_finesse",
    "fortunate",
    "experienced",
    "infuser",
    "crystalmancer",
    "trinketer",
    "divine",
    "unbreakable",
    "marketer",
    "bounty_hunter",
    "angel",
    "jeweler",
    "artisan",
    "bartering",
    "companion's_loyalty",
];

/// Milestone locations, 43400 + i.
pub const MILESTONES: &[&str] = &[
    "level_10",
    "level_25",
    "level_50",
    "level_75",
    "level_100",
    "first_vault",
    "complete_10_vaults",
    "complete_25_vaults",
    "complete_50_vaults",
];

/// Level thresholds for `MILESTONES[0..5]`.
pub const LEVEL_MILESTONES: &[u32] = &[10, 25, 50, 75, 100];

/// Vault-completion thresholds for `MILESTONES[5..9]`.
pub const VAULT_MILESTONES: &[u32] = &[1, 10, 25, 50];

/// Collectible (trinket) locations, 43600 + i.
pub const COLLECTIBLES: &[&str] = &[
    "Carapace",
    "Portable Cat",
    "Slimey",
    "Prismatic Feather",
    "Ender Anchor",
    "Elvish Air",
    "Gluttony Pendant",
    "Golden Burger",
    "The Frog",
    "Treasure Goggles",
    "Velara's Petal",
    "Wendarr's Hourglass",
    "Stone of Jordan",
    "Wings",
    "Chromatic Powder",
    "Clover",
    "Cufflings",
    "Spellbook",
    "Crystal Ball",
    "Giant's Heart",
    "Idona's Pendant",
    "Picture of a Lucky Goose",
    "Phylactery",
    "Tenos' Necklace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillerEntry {
    pub item: &'static str,
    pub base_count: u32,
}

const fn f(item: &'static str, base_count: u32) -> FillerEntry {
    FillerEntry { item, base_count }
}

/// Placeholder slot in `FILLER`; grants nothing.
pub const FILLER_PLACEHOLDER: usize = 34;

/// Filler rewards, 33700 + i.
pub const FILLER: &[FillerEntry] = &[
    f("the_vault:cooked_vault_steak", 8),
    f("the_vault:chromatic_iron_ingot", 24),
    f("minecraft:shulker_box", 1),
    f("minecraft:experience_bottle", 20),
    f("minecraft:emerald", 50),
    f("minecraft:ender_pearl", 1),
    f("sophisticatedbackpacks:backpack", 1),
    f("sophisticatedbackpacks:pickup_upgrade", 1),
    f("sophisticatedbackpacks:void_upgrade", 1),
    f("the_vault:bounty_pearl", 10),
    f("the_vault:chromatic_iron_ingot", 32),
    f("the_vault:gemstone", 2),
    f("the_vault:chromatic_steel_ingot", 4),
    f("the_vault:vault_gold", 1),
    f("the_vault:vault_plating", 9),
    f("minecraft:diamond", 5),
    f("the_vault:vault_bronze", 81),
    f("the_vault:magnetite_ingot", 1),
    f("the_vault:vault_alloy", 1),
    f("the_vault:wild_focus", 1),
    f("the_vault:vault_plating", 12),
    f("the_vault:vault_bronze", 32),
    f("the_vault:vault_scrap", 1),
    f("the_vault:vault_gold", 1),
    f("the_vault:vault_diamond", 1),
    f("the_vault:plain_burger", 1),
    f("the_vault:crystal_seal_scout", 1),
    f("the_vault:silver_scrap", 1),
    f("the_vault:soul_shard", 1),
    f("the_vault:helmet", 1),
    f("the_vault:chestplate", 1),
    f("the_vault:leggings", 1),
    f("the_vault:boots", 1),
    f("the_vault:mod_box", 1),
    f("minecraft:barrier", 0),
    f("the_vault:crystal_seal_sage", 1),
    f("the_vault:phoenix_feather", 1),
    f("the_vault:vault_catalyst_fragment", 1),
    f("the_vault:inscription_piece", 1),
    f("the_vault:unidentified_artifact", 1),
    f("the_vault:vault_gold", 4),
    f("the_vault:trinket", 1),
    f("the_vault:vault_diamond", 4),
    f("the_vault:vault_gold", 20),
    f("the_vault:gem_pog", 1),
    f("minecraft:netherite_ingot", 1),
    f("the_vault:wardrobe", 1),
    f("the_vault:vault_bronze", 64),
    f("the_vault:gem_echo", 1),
    f("the_vault:mod_box", 2),
    f("the_vault:sour_orange", 1),
    f("minecraft:bamboo", 1),
    f("the_vault:trinket", 1),
    f("the_vault:vault_gold", 64),
    f("the_vault:neuralizer", 1),
    f("the_vault:perfect_echo_gem", 1),
    f("the_vault:lost_bounty", 1),
    f("the_vault:ember", 1),
    f("the_vault:omega_pog", 1),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_sizes_are_pinned() {
        assert_eq!(SKILL_LOCATIONS.len(), 26);
        assert_eq!(SKILL_ITEMS.len(), 27);
        assert_eq!(TALENTS.len(), 42);
        assert_eq!(MOD_RESEARCH.len(), 57);
        assert_eq!(EXPERTISES.len(), 16);
        assert_eq!(MILESTONES.len(), LEVEL_MILESTONES.len() + VAULT_MILESTONES.len());
        assert_eq!(COLLECTIBLES.len(), 24);
        assert_eq!(FILLER.len(), 59);
        assert_eq!(FILLER[FILLER_PLACEHOLDER].base_count, 0);
    }
}
