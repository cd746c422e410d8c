use std::fmt;

use serde::Serialize;

/// Points pools a forced removal refunds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    SkillPoints,
    ExpertisePoints,
    Knowledge,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::SkillPoints => "skill_points",
            Resource::ExpertisePoints => "expertise_points",
            Resource::Knowledge => "knowledge",
        }
    }

    pub fn label(self, amount: u32) -> &'static str {
        match (self, amount) {
            (Resource::SkillPoints, 1) => "skill point",
            (Resource::SkillPoints, _) => "skill points",
            (Resource::ExpertisePoints, 1) => "expertise point",
            (Resource::ExpertisePoints, _) => "expertise points",
            (Resource::Knowledge, 1) => "knowledge star",
            (Resource::Knowledge, _) => "knowledge stars",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Skill,
    Talent,
    Expertise,
    ModResearch,
}

/// Per-kind behavior. Everything that differs between kinds lives here.
#[derive(Debug)]
pub struct KindInfo {
    pub prefix: &'static str,
    pub label: &'static str,
    pub location_base: i64,
    pub refund: Resource,
    /// Ask the host to run its remove/re-add hooks around a forced reset.
    pub recompute_hooks: bool,
}

static KIND_INFO: [KindInfo; 4] = [
    KindInfo {
        prefix: "skill:",
        label: "Skill",
        location_base: 43000,
        refund: Resource::SkillPoints,
        recompute_hooks: true,
    },
    KindInfo {
        prefix: "talent:",
        label: "Talent",
        location_base: 43100,
        refund: Resource::SkillPoints,
        recompute_hooks: true,
    },
    KindInfo {
        prefix: "expertise:",
        label: "Expertise",
        location_base: 43300,
        refund: Resource::ExpertisePoints,
        recompute_hooks: false,
    },
    KindInfo {
        prefix: "mod:",
        label: "Research",
        location_base: 43200,
        refund: Resource::Knowledge,
        recompute_hooks: false,
    },
];

impl CapabilityKind {
    pub const ALL: &'static [Self] = &[
        Self::Skill,
        Self::Talent,
        Self::Expertise,
        Self::ModResearch,
    ];

    pub fn index(self) -> usize {
        match self {
            CapabilityKind::Skill => 0,
            CapabilityKind::Talent => 1,
            CapabilityKind::Expertise => 2,
            CapabilityKind::ModResearch => 3,
        }
    }

    pub fn info(self) -> &'static KindInfo {
        &KIND_INFO[self.index()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityKind::Skill => "skill",
            CapabilityKind::Talent => "talent",
            CapabilityKind::Expertise => "expertise",
            CapabilityKind::ModResearch => "mod_research",
        }
    }

    pub fn prefix(self) -> &'static str {
        self.info().prefix
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skill" | "skills" | "ability" => Some(Self::Skill),
            "talent" | "talents" => Some(Self::Talent),
            "expertise" | "expertises" => Some(Self::Expertise),
            "mod" | "mods" | "research" | "mod_research" => Some(Self::ModResearch),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, kind-prefixed capability name, e.g. `skill:ice_bolt`.
///
/// Normalization lowercases, trims, turns spaces into underscores and strips
/// an existing kind prefix, so normalizing twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityName {
    kind: CapabilityKind,
    key: String,
}

impl CapabilityName {
    pub fn new(kind: CapabilityKind, raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        let bare = lower.strip_prefix(kind.prefix()).unwrap_or(lower.as_str());
        let bare = bare.trim().replace(' ', "_");
        Self {
            kind,
            key: format!("{}{}", kind.prefix(), bare),
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Name without the kind prefix.
    pub fn bare(&self) -> &str {
        &self.key[self.kind.prefix().len()..]
    }

    /// Human-readable form for chat: `ice_bolt` -> `Ice Bolt`.
    pub fn title(&self) -> String {
        self.bare()
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut cs = w.chars();
                match cs.next() {
                    Some(c) => c.to_uppercase().chain(cs).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_display_names() {
        let n = CapabilityName::new(CapabilityKind::Skill, "  Ice Bolt ");
        assert_eq!(n.as_str(), "skill:ice_bolt");
        assert_eq!(n.bare(), "ice_bolt");
        assert_eq!(n.title(), "Ice Bolt");

        let t = CapabilityName::new(CapabilityKind::Talent, "Hunter's Instinct");
        assert_eq!(t.as_str(), "talent:hunter's_instinct");
    }

    #[test]
    fn normalizing_twice_is_identity() {
        let once = CapabilityName::new(CapabilityKind::ModResearch, "Applied Energistics");
        let twice = CapabilityName::new(CapabilityKind::ModResearch, once.as_str());
        assert_eq!(once, twice);
        assert_eq!(twice.as_str(), "mod:applied_energistics");
    }

    #[test]
    fn same_bare_name_differs_by_kind() {
        let a = CapabilityName::new(CapabilityKind::Skill, "angel");
        let b = CapabilityName::new(CapabilityKind::Expertise, "angel");
        assert_ne!(a, b);
    }

    #[test]
    fn kind_parse_and_table() {
        for k in CapabilityKind::ALL {
            assert_eq!(CapabilityKind::parse(k.as_str()), Some(*k));
            assert_eq!(k.info().prefix, KIND_INFO[k.index()].prefix);
        }
        assert_eq!(CapabilityKind::parse(" Mod "), Some(CapabilityKind::ModResearch));
        assert_eq!(CapabilityKind::parse("vault"), None);
        assert_eq!(
            CapabilityKind::Expertise.info().refund,
            Resource::ExpertisePoints
        );
    }
}
