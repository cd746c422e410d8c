use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `StatusUpdate` code meaning "this slot reached its goal".
pub const GOAL_COMPLETE_STATUS: i32 = 30;

/// Request every item-visibility category: items from other worlds, items
/// found in our own world, and our starting inventory.
pub const ITEMS_HANDLING_ALL: i32 = 0b111;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub class: &'static str,
}

impl NetworkVersion {
    pub const CURRENT: Self = Self {
        major: 0,
        minor: 5,
        build: 1,
        class: "Version",
    };
}

/// Commands we send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd")]
pub enum ClientCommand {
    Connect {
        game: String,
        name: String,
        uuid: String,
        version: NetworkVersion,
        items_handling: i32,
        slot_data: bool,
        password: String,
        tags: Vec<String>,
    },
    LocationChecks {
        locations: Vec<i32>,
    },
    StatusUpdate {
        status: i32,
    },
}

impl ClientCommand {
    pub fn connect(game: &str, slot: &str, uuid: &str, password: Option<&str>) -> Self {
        ClientCommand::Connect {
            game: game.to_string(),
            name: slot.to_string(),
            uuid: uuid.to_string(),
            version: NetworkVersion::CURRENT,
            items_handling: ITEMS_HANDLING_ALL,
            slot_data: true,
            password: password.unwrap_or_default().to_string(),
            tags: Vec::new(),
        }
    }

    pub fn goal_complete() -> Self {
        ClientCommand::StatusUpdate {
            status: GOAL_COMPLETE_STATUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NetworkItem {
    pub item: i64,
    pub location: i64,
    #[serde(default)]
    pub player: i64,
    #[serde(default)]
    pub flags: i64,
}

/// One run of rich text inside `PrintJSON`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextPart {
    #[serde(default)]
    pub text: String,
}

/// Commands the server sends that we understand.
///
/// Unknown fields are ignored so newer servers stay compatible.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd")]
pub enum ServerCommand {
    RoomInfo {
        #[serde(default)]
        seed_name: Option<String>,
    },
    Connected {
        slot: i64,
        team: i64,
        #[serde(default)]
        slot_data: Value,
    },
    ReceivedItems {
        #[serde(default)]
        index: i64,
        items: Vec<NetworkItem>,
    },
    LocationInfo {
        #[serde(default)]
        locations: Vec<NetworkItem>,
    },
    Print {
        text: String,
    },
    #[serde(rename = "PrintJSON")]
    PrintJson {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        data: Vec<TextPart>,
    },
    ConnectionRefused {
        #[serde(default)]
        errors: Vec<String>,
    },
    Retrieved {},
    SetReply {},
    Bounced {},
}

impl ServerCommand {
    pub const NAMES: &'static [&'static str] = &[
        "RoomInfo",
        "Connected",
        "ReceivedItems",
        "LocationInfo",
        "Print",
        "PrintJSON",
        "ConnectionRefused",
        "Retrieved",
        "SetReply",
        "Bounced",
    ];

    /// Plain text for the player's chat, if this command carries any.
    pub fn display_text(&self) -> Option<String> {
        match self {
            ServerCommand::Print { text } => Some(text.clone()),
            ServerCommand::PrintJson { text: Some(t), .. } => Some(t.clone()),
            ServerCommand::PrintJson { text: None, data } => {
                let s: String = data.iter().map(|p| p.text.as_str()).collect();
                if s.is_empty() {
                    None
                } else {
                    Some(s)
                }
            }
            _ => None,
        }
    }

    /// First refusal reason, or "Unknown".
    pub fn refusal_reason(&self) -> Option<String> {
        match self {
            ServerCommand::ConnectionRefused { errors } => Some(
                errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            _ => None,
        }
    }
}
