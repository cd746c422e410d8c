//! `approto`: the randomizer network's JSON command protocol.
//!
//! Every message on the wire is a JSON array of command objects, each carrying
//! a string `cmd` discriminator:
//! - `command`: typed client (outbound) and server (inbound) commands
//! - `batch`: array framing, plus tolerant per-element decoding so one bad
//!   element never poisons the rest of a batch

pub mod batch;
pub mod command;

pub use batch::{decode_batch, decode_command, encode_batch, Inbound};
pub use command::{
    ClientCommand, NetworkItem, NetworkVersion, ServerCommand, TextPart, GOAL_COMPLETE_STATUS,
    ITEMS_HANDLING_ALL,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    Json(String),
    MissingCmd,
    Malformed(&'static str),
}

impl std::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtoError::Json(e) => write!(f, "invalid json: {e}"),
            ProtoError::MissingCmd => write!(f, "command object has no cmd"),
            ProtoError::Malformed(s) => write!(f, "malformed command: {s}"),
        }
    }
}

impl std::error::Error for ProtoError {}
