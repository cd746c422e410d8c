use serde_json::Value;

use crate::command::{ClientCommand, ServerCommand};
use crate::ProtoError;

/// One decoded element of an inbound batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command(ServerCommand),
    /// Well-formed object with a `cmd` we don't handle.
    Unhandled(String),
}

/// Frame outbound commands. The outer frame is always an array, even for one
/// command.
pub fn encode_batch(cmds: &[ClientCommand]) -> Result<String, ProtoError> {
    serde_json::to_string(cmds).map_err(|e| ProtoError::Json(e.to_string()))
}

/// Parse one complete message.
///
/// The outer `Err` means the message as a whole was unusable. Otherwise every
/// element is decoded on its own; a broken element yields an inner `Err` and
/// the rest are unaffected.
pub fn decode_batch(text: &str) -> Result<Vec<Result<Inbound, ProtoError>>, ProtoError> {
    let v: Value = serde_json::from_str(text).map_err(|e| ProtoError::Json(e.to_string()))?;
    match v {
        Value::Array(items) => Ok(items.into_iter().map(decode_command).collect()),
        obj @ Value::Object(_) => Ok(vec![decode_command(obj)]),
        _ => Err(ProtoError::Malformed("expected a command object or an array")),
    }
}

pub fn decode_command(v: Value) -> Result<Inbound, ProtoError> {
    let cmd = match v.get("cmd") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(ProtoError::Malformed("cmd is not a string")),
        None => return Err(ProtoError::MissingCmd),
    };
    if !ServerCommand::NAMES.contains(&cmd.as_str()) {
        return Ok(Inbound::Unhandled(cmd));
    }
    serde_json::from_value(v)
        .map(Inbound::Command)
        .map_err(|e| ProtoError::Json(e.to_string()))
}
