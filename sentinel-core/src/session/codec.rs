//! JSON wire format for report requests and responses.

use serde::{Deserialize, Serialize};

use super::{Command, CommandLocation, CommandWrapper};

/// Report body POSTed to the management service.
#[derive(Serialize, Debug, Eq, PartialEq)]
pub struct ReportRequest<'a> {
    #[serde(rename = "pcName")]
    pub pc_name: &'a str,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<&'a str>,
    #[serde(rename = "isAlive")]
    pub is_alive: bool,
    #[serde(rename = "isOpened")]
    pub is_opened: bool,
    #[serde(rename = "sessionID")]
    pub session_id: &'a str,
}

/// Failure to produce or interpret a body.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodecError {
    BufferTooSmall,
    InvalidJson,
}

/// Serializes `request` into `buffer`, returning the encoded length.
pub fn encode_request(request: &ReportRequest<'_>, buffer: &mut [u8]) -> Result<usize, CodecError> {
    serde_json_core::to_slice(request, buffer).map_err(|_| CodecError::BufferTooSmall)
}

#[derive(Deserialize)]
struct CommandFlag {
    #[serde(rename = "turnOffPC", default)]
    turn_off_pc: Option<bool>,
}

#[derive(Deserialize)]
struct DataWrapped {
    #[serde(default)]
    data: Option<CommandFlag>,
}

#[derive(Deserialize)]
struct CommandWrapped {
    #[serde(default)]
    command: Option<CommandFlag>,
}

/// Any JSON object; every member is skipped.
#[derive(Deserialize)]
struct Envelope {}

/// Interprets a successful response body.
///
/// An empty body acknowledges without a command. A JSON object whose command
/// field cannot be read as a boolean still acknowledges, flagged as
/// [`Command::Malformed`]. Anything that is not a JSON object is an error.
pub fn decode_response(body: &[u8], location: CommandLocation) -> Result<Command, CodecError> {
    let body = body.trim_ascii();
    if body.is_empty() {
        return Ok(Command::None);
    }

    let flag = match location {
        CommandLocation::TopLevel => {
            serde_json_core::from_slice::<CommandFlag>(body).map(|(parsed, _)| parsed.turn_off_pc)
        }
        CommandLocation::Nested(CommandWrapper::Data) => {
            serde_json_core::from_slice::<DataWrapped>(body)
                .map(|(parsed, _)| parsed.data.and_then(|inner| inner.turn_off_pc))
        }
        CommandLocation::Nested(CommandWrapper::Command) => {
            serde_json_core::from_slice::<CommandWrapped>(body)
                .map(|(parsed, _)| parsed.command.and_then(|inner| inner.turn_off_pc))
        }
    };

    match flag {
        Ok(Some(true)) => Ok(Command::PowerOff),
        Ok(Some(false) | None) => Ok(Command::None),
        Err(_) => match serde_json_core::from_slice::<Envelope>(body) {
            Ok(_) => Ok(Command::Malformed),
            Err(_) => Err(CodecError::InvalidJson),
        },
    }
}
