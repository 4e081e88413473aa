// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire envelope: a JSON object with a `type` discriminator.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{DeviceInfo, StatusMessage};
use crate::error::ParseError;

/// Discriminator of the unified status message.
pub const STATUS: &str = "status";
/// Discriminator of the device identity message.
pub const DEVICE_INFO: &str = "device_info";
/// Command asking the publisher for a fresh full sync.
pub const REQUEST_STATE: &str = "request_state";
/// Sent by an idle publisher so observers do not consider the link stale.
pub const KEEPALIVE: &str = "keepalive";

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// State delta or full sync.
    Status(Box<StatusMessage>),
    /// Device identity.
    DeviceInfo(Box<DeviceInfo>),
    /// Any other message type, passed through undecoded.
    Other {
        /// Value of the `type` field.
        kind: String,
        /// Remaining fields.
        payload: Map<String, Value>,
    },
}

impl WireMessage {
    /// Decodes a message from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the text is not a JSON object with a string
    /// `type` field, or if a known message type has an invalid body.
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(ParseError::UnexpectedFormat(
                "message is not a JSON object".to_string(),
            ));
        };

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(_) => {
                return Err(ParseError::UnexpectedFormat(
                    "`type` is not a string".to_string(),
                ));
            }
            None => return Err(ParseError::MissingField("type".to_string())),
        };

        let message = match kind.as_str() {
            STATUS => Self::Status(Box::new(serde_json::from_value(Value::Object(fields))?)),
            DEVICE_INFO => Self::DeviceInfo(Box::new(serde_json::from_value(Value::Object(fields))?)),
            _ => Self::Other {
                kind,
                payload: fields,
            },
        };
        Ok(message)
    }

    /// Returns the value of the `type` field.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Status(_) => STATUS,
            Self::DeviceInfo(_) => DEVICE_INFO,
            Self::Other { kind, .. } => kind,
        }
    }

    /// Encodes the message as JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the body cannot be serialized.
    pub fn to_json(&self) -> Result<String, ParseError> {
        match self {
            Self::Status(status) => encode(STATUS, status.as_ref()),
            Self::DeviceInfo(info) => encode(DEVICE_INFO, info.as_ref()),
            Self::Other { kind, payload } => encode(kind, payload),
        }
    }
}

impl From<StatusMessage> for WireMessage {
    fn from(status: StatusMessage) -> Self {
        Self::Status(Box::new(status))
    }
}

impl From<DeviceInfo> for WireMessage {
    fn from(info: DeviceInfo) -> Self {
        Self::DeviceInfo(Box::new(info))
    }
}

/// Encodes `{"type": kind, ...payload}`.
///
/// Object payloads are merged into the envelope; the `type` discriminator
/// always wins over a payload field of the same name. Any other payload is
/// carried under `value`, and a unit/null payload adds nothing.
///
/// # Errors
///
/// Returns `ParseError` if the payload cannot be serialized.
///
/// # Examples
///
/// ```
/// use brewlink::protocol::encode;
/// use serde_json::json;
///
/// let text = encode("command", json!({"cmd": "set_eco", "enabled": true})).unwrap();
/// let value: serde_json::Value = serde_json::from_str(&text).unwrap();
/// assert_eq!(value, json!({"type": "command", "cmd": "set_eco", "enabled": true}));
///
/// let text = encode("set_temp", 93.5).unwrap();
/// assert_eq!(text, r#"{"type":"set_temp","value":93.5}"#);
/// ```
pub fn encode<P: Serialize>(kind: &str, payload: P) -> Result<String, ParseError> {
    let mut envelope = Map::new();
    envelope.insert("type".to_string(), Value::String(kind.to_string()));

    match serde_json::to_value(payload)? {
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "type" {
                    envelope.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            envelope.insert("value".to_string(), other);
        }
    }

    Ok(serde_json::to_string(&envelope)?)
}
