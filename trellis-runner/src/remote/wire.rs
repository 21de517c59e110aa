// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::RemoteError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trellis_metadata::Message;

/// The largest frame payload either side will send or accept.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// The size of the length prefix on every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// A message on the wire: its type name and JSON body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The message's [`Message::TYPE_NAME`].
    #[serde(rename = "type")]
    pub message_type: String,

    /// The serialized message.
    pub body: Value,
}

impl Envelope {
    /// Wraps a message.
    pub fn new<M: Message>(message: &M) -> Result<Self, RemoteError> {
        let body = serde_json::to_value(message).map_err(|err| RemoteError::Json {
            message_type: M::TYPE_NAME.to_owned(),
            err,
        })?;
        Ok(Self {
            message_type: M::TYPE_NAME.to_owned(),
            body,
        })
    }

    /// Returns true if this envelope carries a message of type `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.message_type == M::TYPE_NAME
    }

    /// Deserializes the body as `M`. The type name must already have been checked.
    pub fn decode<M: Message>(&self) -> Result<M, RemoteError> {
        M::deserialize(&self.body).map_err(|err| RemoteError::Json {
            message_type: self.message_type.clone(),
            err,
        })
    }

    /// Converts this envelope into an error reporting it as unexpected.
    pub fn into_unexpected(self) -> RemoteError {
        RemoteError::UnexpectedMessage {
            message_type: self.message_type,
            body: self.body.to_string(),
        }
    }

    /// Serializes this envelope as a complete frame, including the length prefix.
    pub fn to_frame(&self) -> Result<Vec<u8>, RemoteError> {
        let payload = serde_json::to_vec(self).map_err(|err| RemoteError::Json {
            message_type: self.message_type.clone(),
            err,
        })?;
        let len = check_frame_len(payload.len())?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Deserializes a frame payload, without the length prefix.
    pub fn from_payload(payload: &[u8]) -> Result<Self, RemoteError> {
        serde_json::from_slice(payload).map_err(|err| RemoteError::Json {
            message_type: "envelope".to_owned(),
            err,
        })
    }
}

/// Checks a payload length against [`MAX_FRAME_LEN`], returning it as a length prefix.
pub fn check_frame_len(len: usize) -> Result<u32, RemoteError> {
    if len > MAX_FRAME_LEN {
        return Err(RemoteError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    // MAX_FRAME_LEN fits in a u32.
    Ok(len as u32)
}
