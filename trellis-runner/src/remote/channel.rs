// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Envelope, FRAME_HEADER_LEN, MAX_FRAME_LEN};
use crate::errors::RemoteError;
use std::io::{self, Read, Write};
use trellis_metadata::Message;

/// A blocking, frame-oriented view of a byte stream. Used by the target side.
#[derive(Debug)]
pub struct FramedChannel<S> {
    stream: S,
}

impl<S: Read + Write> FramedChannel<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Sends a message as a single frame.
    pub fn send<M: Message>(&mut self, message: &M) -> Result<(), RemoteError> {
        self.send_envelope(&Envelope::new(message)?)
    }

    /// Sends an envelope as a single frame.
    pub fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), RemoteError> {
        let frame = envelope.to_frame()?;
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        tracing::trace!(message_type = %envelope.message_type, len = frame.len(), "sent frame");
        Ok(())
    }

    /// Receives the next frame.
    ///
    /// Returns [`RemoteError::ChannelClosed`] if the stream ends cleanly between frames.
    pub fn receive(&mut self) -> Result<Envelope, RemoteError> {
        let mut header = [0; FRAME_HEADER_LEN];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(RemoteError::ChannelClosed);
            }
            Err(err) => return Err(err.into()),
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            return Err(RemoteError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        let mut payload = vec![0; len];
        self.stream.read_exact(&mut payload)?;
        Envelope::from_payload(&payload)
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
