// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Envelope, MAX_FRAME_LEN};
use crate::{
    bus::Bus,
    errors::{RemoteError, RunError},
};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use trellis_metadata::{
    AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped, Completed,
    DiscoverMethods, ErrorEnvelope, Message, MethodDiscovered, MethodId, RunAssembly, RunMethods,
};

#[cfg(unix)]
pub use unix_channel::*;

#[cfg(unix)]
mod unix_channel {
    use super::HostConnection;
    use crate::errors::RemoteError;
    use camino::{Utf8Path, Utf8PathBuf};
    use tokio::net::{UnixListener, UnixStream};

    /// The host end of a remote control channel: a bound Unix domain socket.
    ///
    /// Must be created from within a Tokio runtime.
    #[derive(Debug)]
    pub struct HostChannel {
        listener: UnixListener,
        path: Utf8PathBuf,
    }

    impl HostChannel {
        /// Binds a socket at `path`. The path must not already exist.
        pub fn bind(path: &Utf8Path) -> Result<Self, RemoteError> {
            let listener = UnixListener::bind(path).map_err(|err| RemoteError::Open {
                channel: path.to_owned(),
                err,
            })?;
            tracing::debug!(channel = %path, "bound host channel");
            Ok(Self {
                listener,
                path: path.to_owned(),
            })
        }

        /// The channel name to pass to the target.
        pub fn path(&self) -> &Utf8Path {
            &self.path
        }

        /// Waits for the target to connect.
        pub async fn accept(&self) -> Result<HostConnection<UnixStream>, RemoteError> {
            let (stream, _) = self.listener.accept().await?;
            tracing::debug!(channel = %self.path, "target connected");
            Ok(HostConnection::new(stream))
        }
    }
}

/// A request a host can make of a target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostRequest {
    /// List candidate methods without running anything.
    DiscoverMethods,

    /// Run exactly these methods.
    RunMethods(Vec<MethodId>),

    /// Run everything.
    RunAssembly,
}

/// The result of a remote session that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostOutcome {
    /// The description from the target's `Error` envelope, if it sent one.
    pub error: Option<String>,

    /// The number of events re-published on the host bus.
    pub events: usize,
}

/// The host end of one connection.
#[derive(Debug)]
pub struct HostConnection<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> HostConnection<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Sends a message as a single frame.
    pub async fn send<M: Message>(&mut self, message: &M) -> Result<(), RemoteError> {
        let frame = Envelope::new(message)?.to_frame()?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receives the next frame.
    ///
    /// Returns [`RemoteError::ChannelClosed`] if the stream ends cleanly between frames.
    pub async fn receive(&mut self) -> Result<Envelope, RemoteError> {
        let len = match self.stream.read_u32().await {
            Ok(len) => len as usize,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(RemoteError::ChannelClosed);
            }
            Err(err) => return Err(err.into()),
        };
        if len > MAX_FRAME_LEN {
            return Err(RemoteError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut payload = vec![0; len];
        self.stream.read_exact(&mut payload).await?;
        Envelope::from_payload(&payload)
    }

    /// Sends `request`, then re-publishes every event the target streams back on `bus` until the
    /// target sends `Completed`.
    pub async fn drive(mut self, request: HostRequest, bus: &Bus) -> Result<HostOutcome, RunError> {
        tracing::debug!(?request, "sending request");
        match &request {
            HostRequest::DiscoverMethods => self.send(&DiscoverMethods {}).await?,
            HostRequest::RunMethods(methods) => {
                self.send(&RunMethods {
                    methods: methods.clone(),
                })
                .await?
            }
            HostRequest::RunAssembly => self.send(&RunAssembly {}).await?,
        }

        let mut outcome = HostOutcome::default();
        loop {
            let envelope = self.receive().await?;
            if envelope.is::<Completed>() {
                tracing::debug!(events = outcome.events, "target completed");
                return Ok(outcome);
            } else if envelope.is::<ErrorEnvelope>() {
                let error: ErrorEnvelope = envelope.decode()?;
                outcome.error = Some(error.description);
            } else {
                republish(&envelope, bus)?;
                outcome.events += 1;
            }
        }
    }
}

fn republish(envelope: &Envelope, bus: &Bus) -> Result<(), RunError> {
    fn forward<M: Message>(envelope: &Envelope, bus: &Bus) -> Result<(), RunError> {
        bus.publish(&envelope.decode::<M>()?)?;
        Ok(())
    }

    if envelope.is::<AssemblyStarted>() {
        forward::<AssemblyStarted>(envelope, bus)
    } else if envelope.is::<MethodDiscovered>() {
        forward::<MethodDiscovered>(envelope, bus)
    } else if envelope.is::<CaseSkipped>() {
        forward::<CaseSkipped>(envelope, bus)
    } else if envelope.is::<CasePassed>() {
        forward::<CasePassed>(envelope, bus)
    } else if envelope.is::<CaseFailed>() {
        forward::<CaseFailed>(envelope, bus)
    } else if envelope.is::<AssemblyCompleted>() {
        forward::<AssemblyCompleted>(envelope, bus)
    } else {
        Err(envelope.clone().into_unexpected().into())
    }
}

