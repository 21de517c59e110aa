// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::FramedChannel;
use crate::{
    bus::{Bus, Handler, Listener, ListenerHandle, Registry},
    errors::{BoxError, DisplayErrorChain, RemoteError, RunError},
    lifecycle::ClassExecution,
    runner::{Assembly, AssemblyRunner, RunContext},
};
use camino::Utf8Path;
use std::io::{Read, Write};
use trellis_metadata::{
    AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped, Completed,
    DiscoverMethods, ErrorEnvelope, Message, MethodDiscovered, RunAssembly, RunMethods,
    TrellisExitCode,
};

/// The stream a target uses to talk to its host.
#[cfg(unix)]
pub type TargetStream = std::os::unix::net::UnixStream;

/// The stream a target uses to talk to its host. Remote control is unsupported on this platform.
#[cfg(not(unix))]
#[derive(Debug)]
pub enum TargetStream {}

#[cfg(not(unix))]
impl Read for TargetStream {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        match *self {}
    }
}

#[cfg(not(unix))]
impl Write for TargetStream {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        match *self {}
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match *self {}
    }
}

/// Connects to the channel a host has bound.
pub fn connect(channel: &Utf8Path) -> Result<FramedChannel<TargetStream>, RemoteError> {
    #[cfg(unix)]
    {
        tracing::debug!(%channel, "connecting to host");
        let stream = TargetStream::connect(channel).map_err(|err| RemoteError::Open {
            channel: channel.to_owned(),
            err,
        })?;
        Ok(FramedChannel::new(stream))
    }

    #[cfg(not(unix))]
    {
        let _ = channel;
        Err(RemoteError::Unsupported)
    }
}

/// Forwards every execution event to the host.
#[derive(Debug)]
pub struct RemoteListener<S> {
    channel: FramedChannel<S>,
}

impl<S: Read + Write> RemoteListener<S> {
    /// Creates a listener that writes to `channel`.
    pub fn new(channel: FramedChannel<S>) -> Self {
        Self { channel }
    }

    fn channel_mut(&mut self) -> &mut FramedChannel<S> {
        &mut self.channel
    }
}

impl<S: Read + Write + 'static> Listener for RemoteListener<S> {
    const NAME: &'static str = "remote";

    fn register(registry: &mut Registry<'_, Self>) {
        registry
            .handle::<AssemblyStarted>()
            .handle::<MethodDiscovered>()
            .handle::<CaseSkipped>()
            .handle::<CasePassed>()
            .handle::<CaseFailed>()
            .handle::<AssemblyCompleted>();
    }
}

impl<S: Read + Write, M: Message> Handler<M> for RemoteListener<S> {
    fn handle(&mut self, message: &M) -> Result<(), BoxError> {
        self.channel.send(message)?;
        Ok(())
    }
}

/// The target side of one remote control session.
///
/// A session serves exactly one request, then sends `Completed` and drops the connection.
pub struct TargetSession<S> {
    remote: ListenerHandle<RemoteListener<S>>,
    bus: Bus,
}

impl<S: Read + Write + 'static> TargetSession<S> {
    /// Creates a session over a connected channel. The remote listener is subscribed first.
    pub fn new(channel: FramedChannel<S>) -> Self {
        let mut bus = Bus::new();
        let remote = bus.subscribe(RemoteListener::new(channel));
        Self { remote, bus }
    }

    /// Subscribes an additional listener, after the remote listener.
    pub fn subscribe<L: Listener>(&mut self, listener: L) -> ListenerHandle<L> {
        self.bus.subscribe(listener)
    }

    /// Receives one request, runs it, and reports the outcome. Returns the exit code.
    pub fn serve(
        self,
        execution: &ClassExecution,
        context: &RunContext,
        assembly: &Assembly,
    ) -> i32 {
        let result = self.dispatch(execution, context, assembly);
        self.finish(result)
    }

    /// Reports an error that happened before a request could be served, such as a failure to
    /// construct the convention. Returns [`TrellisExitCode::FATAL`].
    pub fn fail(self, error: RunError) -> i32 {
        // Consume the request so that the host sees an orderly shutdown.
        let received = self.remote.borrow_mut().channel_mut().receive();
        if let Err(err) = received {
            tracing::debug!(error = %DisplayErrorChain::new(&err), "no request received");
        }
        self.finish(Err(error))
    }

    fn dispatch(
        &self,
        execution: &ClassExecution,
        context: &RunContext,
        assembly: &Assembly,
    ) -> Result<i32, RunError> {
        let envelope = self.remote.borrow_mut().channel_mut().receive()?;
        tracing::debug!(message_type = %envelope.message_type, "received request");

        let runner = AssemblyRunner::new(execution, context, &self.bus);
        if envelope.is::<DiscoverMethods>() {
            envelope.decode::<DiscoverMethods>()?;
            runner.discover_methods(assembly)?;
            Ok(TrellisExitCode::OK)
        } else if envelope.is::<RunMethods>() {
            let request: RunMethods = envelope.decode()?;
            let summary = runner.run_methods(assembly, &request.methods)?;
            Ok(TrellisExitCode::from_summary(&summary))
        } else if envelope.is::<RunAssembly>() {
            envelope.decode::<RunAssembly>()?;
            let summary = runner.run_assembly(assembly)?;
            Ok(TrellisExitCode::from_summary(&summary))
        } else {
            Err(envelope.into_unexpected().into())
        }
    }

    fn finish(self, result: Result<i32, RunError>) -> i32 {
        let mut remote = self.remote.borrow_mut();
        let channel = remote.channel_mut();

        let exit_code = match result {
            Ok(exit_code) => exit_code,
            Err(error) => {
                let description = DisplayErrorChain::new(&error).to_string();
                tracing::debug!(%description, "request failed");
                if let Err(err) = channel.send(&ErrorEnvelope { description }) {
                    tracing::warn!(
                        "failed to send error to host: {}",
                        DisplayErrorChain::new(&err)
                    );
                }
                TrellisExitCode::FATAL
            }
        };

        if let Err(err) = channel.send(&Completed {}) {
            tracing::warn!(
                "failed to send completion to host: {}",
                DisplayErrorChain::new(&err)
            );
        }
        exit_code
    }
}
