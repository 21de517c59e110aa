// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;
use trellis_metadata::{CasePassed, CaseRecord, Completed, ErrorEnvelope, TrellisExitCode};
use trellis_runner::{
    bus::Bus,
    errors::{RemoteError, RunError},
    lifecycle::ClassExecution,
    remote::{HostConnection, HostRequest, MAX_FRAME_LEN},
    runner::{Assembly, RunContext},
};

#[cfg(unix)]
mod socket {
    use super::*;
    use pretty_assertions::assert_eq;
    use camino_tempfile::Utf8TempDir;
    use trellis_runner::remote::{HostChannel, TargetSession, connect};

    /// Spawns a target on its own thread that connects to `channel` and serves one request.
    fn spawn_target(
        channel: camino::Utf8PathBuf,
        build: fn(&Trace) -> Assembly,
    ) -> std::thread::JoinHandle<(i32, Vec<String>)> {
        std::thread::spawn(move || {
            let trace = Trace::default();
            let assembly = build(&trace);
            let session = TargetSession::new(connect(&channel).expect("host is listening"));
            let exit_code = session.serve(&ClassExecution::new(), &RunContext::default(), &assembly);
            (exit_code, trace_of(&trace))
        })
    }

    fn sample_assembly(trace: &Trace) -> Assembly {
        Assembly::new("sample").class(sample_class(trace, SampleOptions::default()))
    }

    fn empty_assembly(_: &Trace) -> Assembly {
        Assembly::new("empty")
    }

    #[tokio::test]
    async fn run_assembly_end_to_end() {
        let dir = Utf8TempDir::new().unwrap();
        let host = HostChannel::bind(&dir.path().join("trellis.sock")).unwrap();
        let target = spawn_target(host.path().to_owned(), sample_assembly);

        let mut bus = Bus::new();
        let recorder = bus.subscribe(Recorder::default());
        let outcome = host
            .accept()
            .await
            .unwrap()
            .drive(HostRequest::RunAssembly, &bus)
            .await
            .unwrap();

        let (exit_code, trace) = target.join().unwrap();
        assert_eq!(exit_code, TrellisExitCode::TESTS_FAILED);
        assert_eq!(
            trace,
            [".ctor", "Pass", "Dispose", ".ctor", "Fail", "Dispose"]
        );
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.events, 4);
        assert_eq!(
            recorder.borrow().events,
            [
                "Started sample",
                "Passed SampleTestClass.Pass",
                "Failed SampleTestClass.Fail: 'Fail' failed!",
                "Completed sample: 1 passed, 1 failed, 0 skipped",
            ]
        );
    }

    #[tokio::test]
    async fn run_methods_end_to_end() {
        let dir = Utf8TempDir::new().unwrap();
        let host = HostChannel::bind(&dir.path().join("trellis.sock")).unwrap();
        let target = spawn_target(host.path().to_owned(), sample_assembly);

        let mut bus = Bus::new();
        let recorder = bus.subscribe(Recorder::default());
        host.accept()
            .await
            .unwrap()
            .drive(
                HostRequest::RunMethods(vec!["SampleTestClass.Pass".parse().unwrap()]),
                &bus,
            )
            .await
            .unwrap();

        let (exit_code, trace) = target.join().unwrap();
        assert_eq!(exit_code, TrellisExitCode::OK);
        assert_eq!(trace, [".ctor", "Pass", "Dispose"]);
        assert_eq!(recorder.borrow().events[1], "Passed SampleTestClass.Pass");
    }

    #[tokio::test]
    async fn discovery_end_to_end() {
        let dir = Utf8TempDir::new().unwrap();
        let host = HostChannel::bind(&dir.path().join("trellis.sock")).unwrap();
        let target = spawn_target(host.path().to_owned(), sample_assembly);

        let mut bus = Bus::new();
        let recorder = bus.subscribe(Recorder::default());
        host.accept()
            .await
            .unwrap()
            .drive(HostRequest::DiscoverMethods, &bus)
            .await
            .unwrap();

        let (exit_code, trace) = target.join().unwrap();
        assert_eq!(exit_code, TrellisExitCode::OK);
        assert!(trace.is_empty());
        assert_eq!(
            recorder.borrow().events,
            [
                "Discovered SampleTestClass.Pass",
                "Discovered SampleTestClass.Fail"
            ]
        );
    }

    #[tokio::test]
    async fn unrecognized_requests_get_an_error_then_completed() {
        let dir = Utf8TempDir::new().unwrap();
        let host = HostChannel::bind(&dir.path().join("trellis.sock")).unwrap();
        let target = spawn_target(host.path().to_owned(), sample_assembly);

        let mut connection = host.accept().await.unwrap();
        connection.send(&Completed {}).await.unwrap();

        let error: ErrorEnvelope = connection.receive().await.unwrap().decode().unwrap();
        assert_eq!(
            error.description,
            "remote control failed\n  caused by:\n  - received unexpected message of type Completed: {}"
        );
        assert!(connection.receive().await.unwrap().is::<Completed>());
        assert!(matches!(
            connection.receive().await,
            Err(RemoteError::ChannelClosed)
        ));

        let (exit_code, trace) = target.join().unwrap();
        assert_eq!(exit_code, TrellisExitCode::FATAL);
        assert!(trace.is_empty());
    }

    #[tokio::test]
    async fn empty_assembly_is_fatal() {
        let dir = Utf8TempDir::new().unwrap();
        let host = HostChannel::bind(&dir.path().join("trellis.sock")).unwrap();
        let target = spawn_target(host.path().to_owned(), empty_assembly);

        let bus = Bus::new();
        let outcome = host
            .accept()
            .await
            .unwrap()
            .drive(HostRequest::RunAssembly, &bus)
            .await
            .unwrap();

        let (exit_code, _) = target.join().unwrap();
        assert_eq!(exit_code, TrellisExitCode::FATAL);
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.events, 2, "started and completed only");
    }

    #[test]
    fn connecting_to_a_missing_channel_fails() {
        let dir = Utf8TempDir::new().unwrap();
        let err = connect(&dir.path().join("missing.sock")).unwrap_err();
        assert!(matches!(err, RemoteError::Open { .. }), "{err:?}");
    }
}

fn record(method: &str) -> CaseRecord {
    CaseRecord {
        class: "SampleTestClass".to_owned(),
        method: method.to_owned(),
        name: format!("SampleTestClass.{method}"),
        duration: std::time::Duration::from_millis(3),
        output: String::new(),
    }
}

#[tokio::test]
async fn early_close_is_channel_closed() {
    let (host_side, target_side) = tokio::io::duplex(64 * 1024);
    let target = tokio::spawn(async move {
        let mut target = HostConnection::new(target_side);
        target.receive().await.unwrap();
        target
            .send(&CasePassed {
                case: record("Pass"),
            })
            .await
            .unwrap();
        // Dropped without sending Completed.
    });

    let mut bus = Bus::new();
    let recorder = bus.subscribe(Recorder::default());
    let err = HostConnection::new(host_side)
        .drive(HostRequest::RunAssembly, &bus)
        .await
        .unwrap_err();
    target.await.unwrap();

    assert!(
        matches!(err, RunError::Remote(RemoteError::ChannelClosed)),
        "{err:?}"
    );
    assert_eq!(recorder.borrow().events, ["Passed SampleTestClass.Pass"]);
}

#[tokio::test]
async fn error_envelopes_are_captured() {
    let (host_side, target_side) = tokio::io::duplex(64 * 1024);
    let target = tokio::spawn(async move {
        let mut target = HostConnection::new(target_side);
        target.receive().await.unwrap();
        target
            .send(&ErrorEnvelope {
                description: "failed to construct the test convention".to_owned(),
            })
            .await
            .unwrap();
        target.send(&Completed {}).await.unwrap();
    });

    let outcome = HostConnection::new(host_side)
        .drive(HostRequest::DiscoverMethods, &Bus::new())
        .await
        .unwrap();
    target.await.unwrap();

    assert_eq!(
        outcome.error.as_deref(),
        Some("failed to construct the test convention")
    );
    assert_eq!(outcome.events, 0);
}

#[tokio::test]
async fn oversize_frames_are_rejected() {
    let (host_side, mut target_side) = tokio::io::duplex(64);
    target_side
        .write_all(&((MAX_FRAME_LEN + 1) as u32).to_be_bytes())
        .await
        .unwrap();

    let mut host = HostConnection::new(host_side);
    let err = host.receive().await.unwrap_err();
    assert!(
        matches!(err, RemoteError::FrameTooLarge { len, .. } if len == MAX_FRAME_LEN + 1),
        "{err:?}"
    );
}
