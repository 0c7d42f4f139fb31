mod common;

use avirt_core::error::AvirtError;
use avirt_core::session::AvirtSession;
use avirt_core::stream::StreamSpec;
use avirt_core::workflow::{apply, ApplyOptions, WorkflowLevel};
use avirt_provider::StreamDirection;
use common::{Fixture, MockControl, MockMounter};
use std::fs;
use std::sync::Arc;

fn configured_streams() -> Vec<StreamSpec> {
    vec![
        StreamSpec::new("multimedia", 2, StreamDirection::Playback).with_map("ap_loopback"),
        StreamSpec::new("navigation", 1, StreamDirection::Playback),
        StreamSpec::new("voice", 1, StreamDirection::Capture),
    ]
}

#[test]
fn apply_creates_streams_and_seals() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.streams = configured_streams();
    let mut session = AvirtSession::with_mounter(
        Arc::new(config),
        MockControl::with_cards(&[(0, "PCH"), (1, "avirt")]),
        MockMounter::new(&fixture),
    );

    let report = apply(&mut session, ApplyOptions::default()).unwrap();
    assert!(!report.has_errors());
    assert_eq!(report.title, "Applied 3 stream(s)");
    let successes = report
        .events
        .iter()
        .filter(|event| event.level == WorkflowLevel::Success)
        .count();
    assert_eq!(successes, 4);
    assert!(report
        .events
        .iter()
        .any(|event| event.message == "Card registered as index 1."));

    let layout = fixture.layout();
    for dir in ["playback_multimedia", "playback_navigation", "capture_voice"] {
        assert!(layout.streams_dir().join(dir).is_dir(), "{dir} missing");
    }
    assert_eq!(fs::read_to_string(layout.sealed_path()).unwrap(), "1");
    assert!(session.is_sealed());
}

#[test]
fn apply_without_seal_leaves_card_open() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.streams = configured_streams();
    let mut session = AvirtSession::with_mounter(
        Arc::new(config),
        MockControl::default(),
        MockMounter::new(&fixture),
    );

    let options = ApplyOptions {
        seal: false,
        ..ApplyOptions::default()
    };
    apply(&mut session, options).unwrap();
    assert!(!session.is_sealed());

    // Existing streams fail the second run unless skipped.
    let err = apply(&mut session, options).unwrap_err();
    assert!(matches!(err, AvirtError::StreamExists(_)));

    let report = apply(
        &mut session,
        ApplyOptions {
            seal: true,
            skip_existing: true,
        },
    )
    .unwrap();
    let skipped = report
        .events
        .iter()
        .filter(|event| event.level == WorkflowLevel::Info)
        .count();
    assert!(skipped >= 3);
    assert!(session.is_sealed());
}

#[test]
fn apply_on_sealed_card_fails() {
    let fixture = Fixture::new();
    fixture.premount();
    fs::write(fixture.layout().sealed_path(), "1").unwrap();
    let mut config = fixture.config();
    config.streams = configured_streams();
    let mut session = AvirtSession::with_mounter(
        Arc::new(config),
        MockControl::default(),
        MockMounter::new(&fixture),
    );

    let err = apply(&mut session, ApplyOptions::default()).unwrap_err();
    assert!(matches!(err, AvirtError::Sealed));
    assert!(!fixture
        .layout()
        .streams_dir()
        .join("playback_multimedia")
        .exists());
}

#[test]
fn apply_with_no_streams_on_sealed_card_fails() {
    let fixture = Fixture::new();
    fixture.premount();
    fs::write(fixture.layout().sealed_path(), "1").unwrap();

    for options in [
        ApplyOptions::default(),
        ApplyOptions {
            seal: false,
            skip_existing: false,
        },
    ] {
        let mut session = AvirtSession::with_mounter(
            Arc::new(fixture.config()),
            MockControl::default(),
            MockMounter::new(&fixture),
        );
        let err = apply(&mut session, options).unwrap_err();
        assert!(matches!(err, AvirtError::Sealed), "{err:?}");
        assert_eq!(err.errno(), -libc::EPERM);
    }
}

#[test]
fn apply_reports_unlocatable_card_as_warning() {
    let fixture = Fixture::new();
    let mut session = AvirtSession::with_mounter(
        Arc::new(fixture.config()),
        MockControl::default(),
        MockMounter::new(&fixture),
    );

    let report = apply(&mut session, ApplyOptions::default()).unwrap();
    let warnings: Vec<_> = report
        .events
        .iter()
        .filter(|event| event.level == WorkflowLevel::Warn)
        .collect();
    assert_eq!(warnings.len(), 2, "{warnings:?}");
    assert!(session.is_sealed());
}
