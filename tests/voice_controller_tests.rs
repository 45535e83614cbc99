// Integration tests for the voice controller
//
// The controller runs against scripted devices and a scripted transport, so
// every event is delivered by the test in a known order.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cognitive_companion::audio::EncodedBlob;
use cognitive_companion::live::{InboundEvent, OutboundMessage};
use cognitive_companion::session::{SessionEvent, VoiceController, VoiceHandle, VoiceSessionConfig, VoiceStatus};
use cognitive_companion::VoiceError;
use common::{ScriptedTransport, TestDevices};

fn controller(devices: &TestDevices, transport: &ScriptedTransport) -> VoiceController {
    VoiceController::new(
        VoiceSessionConfig::default(),
        Arc::new(devices.clone()),
        Arc::new(transport.clone()),
    )
}

fn speech(secs: f64) -> InboundEvent {
    let samples = vec![0.1; (secs * 24000.0) as usize];
    InboundEvent::AudioChunk(EncodedBlob::from_samples(&samples, 24000))
}

async fn deliver(controller: &mut VoiceController, event: InboundEvent) {
    controller.handle_event(SessionEvent::Inbound(Some(event))).await;
}

#[tokio::test]
async fn test_start_activates_session() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);

    let session_id = controller.start().await?;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, VoiceStatus::Active);
    assert_eq!(snapshot.session_id.as_deref(), Some(session_id.as_str()));
    assert!(devices.capture.is_running());
    assert_eq!(transport.connects(), 1);
    Ok(())
}

#[tokio::test]
async fn test_second_start_is_rejected() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);

    controller.start().await?;
    let second = controller.start().await;

    assert!(matches!(second, Err(VoiceError::AlreadyRunning)));
    assert_eq!(transport.connects(), 1, "no second connection attempt");
    assert_eq!(devices.capture.state.lock().starts, 1);
    assert_eq!(controller.status(), VoiceStatus::Active);
    Ok(())
}

#[tokio::test]
async fn test_microphone_denied() {
    let devices = TestDevices::default();
    devices.capture.state.lock().fail = true;
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);

    let result = controller.start().await;

    assert!(matches!(result, Err(VoiceError::Acquisition(_))));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, VoiceStatus::Error);
    assert!(snapshot.reason.unwrap_or_default().contains("microphone"));
    assert_eq!(transport.connects(), 0, "never connect without a microphone");
}

#[tokio::test]
async fn test_output_failure_releases_microphone() {
    let devices = TestDevices {
        fail_output: true,
        ..TestDevices::default()
    };
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);

    assert!(controller.start().await.is_err());
    assert!(!devices.capture.is_running());
    assert_eq!(devices.capture.state.lock().stops, 1);
    assert_eq!(controller.status(), VoiceStatus::Error);
}

#[tokio::test]
async fn test_connect_failure_rolls_back() {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    transport.state.lock().fail = true;
    let mut controller = controller(&devices, &transport);

    let result = controller.start().await;

    assert!(matches!(result, Err(VoiceError::Connect(_))));
    assert!(!devices.capture.is_running(), "microphone released");
    assert_eq!(devices.output.log.lock().closed, 1, "output closed");
    assert!(!controller.has_session());
    assert_eq!(controller.status(), VoiceStatus::Error);
}

#[tokio::test]
async fn test_captured_frames_are_forwarded() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    let level = controller.level();

    controller.start().await?;
    let mut remote = transport.take_remote();

    devices.capture.push(vec![0.5; 4096], 0).await;
    let event = tokio::time::timeout(Duration::from_secs(1), controller.next_event()).await?;
    controller.handle_event(event).await;

    match remote.outbound.try_recv()? {
        OutboundMessage::Frame(blob) => {
            assert_eq!(blob.sample_rate(), Some(16000));
            assert_eq!(blob.bytes()?.len(), 4096 * 2);
        }
        other => panic!("expected a frame, got {:?}", other),
    }
    assert!((*level.borrow() - 0.5).abs() < 1e-6);
    assert_eq!(controller.stats().map(|s| s.frames_sent), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_replies_play_gapless() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    controller.start().await?;

    deliver(&mut controller, speech(0.5)).await;
    deliver(&mut controller, speech(0.5)).await;

    let played = devices.output.played();
    assert_eq!(played.len(), 2);
    assert_eq!(played[1].1, played[0].1 + 0.5);
    assert!(controller.snapshot().speaking);

    controller.handle_event(SessionEvent::PlaybackEnded(played[0].0)).await;
    assert!(controller.snapshot().speaking, "second buffer still playing");

    devices.finish(played[1].0);
    let event = tokio::time::timeout(Duration::from_secs(1), controller.next_event()).await?;
    controller.handle_event(event).await;
    assert!(!controller.snapshot().speaking);
    Ok(())
}

#[tokio::test]
async fn test_bad_chunk_is_skipped() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    controller.start().await?;

    let odd = EncodedBlob {
        data: "AAAA".to_string(), // three bytes
        mime_type: "audio/pcm;rate=24000".to_string(),
    };
    deliver(&mut controller, InboundEvent::AudioChunk(odd)).await;
    deliver(&mut controller, speech(0.25)).await;

    assert_eq!(controller.status(), VoiceStatus::Active);
    assert_eq!(devices.output.played().len(), 1);
    assert_eq!(controller.scheduler().next_start_time(), 0.25);

    let stats = controller.stats().expect("session is active");
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.chunks_played, 1);
    Ok(())
}

#[tokio::test]
async fn test_barge_in() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    controller.start().await?;

    deliver(&mut controller, speech(2.0)).await;
    let first = devices.output.played()[0].0;

    devices.output.set_now(0.3);
    deliver(&mut controller, InboundEvent::Interrupted).await;

    assert_eq!(devices.output.log.lock().stopped, vec![(first, 0.3)]);
    assert!(!controller.snapshot().speaking);
    assert!(!controller.scheduler().is_speaking());

    deliver(&mut controller, speech(0.5)).await;
    assert_eq!(devices.output.played()[1].1, 0.3);
    assert_eq!(controller.stats().map(|s| s.interruptions), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_transcript_accumulates_per_session() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    controller.start().await?;

    deliver(&mut controller, InboundEvent::TranscriptDelta("Hello".to_string())).await;
    deliver(&mut controller, InboundEvent::TranscriptDelta(", there".to_string())).await;
    deliver(&mut controller, InboundEvent::TurnComplete).await;

    assert_eq!(controller.snapshot().transcript, "Hello, there");
    assert_eq!(controller.stats().map(|s| s.turns_completed), Some(1));

    controller.stop().await;
    assert_eq!(controller.snapshot().transcript, "Hello, there");

    controller.start().await?;
    assert_eq!(controller.snapshot().transcript, "", "new session starts clean");
    Ok(())
}

#[tokio::test]
async fn test_remote_error_tears_down() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    controller.start().await?;
    deliver(&mut controller, speech(1.0)).await;

    deliver(&mut controller, InboundEvent::Error("socket reset".to_string())).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, VoiceStatus::Error);
    assert!(snapshot.reason.is_some());
    assert!(!snapshot.speaking);
    assert!(!controller.has_session());
    assert!(!devices.capture.is_running());
    assert_eq!(devices.output.log.lock().closed, 1);
    assert_eq!(devices.output.stopped_ids().len(), 1, "queued speech stopped");

    // A fresh start is allowed after an error
    controller.start().await?;
    assert_eq!(controller.status(), VoiceStatus::Active);
    Ok(())
}

#[tokio::test]
async fn test_remote_close_returns_to_idle() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);
    controller.start().await?;
    let remote = transport.take_remote();

    remote.events.send(InboundEvent::Closed)?;
    let event = tokio::time::timeout(Duration::from_secs(1), controller.next_event()).await?;
    controller.handle_event(event).await;

    assert_eq!(controller.status(), VoiceStatus::Idle);
    assert!(!controller.has_session());
    assert!(!devices.capture.is_running());
    Ok(())
}

#[tokio::test]
async fn test_stop_is_idempotent() -> Result<()> {
    let devices = TestDevices::default();
    let transport = ScriptedTransport::default();
    let mut controller = controller(&devices, &transport);

    assert!(controller.stop().await.is_none(), "stop before start is a no-op");
    assert_eq!(controller.status(), VoiceStatus::Idle);

    controller.start().await?;
    let mut remote = transport.take_remote();
    let stats = controller.stop().await.expect("stats for the stopped session");
    assert!(!stats.is_active);

    assert!(controller.stop().await.is_none());
    assert_eq!(controller.status(), VoiceStatus::Idle);
    assert_eq!(devices.capture.state.lock().stops, 1);
    assert_eq!(devices.output.log.lock().closed, 1);
    assert!(matches!(remote.outbound.try_recv(), Ok(OutboundMessage::Close)));

    // Last session's stats stay available
    assert_eq!(controller.stats().map(|s| s.session_id), Some(stats.session_id));
    Ok(())
}

#[tokio::test]
async fn test_handle_rejects_start_while_connecting() -> Result<()> {
    let devices = TestDevices::default();
    let (transport, gate) = ScriptedTransport::gated();
    let (handle, _task) = VoiceHandle::spawn(
        VoiceSessionConfig::default(),
        Arc::new(devices.clone()),
        Arc::new(transport.clone()),
    );

    let starter = handle.clone();
    let first = tokio::spawn(async move { starter.start().await });

    let mut snapshots = handle.subscribe();
    snapshots.wait_for(|s| s.status == VoiceStatus::Connecting).await?;

    let second = handle.start().await;
    assert!(matches!(second, Err(VoiceError::AlreadyRunning)));

    gate.notify_one();
    let session_id = first.await??;
    assert_eq!(handle.snapshot().session_id, Some(session_id));
    assert_eq!(handle.snapshot().status, VoiceStatus::Active);
    Ok(())
}

#[tokio::test]
async fn test_handle_stop_cancels_connect() -> Result<()> {
    let devices = TestDevices::default();
    let (transport, _gate) = ScriptedTransport::gated();
    let (handle, _task) = VoiceHandle::spawn(
        VoiceSessionConfig::default(),
        Arc::new(devices.clone()),
        Arc::new(transport.clone()),
    );

    let starter = handle.clone();
    let first = tokio::spawn(async move { starter.start().await });
    handle
        .subscribe()
        .wait_for(|s| s.status == VoiceStatus::Connecting)
        .await?;

    assert!(handle.stop().await?.is_none());
    assert!(first.await?.is_err());
    assert_eq!(handle.snapshot().status, VoiceStatus::Idle);
    assert!(!devices.capture.is_running());
    assert_eq!(devices.output.log.lock().closed, 1);
    Ok(())
}
