use std::time::Duration;

use serde_json::json;

use super::mock_backend::MockBackend;
use crate::asr::EditOutcome;
use crate::backend::{AsrMode, AsrOptions, AsrPreferences};
use crate::controls::ActionOutcome;
use crate::pipeline::{ClientSession, Command, CommandOutcome, FeedMessage};
use crate::progress::{DisplayMetrics, DownloadMetrics, ProgressEvent};
use crate::settings::{ClientConfig, DEFAULT_BIAS_WORDS};
use crate::steps::PipelineStep;

fn session(mock: &MockBackend) -> ClientSession {
    ClientSession::new(mock.clone(), &ClientConfig::default())
}

#[tokio::test]
async fn test_open_configuration_snapshot() {
    let mock = MockBackend::new();
    mock.set_stored(("whisper", "large-v3", ""), Some("Deutsch"));
    mock.set_segment_count(27);
    let session = session(&mock);

    let view = session.open_configuration().await;
    assert_eq!(view.preferences, AsrPreferences::new("whisper", "large-v3", "de"));
    assert_eq!(view.services.len(), 2);
    assert_eq!(view.languages.len(), 3);
    assert_eq!(view.segment_count, 27);
    assert!(view.supports_bias_words);
    assert_eq!(view.options.bias_words, DEFAULT_BIAS_WORDS);
    assert!(!view.options_loading);
    assert!(!view.reconciling);
}

#[tokio::test]
async fn test_open_configuration_degrades_on_load_failures() {
    let mock = MockBackend::new();
    mock.fail_preferences_load();
    mock.fail_options_load();
    mock.fail_segment_count();
    let session = session(&mock);

    let view = session.open_configuration().await;
    assert!(view.services.is_empty());
    assert_eq!(view.preferences, AsrPreferences::default());
    assert_eq!(view.options, AsrOptions::default());
    assert_eq!(view.segment_count, 0);
    assert!(!view.supports_bias_words);
    assert_eq!(session.request_log().failures().len(), 3);
}

#[tokio::test]
async fn test_service_switch_updates_bias_word_support() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;

    let outcome = session
        .dispatch(Command::SelectService("parakeet".to_string()))
        .await;
    assert_eq!(
        outcome,
        CommandOutcome::Preferences(AsrPreferences::new("parakeet", "tdt-0.6b", "es"))
    );
    assert!(!session.configuration().supports_bias_words);
}

#[tokio::test]
async fn test_failed_switch_reports_committed_preferences() {
    let mock = MockBackend::new();
    let session = session(&mock);
    let before = session.open_configuration().await.preferences;

    mock.fail_next_set_preferences();
    let outcome = session
        .dispatch(Command::SelectService("parakeet".to_string()))
        .await;
    assert_eq!(outcome, CommandOutcome::Preferences(before));
}

#[tokio::test(start_paused = true)]
async fn test_rapid_bias_word_edits_write_once() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;

    for text in ["Kap", "Kapi", "Kapitel"] {
        let outcome = session.dispatch(Command::EditBiasWords(text.to_string())).await;
        assert_eq!(outcome, CommandOutcome::Edit(EditOutcome::Scheduled));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Local echo is immediate, the write waits for quiescence.
    assert_eq!(session.configuration().options.bias_words, "Kapitel");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(mock.options_updates().is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;
    let written = mock.options_updates();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].bias_words, "Kapitel");
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_pending_edit() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;

    session
        .dispatch(Command::EditBiasWords("Custom words".to_string()))
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcome = session.dispatch(Command::ResetBiasWords).await;
    assert_eq!(outcome, CommandOutcome::Edit(EditOutcome::Persisted));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let written = mock.options_updates();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].bias_words, DEFAULT_BIAS_WORDS);
    assert_eq!(session.configuration().options.bias_words, DEFAULT_BIAS_WORDS);
}

#[tokio::test(start_paused = true)]
async fn test_bias_word_write_failure_keeps_echo() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;

    mock.fail_next_options_update();
    session
        .dispatch(Command::EditBiasWords("Teil".to_string()))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(mock.options_updates().is_empty());
    assert_eq!(session.configuration().options.bias_words, "Teil");
    assert_eq!(session.request_log().for_operation("update_asr_options").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_proceed_flushes_pending_edit_first() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;

    session
        .dispatch(Command::EditBiasWords("Kapitel".to_string()))
        .await;
    let outcome = session.dispatch(Command::Proceed).await;
    assert_eq!(outcome, CommandOutcome::Action(ActionOutcome::Completed));
    assert_eq!(mock.configure_calls(), vec![AsrMode::Transcribe]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let written = mock.options_updates();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].bias_words, "Kapitel");

    let log = session.request_log().get_logs();
    assert_eq!(log[0].operation, "configure_asr");
    assert_eq!(log[1].operation, "update_asr_options");
}

#[tokio::test(start_paused = true)]
async fn test_double_invocation_calls_backend_once() {
    let mock = MockBackend::new();
    mock.set_latency(Duration::from_millis(100));
    let session = session(&mock);

    let (first, second) = tokio::join!(
        session.dispatch(Command::Skip),
        session.dispatch(Command::Skip)
    );
    assert_eq!(first, CommandOutcome::Action(ActionOutcome::Completed));
    assert_eq!(second, CommandOutcome::Action(ActionOutcome::Ignored));
    assert_eq!(mock.configure_calls(), vec![AsrMode::Skip]);

    let (first, second) = tokio::join!(
        session.dispatch(Command::Cancel),
        session.dispatch(Command::Proceed)
    );
    assert_eq!(first, CommandOutcome::Action(ActionOutcome::Completed));
    assert_eq!(second, CommandOutcome::Action(ActionOutcome::Ignored));
    assert_eq!(mock.cancel_calls(), 1);
    assert_eq!(mock.configure_calls().len(), 1);
    assert!(!session.is_action_loading());
}

#[tokio::test]
async fn test_action_failure_is_user_visible() {
    let mock = MockBackend::new();
    mock.fail_actions(true);
    let session = session(&mock);

    let outcome = session.dispatch(Command::Proceed).await;
    assert!(matches!(outcome, CommandOutcome::Action(ActionOutcome::Failed(_))));
    let error = session.action_error().unwrap();
    assert!(error.starts_with("Failed to start transcription"));
    assert!(!session.is_action_loading());

    session.clear_action_error();
    assert!(session.action_error().is_none());
}

#[tokio::test]
async fn test_deleting_cancel_resets_to_idle() {
    let mock = MockBackend::new();
    mock.set_cancel_action("deleted");
    let session = session(&mock);
    session.open_configuration().await;
    session.apply_feed_message(FeedMessage::Connectivity(true));
    session.apply_feed_message(FeedMessage::Progress(ProgressEvent {
        step: PipelineStep::AsrProcessing,
        percent: 40.0,
        message: "Transcribing".to_string(),
        details: Some(json!({"completed_segments": 4, "total_segments": 10})),
    }));

    let outcome = session.dispatch(Command::Cancel).await;
    assert_eq!(outcome, CommandOutcome::Action(ActionOutcome::SessionDeleted));

    assert!(session.progress_view().is_none());
    let view = session.configuration();
    assert!(view.services.is_empty());
    assert_eq!(view.preferences, AsrPreferences::default());
    assert_eq!(view.segment_count, 0);
    assert_eq!(session.is_connected(), Some(true));
}

#[tokio::test]
async fn test_other_cancel_keeps_session() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;

    let outcome = session.dispatch(Command::Cancel).await;
    assert_eq!(outcome, CommandOutcome::Action(ActionOutcome::Completed));
    assert_eq!(session.configuration().services.len(), 2);
}

#[test]
fn test_download_event_end_to_end() {
    let session = session(&MockBackend::new());
    let message: FeedMessage = serde_json::from_value(json!({
        "type": "progress",
        "data": {
            "step": "downloading",
            "percent": 42,
            "message": "Downloading audiobook",
            "details": {
                "bytes_downloaded": 1048576,
                "total_bytes": 10485760,
                "speed_bps": 524288,
                "eta_seconds": 17
            }
        }
    }))
    .unwrap();
    session.apply_feed_message(message);

    let view = session.progress_view().unwrap();
    assert_eq!(view.info.title, crate::steps::describe(&PipelineStep::Downloading).title);
    assert_eq!(view.percent, 42.0);
    assert_eq!(
        view.metrics,
        Some(DisplayMetrics::Download(DownloadMetrics {
            downloaded: "1.00 MB".to_string(),
            total: Some("10.00 MB".to_string()),
            speed: Some("512.00 KB/s".to_string()),
            eta: Some("17s".to_string()),
        }))
    );
}

#[test]
fn test_cleanup_view_uses_derived_message() {
    let session = session(&MockBackend::new());
    session.apply_feed_message(FeedMessage::Progress(ProgressEvent {
        step: PipelineStep::AiCleanup,
        percent: 90.0,
        message: String::new(),
        details: Some(json!({"parsed_count": 3, "expected_count": 12})),
    }));

    let view = session.progress_view().unwrap();
    assert_eq!(view.message, "Cleaning up chapters: 3/12");
}

#[test]
fn test_init_logging_is_idempotent() {
    crate::init_logging();
    crate::init_logging();
    log::info!("Session: logging initialized twice");
}

#[tokio::test(start_paused = true)]
async fn test_skip_is_ignored_while_proceed_flushes_edit() {
    let mock = MockBackend::new();
    let session = session(&mock);
    session.open_configuration().await;
    mock.set_latency(Duration::from_millis(100));

    session
        .dispatch(Command::EditBiasWords("Kapitel".to_string()))
        .await;
    assert!(session.configuration().bias_words_pending);

    let (proceed, skip) = tokio::join!(
        session.dispatch(Command::Proceed),
        session.dispatch(Command::Skip)
    );
    assert_eq!(proceed, CommandOutcome::Action(ActionOutcome::Completed));
    assert_eq!(skip, CommandOutcome::Action(ActionOutcome::Ignored));
    assert_eq!(mock.configure_calls(), vec![AsrMode::Transcribe]);
    assert_eq!(mock.options_updates().len(), 1);
    assert!(!session.configuration().bias_words_pending);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_ignored_while_proceed_flushes_edit() {
    let mock = MockBackend::new();
    mock.set_cancel_action("deleted");
    let session = session(&mock);
    session.open_configuration().await;
    mock.set_latency(Duration::from_millis(100));

    session
        .dispatch(Command::EditBiasWords("Kapitel".to_string()))
        .await;
    let (proceed, cancel) = tokio::join!(
        session.dispatch(Command::Proceed),
        session.dispatch(Command::Cancel)
    );
    assert_eq!(proceed, CommandOutcome::Action(ActionOutcome::Completed));
    assert_eq!(cancel, CommandOutcome::Action(ActionOutcome::Ignored));
    assert_eq!(mock.cancel_calls(), 0);
    assert_eq!(session.configuration().services.len(), 2);
}

#[test]
fn test_cleanup_view_keeps_server_message() {
    let session = session(&MockBackend::new());
    session.apply_feed_message(FeedMessage::Progress(ProgressEvent {
        step: PipelineStep::AiCleanup,
        percent: 60.0,
        message: "Processing batch 2 of 5".to_string(),
        details: Some(json!({"parsed_count": 3, "expected_count": 10})),
    }));

    let view = session.progress_view().unwrap();
    assert_eq!(view.message, "Processing batch 2 of 5");
    match view.metrics {
        Some(DisplayMetrics::Cleanup(cleanup)) => {
            assert_eq!(cleanup.parsed, 3);
            assert_eq!(cleanup.expected, 10);
        }
        other => panic!("unexpected metrics: {:?}", other),
    }
}
