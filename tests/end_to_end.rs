mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use handsign::clock::ManualClock;
use handsign::config::{self, AppSettings};
use handsign::detector::{BlankFrames, ReplayDetector, SharedCapture};
use handsign::inference::InferenceOutput;
use handsign::model_store::{MODEL_KEY, ModelStore};
use handsign::pose::{Connection, HandDetection, Keypoint};
use handsign::recording::{DEFAULT_SAMPLE_INTERVAL, TickOutcome};
use handsign::session::Session;
use handsign::status::{StatusEvent, StatusSink};
use handsign::training::TrainError;
use support::handsign_env::HandsignEnvGuard;
use support::hands::{fist, open_hand, open_hand_missing_middle, write_detections};
use tempfile::tempdir;

fn replay(frames: Vec<Vec<HandDetection>>) -> SharedCapture {
    SharedCapture::new(BlankFrames::new(64, 48), ReplayDetector::from_frames(frames))
}

fn manual_session(
    settings: &AppSettings,
    frames: Vec<Vec<HandDetection>>,
    models: Option<ModelStore>,
) -> (Session, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let session = Session::with_clock(
        settings,
        replay(frames),
        models,
        StatusSink::disabled(),
        clock.clone(),
    );
    (session, clock)
}

fn record_ticks(session: &Session, clock: &ManualClock, ticks: usize) -> usize {
    let mut recorded = 0;
    for _ in 0..ticks {
        if matches!(session.recorder().tick(), TickOutcome::Recorded { .. }) {
            recorded += 1;
        }
        clock.advance(DEFAULT_SAMPLE_INTERVAL);
    }
    recorded
}

#[test]
fn single_connection_yields_exact_distances() {
    let mut settings = AppSettings::default();
    settings.topology.connections = vec![Connection::new("wrist", "thumb_tip")];
    settings.topology.pivot = String::new();
    let frames = [(3.0, 4.0), (6.0, 8.0), (5.0, 12.0)]
        .into_iter()
        .map(|(x, y)| {
            vec![HandDetection::new(vec![
                Keypoint::new("wrist", 0.0, 0.0),
                Keypoint::new("thumb_tip", x, y),
                Keypoint::new("index_finger_tip", 9.0, 9.0),
            ])]
        })
        .collect();
    let (session, clock) = manual_session(&settings, frames, None);

    session.recorder().start_recording("point");
    assert_eq!(record_ticks(&session, &clock, 3), 3);
    let samples = session
        .store()
        .read_dataset(|dataset| dataset.samples("point").map(<[_]>::to_vec))
        .unwrap();
    assert_eq!(samples, vec![vec![5.0], vec![10.0], vec![13.0]]);
    assert_eq!(session.store().extractor().current_feature_len(), 1);
}

#[test]
fn recorded_gestures_train_a_working_classifier() {
    let mut frames: Vec<Vec<HandDetection>> =
        (0..5).map(|i| vec![open_hand(i as f32 * 1.5)]).collect();
    frames.extend((0..5).map(|i| vec![fist(i as f32 * 1.5)]));
    let (session, clock) = manual_session(&AppSettings::default(), frames, None);

    assert!(session.trigger("A").unwrap().is_none());
    assert_eq!(record_ticks(&session, &clock, 5), 5);
    // The second trigger retrains on "A" alone before recording "B".
    assert!(session.trigger("B").unwrap().is_some());
    assert_eq!(record_ticks(&session, &clock, 5), 5);

    session.train().unwrap();
    let model = session.store().active_model().unwrap();
    assert_eq!(model.labels(), ["A".to_string(), "B".to_string()]);

    let mut inference = session.inference_loop();
    let output = inference.classify_detections(&[open_hand(3.0)]);
    assert_eq!(output.primary().map(|p| p.label.as_str()), Some("A"));
    let output = inference.classify_detections(&[fist(3.0)]);
    assert_eq!(output.primary().map(|p| p.label.as_str()), Some("B"));
}

#[test]
fn partial_first_frame_does_not_spoil_the_recording() {
    let mut frames = vec![vec![open_hand_missing_middle(0.0)]];
    frames.extend((0..5).map(|i| vec![open_hand(i as f32 * 1.5)]));
    frames.extend((0..5).map(|i| vec![fist(i as f32 * 1.5)]));
    let (session, clock) = manual_session(&AppSettings::default(), frames, None);

    session.recorder().start_recording("A");
    assert_eq!(record_ticks(&session, &clock, 6), 5);
    session.recorder().start_recording("B");
    assert_eq!(record_ticks(&session, &clock, 5), 5);
    assert_eq!(session.store().read_dataset(|d| d.sample_count()), 10);

    session.train().unwrap();
    let model = session.store().active_model().unwrap();
    assert_eq!(model.feature_len(), 18);
    let mut inference = session.inference_loop();
    let output = inference.classify_detections(&[fist(2.0)]);
    assert_eq!(output.primary().map(|p| p.label.as_str()), Some("B"));
}

#[test]
fn training_without_samples_fails_and_saves_nothing() {
    let dir = tempdir().unwrap();
    let models = ModelStore::new(dir.path().join("models"));
    let (session, _clock) = manual_session(&AppSettings::default(), Vec::new(), Some(models.clone()));

    assert!(matches!(session.train(), Err(TrainError::NoTrainableData)));
    assert!(session.store().active_model().is_none());
    assert!(models.load(MODEL_KEY).unwrap().is_none());
    assert!(!models.path_for(MODEL_KEY).unwrap().exists());
}

#[test]
fn recording_ends_on_its_own_when_the_timer_fires() {
    let mut settings = AppSettings::default();
    settings.recording.duration_ms = 150;
    settings.recording.sample_interval_ms = 20;
    let detector = ReplayDetector::from_frames(vec![vec![open_hand(0.0)]]).looping(true);
    let (status, rx) = StatusSink::channel();
    let mut session = Session::new(
        &settings,
        SharedCapture::new(BlankFrames::new(64, 48), detector),
        None,
        status,
    );
    session.start().unwrap();
    session.trigger("wave").unwrap();

    let give_up = Instant::now() + Duration::from_secs(5);
    while session.recorder().is_recording() && Instant::now() < give_up {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!session.recorder().is_recording());
    let recorded = session.store().read_dataset(|d| d.sample_count());
    std::thread::sleep(Duration::from_millis(100));
    session.stop();

    assert!(recorded >= 1);
    assert_eq!(session.store().read_dataset(|d| d.sample_count()), recorded);
    let events: Vec<StatusEvent> = rx.try_iter().collect();
    assert!(events.contains(&StatusEvent::Recording {
        label: "wave".into()
    }));
    assert!(events.contains(&StatusEvent::Cleared));
}

#[test]
fn trained_model_survives_a_restart() {
    let dir = tempdir().unwrap();
    let models = ModelStore::new(dir.path());
    let mut frames: Vec<Vec<HandDetection>> =
        (0..6).map(|i| vec![open_hand(i as f32)]).collect();
    frames.extend((0..6).map(|i| vec![fist(i as f32)]));

    let (session, clock) = manual_session(&AppSettings::default(), frames, Some(models.clone()));
    session.recorder().start_recording("open");
    record_ticks(&session, &clock, 6);
    session.recorder().start_recording("fist");
    record_ticks(&session, &clock, 6);
    session.train().unwrap();
    let trained = session.store().active_model().unwrap();
    drop(session);

    let (restarted, _clock) = manual_session(&AppSettings::default(), Vec::new(), Some(models));
    let loaded = restarted.store().active_model().unwrap();
    assert_eq!(loaded.descriptor, trained.descriptor);
    let mut inference = restarted.inference_loop();
    assert!(matches!(
        inference.classify_detections(&[fist(2.0)]),
        InferenceOutput::Detected(_)
    ));
}

#[test]
fn config_home_env_relocates_app_files() {
    let dir = tempdir().unwrap();
    let _guard = HandsignEnvGuard::set_config_home(dir.path().to_path_buf());

    let mut settings = config::load_or_default().unwrap();
    assert_eq!(settings, AppSettings::default());
    settings.recording.persist_dataset = true;
    config::save(&settings).unwrap();

    let root = dir.path().join(handsign::app_dirs::APP_DIR_NAME);
    assert!(root.join(config::CONFIG_FILE_NAME).is_file());
    assert_eq!(config::load_or_default().unwrap(), settings);
    assert_eq!(ModelStore::open_default().unwrap().dir(), root.join("models"));
}

#[test]
fn replayed_recording_persists_the_dataset() {
    let dir = tempdir().unwrap();
    let _guard = HandsignEnvGuard::set_config_home(dir.path().to_path_buf());
    let detections = dir.path().join("open.jsonl");
    write_detections(&detections, &[vec![open_hand(0.0)], vec![open_hand(1.0)]]);

    let mut settings = AppSettings::default();
    settings.recording.persist_dataset = true;
    let capture = SharedCapture::new(
        BlankFrames::new(64, 48),
        ReplayDetector::from_path(&detections).unwrap(),
    );
    let clock = Arc::new(ManualClock::new());
    let session = Session::with_clock(&settings, capture, None, StatusSink::disabled(), clock.clone());
    session.recorder().start_recording("open");
    assert_eq!(record_ticks(&session, &clock, 3), 2);

    let path = handsign::dataset::snapshot_path("gestures").unwrap();
    let snapshot = handsign::dataset::load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.samples_for("open").map(<[_]>::len), Some(2));
}
