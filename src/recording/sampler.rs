use std::io;

use super::{RecordingController, TickOutcome};
use crate::worker::PeriodicWorker;

/// Start the thread that ticks `controller` at its sample interval.
pub fn spawn_sampler(controller: RecordingController) -> io::Result<PeriodicWorker> {
    let period = controller.options().sample_interval;
    PeriodicWorker::spawn("recording-sampler", period, move || {
        if let TickOutcome::Rejected(outcome) = controller.tick() {
            tracing::debug!("Sample rejected: {outcome:?}");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::detector::{BlankFrames, ReplayDetector, SharedCapture};
    use crate::recording::RecordingOptions;
    use crate::recording::tests::{thumb_hand, thumb_store};
    use crate::status::StatusSink;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn sampler_records_until_the_deadline() {
        let store = thumb_store();
        let detector = ReplayDetector::from_frames(vec![vec![thumb_hand(2.0)]]).looping(true);
        let controller = RecordingController::new(
            Arc::clone(&store),
            SharedCapture::new(BlankFrames::new(4, 4), detector),
            Arc::new(SystemClock),
            StatusSink::disabled(),
            RecordingOptions {
                duration: Duration::from_millis(120),
                sample_interval: Duration::from_millis(10),
                snapshot_path: None,
            },
        );
        let mut sampler = spawn_sampler(controller.clone()).unwrap();
        controller.start_recording("wave");

        let give_up = Instant::now() + Duration::from_secs(5);
        while controller.is_recording() && Instant::now() < give_up {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!controller.is_recording());
        let recorded = store.read_dataset(|d| d.sample_count());
        std::thread::sleep(Duration::from_millis(50));
        sampler.stop();
        assert!(recorded >= 1);
        assert_eq!(store.read_dataset(|d| d.sample_count()), recorded);
    }
}
