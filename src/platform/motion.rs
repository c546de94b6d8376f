//! Motion preference monitoring
//!
//! Reports whether the user has requested reduced motion. Injected as a
//! capability object; the watch-backed variant is torn down by dropping the
//! sensor alongside the owning component.

use tokio::sync::watch;

/// Source of the reduced-motion preference
pub trait MotionMonitor: Send + Sync {
    /// Whether reduced motion is currently requested
    fn prefers_reduced_motion(&self) -> bool;
}

/// Monitor with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticMotion(pub bool);

impl MotionMonitor for StaticMotion {
    fn prefers_reduced_motion(&self) -> bool {
        self.0
    }
}

/// Publisher half of a live preference feed
#[derive(Debug)]
pub struct MotionSensor {
    tx: watch::Sender<bool>,
}

impl MotionSensor {
    /// Publish a preference change
    pub fn set(&self, reduced: bool) {
        let _ = self.tx.send(reduced);
    }
}

/// Monitor fed by a `MotionSensor`
#[derive(Debug, Clone)]
pub struct WatchMotion {
    rx: watch::Receiver<bool>,
}

impl MotionMonitor for WatchMotion {
    fn prefers_reduced_motion(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Create a connected sensor/monitor pair. Dropping the sensor freezes the
/// monitor at the last published preference.
pub fn motion_channel(initial: bool) -> (MotionSensor, WatchMotion) {
    let (tx, rx) = watch::channel(initial);
    (MotionSensor { tx }, WatchMotion { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_motion_tracks_sensor() {
        let (sensor, monitor) = motion_channel(false);
        assert!(!monitor.prefers_reduced_motion());

        sensor.set(true);
        assert!(monitor.prefers_reduced_motion());
    }
}
