//! Training-capture mode.
//!
//! While on, map clicks become [`TrainingPoint`]s: each is drawn immediately
//! and posted for annotation by the engine. An idle watchdog commits the batch
//! once no capture has happened for `idle_commit_s`. Committing an empty batch
//! is a no-op.

use foundation::geo::LngLat;
use foundation::time::Time;
use runtime::timers::{TimerId, TimerQueue};
use scene::surface::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingPoint {
    pub lat: f64,
    pub lng: f64,
    pub local_id: u64,
}

impl TrainingPoint {
    pub fn position(&self) -> LngLat {
        LngLat::new(self.lng, self.lat)
    }
}

#[derive(Debug)]
pub struct TrainingCapture {
    idle_commit_s: f64,
    on: bool,
    batch: Vec<TrainingPoint>,
    next_local_id: u64,
    watchdog: TimerQueue<()>,
    pending: Option<TimerId>,
}

impl TrainingCapture {
    pub fn new(idle_commit_s: f64) -> Self {
        Self {
            idle_commit_s,
            on: false,
            batch: Vec::new(),
            next_local_id: 1,
            watchdog: TimerQueue::new(),
            pending: None,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn batch(&self) -> &[TrainingPoint] {
        &self.batch
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.watchdog.next_deadline()
    }

    /// Switching off keeps the batch and disarms the watchdog.
    pub fn set_on(&mut self, on: bool) {
        self.on = on;
        if !on {
            self.disarm();
        }
    }

    /// Records a click. Ignored while the mode is off.
    pub fn capture(&mut self, now: Time, at: LngLat, surface: &mut impl MapSurface) -> Option<TrainingPoint> {
        if !self.on {
            return None;
        }
        let point = TrainingPoint {
            lat: at.lat,
            lng: at.lng,
            local_id: self.next_local_id,
        };
        self.next_local_id += 1;
        self.batch.push(point);
        surface.add_training_marker(point.local_id, at);

        self.disarm();
        self.pending = Some(self.watchdog.arm(now, self.idle_commit_s, ()));
        Some(point)
    }

    /// Whether the idle watchdog elapsed by `now`. The caller then commits.
    pub fn fire_due(&mut self, now: Time) -> bool {
        let mut due = false;
        while let Some((id, ())) = self.watchdog.pop_due(now) {
            if self.pending == Some(id) {
                self.pending = None;
                due = true;
            }
        }
        due
    }

    /// Takes the batch, clears its markers and turns the mode off.
    ///
    /// Returns `None` (and changes nothing) when the batch is empty.
    pub fn commit(&mut self, surface: &mut impl MapSurface) -> Option<Vec<TrainingPoint>> {
        if self.batch.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.batch);
        surface.clear_training_markers();
        self.set_on(false);
        Some(batch)
    }

    /// Drops the batch without committing it.
    pub fn clear(&mut self, surface: &mut impl MapSurface) {
        self.batch.clear();
        self.disarm();
        surface.clear_training_markers();
    }

    fn disarm(&mut self) {
        if let Some(id) = self.pending.take() {
            self.watchdog.cancel(id);
        }
    }
}
