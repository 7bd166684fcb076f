//! Viewport-driven asset fetch scheduling.
//!
//! The fetcher decides *when* to fetch and *whether* a completion may be
//! applied; the host performs the HTTP call. Rules:
//! - a region change fetches immediately and cancels any pending debounce;
//! - pan/move re-arms a quiet-period timer carrying the newest bbox;
//! - a zoom change across `asset_min_zoom` fetches immediately;
//! - completions pass through a [`StaleResponseGuard`].

use foundation::geo::BBox;
use foundation::time::Time;
use runtime::timers::{TimerId, TimerQueue};
use tracing::debug;

use crate::request::{RequestStamp, StaleResponseGuard};

pub const DEFAULT_FETCH_DEBOUNCE_S: f64 = 0.5;
pub const DEFAULT_ASSET_MIN_ZOOM: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchConfig {
    pub debounce_s: f64,
    pub asset_min_zoom: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            debounce_s: DEFAULT_FETCH_DEBOUNCE_S,
            asset_min_zoom: DEFAULT_ASSET_MIN_ZOOM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Region,
    Viewport,
    ZoomThreshold,
    Refresh,
}

impl FetchTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchTrigger::Region => "region",
            FetchTrigger::Viewport => "viewport",
            FetchTrigger::ZoomThreshold => "zoom_threshold",
            FetchTrigger::Refresh => "refresh",
        }
    }
}

/// A fetch the host should perform.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub stamp: RequestStamp,
    pub bbox: BBox,
    pub trigger: FetchTrigger,
}

#[derive(Debug)]
pub struct ViewportFetcher {
    config: FetchConfig,
    next_seq: u64,
    guard: StaleResponseGuard,
    debounce: TimerQueue<BBox>,
    pending: Option<TimerId>,
    last_zoom: Option<f64>,
}

impl ViewportFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            next_seq: 1,
            guard: StaleResponseGuard::new(),
            debounce: TimerQueue::new(),
            pending: None,
            last_zoom: None,
        }
    }

    pub fn config(&self) -> FetchConfig {
        self.config
    }

    pub fn region(&self) -> Option<&str> {
        self.guard.region()
    }

    pub fn has_pending_debounce(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.debounce.next_deadline()
    }

    /// Switches region and issues its scoped fetch.
    pub fn set_region(&mut self, region: &str, bbox: BBox, zoom: f64) -> FetchRequest {
        self.cancel_debounce();
        self.guard.set_region(region, self.next_seq);
        self.last_zoom = Some(zoom);
        self.issue(bbox, FetchTrigger::Region)
    }

    /// Camera settled at a new viewport.
    ///
    /// Returns a request only when the zoom crossed the asset threshold;
    /// otherwise the debounce is re-armed and the fetch comes from
    /// [`ViewportFetcher::fire_due`].
    pub fn viewport_moved(&mut self, now: Time, bbox: BBox, zoom: f64) -> Option<FetchRequest> {
        self.guard.region()?;
        let crossed = self.last_zoom.is_some_and(|prev| {
            (prev >= self.config.asset_min_zoom) != (zoom >= self.config.asset_min_zoom)
        });
        self.last_zoom = Some(zoom);

        self.cancel_debounce();
        if crossed {
            return Some(self.issue(bbox, FetchTrigger::ZoomThreshold));
        }
        self.pending = Some(self.debounce.arm(now, self.config.debounce_s, bbox));
        None
    }

    pub fn fire_due(&mut self, now: Time) -> Option<FetchRequest> {
        let mut newest = None;
        while let Some((id, bbox)) = self.debounce.pop_due(now) {
            if self.pending == Some(id) {
                self.pending = None;
                newest = Some(bbox);
            }
        }
        newest.map(|bbox| self.issue(bbox, FetchTrigger::Viewport))
    }

    /// Immediate refetch of `bbox` for the current region.
    pub fn refresh(&mut self, bbox: BBox) -> Option<FetchRequest> {
        self.guard.region()?;
        self.cancel_debounce();
        Some(self.issue(bbox, FetchTrigger::Refresh))
    }

    /// Whether a completion carrying `stamp` may replace the rendered set.
    /// Accepting it marks it applied.
    pub fn accept(&mut self, stamp: &RequestStamp) -> bool {
        let ok = self.guard.accept(stamp);
        if !ok {
            debug!(seq = stamp.seq, region = %stamp.region, "discarding stale asset response");
        }
        ok
    }

    /// Clears the debounce on shutdown or reset.
    pub fn cancel_debounce(&mut self) {
        if let Some(id) = self.pending.take() {
            self.debounce.cancel(id);
        }
    }

    fn issue(&mut self, bbox: BBox, trigger: FetchTrigger) -> FetchRequest {
        let region = self.guard.region().unwrap_or_default().to_string();
        let stamp = RequestStamp::new(self.next_seq, region);
        self.next_seq += 1;
        debug!(seq = stamp.seq, trigger = trigger.as_str(), "asset fetch issued");
        FetchRequest { stamp, bbox, trigger }
    }
}
