use camera::Choreographer;
use catalog::{Region, RegionCatalog, regions_from_groups};
use foundation::time::Time;
use foundation::view::ScreenPoint;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use runtime::event_bus::EventBus;
use runtime::frame::Frame;
use runtime::timers::TimerQueue;
use scene::asset::{Asset, AssetId};
use scene::inspection::InspectionOverlay;
use scene::layer::AssetLayer;
use scene::markers::{MarkerChange, MarkerLifecycle};
use scene::picking::{assets_in_band, pick_at};
use scene::surface::MapSurface;
use streaming::fetcher::{FetchRequest, ViewportFetcher};
use streaming::protocol::{AnnotationRequest, TRAIN_SATELLITE_JOB};
use tracing::{debug, info, warn};

use crate::capture::TrainingCapture;
use crate::config::ViewerConfig;
use crate::effect::{Effect, ViewerEvent};
use crate::poller::StatusPoller;

/// Shortest period accepted for the repeating scan and poll clocks.
const MIN_PERIOD_S: f64 = 0.05;

/// Components that own timers, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clock {
    Camera,
    Markers,
    Fetch,
    Capture,
    Scan,
    Poll,
}

/// The map engine: one instance per map view.
///
/// All state lives here and is mutated only through `&mut self`, so event
/// handlers, timer callbacks and frame steps are serialized by construction.
pub struct Viewer<S: MapSurface> {
    config: ViewerConfig,
    surface: S,
    now: Time,
    frame: Frame,
    started: bool,
    catalog: RegionCatalog,
    fetcher: ViewportFetcher,
    layer: AssetLayer,
    markers: MarkerLifecycle,
    overlay: InspectionOverlay,
    camera: Choreographer,
    capture: TrainingCapture,
    poller: StatusPoller,
    scan: TimerQueue<()>,
    rng: StdRng,
    /// Asset glyph currently under the pointer.
    hovered: Option<AssetId>,
    bus: EventBus,
    effects: Vec<Effect>,
}

impl<S: MapSurface> Viewer<S> {
    pub fn new(config: ViewerConfig, surface: S) -> Self {
        let rng = match config.scan_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            fetcher: ViewportFetcher::new(config.fetch),
            markers: MarkerLifecycle::new(config.markers),
            overlay: InspectionOverlay::new(config.imagery.clone()),
            camera: Choreographer::new(config.camera),
            capture: TrainingCapture::new(config.capture_idle_commit_s),
            poller: StatusPoller::new(config.status_poll_interval_s.max(MIN_PERIOD_S)),
            config,
            surface,
            now: Time::ZERO,
            frame: Frame::at(0, 0.0, Time::ZERO),
            started: false,
            catalog: RegionCatalog::new(),
            layer: AssetLayer::new(),
            scan: TimerQueue::new(),
            rng,
            hovered: None,
            bus: EventBus::new(),
            effects: Vec::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn last_frame(&self) -> Frame {
        self.frame
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn fetcher(&self) -> &ViewportFetcher {
        &self.fetcher
    }

    pub fn layer(&self) -> &AssetLayer {
        &self.layer
    }

    pub fn markers(&self) -> &MarkerLifecycle {
        &self.markers
    }

    pub fn overlay(&self) -> &InspectionOverlay {
        &self.overlay
    }

    pub fn camera(&self) -> &Choreographer {
        &self.camera
    }

    pub fn capture(&self) -> &TrainingCapture {
        &self.capture
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Hands the accumulated trace to the host and empties the bus.
    pub fn drain_trace(&mut self) -> Vec<runtime::event_bus::Event> {
        self.bus.drain()
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Requests the region catalog and starts the scan and poll clocks.
    pub fn start(&mut self, now: Time) {
        if self.started {
            return;
        }
        self.started = true;
        self.advance_to(now);
        self.effects.push(Effect::LoadRegions);
        self.scan.arm(now, self.config.scan_interval_s.max(MIN_PERIOD_S), ());
        self.poller.start(now);
    }

    /// Earliest pending timer across all components.
    pub fn next_deadline(&self) -> Option<Time> {
        self.deadlines()
            .into_iter()
            .filter_map(|(d, _)| d)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Fires every timer due by `now`, in deadline order across components.
    pub fn advance_to(&mut self, now: Time) {
        while let Some((at, clock)) = self.next_due(now) {
            if at > self.now {
                self.now = at;
            }
            self.fire(clock, at);
            self.flush_marker_changes();
        }
        if now > self.now {
            self.now = now;
        }
    }

    /// One rendered frame at `now`: timers first, then the orbit step.
    pub fn frame(&mut self, now: Time) -> Frame {
        self.advance_to(now);
        let prev = self.frame;
        self.frame = Frame::at(prev.index + 1, now.since(prev.time), now);
        self.camera.on_frame(&mut self.surface);
        self.frame
    }

    pub fn handle(&mut self, now: Time, event: ViewerEvent) {
        self.advance_to(now);
        match event {
            ViewerEvent::RegionsLoaded(Ok(groups)) => {
                let regions = regions_from_groups(&groups, self.config.regions);
                info!(count = regions.len(), "region catalog loaded");
                self.bus.emit(self.now, "regions.loaded", format!("{} regions", regions.len()));
                if let Some(region) = self.catalog.load(regions, self.config.default_region.as_deref()) {
                    self.enter_region(region);
                }
            }
            ViewerEvent::RegionsLoaded(Err(err)) => {
                warn!(error = %err, "region catalog unavailable");
                self.bus.emit(self.now, "regions.failed", err.to_string());
            }
            ViewerEvent::SelectRegion(id) => match self.catalog.select(&id) {
                Ok(region) => self.enter_region(region),
                Err(err) => warn!(error = %err, "region selection rejected"),
            },
            ViewerEvent::AssetsLoaded { stamp, result } => match result {
                Ok(assets) => {
                    if self.fetcher.accept(&stamp) {
                        let n = self.layer.replace(assets, &mut self.surface);
                        debug!(seq = stamp.seq, points = n, "asset layer replaced");
                        self.bus.emit(self.now, "fetch.applied", format!("seq={} points={n}", stamp.seq));
                    } else {
                        self.bus.emit(self.now, "fetch.stale", format!("seq={} region={}", stamp.seq, stamp.region));
                    }
                }
                Err(err) => {
                    warn!(seq = stamp.seq, error = %err, "asset fetch failed; keeping previous assets");
                    self.bus.emit(self.now, "fetch.failed", err.to_string());
                }
            },
            ViewerEvent::ViewportMoved => self.on_viewport_moved(),
            ViewerEvent::PointerMoved(at) => self.update_hover(at),
            ViewerEvent::PointerDown(_) => self.camera.on_pointer_down(&mut self.surface),
            ViewerEvent::PointerUp(_) => self.camera.on_pointer_up(),
            ViewerEvent::Click { at, lnglat } => {
                if self.capture.is_on() {
                    if let Some(point) = self.capture.capture(self.now, lnglat, &mut self.surface) {
                        self.bus.emit(self.now, "capture.point", format!("#{}", point.local_id));
                        self.effects.push(Effect::PostAnnotation {
                            local_id: point.local_id,
                            body: AnnotationRequest {
                                lat: point.lat,
                                lon: point.lng,
                                dataset: self.config.annotation_dataset.clone(),
                            },
                        });
                    }
                } else {
                    match pick_at(&self.layer, &self.surface, at, self.config.pick_radius_px).cloned() {
                        Some(asset) => self.expand(&asset),
                        None => self.background_click(),
                    }
                }
            }
            ViewerEvent::CardHover { id, inside } => {
                if inside {
                    if let Some(asset) = self.markers.asset(&id).cloned() {
                        self.markers.hover_enter(&asset, &mut self.surface);
                    }
                } else {
                    self.markers.hover_leave(&id, self.now);
                }
            }
            ViewerEvent::Collapse => self.collapse_expanded(),
            ViewerEvent::ToggleStreetProvider => self.overlay.toggle_provider(),
            ViewerEvent::ImageWheel(delta) => self.overlay.wheel(delta),
            ViewerEvent::ImageDrag { dx, dy } => self.overlay.drag(dx, dy),
            ViewerEvent::SetRotation(on) => self.camera.set_rotating(on),
            ViewerEvent::SetCapture(on) => {
                self.capture.set_on(on);
                self.bus.emit(self.now, "capture.mode", if on { "on" } else { "off" });
            }
            ViewerEvent::CommitCapture => self.commit_capture("manual"),
            ViewerEvent::ClearCapture => self.capture.clear(&mut self.surface),
            ViewerEvent::AnnotationPosted { local_id, result } => match result {
                Ok(()) => debug!(local_id, "training point posted"),
                Err(err) => warn!(local_id, error = %err, "training point post failed"),
            },
            ViewerEvent::PipelineStarted(result) => match result {
                Ok(()) => info!("training job started"),
                Err(err) => warn!(error = %err, "training job request failed"),
            },
            ViewerEvent::StatusPolled(result) => {
                let finished = match result {
                    Ok(status) => self.poller.on_result(Some(status)),
                    Err(err) => {
                        debug!(error = %err, "status poll failed");
                        self.poller.on_result(None)
                    }
                };
                if finished {
                    self.on_job_finished();
                }
            }
        }
        self.flush_marker_changes();
    }

    fn deadlines(&self) -> [(Option<Time>, Clock); 6] {
        [
            (self.camera.next_deadline(), Clock::Camera),
            (self.markers.next_deadline(), Clock::Markers),
            (self.fetcher.next_deadline(), Clock::Fetch),
            (self.capture.next_deadline(), Clock::Capture),
            (self.scan.next_deadline(), Clock::Scan),
            (self.poller.next_deadline(), Clock::Poll),
        ]
    }

    fn next_due(&self, now: Time) -> Option<(Time, Clock)> {
        self.deadlines()
            .into_iter()
            .filter_map(|(d, clock)| d.filter(|d| *d <= now).map(|d| (d, clock)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    fn fire(&mut self, clock: Clock, at: Time) {
        match clock {
            Clock::Camera => {
                let before = self.camera.phase();
                self.camera.fire_due(at, &mut self.surface);
                let after = self.camera.phase();
                if before != after {
                    self.bus.emit(at, "camera.phase", after.as_str());
                }
            }
            Clock::Markers => self.markers.fire_due(at, &mut self.surface),
            Clock::Fetch => {
                if let Some(req) = self.fetcher.fire_due(at) {
                    self.issue_fetch(req);
                }
            }
            Clock::Capture => {
                if self.capture.fire_due(at) {
                    self.commit_capture("idle");
                }
            }
            Clock::Scan => self.scan_cycle(at),
            Clock::Poll => {
                if self.poller.fire_due(at) {
                    self.effects.push(Effect::PollStatus {
                        log_lines: self.config.status_log_lines,
                    });
                }
            }
        }
    }

    fn enter_region(&mut self, region: Region) {
        info!(region = %region.id, zoom = region.zoom, "entering region");
        self.markers.clear(&mut self.surface);
        self.overlay.close();
        self.hovered = None;
        self.camera
            .enter_region(self.now, region.center, region.zoom, &mut self.surface);
        self.bus.emit(self.now, "region.enter", region.id.clone());
        let req = self.fetcher.set_region(&region.id, region.bbox, region.zoom);
        self.issue_fetch(req);
    }

    fn issue_fetch(&mut self, req: FetchRequest) {
        self.bus.emit(
            self.now,
            "fetch.issued",
            format!("seq={} trigger={}", req.stamp.seq, req.trigger.as_str()),
        );
        self.effects.push(Effect::FetchAssets(req));
    }

    fn on_viewport_moved(&mut self) {
        if self.camera.phase().in_transit() {
            return;
        }
        let zoom = self.surface.camera().zoom;
        let bbox = self.surface.visible_bounds();
        if let Some(req) = self.fetcher.viewport_moved(self.now, bbox, zoom) {
            self.issue_fetch(req);
        }
    }

    fn on_job_finished(&mut self) {
        info!("pipeline job finished; refreshing assets");
        self.bus.emit(self.now, "status.finished", "");
        let Some(bbox) = self.catalog.selected().map(|r| r.bbox) else {
            return;
        };
        if let Some(req) = self.fetcher.refresh(bbox) {
            self.issue_fetch(req);
        }
    }

    fn update_hover(&mut self, at: ScreenPoint) {
        let hit = pick_at(&self.layer, &self.surface, at, self.config.pick_radius_px).cloned();
        let still_active = self.hovered.as_ref().is_some_and(|id| self.markers.is_active(id));
        if still_active && hit.as_ref().map(|a| &a.id) == self.hovered.as_ref() {
            return;
        }
        if let Some(old) = self.hovered.take() {
            self.markers.hover_leave(&old, self.now);
        }
        if let Some(asset) = hit {
            self.markers.hover_enter(&asset, &mut self.surface);
            self.hovered = Some(asset.id);
        }
    }

    fn expand(&mut self, asset: &Asset) {
        self.markers.expand(asset, self.now, &mut self.surface);
        self.overlay.open(asset);
    }

    fn collapse_expanded(&mut self) {
        if let Some(id) = self.markers.expanded().map(|a| a.id.clone()) {
            self.markers.collapse(&id, self.now, &mut self.surface);
        }
        self.overlay.close();
    }

    /// Click on empty map: collapse the open card and drop stale hover state.
    fn background_click(&mut self) {
        self.collapse_expanded();
        self.hovered = None;
        self.markers.pointer_left_all(self.now);
    }

    fn scan_allowed(&self) -> bool {
        self.camera.allows_scan() && !self.markers.has_expanded() && !self.capture.is_on()
    }

    fn scan_cycle(&mut self, at: Time) {
        while self.scan.pop_due(at).is_some() {}
        self.scan.arm(at, self.config.scan_interval_s.max(MIN_PERIOD_S), ());
        if !self.scan_allowed() {
            return;
        }
        let candidates: Vec<Asset> = assets_in_band(&self.layer, &self.surface, self.config.scan_band)
            .into_iter()
            .filter(|a| !self.markers.is_active(&a.id))
            .cloned()
            .collect();
        let Some(pick) = candidates.choose(&mut self.rng) else {
            return;
        };
        debug!(asset = %pick.id, candidates = candidates.len(), "scan promotion");
        self.markers.promote(pick, at, &mut self.surface);
    }

    fn commit_capture(&mut self, reason: &'static str) {
        match self.capture.commit(&mut self.surface) {
            Some(batch) => {
                info!(points = batch.len(), reason, "committing training batch");
                self.bus.emit(self.now, "capture.commit", format!("{} points ({reason})", batch.len()));
                self.effects.push(Effect::RunPipeline {
                    job_type: TRAIN_SATELLITE_JOB.to_string(),
                    params: self.config.train_params,
                });
            }
            None => debug!(reason, "training batch empty; nothing to commit"),
        }
    }

    fn flush_marker_changes(&mut self) {
        for change in self.markers.drain_changes() {
            let (kind, message) = match change {
                MarkerChange::Activated { id, via } => ("marker.activate", format!("{id} via {via:?}")),
                MarkerChange::Expanded(id) => ("marker.expand", id.to_string()),
                MarkerChange::Collapsed(id) => ("marker.collapse", id.to_string()),
                MarkerChange::Evicted { id, reason } => ("marker.evict", format!("{id} {reason:?}")),
            };
            debug!(kind, %message, "marker transition");
            self.bus.emit(self.now, kind, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Viewer;
    use crate::config::ViewerConfig;
    use crate::effect::{Effect, ViewerEvent};
    use catalog::RegionGroups;
    use foundation::geo::{BBox, LngLat};
    use foundation::time::Time;
    use foundation::view::{CameraPose, ScreenPoint};
    use pretty_assertions::assert_eq;
    use scene::asset::{Asset, AssetId, AssetStatus};
    use scene::markers::MarkerState;
    use scene::surface::{HeadlessSurface, MapSurface};
    use serde_json::json;
    use streaming::fetcher::{FetchRequest, FetchTrigger};
    use streaming::protocol::PipelineJobStatus;

    fn groups() -> RegionGroups {
        serde_json::from_value(json!({
            "PA": [
                {"id": "dauphin_pa", "name": "Dauphin County",
                 "bbox": {"min_lat": 39.9, "max_lat": 40.5, "min_lng": -77.2, "max_lng": -76.2},
                 "center": [-76.8, 40.2], "zoom": 11.0, "status": "ready"},
                {"id": "york_pa", "name": "York County",
                 "bbox": {"min_lat": 39.7, "max_lat": 40.1, "min_lng": -77.0, "max_lng": -76.4},
                 "center": [-76.7, 39.9], "zoom": 11.5, "status": "ready"}
            ]
        }))
        .unwrap()
    }

    fn mt1() -> Asset {
        Asset::new("MT-1", 40.1, -76.8, AssetStatus::Verified, 0.92)
    }

    fn fetches(effects: &[Effect]) -> Vec<FetchRequest> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::FetchAssets(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    fn viewer() -> Viewer<HeadlessSurface> {
        let config = ViewerConfig {
            scan_seed: Some(7),
            ..ViewerConfig::default()
        };
        Viewer::new(config, HeadlessSurface::new(800.0, 600.0))
    }

    /// Started viewer with the default region selected; returns its fetch.
    fn with_region() -> (Viewer<HeadlessSurface>, FetchRequest) {
        let mut v = viewer();
        v.start(Time(0.0));
        assert_eq!(v.drain_effects(), vec![Effect::LoadRegions]);
        v.handle(Time(0.1), ViewerEvent::RegionsLoaded(Ok(groups())));
        let mut reqs = fetches(&v.drain_effects());
        assert_eq!(reqs.len(), 1);
        (v, reqs.remove(0))
    }

    /// Region landed, `assets` rendered and the camera parked over MT-1.
    fn landed_over_mt1(assets: Vec<Asset>) -> Viewer<HeadlessSurface> {
        let (mut v, req) = with_region();
        v.handle(Time(0.2), ViewerEvent::AssetsLoaded { stamp: req.stamp, result: Ok(assets) });
        v.advance_to(Time(8.0));
        assert!(v.camera().allows_scan());
        v.surface_mut()
            .set_camera(CameraPose::new(LngLat::new(-76.8, 40.1), 17.0, 0.0, 0.0));
        v.drain_effects();
        v
    }

    #[test]
    fn region_catalog_selects_and_fetches_once() {
        let (v, req) = with_region();
        assert_eq!(v.catalog().regions().len(), 2);
        assert_eq!(v.catalog().selected().unwrap().id, "dauphin_pa");
        assert_eq!(req.trigger, FetchTrigger::Region);
        assert_eq!(req.stamp.region, "dauphin_pa");
        assert_eq!(req.bbox, BBox::new(39.9, 40.5, -77.2, -76.2));

        let (pose, _) = v.surface().flights()[0];
        assert_eq!(pose.center, LngLat::new(-76.8, 40.2));
        assert_eq!(pose.zoom, 11.0);
    }

    #[test]
    fn selecting_a_region_moves_camera_and_fetches_scoped_assets() {
        let (mut v, _) = with_region();
        v.handle(Time(1.0), ViewerEvent::SelectRegion("york_pa".to_string()));
        let reqs = fetches(&v.drain_effects());
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].bbox, BBox::new(39.7, 40.1, -77.0, -76.4));

        let (pose, _) = *v.surface().flights().last().unwrap();
        assert_eq!(pose.center, LngLat::new(-76.7, 39.9));
        assert_eq!(pose.zoom, 11.5);
        assert_eq!(pose.pitch, 0.0);

        v.handle(Time(1.1), ViewerEvent::SelectRegion("nowhere".to_string()));
        assert!(fetches(&v.drain_effects()).is_empty());
        assert_eq!(v.catalog().selected().unwrap().id, "york_pa");
    }

    #[test]
    fn fetched_assets_render_without_activating_markers() {
        let (mut v, req) = with_region();
        v.handle(Time(0.5), ViewerEvent::AssetsLoaded { stamp: req.stamp, result: Ok(vec![mt1()]) });
        v.advance_to(Time(2.0));

        assert_eq!(v.surface().points().len(), 1);
        assert_eq!(v.surface().points()[0].id, AssetId::new("MT-1"));
        assert!(v.markers().is_empty());
        assert!(v.surface().markers().is_empty());
    }

    #[test]
    fn hover_expand_collapse_then_evict() {
        let mut v = landed_over_mt1(vec![mt1()]);
        let id = AssetId::new("MT-1");
        let centre = ScreenPoint::new(400.0, 300.0);

        v.handle(Time(8.0), ViewerEvent::PointerMoved(centre));
        assert_eq!(v.markers().state(&id), MarkerState::Unexpanded);

        v.handle(Time(8.2), ViewerEvent::Click { at: centre, lnglat: LngLat::new(-76.8, 40.1) });
        assert_eq!(v.markers().state(&id), MarkerState::Expanded);
        assert!(!v.markers().has_pending_eviction(&id));
        assert!(v.overlay().is_open_for(&id));

        let away = ScreenPoint::new(60.0, 60.0);
        v.handle(Time(8.5), ViewerEvent::PointerMoved(away));
        v.handle(Time(9.0), ViewerEvent::Click { at: away, lnglat: LngLat::new(-76.9, 40.2) });
        assert_eq!(v.markers().state(&id), MarkerState::Unexpanded);
        assert!(v.overlay().view().is_none());

        v.advance_to(Time(11.9));
        assert!(v.markers().is_active(&id));
        v.advance_to(Time(12.0));
        assert_eq!(v.markers().state(&id), MarkerState::Inactive);
        assert!(v.surface().markers().is_empty());
        assert_eq!(v.bus().count("marker.evict"), 1);
    }

    #[test]
    fn late_response_for_previous_region_is_discarded() {
        let (mut v, a) = with_region();
        v.handle(Time(0.5), ViewerEvent::SelectRegion("york_pa".to_string()));
        let b = fetches(&v.drain_effects()).remove(0);

        let york = Asset::new("Y-1", 39.9, -76.7, AssetStatus::New, 0.7);
        v.handle(Time(0.8), ViewerEvent::AssetsLoaded { stamp: b.stamp, result: Ok(vec![york]) });
        v.handle(Time(1.5), ViewerEvent::AssetsLoaded { stamp: a.stamp, result: Ok(vec![mt1()]) });

        let ids: Vec<_> = v.layer().iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, vec!["Y-1"]);
        assert_eq!(v.surface().points().len(), 1);
        assert_eq!(v.bus().count("fetch.stale"), 1);
    }

    #[test]
    fn moves_during_flight_are_ignored_and_later_moves_debounce() {
        let (mut v, _) = with_region();
        v.handle(Time(1.0), ViewerEvent::ViewportMoved);
        assert!(!v.fetcher().has_pending_debounce());

        // Landing took the zoom from 11 to street scale: the first settled
        // move crosses the asset threshold and fetches at once.
        v.advance_to(Time(8.0));
        v.drain_effects();
        v.handle(Time(8.0), ViewerEvent::ViewportMoved);
        let reqs = fetches(&v.drain_effects());
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].trigger, FetchTrigger::ZoomThreshold);

        v.handle(Time(8.1), ViewerEvent::ViewportMoved);
        v.handle(Time(8.3), ViewerEvent::ViewportMoved);
        assert!(fetches(&v.drain_effects()).is_empty());
        v.advance_to(Time(8.9));
        let reqs = fetches(&v.drain_effects());
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].trigger, FetchTrigger::Viewport);
    }

    #[test]
    fn scan_promotes_assets_in_the_forward_band_unless_suppressed() {
        // Lower centre of the canvas while looking at MT-1.
        let mut probe = HeadlessSurface::new(800.0, 600.0);
        probe.jump_to(CameraPose::new(LngLat::new(-76.8, 40.1), 17.0, 0.0, 0.0));
        let low = probe.unproject(ScreenPoint::new(400.0, 450.0));
        let front = Asset::new("F-1", low.lat, low.lng, AssetStatus::Review, 0.8);

        let mut v = landed_over_mt1(vec![mt1(), front]);
        v.advance_to(Time(9.7));
        assert_eq!(v.markers().active_ids(), vec![AssetId::new("F-1")]);

        // An expanded card pauses promotion.
        let mut v = landed_over_mt1(vec![mt1(), Asset::new("F-2", low.lat, low.lng, AssetStatus::New, 0.5)]);
        let centre = ScreenPoint::new(400.0, 300.0);
        v.handle(Time(8.0), ViewerEvent::Click { at: centre, lnglat: LngLat::new(-76.8, 40.1) });
        v.advance_to(Time(20.0));
        assert_eq!(v.markers().active_ids(), vec![AssetId::new("MT-1")]);
    }

    #[test]
    fn scan_promotions_never_evict_the_hovered_marker() {
        let mut probe = HeadlessSurface::new(800.0, 600.0);
        probe.jump_to(CameraPose::new(LngLat::new(-76.8, 40.1), 17.0, 0.0, 0.0));
        let in_band: Vec<Asset> = [300.0, 400.0, 500.0]
            .into_iter()
            .enumerate()
            .map(|(i, x)| {
                let p = probe.unproject(ScreenPoint::new(x, 450.0));
                Asset::new(format!("B-{i}"), p.lat, p.lng, AssetStatus::New, 0.6)
            })
            .collect();
        let mut assets = vec![mt1()];
        assets.extend(in_band);

        let mut v = landed_over_mt1(assets);
        let id = AssetId::new("MT-1");
        let centre = ScreenPoint::new(400.0, 300.0);
        v.handle(Time(8.0), ViewerEvent::PointerMoved(centre));

        // Scans at 8.4, 9.6 and 10.8 promote all three band assets.
        v.advance_to(Time(10.9));
        assert_eq!(v.markers().len(), 3);
        assert_eq!(v.markers().state(&id), MarkerState::Unexpanded);
        assert!(v.markers().is_hovered(&id));
        assert_eq!(v.bus().count("marker.evict"), 1);

        v.handle(Time(11.0), ViewerEvent::PointerMoved(centre));
        assert_eq!(v.markers().state(&id), MarkerState::Unexpanded);
    }

    #[test]
    fn capture_mode_posts_each_click_and_commits_after_idle() {
        let mut v = landed_over_mt1(vec![mt1()]);
        v.handle(Time(10.0), ViewerEvent::SetCapture(true));
        for (i, t) in [10.0, 11.0, 12.0].into_iter().enumerate() {
            let p = LngLat::new(-76.8 + i as f64 * 0.001, 40.1);
            v.handle(Time(t), ViewerEvent::Click { at: ScreenPoint::new(400.0, 300.0), lnglat: p });
        }
        assert!(v.markers().is_empty());
        assert_eq!(v.surface().training_markers().len(), 3);

        let effects = v.drain_effects();
        let posts: Vec<_> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::PostAnnotation { local_id, body } => Some((*local_id, body.lon)),
                _ => None,
            })
            .collect();
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[2].0, 3);

        v.advance_to(Time(16.9));
        assert!(v.capture().is_on());
        v.advance_to(Time(17.0));
        let runs: Vec<_> = v
            .drain_effects()
            .into_iter()
            .filter(|e| matches!(e, Effect::RunPipeline { .. }))
            .collect();
        assert_eq!(runs.len(), 1);
        let Effect::RunPipeline { job_type, .. } = &runs[0] else {
            unreachable!()
        };
        assert_eq!(job_type, "train_satellite");
        assert!(!v.capture().is_on());
        assert!(v.capture().batch().is_empty());
        assert!(v.surface().training_markers().is_empty());
    }

    #[test]
    fn empty_commit_issues_no_backend_call() {
        let mut v = viewer();
        v.start(Time(0.0));
        v.handle(Time(0.1), ViewerEvent::SetCapture(true));
        v.handle(Time(0.2), ViewerEvent::CommitCapture);
        assert!(!v.drain_effects().iter().any(|e| matches!(e, Effect::RunPipeline { .. })));
        assert!(v.capture().is_on());
    }

    #[test]
    fn finished_job_triggers_refetch_of_the_region() {
        let (mut v, _) = with_region();
        v.advance_to(Time(1.0));
        assert!(v.drain_effects().contains(&Effect::PollStatus { log_lines: 20 }));

        let running = PipelineJobStatus {
            running: true,
            ..PipelineJobStatus::default()
        };
        v.handle(Time(1.1), ViewerEvent::StatusPolled(Ok(running)));
        v.advance_to(Time(2.0));
        v.drain_effects();
        v.handle(Time(2.1), ViewerEvent::StatusPolled(Ok(PipelineJobStatus::default())));

        let reqs = fetches(&v.drain_effects());
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].trigger, FetchTrigger::Refresh);
        assert_eq!(reqs[0].bbox, BBox::new(39.9, 40.5, -77.2, -76.2));
    }

    #[test]
    fn orbit_runs_per_frame_after_landing() {
        let (mut v, _) = with_region();
        v.frame(Time(7.7));
        let before = v.surface().camera().bearing;
        let frame = v.frame(Time(7.716));
        assert_eq!(frame.index, 2);
        assert!((v.surface().camera().bearing - before - 0.04).abs() < 1e-9);
    }
}
