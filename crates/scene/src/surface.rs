//! Contract between the viewer and the host mapping engine.
//!
//! The engine never renders; it tells the surface which points make up the
//! asset layer, which anchored card elements exist, where training captures
//! sit and where the camera should go. The surface answers projection queries.

use std::collections::BTreeMap;

use foundation::geo::{BBox, LngLat};
use foundation::math::{lng_lat_to_world_px, world_px_to_lng_lat};
use foundation::view::{CameraPose, ScreenPoint, ScreenSize};

use crate::asset::{Asset, AssetId, AssetStatus};

/// Handle for an anchored view element owned by the surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

/// One geometry point of the rendered asset layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPoint {
    pub id: AssetId,
    pub position: LngLat,
    pub status: AssetStatus,
    pub confidence: f64,
}

impl From<&Asset> for AssetPoint {
    fn from(a: &Asset) -> Self {
        Self {
            id: a.id.clone(),
            position: a.position(),
            status: a.status.clone(),
            confidence: a.confidence,
        }
    }
}

pub trait MapSurface {
    fn viewport(&self) -> ScreenSize;

    /// Current camera as reported by the engine (after user drags, flights).
    fn camera(&self) -> CameraPose;

    /// Canvas position of `at`, or `None` when it is off screen.
    fn project(&self, at: LngLat) -> Option<ScreenPoint>;

    /// Geographic bounds of what is currently on screen.
    fn visible_bounds(&self) -> BBox;

    /// Replaces the backing point collection of the asset layer.
    fn set_asset_points(&mut self, points: &[AssetPoint]);

    /// Mounts a card element anchored at the base of `asset`'s glyph.
    fn mount_marker(&mut self, asset: &Asset) -> ElementId;

    fn set_marker_expanded(&mut self, element: ElementId, expanded: bool);

    fn unmount_marker(&mut self, element: ElementId);

    fn add_training_marker(&mut self, local_id: u64, at: LngLat);

    fn clear_training_markers(&mut self);

    /// Animated camera move.
    fn fly_to(&mut self, pose: CameraPose, duration_s: f64);

    /// Immediate camera change (used for per-frame orbit steps).
    fn jump_to(&mut self, pose: CameraPose);

    /// Cancels any running camera animation, leaving the camera where it is.
    fn stop_camera(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct MountedMarker {
    pub asset: AssetId,
    pub expanded: bool,
}

/// A surface with no renderer behind it.
///
/// Used by the host binary when running without a display and by tests. It
/// projects with web-mercator around the camera center (bearing applied,
/// pitch ignored), applies camera moves instantly and records everything it
/// is asked to do.
#[derive(Debug)]
pub struct HeadlessSurface {
    size: ScreenSize,
    camera: CameraPose,
    points: Vec<AssetPoint>,
    markers: BTreeMap<ElementId, MountedMarker>,
    training: Vec<(u64, LngLat)>,
    flights: Vec<(CameraPose, f64)>,
    next_element: u64,
    point_uploads: usize,
    stops: usize,
}

impl HeadlessSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: ScreenSize::new(width, height),
            camera: CameraPose::global(),
            points: Vec::new(),
            markers: BTreeMap::new(),
            training: Vec::new(),
            flights: Vec::new(),
            next_element: 1,
            point_uploads: 0,
            stops: 0,
        }
    }

    pub fn points(&self) -> &[AssetPoint] {
        &self.points
    }

    pub fn point_uploads(&self) -> usize {
        self.point_uploads
    }

    pub fn markers(&self) -> &BTreeMap<ElementId, MountedMarker> {
        &self.markers
    }

    pub fn marker_for(&self, asset: &AssetId) -> Option<(&ElementId, &MountedMarker)> {
        self.markers.iter().find(|(_, m)| &m.asset == asset)
    }

    pub fn training_markers(&self) -> &[(u64, LngLat)] {
        &self.training
    }

    pub fn flights(&self) -> &[(CameraPose, f64)] {
        &self.flights
    }

    pub fn stops(&self) -> usize {
        self.stops
    }

    /// Simulates a user drag landing the camera somewhere else.
    pub fn set_camera(&mut self, pose: CameraPose) {
        self.camera = pose;
    }

    /// Inverse of [`MapSurface::project`] for on-canvas points.
    pub fn unproject(&self, p: ScreenPoint) -> LngLat {
        let cam = self.camera;
        let c = lng_lat_to_world_px(cam.center, cam.zoom);
        let dx = p.x - 0.5 * self.size.width;
        let dy = p.y - 0.5 * self.size.height;
        let (sin, cos) = cam.bearing.to_radians().sin_cos();
        let wx = dx * cos - dy * sin;
        let wy = dx * sin + dy * cos;
        world_px_to_lng_lat([c[0] + wx, c[1] + wy], cam.zoom)
    }

    fn project_unclipped(&self, at: LngLat) -> ScreenPoint {
        let cam = self.camera;
        let c = lng_lat_to_world_px(cam.center, cam.zoom);
        let w = lng_lat_to_world_px(at, cam.zoom);
        let dx = w[0] - c[0];
        let dy = w[1] - c[1];
        // Map north rotates by -bearing on screen.
        let (sin, cos) = cam.bearing.to_radians().sin_cos();
        let sx = dx * cos + dy * sin;
        let sy = -dx * sin + dy * cos;
        ScreenPoint::new(0.5 * self.size.width + sx, 0.5 * self.size.height + sy)
    }
}

impl MapSurface for HeadlessSurface {
    fn viewport(&self) -> ScreenSize {
        self.size
    }

    fn camera(&self) -> CameraPose {
        self.camera
    }

    fn project(&self, at: LngLat) -> Option<ScreenPoint> {
        let p = self.project_unclipped(at);
        let on_screen = (0.0..=self.size.width).contains(&p.x) && (0.0..=self.size.height).contains(&p.y);
        on_screen.then_some(p)
    }

    fn visible_bounds(&self) -> BBox {
        let corners = [
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(self.size.width, 0.0),
            ScreenPoint::new(0.0, self.size.height),
            ScreenPoint::new(self.size.width, self.size.height),
        ]
        .map(|p| self.unproject(p));

        let mut b = BBox::new(f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for c in corners {
            b.min_lat = b.min_lat.min(c.lat);
            b.max_lat = b.max_lat.max(c.lat);
            b.min_lng = b.min_lng.min(c.lng);
            b.max_lng = b.max_lng.max(c.lng);
        }
        b
    }

    fn set_asset_points(&mut self, points: &[AssetPoint]) {
        self.points = points.to_vec();
        self.point_uploads += 1;
    }

    fn mount_marker(&mut self, asset: &Asset) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        self.markers.insert(
            id,
            MountedMarker {
                asset: asset.id.clone(),
                expanded: false,
            },
        );
        id
    }

    fn set_marker_expanded(&mut self, element: ElementId, expanded: bool) {
        if let Some(m) = self.markers.get_mut(&element) {
            m.expanded = expanded;
        }
    }

    fn unmount_marker(&mut self, element: ElementId) {
        self.markers.remove(&element);
    }

    fn add_training_marker(&mut self, local_id: u64, at: LngLat) {
        self.training.push((local_id, at));
    }

    fn clear_training_markers(&mut self) {
        self.training.clear();
    }

    fn fly_to(&mut self, pose: CameraPose, duration_s: f64) {
        self.flights.push((pose, duration_s));
        self.camera = pose;
    }

    fn jump_to(&mut self, pose: CameraPose) {
        self.camera = pose;
    }

    fn stop_camera(&mut self) {
        self.stops += 1;
    }
}
