//! Detail panel for the expanded asset.
//!
//! Everything here is derived data: the imagery URL, the structured fields and
//! the street-level panel state are computed from the asset and the imagery
//! configuration. Missing credentials degrade to
//! [`StreetPanel::ConfigurationRequired`]; nothing in this module fails.

use foundation::geo::{BBox, LngLat};
use url::Url;

use crate::asset::{Asset, AssetId, AssetStatus};

pub const DEFAULT_POINT_IMAGERY_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/export";
pub const MAPILLARY_GRAPH_URL: &str = "https://graph.mapillary.com";
pub const STREETVIEW_STATIC_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

pub const MIN_IMAGE_ZOOM: f64 = 1.0;
pub const MAX_IMAGE_ZOOM: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageryConfig {
    pub point_imagery_url: String,
    /// Half-width of the bbox requested around the asset, degrees.
    pub half_span_deg: f64,
    pub image_size_px: (u32, u32),
    pub mapillary_token: Option<String>,
    pub streetview_key: Option<String>,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            point_imagery_url: DEFAULT_POINT_IMAGERY_URL.to_string(),
            half_span_deg: 0.0004,
            image_size_px: (1024, 1024),
            mapillary_token: None,
            streetview_key: None,
        }
    }
}

impl ImageryConfig {
    /// Point-imagery export URL for a small bbox centred on `at`.
    ///
    /// `None` only when the configured base URL does not parse.
    pub fn point_imagery_url(&self, at: LngLat) -> Option<String> {
        let b = BBox::around(at, self.half_span_deg);
        let mut url = Url::parse(&self.point_imagery_url).ok()?;
        let (w, h) = self.image_size_px;
        url.query_pairs_mut()
            .append_pair(
                "bbox",
                &format!("{},{},{},{}", b.min_lng, b.min_lat, b.max_lng, b.max_lat),
            )
            .append_pair("bboxSR", "4326")
            .append_pair("imageSR", "4326")
            .append_pair("size", &format!("{w},{h}"))
            .append_pair("format", "jpg")
            .append_pair("f", "image");
        Some(url.into())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum StreetProvider {
    #[default]
    Mapillary,
    StreetView,
}

impl StreetProvider {
    pub fn toggled(self) -> Self {
        match self {
            StreetProvider::Mapillary => StreetProvider::StreetView,
            StreetProvider::StreetView => StreetProvider::Mapillary,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StreetProvider::Mapillary => "Mapillary",
            StreetProvider::StreetView => "Street View",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreetPanel {
    /// Request URL for the provider's image (Mapillary answers with JSON
    /// holding `thumb_2048_url`; Street View answers with the image itself).
    Image { provider: StreetProvider, url: String },
    /// The asset carries no reference for this provider.
    Unavailable { provider: StreetProvider },
    /// The provider needs a credential that is not configured.
    ConfigurationRequired { provider: StreetProvider },
}

pub fn street_panel(asset: &Asset, provider: StreetProvider, config: &ImageryConfig) -> StreetPanel {
    let (reference, credential) = match provider {
        StreetProvider::Mapillary => (asset.mapillary_key(), config.mapillary_token.as_deref()),
        StreetProvider::StreetView => (asset.streetview_pano(), config.streetview_key.as_deref()),
    };
    let Some(reference) = reference else {
        return StreetPanel::Unavailable { provider };
    };
    let Some(credential) = credential.filter(|c| !c.trim().is_empty()) else {
        return StreetPanel::ConfigurationRequired { provider };
    };

    let url = match provider {
        StreetProvider::Mapillary => mapillary_url(reference, credential),
        StreetProvider::StreetView => Url::parse_with_params(
            STREETVIEW_STATIC_URL,
            &[("size", "640x400"), ("pano", reference), ("key", credential)],
        )
        .ok(),
    };
    match url {
        Some(u) => StreetPanel::Image {
            provider,
            url: u.into(),
        },
        None => StreetPanel::Unavailable { provider },
    }
}

/// The image key is pushed as one encoded path segment, so it can never
/// change the host the token is sent to.
fn mapillary_url(key: &str, token: &str) -> Option<Url> {
    let mut url = Url::parse(MAPILLARY_GRAPH_URL).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(key);
    url.query_pairs_mut()
        .append_pair("fields", "thumb_2048_url")
        .append_pair("access_token", token);
    Some(url)
}

/// Structured fields shown beside the imagery.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionFields {
    pub id: AssetId,
    pub status: AssetStatus,
    /// Whole percent.
    pub confidence_pct: u8,
    pub sensors: Vec<String>,
    pub string_id: Option<String>,
    /// Matching record in an external inventory.
    pub cross_ref: Option<String>,
    pub confirming_image: Option<String>,
    pub position: LngLat,
    pub height_m: Option<f64>,
    pub issues: Vec<String>,
}

impl From<&Asset> for InspectionFields {
    fn from(a: &Asset) -> Self {
        Self {
            id: a.id.clone(),
            status: a.status.clone(),
            confidence_pct: (a.confidence.clamp(0.0, 1.0) * 100.0).round() as u8,
            sensors: a.sensors(),
            string_id: a.string_id().map(str::to_string),
            cross_ref: a.cross_ref().map(str::to_string),
            confirming_image: a.confirming_image().map(str::to_string),
            position: a.position(),
            height_m: a.height_m,
            issues: a.issues.clone(),
        }
    }
}

/// Zoom and pan of the primary image inside its frame.
///
/// The offset is in frame pixels and is clamped so the scaled image always
/// covers the frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImageViewport {
    pub zoom: f64,
    pub offset: (f64, f64),
    frame: (f64, f64),
}

impl ImageViewport {
    pub fn new(frame_w: f64, frame_h: f64) -> Self {
        Self {
            zoom: MIN_IMAGE_ZOOM,
            offset: (0.0, 0.0),
            frame: (frame_w.max(1.0), frame_h.max(1.0)),
        }
    }

    /// Scroll: positive `delta` zooms in by `delta` steps of 0.25x.
    pub fn wheel(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom + delta * 0.25).clamp(MIN_IMAGE_ZOOM, MAX_IMAGE_ZOOM);
        if self.zoom <= MIN_IMAGE_ZOOM {
            self.offset = (0.0, 0.0);
        }
        self.clamp_offset();
    }

    pub fn drag(&mut self, dx: f64, dy: f64) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.offset.0 += dx;
        self.offset.1 += dy;
        self.clamp_offset();
    }

    pub fn reset(&mut self) {
        self.zoom = MIN_IMAGE_ZOOM;
        self.offset = (0.0, 0.0);
    }

    fn max_offset(&self) -> (f64, f64) {
        let slack = (self.zoom - 1.0) * 0.5;
        (self.frame.0 * slack, self.frame.1 * slack)
    }

    fn clamp_offset(&mut self) {
        let (mx, my) = self.max_offset();
        self.offset.0 = self.offset.0.clamp(-mx, mx);
        self.offset.1 = self.offset.1.clamp(-my, my);
    }
}

/// Everything the detail panel renders for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionView {
    pub fields: InspectionFields,
    pub imagery_url: Option<String>,
    pub provider: StreetProvider,
    pub street: StreetPanel,
    pub image: ImageViewport,
}

/// The overlay owning at most one open inspection.
#[derive(Debug)]
pub struct InspectionOverlay {
    config: ImageryConfig,
    provider: StreetProvider,
    open: Option<(Asset, InspectionView)>,
}

impl InspectionOverlay {
    pub fn new(config: ImageryConfig) -> Self {
        Self {
            config,
            provider: StreetProvider::default(),
            open: None,
        }
    }

    pub fn config(&self) -> &ImageryConfig {
        &self.config
    }

    pub fn view(&self) -> Option<&InspectionView> {
        self.open.as_ref().map(|(_, v)| v)
    }

    pub fn is_open_for(&self, id: &AssetId) -> bool {
        self.open.as_ref().is_some_and(|(a, _)| &a.id == id)
    }

    pub fn open(&mut self, asset: &Asset) -> &InspectionView {
        let view = InspectionView {
            fields: InspectionFields::from(asset),
            imagery_url: self.config.point_imagery_url(asset.position()),
            provider: self.provider,
            street: street_panel(asset, self.provider, &self.config),
            image: ImageViewport::new(self.config.image_size_px.0 as f64, self.config.image_size_px.1 as f64),
        };
        let (_, v) = self.open.insert((asset.clone(), view));
        v
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    /// Switches the street-level provider; the choice sticks across assets.
    pub fn toggle_provider(&mut self) {
        self.provider = self.provider.toggled();
        if let Some((asset, view)) = self.open.as_mut() {
            view.provider = self.provider;
            view.street = street_panel(asset, self.provider, &self.config);
        }
    }

    pub fn wheel(&mut self, delta: f64) {
        if let Some((_, v)) = self.open.as_mut() {
            v.image.wheel(delta);
        }
    }

    pub fn drag(&mut self, dx: f64, dy: f64) {
        if let Some((_, v)) = self.open.as_mut() {
            v.image.drag(dx, dy);
        }
    }
}
