use std::collections::BTreeMap;

use foundation::geo::{BBox, LngLat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Half-width of the box synthesized around a center-only region.
pub const DEFAULT_FALLBACK_SPAN_DEG: f64 = 0.25;

/// Camera zoom used when the backend omits one.
pub const DEFAULT_REGION_ZOOM: f64 = 11.0;

/// Region bounding box as the backend may send it: either the named-field
/// object or a `[min_lng, min_lat, max_lng, max_lat]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BBoxRecord {
    Fields(BBox),
    Array([f64; 4]),
}

impl BBoxRecord {
    pub fn to_bbox(self) -> BBox {
        match self {
            BBoxRecord::Fields(b) => b,
            BBoxRecord::Array([min_lng, min_lat, max_lng, max_lat]) => {
                BBox::new(min_lat, max_lat, min_lng, max_lng)
            }
        }
    }
}

/// One entry of `GET /regions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bbox: Option<BBoxRecord>,
    /// `[lng, lat]`.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// `GET /regions` body: group key → entries.
pub type RegionGroups = BTreeMap<String, Vec<RegionRecord>>;

/// A selectable map region with resolved framing.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    pub label: String,
    pub group: String,
    pub center: LngLat,
    pub zoom: f64,
    pub bbox: BBox,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionDefaults {
    pub fallback_span_deg: f64,
    pub zoom: f64,
}

impl Default for RegionDefaults {
    fn default() -> Self {
        Self {
            fallback_span_deg: DEFAULT_FALLBACK_SPAN_DEG,
            zoom: DEFAULT_REGION_ZOOM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("no selectable regions")]
    NoSelectableRegions,
}

/// Resolves a wire record into a map region.
///
/// Returns `None` for entries the map cannot frame: no bbox and no center, or
/// a degenerate bbox with no center to fall back on.
pub fn resolve_region(group: &str, record: &RegionRecord, defaults: RegionDefaults) -> Option<Region> {
    let center = record
        .center
        .map(|[lng, lat]| LngLat::new(lng, lat))
        .filter(LngLat::is_valid);
    let bbox = record
        .bbox
        .map(BBoxRecord::to_bbox)
        .filter(|b| !b.is_degenerate());

    let (center, bbox) = match (center, bbox) {
        (Some(c), Some(b)) => (c, b),
        (Some(c), None) => (c, BBox::around(c, defaults.fallback_span_deg)),
        (None, Some(b)) => (b.center(), b),
        (None, None) => return None,
    };

    let zoom = record
        .zoom
        .filter(|z| z.is_finite())
        .unwrap_or(defaults.zoom);

    Some(Region {
        id: record.id.clone(),
        label: record.name.clone(),
        group: group.to_string(),
        center,
        zoom,
        bbox,
        status: record.status.clone(),
    })
}

/// Flattens the grouped response into selectable regions, ordered by group key
/// then backend order. Unframeable entries are dropped.
pub fn regions_from_groups(groups: &RegionGroups, defaults: RegionDefaults) -> Vec<Region> {
    let mut out = Vec::new();
    for (group, records) in groups {
        for record in records {
            match resolve_region(group, record, defaults) {
                Some(region) => out.push(region),
                None => debug!(region = %record.id, "region has no usable bbox or center; skipped"),
            }
        }
    }
    out
}

/// The region list plus the current selection.
#[derive(Debug, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    selected: Option<String>,
}

impl RegionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn selected(&self) -> Option<&Region> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    /// Replaces the region list.
    ///
    /// On the first load with no selection, picks `preferred` (when present)
    /// or the first region, and returns it so the caller can move the camera
    /// and fetch. A selection that survives the reload is kept and `None` is
    /// returned.
    pub fn load(&mut self, regions: Vec<Region>, preferred: Option<&str>) -> Option<Region> {
        self.regions = regions;

        if let Some(id) = self.selected.as_deref() {
            if self.get(id).is_some() {
                return None;
            }
            warn!(region = %id, "selected region disappeared from catalog");
            self.selected = None;
        }

        let pick = preferred
            .and_then(|id| self.get(id))
            .or_else(|| self.regions.first())
            .cloned()?;
        self.selected = Some(pick.id.clone());
        Some(pick)
    }

    pub fn select(&mut self, id: &str) -> Result<Region, CatalogError> {
        if self.regions.is_empty() {
            return Err(CatalogError::NoSelectableRegions);
        }
        let region = self
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownRegion(id.to_string()))?;
        self.selected = Some(region.id.clone());
        Ok(region)
    }
}
