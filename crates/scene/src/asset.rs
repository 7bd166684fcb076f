use std::collections::BTreeMap;
use std::fmt;

use foundation::geo::LngLat;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Externally assigned, stable asset identifier.
///
/// The backend sends it as a string or a number; both normalise to text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => AssetId(s),
            Raw::Number(n) => AssetId(n.to_string()),
        })
    }
}

/// Fusion verdict for a detected pole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetStatus {
    Verified,
    Moved,
    New,
    Review,
    Critical,
    Other(String),
}

impl AssetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AssetStatus::Verified => "Verified",
            AssetStatus::Moved => "Moved",
            AssetStatus::New => "New",
            AssetStatus::Review => "Review",
            AssetStatus::Critical => "Critical",
            AssetStatus::Other(s) => s,
        }
    }
}

impl From<String> for AssetStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "verified" => AssetStatus::Verified,
            "moved" => AssetStatus::Moved,
            "new" => AssetStatus::New,
            "review" => AssetStatus::Review,
            "critical" => AssetStatus::Critical,
            _ => AssetStatus::Other(s),
        }
    }
}

impl From<AssetStatus> for String {
    fn from(s: AssetStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag keys the fusion pipeline attaches to assets.
pub mod tag {
    pub const SENSORS: &str = "sensors";
    pub const STRING_ID: &str = "string_id";
    pub const CROSS_REF: &str = "cross_ref";
    pub const CONFIRMING_IMAGE: &str = "confirming_image";
    pub const MAPILLARY_KEY: &str = "mapillary_key";
    pub const STREETVIEW_PANO: &str = "streetview_pano";
}

/// A detected utility pole as returned by `GET /assets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub lat: f64,
    pub lng: f64,
    pub status: AssetStatus,
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<String>,
    #[serde(default)]
    pub height_m: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// Optional collections arrive as a missing key or an explicit `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Asset {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64, status: AssetStatus, confidence: f64) -> Self {
        Self {
            id: AssetId::new(id),
            lat,
            lng,
            status,
            confidence,
            issues: Vec::new(),
            height_m: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: serde_json::Value) -> Self {
        self.tags.insert(key.to_string(), value);
        self
    }

    pub fn position(&self) -> LngLat {
        LngLat::new(self.lng, self.lat)
    }

    fn tag_str(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Sensors that fused into this detection; accepts a list or a
    /// comma-separated string.
    pub fn sensors(&self) -> Vec<String> {
        match self.tags.get(tag::SENSORS) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(serde_json::Value::String(s)) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn string_id(&self) -> Option<&str> {
        self.tag_str(tag::STRING_ID)
    }

    pub fn cross_ref(&self) -> Option<&str> {
        self.tag_str(tag::CROSS_REF)
    }

    pub fn confirming_image(&self) -> Option<&str> {
        self.tag_str(tag::CONFIRMING_IMAGE)
    }

    pub fn mapillary_key(&self) -> Option<&str> {
        self.tag_str(tag::MAPILLARY_KEY)
    }

    pub fn streetview_pano(&self) -> Option<&str> {
        self.tag_str(tag::STREETVIEW_PANO)
    }

    /// Enforces the data-model invariants: finite in-range coordinates and a
    /// confidence in `[0, 1]`. Returns `None` for unusable positions.
    pub fn sanitized(mut self) -> Option<Self> {
        if !self.position().is_valid() {
            return None;
        }
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.height_m = self.height_m.filter(|h| h.is_finite());
        Some(self)
    }
}

/// Applies [`Asset::sanitized`] to a fetched batch, logging what was dropped.
pub fn sanitize_assets(raw: Vec<Asset>) -> Vec<Asset> {
    let total = raw.len();
    let kept: Vec<Asset> = raw.into_iter().filter_map(Asset::sanitized).collect();
    if kept.len() != total {
        warn!(dropped = total - kept.len(), "dropped assets with invalid coordinates");
    }
    kept
}
