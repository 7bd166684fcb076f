use serde::{Deserialize, Serialize};

/// WGS84 longitude/latitude in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Geographic bounding box in degrees, laid out the way the backend expects
/// it on the query string.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Square box of `half_span_deg` around `center`, clamped to WGS84 ranges.
    pub fn around(center: LngLat, half_span_deg: f64) -> Self {
        let h = half_span_deg.abs();
        Self {
            min_lat: (center.lat - h).max(-90.0),
            max_lat: (center.lat + h).min(90.0),
            min_lng: (center.lng - h).max(-180.0),
            max_lng: (center.lng + h).min(180.0),
        }
    }

    /// Zero or negative extent on either axis, or non-finite corners.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.min_lat, self.max_lat, self.min_lng, self.max_lng]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.max_lat <= self.min_lat || self.max_lng <= self.min_lng
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            0.5 * (self.min_lng + self.max_lng),
            0.5 * (self.min_lat + self.max_lat),
        )
    }

    pub fn contains(&self, p: LngLat) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat)
            && (self.min_lng..=self.max_lng).contains(&p.lng)
    }
}
