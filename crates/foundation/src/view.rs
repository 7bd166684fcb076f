use crate::geo::LngLat;

/// Map camera framing as understood by the host mapping engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CameraPose {
    pub center: LngLat,
    pub zoom: f64,
    /// Tilt away from nadir, degrees.
    pub pitch: f64,
    /// Clockwise from north, degrees in `[0, 360)`.
    pub bearing: f64,
}

impl CameraPose {
    pub fn new(center: LngLat, zoom: f64, pitch: f64, bearing: f64) -> Self {
        Self {
            center,
            zoom,
            pitch,
            bearing: wrap_bearing(bearing),
        }
    }

    /// Whole-earth framing used before any region is resolved.
    pub fn global() -> Self {
        Self::new(LngLat::new(-40.0, 30.0), 1.5, 0.0, 0.0)
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = wrap_bearing(bearing);
        self
    }
}

pub fn wrap_bearing(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Pixel position on the map canvas, origin top-left.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }
}

/// A sub-rectangle of the canvas expressed in fractions of its size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScreenBand {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ScreenBand {
    pub fn contains(&self, size: ScreenSize, p: ScreenPoint) -> bool {
        let fx = p.x / size.width;
        let fy = p.y / size.height;
        (self.x_min..=self.x_max).contains(&fx) && (self.y_min..=self.y_max).contains(&fy)
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraPose, ScreenBand, ScreenPoint, ScreenSize, wrap_bearing};
    use crate::geo::LngLat;

    #[test]
    fn bearing_wraps_into_range() {
        assert_eq!(wrap_bearing(370.0), 10.0);
        assert_eq!(wrap_bearing(-10.0), 350.0);
        let pose = CameraPose::new(LngLat::new(0.0, 0.0), 10.0, 0.0, 359.98).with_bearing(360.02);
        assert!((pose.bearing - 0.02).abs() < 1e-9);
    }

    #[test]
    fn band_uses_fractions_of_canvas() {
        let band = ScreenBand {
            x_min: 0.3,
            x_max: 0.7,
            y_min: 0.55,
            y_max: 0.9,
        };
        let size = ScreenSize::new(1000.0, 800.0);
        assert!(band.contains(size, ScreenPoint::new(500.0, 600.0)));
        assert!(!band.contains(size, ScreenPoint::new(500.0, 200.0)));
        assert!(!band.contains(size, ScreenPoint::new(100.0, 600.0)));
    }
}
