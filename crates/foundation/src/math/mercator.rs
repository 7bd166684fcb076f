use crate::geo::LngLat;

/// Latitude limit of the square web-mercator world.
pub const MERCATOR_MAX_LAT_DEG: f64 = 85.05112878;

/// Tile edge length the zoom scale is expressed against.
pub const TILE_SIZE_PX: f64 = 256.0;

pub fn clamp_mercator_lat(lat_deg: f64) -> f64 {
    lat_deg.clamp(-MERCATOR_MAX_LAT_DEG, MERCATOR_MAX_LAT_DEG)
}

pub fn world_size_px(zoom: f64) -> f64 {
    TILE_SIZE_PX * zoom.exp2()
}

/// Projects to world pixels at `zoom` (x east, y south).
pub fn lng_lat_to_world_px(p: LngLat, zoom: f64) -> [f64; 2] {
    let ws = world_size_px(zoom);
    let x = (p.lng + 180.0) / 360.0 * ws;
    let lat = clamp_mercator_lat(p.lat).to_radians();
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) * 0.5 * ws;
    [x, y]
}

pub fn world_px_to_lng_lat(px: [f64; 2], zoom: f64) -> LngLat {
    let ws = world_size_px(zoom);
    let lng = px[0] / ws * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * px[1] / ws);
    let lat = n.sinh().atan().to_degrees();
    LngLat::new(lng, lat)
}
