use foundation::view::{ScreenBand, ScreenPoint};

use crate::asset::Asset;
use crate::layer::AssetLayer;
use crate::surface::MapSurface;

/// Assets whose projected position falls inside `band`, in id order.
pub fn assets_in_band<'a>(layer: &'a AssetLayer, surface: &impl MapSurface, band: ScreenBand) -> Vec<&'a Asset> {
    let size = surface.viewport();
    layer
        .iter()
        .filter(|a| {
            surface
                .project(a.position())
                .is_some_and(|p| band.contains(size, p))
        })
        .collect()
}

/// Nearest asset glyph within `radius_px` of a pointer position.
///
/// Ties resolve to the lower id so picking is stable across frames.
pub fn pick_at<'a>(
    layer: &'a AssetLayer,
    surface: &impl MapSurface,
    at: ScreenPoint,
    radius_px: f64,
) -> Option<&'a Asset> {
    let r2 = radius_px * radius_px;
    let mut best: Option<(f64, &Asset)> = None;
    for asset in layer.iter() {
        let Some(p) = surface.project(asset.position()) else {
            continue;
        };
        let d2 = (p.x - at.x).powi(2) + (p.y - at.y).powi(2);
        if d2 > r2 {
            continue;
        }
        if best.is_none_or(|(bd, _)| d2 < bd) {
            best = Some((d2, asset));
        }
    }
    best.map(|(_, a)| a)
}
