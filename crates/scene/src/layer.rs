use std::collections::BTreeMap;

use crate::asset::{Asset, AssetId};
use crate::surface::{AssetPoint, MapSurface};

/// The most recent fetched asset collection and its rendered point source.
///
/// Each fetch replaces the collection wholesale. Entries are keyed by id, so
/// the rendered source holds exactly one point per unique id; when a response
/// repeats an id, the last record wins.
#[derive(Debug, Default)]
pub struct AssetLayer {
    assets: BTreeMap<AssetId, Asset>,
}

impl AssetLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: &AssetId) -> Option<&Asset> {
        self.assets.get(id)
    }

    /// Assets in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> + '_ {
        self.assets.values()
    }

    /// Replaces the collection and re-uploads the point source.
    ///
    /// Returns the number of unique points now rendered.
    pub fn replace(&mut self, assets: Vec<Asset>, surface: &mut impl MapSurface) -> usize {
        self.assets = assets.into_iter().map(|a| (a.id.clone(), a)).collect();
        self.upload(surface);
        self.assets.len()
    }

    fn upload(&self, surface: &mut impl MapSurface) {
        let points: Vec<AssetPoint> = self.assets.values().map(AssetPoint::from).collect();
        surface.set_asset_points(&points);
    }
}

#[cfg(test)]
mod tests {
    use super::AssetLayer;
    use crate::asset::{Asset, AssetId, AssetStatus};
    use crate::surface::HeadlessSurface;

    fn pole(id: &str, lat: f64, lng: f64) -> Asset {
        Asset::new(id, lat, lng, AssetStatus::Verified, 0.9)
    }

    #[test]
    fn one_point_per_unique_id() {
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut layer = AssetLayer::new();
        let batch = vec![pole("a", 40.0, -76.0), pole("b", 40.1, -76.1), pole("a", 40.2, -76.2)];

        assert_eq!(layer.replace(batch.clone(), &mut surface), 2);
        assert_eq!(surface.points().len(), 2);
        assert_eq!(layer.get(&AssetId::new("a")).unwrap().lat, 40.2);

        // Identical data again: same rendered set.
        let before = surface.points().to_vec();
        assert_eq!(layer.replace(batch, &mut surface), 2);
        assert_eq!(surface.points(), before.as_slice());
    }

    #[test]
    fn replace_does_not_merge() {
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut layer = AssetLayer::new();
        layer.replace(vec![pole("a", 40.0, -76.0)], &mut surface);
        layer.replace(vec![pole("b", 41.0, -77.0)], &mut surface);

        assert_eq!(layer.len(), 1);
        assert!(layer.get(&AssetId::new("a")).is_none());
        assert_eq!(surface.points()[0].id, AssetId::new("b"));
    }
}
