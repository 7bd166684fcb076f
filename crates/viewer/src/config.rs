use camera::ChoreographyConfig;
use catalog::RegionDefaults;
use foundation::view::ScreenBand;
use scene::inspection::ImageryConfig;
use scene::markers::MarkerConfig;
use streaming::client::DEFAULT_LOG_LINES;
use streaming::fetcher::FetchConfig;
use streaming::protocol::{DEFAULT_ANNOTATION_DATASET, TrainParams};

pub const DEFAULT_SCAN_INTERVAL_S: f64 = 1.2;
pub const DEFAULT_CAPTURE_IDLE_COMMIT_S: f64 = 5.0;
pub const DEFAULT_STATUS_POLL_INTERVAL_S: f64 = 1.0;

/// Horizontal centre band, lower part of the canvas: stays in the camera's
/// forward frame while orbiting.
pub const DEFAULT_SCAN_BAND: ScreenBand = ScreenBand {
    x_min: 0.3,
    x_max: 0.7,
    y_min: 0.55,
    y_max: 0.9,
};

/// Every tunable of the engine in one place.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub markers: MarkerConfig,
    pub fetch: FetchConfig,
    pub camera: ChoreographyConfig,
    pub imagery: ImageryConfig,
    pub regions: RegionDefaults,
    /// Region picked on first catalog load; falls back to the first region.
    pub default_region: Option<String>,
    pub scan_interval_s: f64,
    pub scan_band: ScreenBand,
    /// `None` seeds the scan RNG from entropy.
    pub scan_seed: Option<u64>,
    /// Pointer distance within which an asset glyph counts as hit.
    pub pick_radius_px: f64,
    pub capture_idle_commit_s: f64,
    pub annotation_dataset: String,
    pub train_params: TrainParams,
    pub status_poll_interval_s: f64,
    pub status_log_lines: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            markers: MarkerConfig::default(),
            fetch: FetchConfig::default(),
            camera: ChoreographyConfig::default(),
            imagery: ImageryConfig::default(),
            regions: RegionDefaults::default(),
            default_region: None,
            scan_interval_s: DEFAULT_SCAN_INTERVAL_S,
            scan_band: DEFAULT_SCAN_BAND,
            scan_seed: None,
            pick_radius_px: 14.0,
            capture_idle_commit_s: DEFAULT_CAPTURE_IDLE_COMMIT_S,
            annotation_dataset: DEFAULT_ANNOTATION_DATASET.to_string(),
            train_params: TrainParams::default(),
            status_poll_interval_s: DEFAULT_STATUS_POLL_INTERVAL_S,
            status_log_lines: DEFAULT_LOG_LINES,
        }
    }
}
