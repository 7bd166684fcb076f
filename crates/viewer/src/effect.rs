use catalog::RegionGroups;
use foundation::geo::LngLat;
use foundation::view::ScreenPoint;
use scene::asset::{Asset, AssetId};
use streaming::client::NetworkError;
use streaming::fetcher::FetchRequest;
use streaming::protocol::{AnnotationRequest, PipelineJobStatus, TrainParams};
use streaming::request::RequestStamp;

/// Work the host must perform on the engine's behalf. Each effect's
/// completion comes back as the matching [`ViewerEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// `GET /regions` → [`ViewerEvent::RegionsLoaded`].
    LoadRegions,
    /// `GET /assets` → [`ViewerEvent::AssetsLoaded`].
    FetchAssets(FetchRequest),
    /// Fire-and-forget `POST /annotation/from-map` →
    /// [`ViewerEvent::AnnotationPosted`].
    PostAnnotation { local_id: u64, body: AnnotationRequest },
    /// `POST /pipeline/run/{job_type}` → [`ViewerEvent::PipelineStarted`].
    RunPipeline { job_type: String, params: TrainParams },
    /// Status plus log tail → [`ViewerEvent::StatusPolled`].
    PollStatus { log_lines: u32 },
}

/// Input from the user, the map engine or a finished network call.
#[derive(Debug)]
pub enum ViewerEvent {
    RegionsLoaded(Result<RegionGroups, NetworkError>),
    SelectRegion(String),
    AssetsLoaded {
        stamp: RequestStamp,
        result: Result<Vec<Asset>, NetworkError>,
    },
    /// The map finished a pan/zoom; the engine reads the new view from the
    /// surface.
    ViewportMoved,
    PointerMoved(ScreenPoint),
    PointerDown(ScreenPoint),
    PointerUp(ScreenPoint),
    /// Click on the map canvas, with the engine's unprojection of it.
    Click { at: ScreenPoint, lnglat: LngLat },
    /// Pointer entered or left an anchored card.
    CardHover { id: AssetId, inside: bool },
    /// Close control of the expanded card.
    Collapse,
    ToggleStreetProvider,
    ImageWheel(f64),
    ImageDrag { dx: f64, dy: f64 },
    SetRotation(bool),
    SetCapture(bool),
    CommitCapture,
    ClearCapture,
    AnnotationPosted {
        local_id: u64,
        result: Result<(), NetworkError>,
    },
    PipelineStarted(Result<(), NetworkError>),
    StatusPolled(Result<PipelineJobStatus, NetworkError>),
}
