use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use foundation::time::Time;
use foundation::view::ScreenPoint;
use scene::surface::HeadlessSurface;
use streaming::client::BackendClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use viewer::{Effect, Viewer, ViewerConfig, ViewerEvent};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless utility-pole map viewer")]
struct Args {
    /// Base URL of the asset/pipeline backend
    #[arg(long, env = "POLE_API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// Mapillary access token for street-level imagery
    #[arg(long, env = "MAPILLARY_TOKEN")]
    mapillary_token: Option<String>,

    /// Google Street View Static API key
    #[arg(long, env = "STREETVIEW_KEY")]
    streetview_key: Option<String>,

    /// Region id to open instead of the first listed one
    #[arg(long, env = "POLE_REGION")]
    region: Option<String>,

    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    #[arg(long, default_value_t = 720.0)]
    height: f64,

    /// Frame rate of the orbit clock
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    run_for: Option<f64>,

    /// Seed for the scan picker
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = ViewerConfig {
        default_region: args.region.clone(),
        scan_seed: args.seed,
        ..ViewerConfig::default()
    };
    config.imagery.mapillary_token = args.mapillary_token.clone();
    config.imagery.streetview_key = args.streetview_key.clone();

    let client = Arc::new(BackendClient::new(args.api_url.clone()));
    info!(api_url = %client.base_url(), "starting viewer");

    let mut viewer = Viewer::new(config, HeadlessSurface::new(args.width, args.height));
    let started = Instant::now();
    let now = || Time(started.elapsed().as_secs_f64());

    let (tx, mut rx) = mpsc::unbounded_channel::<ViewerEvent>();
    viewer.start(now());
    dispatch(&client, &tx, viewer.drain_effects());

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1))));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
            _ = ticker.tick() => {
                let t = now();
                viewer.frame(t);
                if args.run_for.is_some_and(|limit| t.0 >= limit) {
                    info!(seconds = t.0, "run time elapsed");
                    break;
                }
            }
            Some(event) = rx.recv() => {
                viewer.handle(now(), event);
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match parse_command(&line, &viewer) {
                        Some(event) => viewer.handle(now(), event),
                        None if line.trim().is_empty() => {}
                        None => warn!(%line, "unrecognized command"),
                    },
                    Ok(None) => stdin_open = false,
                    Err(err) => {
                        warn!(error = %err, "stdin closed");
                        stdin_open = false;
                    }
                }
            }
        }
        dispatch(&client, &tx, viewer.drain_effects());
        for event in viewer.drain_trace() {
            debug!(kind = event.kind, at = event.at.0, "{}", event.message);
        }
    }

    info!(
        assets = viewer.layer().len(),
        markers = viewer.markers().len(),
        "viewer stopped"
    );
    Ok(())
}

/// Runs each effect on its own task and feeds the outcome back as an event.
fn dispatch(client: &Arc<BackendClient>, tx: &mpsc::UnboundedSender<ViewerEvent>, effects: Vec<Effect>) {
    for effect in effects {
        let client = Arc::clone(client);
        let tx = tx.clone();
        tokio::spawn(async move {
            let event = match effect {
                Effect::LoadRegions => ViewerEvent::RegionsLoaded(client.list_regions().await),
                Effect::FetchAssets(request) => ViewerEvent::AssetsLoaded {
                    stamp: request.stamp,
                    result: client.fetch_assets(request.bbox).await,
                },
                Effect::PostAnnotation { local_id, body } => ViewerEvent::AnnotationPosted {
                    local_id,
                    result: client.post_annotation(&body).await,
                },
                Effect::RunPipeline { job_type, params } => {
                    ViewerEvent::PipelineStarted(client.run_pipeline(&job_type, params).await)
                }
                Effect::PollStatus { log_lines } => ViewerEvent::StatusPolled(client.job_status(log_lines).await),
            };
            if tx.send(event).is_err() {
                debug!("viewer gone; dropping result");
            }
        });
    }
}

/// Line commands standing in for pointer and panel input.
fn parse_command(line: &str, viewer: &Viewer<HeadlessSurface>) -> Option<ViewerEvent> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    let mut point = || -> Option<ScreenPoint> {
        let x = words.next()?.parse().ok()?;
        let y = words.next()?.parse().ok()?;
        Some(ScreenPoint::new(x, y))
    };
    let event = match verb {
        "region" => ViewerEvent::SelectRegion(line.split_whitespace().nth(1)?.to_string()),
        "move" => ViewerEvent::PointerMoved(point()?),
        "click" => {
            let at = point()?;
            ViewerEvent::Click {
                at,
                lnglat: viewer.surface().unproject(at),
            }
        }
        "collapse" => ViewerEvent::Collapse,
        "street" => ViewerEvent::ToggleStreetProvider,
        "rotate" => ViewerEvent::SetRotation(on_off(line)?),
        "capture" => ViewerEvent::SetCapture(on_off(line)?),
        "commit" => ViewerEvent::CommitCapture,
        "clear" => ViewerEvent::ClearCapture,
        "pan" => ViewerEvent::ViewportMoved,
        _ => return None,
    };
    Some(event)
}

fn on_off(line: &str) -> Option<bool> {
    match line.split_whitespace().nth(1)? {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}
