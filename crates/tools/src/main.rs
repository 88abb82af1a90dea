use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use formats::FeatureCollection;
use gpu::{BufferDevice, MapCamera, RecordingDevice, Renderer, ShaderVariant, WgpuDevice};
use layers::{
    BuildPolicy, ChannelFetch, FeatureSource, Layer, LayerId, LayerOptions, LayerStack,
};
use runtime::Frame;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Frames simulated before giving up on a build that never settles.
const MAX_FRAMES: u64 = 1_000_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build extruded building meshes from GeoJSON, headless")]
struct Args {
    /// GeoJSON FeatureCollection to load
    geojson: PathBuf,

    /// JSON file with layer options (id, color, scale, rotation, elevation, fadeIn, minZoom, maxZoom)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Features converted per build step
    #[arg(long)]
    features_per_chunk: Option<usize>,

    /// Pause between build steps, in milliseconds
    #[arg(long)]
    delay_ms: Option<f64>,

    /// Simulated frame interval, in milliseconds
    #[arg(long, default_value_t = 16.0)]
    frame_ms: f64,

    /// Show buildings at full opacity immediately
    #[arg(long)]
    no_fade: bool,

    #[arg(long, value_enum, default_value_t = Quality::Standard)]
    quality: Quality,

    /// Read and parse the file on a loader thread while frames advance
    #[arg(long)]
    background: bool,

    /// Upload to a headless wgpu device instead of keeping buffers in memory
    #[arg(long)]
    gpu: bool,

    /// Camera zoom used for the draw pass in the summary
    #[arg(long, default_value_t = 16.0)]
    zoom: f64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Quality {
    Standard,
    High,
}

#[derive(Debug, Serialize)]
struct Summary {
    state: String,
    error: Option<String>,
    features: usize,
    vertices: usize,
    origin: Option<[f64; 2]>,
    frames: u64,
    batches: usize,
    build_ms: f64,
    shader: &'static str,
    shadows: bool,
    uniforms: usize,
    draws: usize,
    pickable_ids: usize,
    events: BTreeMap<&'static str, usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();

    let mut options = match &args.options {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
            serde_json::from_str::<LayerOptions>(&raw)
                .map_err(|e| format!("options {path:?}: {e}"))?
        }
        None => LayerOptions::default(),
    };
    if args.no_fade {
        options.fade_in = false;
    }

    let mut policy = BuildPolicy::default();
    if let Some(n) = args.features_per_chunk {
        policy.features_per_chunk = n;
    }
    if let Some(ms) = args.delay_ms {
        policy.delay_per_chunk_ms = ms;
    }

    let source = if args.background {
        FeatureSource::fetch(ChannelFetch::read_file(&args.geojson))
    } else {
        let raw = fs::read_to_string(&args.geojson)
            .map_err(|e| format!("read {:?}: {e}", args.geojson))?;
        FeatureCollection::from_geojson_str(&raw)
            .map_err(|e| format!("{:?}: {e}", args.geojson))?
            .into()
    };

    let summary = if args.gpu {
        let device = WgpuDevice::headless().map_err(|e| e.to_string())?;
        run(device, &args, source, options, policy)
    } else {
        run(RecordingDevice::new(), &args, source, options, policy)
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(|e| format!("json: {e}"))?
    );
    match summary.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn run<D: BufferDevice>(
    device: D,
    args: &Args,
    source: FeatureSource,
    options: LayerOptions,
    policy: BuildPolicy,
) -> Summary {
    let mut stack = LayerStack::new(device, policy);
    let id: LayerId = stack.add(source, options);

    let mut frame = Frame::new(0, args.frame_ms.max(0.0) / 1000.0);
    let mut batches = 0;
    while !stack.is_idle() && frame.index < MAX_FRAMES {
        frame = frame.next();
        batches += stack.advance(frame);
        if stack.layer(id).is_some_and(|l| l.is_fetching()) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
    if !stack.is_idle() {
        warn!(frames = frame.index, "stopped before the build settled");
    }

    let variant = ShaderVariant::with_shadows(matches!(args.quality, Quality::High));
    let renderer = Renderer::new(variant);

    let mut events: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in stack.events() {
        *events.entry(event.kind).or_default() += 1;
    }

    let Some(layer) = stack.layer(id) else {
        return Summary {
            state: "Missing".to_string(),
            error: Some(format!("layer {} vanished", id.0)),
            features: 0,
            vertices: 0,
            origin: None,
            frames: frame.index,
            batches,
            build_ms: frame.time.as_millis(),
            shader: variant.name(),
            shadows: variant.uses_shadow_map(),
            uniforms: variant.uniforms().len(),
            draws: 0,
            pickable_ids: stack.picking().len(),
            events,
        };
    };

    let origin = layer.origin();
    let draws = origin
        .map(|o| {
            let camera = MapCamera::new(o.lon_deg, o.lat_deg, args.zoom);
            stack.render(&renderer, &camera).draws.len()
        })
        .unwrap_or(0);

    info!(
        layer = id.0,
        state = ?layer.state(),
        features = layer.items().len(),
        frames = frame.index,
        "build finished"
    );

    Summary {
        state: format!("{:?}", layer.state()),
        error: layer.error().map(|e| e.to_string()),
        features: layer.items().len(),
        vertices: layer.items().total_vertices(),
        origin: origin.map(|o| [o.lon_deg, o.lat_deg]),
        frames: frame.index,
        batches,
        build_ms: frame.time.as_millis(),
        shader: variant.name(),
        shadows: variant.uses_shadow_map(),
        uniforms: variant.uniforms().len(),
        draws,
        pickable_ids: stack.picking().len(),
        events,
    }
}
