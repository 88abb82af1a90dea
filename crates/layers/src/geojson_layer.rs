use std::sync::Arc;
use std::task::Poll;

use formats::{FeatureCollection, GeoPoint};
use foundation::math::Mat4;
use foundation::time::Time;
use gpu::{BufferDevice, BufferError, MapCamera, MeshBindings, MeshDrawable};
use runtime::{EventBus, Frame, TimerId, TimerQueue};
use scene::index::DataIndex;
use scene::picking::PickingRegistry;
use tracing::{debug, error, info, warn};

use crate::build::{ChunkedBuild, Items};
use crate::extrude::parse_color;
use crate::filter::{assign_window, compute_window};
use crate::layer::{Layer, LayerId, LayerState};
use crate::mesh_buffers::MeshBuffers;
use crate::options::{BuildPolicy, LayerOptions, ZoomLimits};
use crate::projection::{compute_origin, model_matrix};
use crate::source::{FeatureFetch, FeatureSource, FetchError};

/// Host-owned state a layer touches while it loads, builds and tears down.
pub struct BuildContext<'a> {
    pub frame: Frame,
    pub device: &'a mut dyn BufferDevice,
    pub index: &'a mut DataIndex<LayerId>,
    pub picking: &'a mut PickingRegistry,
    pub timers: &'a mut TimerQueue<LayerId>,
    pub events: &'a mut EventBus,
}

#[derive(Debug)]
pub enum LayerError {
    Fetch(FetchError),
    /// The first feature has no coordinate to anchor the mesh at.
    MalformedGeometry { geometry: &'static str },
    Buffers(BufferError),
    NotReady,
    /// No layer with this id is loaded.
    UnknownLayer(LayerId),
}

impl std::fmt::Display for LayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerError::Fetch(e) => write!(f, "{e}"),
            LayerError::MalformedGeometry { geometry } => {
                write!(f, "cannot derive an origin from empty {geometry}")
            }
            LayerError::Buffers(e) => write!(f, "buffer upload failed: {e}"),
            LayerError::NotReady => write!(f, "layer has no buffers yet"),
            LayerError::UnknownLayer(id) => write!(f, "no layer with id {}", id.0),
        }
    }
}

impl std::error::Error for LayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LayerError::Fetch(e) => Some(e),
            LayerError::Buffers(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BufferError> for LayerError {
    fn from(e: BufferError) -> Self {
        LayerError::Buffers(e)
    }
}

/// One GeoJSON dataset rendered as extruded buildings.
///
/// The layer converts its features in batches. Between batches it parks a
/// single resumption on the host's timer queue and remembers its id; a
/// resumption that does not carry that id is ignored, which is what makes
/// `destroy` safe against a continuation that is already due.
pub struct GeoJsonLayer {
    id: LayerId,
    options: LayerOptions,
    policy: BuildPolicy,
    zoom_range: (f64, f64),
    color_override: Option<[f32; 3]>,
    state: LayerState,
    origin: Option<GeoPoint>,
    fetch: Option<Box<dyn FeatureFetch>>,
    build: Option<ChunkedBuild>,
    pending: Option<TimerId>,
    items: Items,
    buffers: Option<MeshBuffers>,
    error: Option<LayerError>,
}

impl GeoJsonLayer {
    pub fn new(id: LayerId, options: LayerOptions, policy: BuildPolicy, limits: ZoomLimits) -> Self {
        let color_override = options.color.as_deref().and_then(parse_color);
        if options.color.is_some() && color_override.is_none() {
            warn!(layer = id.0, color = ?options.color, "ignoring unparseable color override");
        }
        Self {
            id,
            zoom_range: options.zoom_range(limits),
            color_override,
            options,
            policy,
            state: LayerState::Loading,
            origin: None,
            fetch: None,
            build: None,
            pending: None,
            items: Items::default(),
            buffers: None,
            error: None,
        }
    }

    pub fn options(&self) -> &LayerOptions {
        &self.options
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.origin
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    pub fn buffers(&self) -> Option<&MeshBuffers> {
        self.buffers.as_ref()
    }

    pub fn error(&self) -> Option<&LayerError> {
        self.error.as_ref()
    }

    /// Id of the parked resumption, if a build is waiting for its next batch.
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_some()
    }

    /// Features converted so far by the running build.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.build.as_ref().map(|b| (b.cursor(), b.total()))
    }

    pub fn is_visible_at_zoom(&self, zoom: f64) -> bool {
        zoom >= self.zoom_range.0 && zoom <= self.zoom_range.1
    }

    /// Camera-relative model transform, available once the layer is ready.
    pub fn matrix(&self, camera: &MapCamera) -> Option<Mat4> {
        if self.state != LayerState::Ready {
            return None;
        }
        let origin = self.origin?;
        Some(model_matrix(origin, camera, &self.options))
    }

    /// Starts loading from `source`.
    ///
    /// Only a fresh layer accepts data; later calls are logged and ignored.
    pub fn load(&mut self, source: FeatureSource, ctx: &mut BuildContext<'_>) {
        if self.state != LayerState::Loading || self.fetch.is_some() || self.build.is_some() {
            warn!(layer = self.id.0, state = ?self.state, "load rejected: layer already loading or built");
            return;
        }
        match source {
            FeatureSource::Collection(collection) => self.set_data(collection, ctx),
            FeatureSource::Fetch(fetch) => {
                self.fetch = Some(fetch);
                self.poll_fetch(ctx);
            }
        }
    }

    /// Drives a pending fetch. Returns `true` while it is still in flight.
    pub fn poll_fetch(&mut self, ctx: &mut BuildContext<'_>) -> bool {
        let Some(mut fetch) = self.fetch.take() else {
            return false;
        };
        match fetch.poll() {
            Poll::Pending => {
                self.fetch = Some(fetch);
                true
            }
            Poll::Ready(Ok(collection)) => {
                self.set_data(Arc::new(collection), ctx);
                false
            }
            Poll::Ready(Err(e)) => {
                self.fail(LayerError::Fetch(e), ctx);
                false
            }
        }
    }

    fn set_data(&mut self, collection: Arc<FeatureCollection>, ctx: &mut BuildContext<'_>) {
        let Some(first) = collection.features.first() else {
            warn!(layer = self.id.0, "empty feature collection; nothing to build");
            return;
        };
        let Some(origin) = compute_origin(&first.geometry) else {
            let geometry = first.geometry.type_name();
            self.fail(LayerError::MalformedGeometry { geometry }, ctx);
            return;
        };

        debug!(
            layer = self.id.0,
            features = collection.len(),
            lon = origin.lon_deg,
            lat = origin.lat_deg,
            "starting building mesh build"
        );
        self.origin = Some(origin);
        self.state = LayerState::Building;
        self.build = Some(ChunkedBuild::new(
            collection,
            origin,
            self.options.id.clone(),
            self.color_override,
        ));
        self.step(ctx);
    }

    /// Runs the next batch if `timer` is the resumption this layer parked.
    ///
    /// Returns `false` for stale or cancelled resumptions.
    pub fn resume(&mut self, timer: TimerId, ctx: &mut BuildContext<'_>) -> bool {
        if self.pending != Some(timer) {
            debug!(layer = self.id.0, timer = timer.0, "ignoring stale resumption");
            return false;
        }
        self.pending = None;
        self.step(ctx);
        true
    }

    fn step(&mut self, ctx: &mut BuildContext<'_>) {
        let Some(build) = self.build.as_mut() else {
            return;
        };
        let (layer, frame) = (self.id, ctx.frame);
        let events = &mut *ctx.events;
        let processed = build.process_batch(self.policy.batch_size(), ctx.picking, |_, id| {
            events.emit(frame, "loadfeature", layer.0, id.unwrap_or_default());
        });
        debug!(
            layer = layer.0,
            features = processed,
            done = build.cursor(),
            total = build.total(),
            vertices = build.accumulator().vertex_count(),
            "processed batch"
        );

        if build.is_complete() {
            self.finalize(ctx);
        } else {
            let due = ctx.frame.time.after(self.policy.delay());
            self.pending = Some(ctx.timers.schedule(due, layer));
        }
    }

    fn finalize(&mut self, ctx: &mut BuildContext<'_>) {
        let Some(build) = self.build.take() else {
            return;
        };
        let (acc, mut items) = build.into_parts();
        let window = compute_window(ctx.frame.time.as_millis(), self.options.fade_in);
        assign_window(items.as_mut_slice(), window);

        let buffers = match MeshBuffers::finalize(ctx.device, &acc, &items) {
            Ok(buffers) => buffers,
            Err(e) => {
                self.fail(LayerError::Buffers(e), ctx);
                return;
            }
        };

        info!(
            layer = self.id.0,
            features = items.len(),
            vertices = buffers.vertex_count(),
            "building layer ready"
        );
        self.items = items;
        self.buffers = Some(buffers);
        self.state = LayerState::Ready;
        ctx.index.add(self.id);
        ctx.events.emit(ctx.frame, "ready", self.id.0, "");
    }

    fn fail(&mut self, err: LayerError, ctx: &mut BuildContext<'_>) {
        error!(layer = self.id.0, error = %err, "building layer failed");
        ctx.events.emit(ctx.frame, "failed", self.id.0, err.to_string());
        if let Some(timer) = self.pending.take() {
            ctx.timers.cancel(timer);
        }
        self.build = None;
        self.state = LayerState::Failed;
        self.error = Some(err);
    }

    /// Rewrites the filter buffer from the items' current fade windows.
    pub fn apply_filter(&self, device: &mut dyn BufferDevice) -> Result<(), LayerError> {
        let buffers = self.buffers.as_ref().ok_or(LayerError::NotReady)?;
        buffers.apply_filter(device, &self.items)?;
        Ok(())
    }

    /// Restarts the fade-in as if the mesh had been built at `at`.
    pub fn refade(&mut self, at: Time, device: &mut dyn BufferDevice) -> Result<(), LayerError> {
        if self.buffers.is_none() {
            return Err(LayerError::NotReady);
        }
        let window = compute_window(at.as_millis(), self.options.fade_in);
        assign_window(self.items.as_mut_slice(), window);
        self.apply_filter(device)
    }

    /// Tears the layer down from any state. Calling it again is a no-op.
    pub fn destroy(&mut self, ctx: &mut BuildContext<'_>) {
        if self.state == LayerState::Destroyed {
            return;
        }
        let was_ready = self.state == LayerState::Ready;
        self.state = LayerState::Destroyed;

        if let Some(timer) = self.pending.take() {
            ctx.timers.cancel(timer);
        }
        if let Some(mut fetch) = self.fetch.take() {
            fetch.abort();
        }
        self.build = None;
        self.items.clear();

        if was_ready && let Some(buffers) = self.buffers.take() {
            buffers.destroy_all(ctx.device);
        }
        ctx.index.remove(self.id);

        info!(layer = self.id.0, "building layer destroyed");
        ctx.events.emit(ctx.frame, "destroy", self.id.0, "");
    }
}

impl Layer for GeoJsonLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn state(&self) -> LayerState {
        self.state
    }
}

impl MeshDrawable for GeoJsonLayer {
    fn zoom_range(&self) -> (f64, f64) {
        self.zoom_range
    }

    fn model_matrix(&self, camera: &MapCamera) -> Option<Mat4> {
        self.matrix(camera)
    }

    fn bindings(&self) -> Option<MeshBindings> {
        self.buffers.as_ref().map(MeshBuffers::bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildContext, GeoJsonLayer, LayerError};
    use crate::layer::{Layer, LayerId, LayerState};
    use crate::options::{BuildPolicy, LayerOptions, ZoomLimits};
    use crate::source::{ChannelFetch, FeatureSource, FetchError};
    use formats::FeatureCollection;
    use foundation::time::Time;
    use gpu::{MapCamera, RecordingDevice};
    use pretty_assertions::assert_eq;
    use runtime::{EventBus, Frame, TimerQueue};
    use scene::index::DataIndex;
    use scene::picking::PickingRegistry;

    #[derive(Default)]
    struct Host {
        device: RecordingDevice,
        index: DataIndex<LayerId>,
        picking: PickingRegistry,
        timers: TimerQueue<LayerId>,
        events: EventBus,
    }

    impl Host {
        fn ctx(&mut self, frame: Frame) -> BuildContext<'_> {
            BuildContext {
                frame,
                device: &mut self.device,
                index: &mut self.index,
                picking: &mut self.picking,
                timers: &mut self.timers,
                events: &mut self.events,
            }
        }

        fn run(&mut self, layer: &mut GeoJsonLayer, frame: Frame) {
            while let Some((timer, _)) = self.timers.pop_due(frame.time) {
                let mut ctx = self.ctx(frame);
                layer.resume(timer, &mut ctx);
            }
        }
    }

    fn squares(n: usize) -> FeatureCollection {
        let features: Vec<String> = (0..n)
            .map(|i| {
                let x = i as f64 * 0.001;
                format!(
                    r#"{{"type":"Feature","id":"b{i}","properties":{{"height":12}},
                    "geometry":{{"type":"Polygon","coordinates":[[[{x},0],[{x2},0],[{x2},0.0005],[{x},0.0005],[{x},0]]]}}}}"#,
                    x2 = x + 0.0005,
                )
            })
            .collect();
        FeatureCollection::from_geojson_str(&format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        ))
        .expect("parse")
    }

    fn layer(policy: BuildPolicy) -> GeoJsonLayer {
        GeoJsonLayer::new(LayerId(1), LayerOptions::default(), policy, ZoomLimits::default())
    }

    #[test]
    fn small_collection_is_ready_after_load() {
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::default());
        let frame = Frame::at(0, Time(2.0));
        layer.load(squares(3).into(), &mut host.ctx(frame));

        assert!(layer.is_ready());
        assert_eq!(layer.items().len(), 3);
        assert!(host.index.contains(LayerId(1)));
        assert_eq!(host.events.count("loadfeature", 1), 3);
        assert_eq!(host.events.count("ready", 1), 1);
        assert_eq!(layer.items().get(0).map(|i| i.filter.to_array()), Some([2250.0, 2750.0, 0.0, 1.0]));
        assert!(layer.matrix(&MapCamera::new(0.0, 0.0, 16.0)).is_some());
    }

    #[test]
    fn loadfeature_carries_the_picking_id() {
        let fc = FeatureCollection::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":7,"properties":{"relationId":"r1"},
                 "geometry":{"type":"Point","coordinates":[0,0]}},
                {"type":"Feature","properties":{"id":"p2"},
                 "geometry":{"type":"Point","coordinates":[0,0]}},
                {"type":"Feature","properties":{},
                 "geometry":{"type":"Point","coordinates":[0,0]}}
            ]}"#,
        )
        .expect("parse");
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::default());
        layer.load(fc.into(), &mut host.ctx(Frame::at(0, Time::ZERO)));

        let messages: Vec<&str> = host
            .events
            .events()
            .iter()
            .filter(|e| e.kind == "loadfeature")
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(messages, vec!["r1", "p2", ""]);
        let ids: Vec<Option<&str>> = layer.items().iter().map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("r1"), Some("p2"), None]);
    }

    #[test]
    fn build_yields_between_batches() {
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::new(2, 75.0));
        let frame = Frame::new(0, 0.05);
        layer.load(squares(5).into(), &mut host.ctx(frame));

        assert_eq!(layer.state(), LayerState::Building);
        assert_eq!(layer.progress(), Some((2, 5)));
        assert!(layer.matrix(&MapCamera::new(0.0, 0.0, 16.0)).is_none());
        assert_eq!(host.timers.len(), 1);

        // 50 ms later nothing is due yet
        host.run(&mut layer, frame.next());
        assert_eq!(layer.progress(), Some((2, 5)));

        let mut f = frame;
        for _ in 0..10 {
            f = f.next();
            host.run(&mut layer, f);
        }
        assert!(layer.is_ready());
        assert_eq!(layer.items().len(), 5);
        assert!(host.timers.is_empty());
    }

    #[test]
    fn destroy_mid_build_cancels_resumption() {
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::new(1, 10.0));
        let frame = Frame::at(0, Time::ZERO);
        layer.load(squares(4).into(), &mut host.ctx(frame));
        let parked = layer.pending_timer().expect("parked");

        layer.destroy(&mut host.ctx(frame));
        assert_eq!(layer.state(), LayerState::Destroyed);
        assert!(host.timers.is_empty());
        assert!(!layer.resume(parked, &mut host.ctx(frame)));
        assert!(layer.items().is_empty());
        assert_eq!(host.device.created(), 0);
        assert_eq!(host.events.count("loadfeature", 1), 1);

        layer.destroy(&mut host.ctx(frame));
        assert_eq!(host.events.count("destroy", 1), 1);
    }

    #[test]
    fn destroy_when_ready_releases_buffers() {
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::default());
        let frame = Frame::at(0, Time::ZERO);
        layer.load(squares(2).into(), &mut host.ctx(frame));
        assert_eq!(host.device.live_buffers(), 7);

        layer.destroy(&mut host.ctx(frame));
        assert_eq!(host.device.live_buffers(), 0);
        assert!(!host.index.contains(LayerId(1)));
        assert!(layer.buffers().is_none());
    }

    #[test]
    fn empty_collection_stays_loading() {
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::default());
        layer.load(
            FeatureCollection::default().into(),
            &mut host.ctx(Frame::at(0, Time::ZERO)),
        );
        assert_eq!(layer.state(), LayerState::Loading);
        assert!(host.events.events().is_empty());
    }

    #[test]
    fn malformed_first_feature_fails_fast() {
        let fc = FeatureCollection::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[]}}
            ]}"#,
        )
        .expect("parse");
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::default());
        layer.load(fc.into(), &mut host.ctx(Frame::at(0, Time::ZERO)));
        assert_eq!(layer.state(), LayerState::Failed);
        assert!(matches!(
            layer.error(),
            Some(LayerError::MalformedGeometry { geometry: "Polygon" })
        ));
        assert_eq!(host.events.count("failed", 1), 1);
    }

    #[test]
    fn fetch_resolves_on_poll_and_errors_fail_the_layer() {
        let mut host = Host::default();
        let frame = Frame::at(0, Time::ZERO);

        let (sender, fetch) = ChannelFetch::channel();
        let mut ok = layer(BuildPolicy::default());
        ok.load(FeatureSource::fetch(fetch), &mut host.ctx(frame));
        assert!(ok.is_fetching());
        sender.complete(Ok(squares(1)));
        assert!(!ok.poll_fetch(&mut host.ctx(frame)));
        assert!(ok.is_ready());

        let (sender, fetch) = ChannelFetch::channel();
        let mut bad = GeoJsonLayer::new(
            LayerId(2),
            LayerOptions::default(),
            BuildPolicy::default(),
            ZoomLimits::default(),
        );
        bad.load(FeatureSource::fetch(fetch), &mut host.ctx(frame));
        sender.complete(Err(FetchError::Io("404".into())));
        bad.poll_fetch(&mut host.ctx(frame));
        assert_eq!(bad.state(), LayerState::Failed);
    }

    #[test]
    fn destroy_aborts_in_flight_fetch() {
        let mut host = Host::default();
        let frame = Frame::at(0, Time::ZERO);
        let (sender, fetch) = ChannelFetch::channel();
        let mut layer = layer(BuildPolicy::default());
        layer.load(FeatureSource::fetch(fetch), &mut host.ctx(frame));
        layer.destroy(&mut host.ctx(frame));

        assert!(!sender.complete(Ok(squares(1))));
        assert!(!layer.poll_fetch(&mut host.ctx(frame)));
        assert_eq!(layer.state(), LayerState::Destroyed);
        assert!(layer.items().is_empty());
    }

    #[test]
    fn refade_rewrites_filter_in_place() {
        let mut host = Host::default();
        let mut layer = layer(BuildPolicy::default());
        let frame = Frame::at(0, Time::ZERO);
        layer.load(squares(1).into(), &mut host.ctx(frame));

        layer
            .refade(Time(1.0), &mut host.device)
            .expect("refade");
        let filter = layer
            .buffers()
            .and_then(|b| host.device.data(b.get(gpu::Attribute::Filter)))
            .expect("filter data");
        assert_eq!(&filter[..4], &[1250.0, 1750.0, 0.0, 1.0]);
        assert_eq!(host.device.writes(), 1);
    }

    #[test]
    fn apply_filter_requires_buffers() {
        let mut host = Host::default();
        let layer = layer(BuildPolicy::default());
        assert!(matches!(
            layer.apply_filter(&mut host.device),
            Err(LayerError::NotReady)
        ));
    }
}
