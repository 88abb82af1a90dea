use std::collections::BTreeMap;

use gpu::{BufferDevice, MapCamera, RenderFrame, Renderer};
use runtime::{Event, EventBus, Frame, TimerQueue};
use scene::index::DataIndex;
use scene::picking::PickingRegistry;
use tracing::{debug, warn};

use crate::geojson_layer::{BuildContext, GeoJsonLayer, LayerError};
use crate::layer::{Layer, LayerId};
use crate::options::{BuildPolicy, LayerOptions, ZoomLimits};
use crate::source::FeatureSource;

/// Host side of the building pipeline.
///
/// Owns every layer together with the state they share: the buffer device,
/// the render index, the picking registry, the timer queue their builds
/// yield to and the event log. Call [`LayerStack::advance`] once per frame.
pub struct LayerStack<D> {
    device: D,
    policy: BuildPolicy,
    limits: ZoomLimits,
    frame: Frame,
    next_id: u64,
    layers: BTreeMap<LayerId, GeoJsonLayer>,
    index: DataIndex<LayerId>,
    picking: PickingRegistry,
    timers: TimerQueue<LayerId>,
    events: EventBus,
}

impl<D: BufferDevice> LayerStack<D> {
    pub fn new(device: D, policy: BuildPolicy) -> Self {
        Self {
            device,
            policy,
            limits: ZoomLimits::default(),
            frame: Frame::new(0, 0.0),
            next_id: 1,
            layers: BTreeMap::new(),
            index: DataIndex::new(),
            picking: PickingRegistry::new(),
            timers: TimerQueue::new(),
            events: EventBus::new(),
        }
    }

    pub fn with_zoom_limits(mut self, limits: ZoomLimits) -> Self {
        self.limits = limits;
        self
    }

    fn parts(&mut self) -> (&mut BTreeMap<LayerId, GeoJsonLayer>, BuildContext<'_>) {
        (
            &mut self.layers,
            BuildContext {
                frame: self.frame,
                device: &mut self.device,
                index: &mut self.index,
                picking: &mut self.picking,
                timers: &mut self.timers,
                events: &mut self.events,
            },
        )
    }

    /// Creates a layer and starts loading it at the current frame.
    pub fn add(&mut self, source: FeatureSource, options: LayerOptions) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        let mut layer = GeoJsonLayer::new(id, options, self.policy, self.limits);
        let (_, mut ctx) = self.parts();
        layer.load(source, &mut ctx);
        self.layers.insert(id, layer);
        id
    }

    /// Destroys and drops a layer. Returns `false` for unknown ids.
    pub fn remove(&mut self, id: LayerId) -> bool {
        let (layers, mut ctx) = self.parts();
        let Some(mut layer) = layers.remove(&id) else {
            warn!(layer = id.0, "remove of unknown layer");
            return false;
        };
        layer.destroy(&mut ctx);
        true
    }

    /// Moves the host clock to `frame`: polls fetches, then runs every
    /// resumption that has come due. Returns how many batches ran.
    pub fn advance(&mut self, frame: Frame) -> usize {
        self.frame = frame;
        let (layers, mut ctx) = self.parts();
        for layer in layers.values_mut() {
            layer.poll_fetch(&mut ctx);
        }

        let mut batches = 0;
        while let Some((timer, id)) = ctx.timers.pop_due(frame.time) {
            let Some(layer) = layers.get_mut(&id) else {
                continue;
            };
            if layer.resume(timer, &mut ctx) {
                batches += 1;
            }
        }
        if batches > 0 {
            debug!(frame = frame.index, batches, "advanced building layers");
        }
        batches
    }

    /// No build is waiting for a resumption and no fetch is in flight.
    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.layers.values().all(|l| !l.is_fetching())
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn layer(&self, id: LayerId) -> Option<&GeoJsonLayer> {
        self.layers.get(&id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &GeoJsonLayer> + '_ {
        self.layers.values()
    }

    pub fn index(&self) -> &DataIndex<LayerId> {
        &self.index
    }

    pub fn picking(&self) -> &PickingRegistry {
        &self.picking
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn apply_filter(&mut self, id: LayerId) -> Result<(), LayerError> {
        let layer = self.layers.get(&id).ok_or(LayerError::UnknownLayer(id))?;
        layer.apply_filter(&mut self.device)
    }

    /// Draw commands for every ready layer visible from `camera`.
    pub fn render(&self, renderer: &Renderer, camera: &MapCamera) -> RenderFrame<LayerId> {
        renderer.collect_buildings(&self.index, camera, |id| self.layers.get(&id))
    }

    /// Identifier under a picking color read back from the picking target.
    pub fn pick(&self, rgb: [u8; 3]) -> Option<&str> {
        self.picking.color_to_id(rgb)
    }

    pub fn ready_count(&self) -> usize {
        self.layers.values().filter(|l| l.is_ready()).count()
    }
}
