#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

/// Lifecycle of a loaded dataset.
///
/// `Loading → Building → Ready` on the normal path. Any state can be torn
/// down into `Destroyed`; `Failed` is entered from `Loading` or `Building`
/// when the data cannot be fetched, has no usable origin, or cannot be
/// uploaded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerState {
    Loading,
    Building,
    Ready,
    Destroyed,
    Failed,
}

pub trait Layer {
    fn id(&self) -> LayerId;

    fn state(&self) -> LayerState;

    fn is_ready(&self) -> bool {
        self.state() == LayerState::Ready
    }
}
