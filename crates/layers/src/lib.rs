pub mod build;
pub mod extrude;
pub mod filter;
pub mod geojson_layer;
pub mod layer;
pub mod mesh_buffers;
pub mod options;
pub mod projection;
pub mod source;
pub mod stack;

pub use build::{BuildAccumulator, ChunkedBuild, Item, Items};
pub use filter::FadeFilter;
pub use geojson_layer::{BuildContext, GeoJsonLayer, LayerError};
pub use layer::*;
pub use mesh_buffers::MeshBuffers;
pub use options::{BuildPolicy, LayerOptions, ZoomLimits};
pub use source::{ChannelFetch, FeatureFetch, FeatureSource, FetchError, FetchSender};
pub use stack::LayerStack;
