pub mod index;
pub mod picking;

pub use index::*;
pub use picking::*;
