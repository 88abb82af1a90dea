pub mod geodesy;
pub mod local;
pub mod matrix;
pub mod vec;

pub use geodesy::*;
pub use local::*;
pub use matrix::*;
pub use vec::*;
