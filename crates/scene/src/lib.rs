pub mod asset;
pub mod inspection;
pub mod layer;
pub mod markers;
pub mod picking;
pub mod surface;

pub use asset::*;
pub use inspection::*;
pub use layer::*;
pub use markers::*;
pub use surface::*;
