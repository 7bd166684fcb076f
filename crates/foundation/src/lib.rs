pub mod geo;
pub mod math;
pub mod time;
pub mod view;

// Foundation crate: small, well-tested primitives only.
pub use geo::*;
pub use time::*;
pub use view::*;
