pub mod choreographer;

pub use choreographer::*;
