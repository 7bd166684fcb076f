//! Headless engine for the pole inventory map.
//!
//! [`Viewer`] owns every stateful component and is driven by three calls from
//! the host loop: [`Viewer::handle`] for input and network completions,
//! [`Viewer::advance_to`] for timers, and [`Viewer::frame`] once per repaint.
//! Network work leaves the engine as [`Effect`]s.

pub mod capture;
pub mod config;
pub mod effect;
pub mod engine;
pub mod poller;

pub use capture::*;
pub use config::*;
pub use effect::*;
pub use engine::*;
pub use poller::*;
