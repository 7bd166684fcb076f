pub mod client;
pub mod fetcher;
pub mod protocol;
pub mod request;

pub use client::*;
pub use fetcher::*;
pub use protocol::*;
pub use request::*;
