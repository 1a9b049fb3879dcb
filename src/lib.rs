// Library exports for the binary and the integration tests

pub mod config;
pub mod events;
pub mod js;
pub mod performance;
pub mod storage;
pub mod time;

pub use config::ShimConfig;
pub use events::{Event, EventTarget, Listener};
pub use js::WebShim;
