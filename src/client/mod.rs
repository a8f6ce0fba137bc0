//! Application-facing connection API
//!
//! [`ConnectionManager`] owns the background connection thread, [`Callbacks`]
//! carries the event handlers, and [`Endpoint`] parses `wss://` URLs.

mod callbacks;
mod endpoint;
mod manager;

pub use callbacks::Callbacks;
pub use endpoint::Endpoint;
pub use manager::ConnectionManager;
