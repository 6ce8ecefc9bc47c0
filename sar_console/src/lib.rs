//! Terminal console for the drone search-and-rescue simulation: consumes
//! the engine's state stream, drives its control API, and renders the
//! tactical map. The binary in `main.rs` wires these modules to the
//! network; everything here is also driven headless by the integration
//! tests.

pub mod app;
pub mod connection;
pub mod dispatch;
pub mod metrics;
pub mod store;
pub mod ui;
pub mod view;
