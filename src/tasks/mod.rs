//! Background Tasks Module
//!
//! Optional maintenance that runs outside the request path.
//!
//! # Tasks
//! - Expiry sweep: evicts expired cache entries at a configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
