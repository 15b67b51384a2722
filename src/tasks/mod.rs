//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a shared cache.
//!
//! # Tasks
//! - Maintenance: runs scheduled purges, eviction callbacks and expiry sweeps

mod maintenance;

pub use maintenance::{spawn_maintenance_task, SharedCache};
