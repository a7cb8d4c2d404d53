//! Core engine-facing contracts.
//!
//! This module defines the interface between the runtime (platform loop) and
//! the application: per-frame callbacks with a consistent context, and a
//! teardown hook that runs while the GPU context is still alive.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
