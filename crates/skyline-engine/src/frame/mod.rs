//! Per-frame orchestration.
//!
//! `FrameLoop` owns the layer set and transform state and is ticked once per
//! redraw by the window runtime (or by a headless driver).

mod frame_loop;

pub use frame_loop::{FrameLoop, TickOutcome, DEFAULT_CLEAR};
