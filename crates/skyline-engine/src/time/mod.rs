//! Time subsystem.
//!
//! Frame timing without coupling to the runtime:
//! - one `FrameClock` per window (or per render loop)
//! - call `tick()` once per frame to obtain `FrameTime`

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
