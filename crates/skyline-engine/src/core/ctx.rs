use winit::window::{CursorIcon, Window, WindowId};

use crate::coords::Viewport;
use crate::device::Gpu;
use crate::input::{InputFrame, InputState};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels.
    pub fn viewport(&self) -> Viewport {
        let size = self.window.inner_size();
        Viewport::new(size.width as f32, size.height as f32)
    }

    /// Sets the mouse cursor shape for this window.
    pub fn set_cursor(&self, cursor: CursorIcon) {
        self.window.set_cursor(cursor);
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Must be called right before the frame is submitted.
    pub fn pre_present_notify(&self) {
        self.window.pre_present_notify();
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub input: &'a InputState,
    pub input_frame: &'a InputFrame,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}
