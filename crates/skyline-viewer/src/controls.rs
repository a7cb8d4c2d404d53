use skyline_engine::camera::TransformState;
use skyline_engine::input::{InputFrame, InputState, Key, MouseButton};

/// Degrees per arrow-key press.
pub const ROTATE_STEP_DEGREES: i32 = 5;
/// Zoom factor per `+`/`-` press or wheel line.
pub const ZOOM_STEP: f32 = 1.1;
/// Rotation per logical pixel of horizontal left-drag.
pub const DRAG_DEGREES_PER_PIXEL: f32 = 0.5;

/// Maps keyboard and mouse input onto the shared [`TransformState`].
///
/// Rotation is whole degrees, so sub-degree drag motion is carried over to the
/// next frame instead of being dropped.
#[derive(Debug, Default)]
pub struct OrbitControls {
    drag_remainder: f32,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies this frame's input. Returns true if the transform changed.
    pub fn apply(&mut self, input: &InputState, frame: &InputFrame, transform: &mut TransformState) -> bool {
        let before = *transform;

        let mut step = 0;
        if frame.key_pressed(Key::ArrowLeft) {
            step -= ROTATE_STEP_DEGREES;
        }
        if frame.key_pressed(Key::ArrowRight) {
            step += ROTATE_STEP_DEGREES;
        }

        if input.button_down(MouseButton::Left) {
            self.drag_remainder += frame.pointer_delta.0 * DRAG_DEGREES_PER_PIXEL;
            let whole = self.drag_remainder.trunc();
            self.drag_remainder -= whole;
            step += whole as i32;
        } else {
            self.drag_remainder = 0.0;
        }

        if step != 0 {
            transform.set_rotation_degrees(transform.rotation_degrees() + step);
        }

        let mut zoom_lines = frame.wheel_lines;
        if frame.key_pressed(Key::Plus) {
            zoom_lines += 1.0;
        }
        if frame.key_pressed(Key::Minus) {
            zoom_lines -= 1.0;
        }
        if zoom_lines != 0.0 {
            transform.set_zoom(transform.zoom() * ZOOM_STEP.powf(zoom_lines));
        }

        if frame.key_pressed(Key::P) {
            transform.set_projection(transform.projection().toggled());
        }

        *transform != before
    }

    #[inline]
    pub fn is_dragging(&self, input: &InputState) -> bool {
        input.button_down(MouseButton::Left)
    }

    #[inline]
    pub fn wants_exit(frame: &InputFrame) -> bool {
        frame.key_pressed(Key::Escape)
    }
}

/// Window title reflecting the current transform.
pub fn title_for(transform: &TransformState) -> String {
    format!(
        "skyline | {} | {}\u{b0} | zoom {:.2}",
        transform.projection(),
        transform.rotation_degrees(),
        transform.zoom()
    )
}
