use std::collections::HashSet;

use super::types::{InputEvent, Key, MouseButton};

/// Per-frame input deltas.
///
/// `InputState` provides the current state (held keys/buttons, pointer position).
/// `InputFrame` provides events and transitions for the current frame.
#[derive(Debug, Default)]
pub struct InputFrame {
    /// Raw events in arrival order.
    pub events: Vec<InputEvent>,

    /// Keys pressed this frame, including key-repeats.
    pub keys_pressed: HashSet<Key>,

    /// Keys released this frame.
    pub keys_released: HashSet<Key>,

    /// Mouse buttons pressed this frame.
    pub buttons_pressed: HashSet<MouseButton>,

    /// Mouse buttons released this frame.
    pub buttons_released: HashSet<MouseButton>,

    /// Accumulated vertical wheel movement, in lines.
    pub wheel_lines: f32,

    /// Accumulated pointer motion in logical pixels.
    pub pointer_delta: (f32, f32),
}

impl InputFrame {
    pub fn clear(&mut self) {
        self.events.clear();
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.wheel_lines = 0.0;
        self.pointer_delta = (0.0, 0.0);
    }

    pub fn push_event(&mut self, ev: InputEvent) {
        self.events.push(ev);
    }

    #[inline]
    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }
}
