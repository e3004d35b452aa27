//! Input accumulation between frames.
//!
//! Window events are fed in as they arrive; the render loop drains them once
//! per iteration with [`InputState::take_frame`].

use glam::Vec2;
pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Everything that happened since the previous frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// Escape pressed or window close requested.
    pub quit: bool,
    /// Net selection steps: +1 per "+" press, -1 per "-" press.
    pub selection_steps: i32,
    /// Pointer travel in pixels while the left button was held.
    pub drag: Vec2,
    /// Scroll distance in lines, positive away from the user.
    pub scroll: f32,
}

/// Accumulates window events until the next frame consumes them.
#[derive(Debug, Default)]
pub struct InputState {
    pending: FrameInput,
    left_down: bool,
    cursor: Option<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_quit(&mut self) {
        self.pending.quit = true;
    }

    /// Handle a key press. Key repeats count as presses.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        match key {
            KeyCode::Escape => self.pending.quit = true,
            KeyCode::Equal | KeyCode::NumpadAdd => self.pending.selection_steps += 1,
            KeyCode::Minus | KeyCode::NumpadSubtract => self.pending.selection_steps -= 1,
            _ => {}
        }
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if button == MouseButton::Left {
            self.left_down = true;
        }
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        if button == MouseButton::Left {
            self.left_down = false;
        }
    }

    /// Handle a cursor position in window pixels.
    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        let position = Vec2::new(x, y);
        if let Some(previous) = self.cursor
            && self.left_down
        {
            self.pending.drag += position - previous;
        }
        self.cursor = Some(position);
    }

    pub fn on_cursor_left(&mut self) {
        self.cursor = None;
    }

    /// Handle a scroll of `lines` lines.
    pub fn on_scroll(&mut self, lines: f32) {
        self.pending.scroll += lines;
    }

    /// Drain the accumulated input.
    pub fn take_frame(&mut self) -> FrameInput {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_requests_quit() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Escape);
        assert!(input.take_frame().quit);
        assert!(!input.take_frame().quit);
    }

    #[test]
    fn test_selection_presses_accumulate() {
        let mut input = InputState::new();
        for _ in 0..4 {
            input.on_key_pressed(KeyCode::Equal);
        }
        input.on_key_pressed(KeyCode::NumpadSubtract);
        assert_eq!(input.take_frame().selection_steps, 3);
    }

    #[test]
    fn test_held_key_repeats_keep_cycling() {
        let mut input = InputState::new();
        // One press followed by two auto-repeats of the same key.
        for _ in 0..3 {
            input.on_key_pressed(KeyCode::NumpadAdd);
        }
        assert_eq!(input.take_frame().selection_steps, 3);
        assert_eq!(input.take_frame().selection_steps, 0);
    }

    #[test]
    fn test_drag_only_while_left_held() {
        let mut input = InputState::new();
        input.on_cursor_moved(10.0, 10.0);
        input.on_cursor_moved(20.0, 10.0);
        assert_eq!(input.take_frame().drag, Vec2::ZERO);

        input.on_mouse_pressed(MouseButton::Left);
        input.on_cursor_moved(25.0, 13.0);
        input.on_cursor_moved(30.0, 16.0);
        input.on_mouse_released(MouseButton::Left);
        input.on_cursor_moved(100.0, 100.0);
        assert_eq!(input.take_frame().drag, Vec2::new(10.0, 6.0));
    }

    #[test]
    fn test_first_cursor_event_is_not_a_jump() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Left);
        input.on_cursor_moved(500.0, 300.0);
        assert_eq!(input.take_frame().drag, Vec2::ZERO);
    }

    #[test]
    fn test_scroll_sums() {
        let mut input = InputState::new();
        input.on_scroll(1.0);
        input.on_scroll(-0.5);
        assert_eq!(input.take_frame().scroll, 0.5);
    }

    #[test]
    fn test_right_button_does_not_drag() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Right);
        input.on_cursor_moved(0.0, 0.0);
        input.on_cursor_moved(5.0, 5.0);
        assert_eq!(input.take_frame().drag, Vec2::ZERO);
    }
}
