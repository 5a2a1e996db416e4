//! Keyboard and mouse types
//!
//! Window-system independent representation of the input the samples react
//! to. Decoding from the window backend lives in [`crate::render::window`].

use bitflags::bitflags;

/// Keys the samples care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// W key
    W,
    /// A key
    A,
    /// S key
    S,
    /// D key
    D,
    /// Q key
    Q,
    /// E key
    E,
    /// R key
    R,
    /// Space key
    Space,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

bitflags! {
    /// Keyboard modifiers held while a key event fired
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Either shift key
        const SHIFT = 1 << 0;
        /// Either control key
        const CONTROL = 1 << 1;
        /// Either alt key
        const ALT = 1 << 2;
    }
}

bitflags! {
    /// Mouse buttons held while the cursor moved
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        /// Left button held
        const LEFT = 1 << 0;
        /// Right button held
        const RIGHT = 1 << 1;
        /// Middle button held
        const MIDDLE = 1 << 2;
    }
}

impl From<MouseButton> for MouseButtons {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Self::LEFT,
            MouseButton::Right => Self::RIGHT,
            MouseButton::Middle => Self::MIDDLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_button_to_flags() {
        let held = MouseButtons::from(MouseButton::Left) | MouseButtons::from(MouseButton::Middle);
        assert!(held.contains(MouseButtons::LEFT));
        assert!(held.contains(MouseButtons::MIDDLE));
        assert!(!held.contains(MouseButtons::RIGHT));
    }
}
