// Window and input events
//
// A closed set of event kinds delivered from the native window to listeners.
// Exactly one kind is active per event; payloads are plain data.

/// Discriminant of a [`WindowEvent`], used to filter listeners by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WindowClose,
    WindowResize,
    WindowFocus,
    WindowLostFocus,
    WindowMoved,
    KeyPressed,
    KeyReleased,
    KeyTyped,
    MouseButtonPressed,
    MouseButtonReleased,
    MouseMoved,
    MouseScrolled,
}

/// Keys the engine understands. Anything else arrives as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Tab,
    Enter,
    Shift,
    Control,
    Alt,
    Escape,
    Space,

    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,

    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    Numpad0,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,

    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,

    Left,
    Up,
    Right,
    Down,

    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Button4,
    Button5,
    Button6,
    Button7,
    Button8,
}

/// Everything a window can report to the application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    Close,
    Resize { width: u32, height: u32 },
    Focus,
    LostFocus,
    Moved { x: i32, y: i32 },
    KeyPressed { key: KeyCode, repeat_count: u8 },
    KeyReleased { key: KeyCode },
    KeyTyped { character: char },
    MouseButtonPressed { button: MouseButton },
    MouseButtonReleased { button: MouseButton },
    MouseMoved { x: f32, y: f32 },
    MouseScrolled { x_offset: f32, y_offset: f32 },
}

impl WindowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Close => EventKind::WindowClose,
            Self::Resize { .. } => EventKind::WindowResize,
            Self::Focus => EventKind::WindowFocus,
            Self::LostFocus => EventKind::WindowLostFocus,
            Self::Moved { .. } => EventKind::WindowMoved,
            Self::KeyPressed { .. } => EventKind::KeyPressed,
            Self::KeyReleased { .. } => EventKind::KeyReleased,
            Self::KeyTyped { .. } => EventKind::KeyTyped,
            Self::MouseButtonPressed { .. } => EventKind::MouseButtonPressed,
            Self::MouseButtonReleased { .. } => EventKind::MouseButtonReleased,
            Self::MouseMoved { .. } => EventKind::MouseMoved,
            Self::MouseScrolled { .. } => EventKind::MouseScrolled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(WindowEvent::Close.kind(), EventKind::WindowClose);
        assert_eq!(
            WindowEvent::Resize { width: 1, height: 2 }.kind(),
            EventKind::WindowResize
        );
        assert_eq!(
            WindowEvent::KeyPressed { key: KeyCode::Escape, repeat_count: 0 }.kind(),
            EventKind::KeyPressed
        );
        assert_eq!(
            WindowEvent::MouseScrolled { x_offset: 0.0, y_offset: -1.0 }.kind(),
            EventKind::MouseScrolled
        );
    }
}
