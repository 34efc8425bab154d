// 参考 winit::MouseButton
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

// 参考 winit::KeyCode，只保留编辑器用到的按键
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyCode {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    KeyE,
    KeyQ,
    F5,
    Escape,
    Space,
    ShiftLeft,

    Other,
}

/// 窗口和输入事件
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WindowClose,
    /// 物理像素
    WindowResize {
        width: u32,
        height: u32,
    },
    KeyPressed {
        key: KeyCode,
        repeat: bool,
    },
    KeyReleased {
        key: KeyCode,
    },
    /// 物理像素，原点在左上角
    MouseMoved {
        x: f64,
        y: f64,
    },
    MouseScrolled {
        dx: f64,
        dy: f64,
    },
    MouseButtonPressed {
        button: MouseButton,
    },
    MouseButtonReleased {
        button: MouseButton,
    },
}
impl Event {
    #[inline]
    pub fn is_window_event(&self) -> bool {
        matches!(self, Self::WindowClose | Self::WindowResize { .. })
    }
}
