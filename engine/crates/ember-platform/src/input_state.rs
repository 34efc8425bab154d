use std::collections::HashSet;

use crate::input_event::{Event, KeyCode, MouseButton};

/// 记录输入信息
#[derive(Default, Clone, Debug)]
pub struct InputState {
    /// 当前的鼠标位置 pixel
    crt_mouse_pos: [f64; 2],
    /// 上一个 tick 结束时的鼠标位置 pixel
    last_mouse_pos: [f64; 2],
    /// 收到第一个 MouseMoved 之前，delta 恒为 0
    has_cursor: bool,
    keys_pressed: HashSet<KeyCode>,
    buttons_pressed: HashSet<MouseButton>,
    scroll: [f64; 2],
}
// update
impl InputState {
    pub fn on_event(&mut self, event: &Event) {
        match *event {
            Event::KeyPressed { key, .. } => {
                self.keys_pressed.insert(key);
            }
            Event::KeyReleased { key } => {
                self.keys_pressed.remove(&key);
            }
            Event::MouseButtonPressed { button } => {
                self.buttons_pressed.insert(button);
            }
            Event::MouseButtonReleased { button } => {
                self.buttons_pressed.remove(&button);
            }
            Event::MouseMoved { x, y } => {
                if !self.has_cursor {
                    self.last_mouse_pos = [x, y];
                    self.has_cursor = true;
                }
                self.crt_mouse_pos = [x, y];
            }
            Event::MouseScrolled { dx, dy } => {
                self.scroll[0] += dx;
                self.scroll[1] += dy;
            }
            Event::WindowClose | Event::WindowResize { .. } => {}
        }
    }

    /// 在每个 tick 的末尾调用，delta 从这里重新开始累计
    pub fn end_tick(&mut self) {
        self.last_mouse_pos = self.crt_mouse_pos;
        self.scroll = [0.0; 2];
    }
}
// getters
impl InputState {
    #[inline]
    pub fn is_key_pressed(&self, key_code: KeyCode) -> bool {
        self.keys_pressed.contains(&key_code)
    }

    #[inline]
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    #[inline]
    pub fn is_right_button_pressed(&self) -> bool {
        self.is_button_pressed(MouseButton::Right)
    }

    #[inline]
    pub fn mouse_position(&self) -> [f64; 2] {
        self.crt_mouse_pos
    }

    /// 本 tick 内鼠标的位移
    #[inline]
    pub fn mouse_delta(&self) -> [f64; 2] {
        [
            self.crt_mouse_pos[0] - self.last_mouse_pos[0],
            self.crt_mouse_pos[1] - self.last_mouse_pos[1],
        ]
    }

    #[inline]
    pub fn scroll_delta(&self) -> [f64; 2] {
        self.scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_and_buttons() {
        let mut input = InputState::default();
        input.on_event(&Event::KeyPressed {
            key: KeyCode::KeyW,
            repeat: false,
        });
        input.on_event(&Event::MouseButtonPressed {
            button: MouseButton::Right,
        });
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_pressed(KeyCode::KeyS));
        assert!(input.is_right_button_pressed());

        input.on_event(&Event::KeyReleased { key: KeyCode::KeyW });
        input.on_event(&Event::MouseButtonReleased {
            button: MouseButton::Right,
        });
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_right_button_pressed());
    }

    #[test]
    fn test_mouse_delta_per_tick() {
        let mut input = InputState::default();
        input.on_event(&Event::MouseMoved { x: 100.0, y: 50.0 });
        assert_eq!(input.mouse_delta(), [0.0, 0.0]);

        input.on_event(&Event::MouseMoved { x: 110.0, y: 45.0 });
        input.on_event(&Event::MouseMoved { x: 120.0, y: 40.0 });
        assert_eq!(input.mouse_delta(), [20.0, -10.0]);

        input.end_tick();
        assert_eq!(input.mouse_delta(), [0.0, 0.0]);
        assert_eq!(input.mouse_position(), [120.0, 40.0]);
    }

    #[test]
    fn test_scroll_accumulates_until_end_of_tick() {
        let mut input = InputState::default();
        input.on_event(&Event::MouseScrolled { dx: 0.0, dy: 1.0 });
        input.on_event(&Event::MouseScrolled { dx: 0.5, dy: 1.0 });
        assert_eq!(input.scroll_delta(), [0.5, 2.0]);
        input.end_tick();
        assert_eq!(input.scroll_delta(), [0.0, 0.0]);
    }
}
