use ember_platform::input_event::{Event, KeyCode, MouseButton};
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::keyboard::PhysicalKey;

pub struct WinitEventAdapter {}
impl WinitEventAdapter {
    /// 与输入无关的窗口事件返回 None
    pub fn from_winit_event(event: &WindowEvent) -> Option<Event> {
        let event = match event {
            WindowEvent::CloseRequested => Event::WindowClose,
            WindowEvent::Resized(physical_size) => Event::WindowResize {
                width: physical_size.width,
                height: physical_size.height,
            },
            WindowEvent::CursorMoved { position, .. } => Event::MouseMoved {
                x: position.x,
                y: position.y,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = Self::scroll_from_winit(*delta);
                Event::MouseScrolled { dx, dy }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = Self::button_from_winit(*button);
                match state {
                    ElementState::Pressed => Event::MouseButtonPressed { button },
                    ElementState::Released => Event::MouseButtonReleased { button },
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                let key = Self::key_from_winit(*key_code);
                match state {
                    ElementState::Pressed => Event::KeyPressed { key, repeat: *repeat },
                    ElementState::Released => Event::KeyReleased { key },
                }
            }
            _ => return None,
        };
        Some(event)
    }

    /// 行滚动按 1 行 = 1 计算，像素滚动按 100 像素 = 1 行换算
    pub fn scroll_from_winit(delta: MouseScrollDelta) -> (f64, f64) {
        match delta {
            MouseScrollDelta::LineDelta(x, y) => (x as f64, y as f64),
            MouseScrollDelta::PixelDelta(pos) => (pos.x / 100.0, pos.y / 100.0),
        }
    }

    pub fn button_from_winit(button: winit::event::MouseButton) -> MouseButton {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            winit::event::MouseButton::Back => MouseButton::Other(3),
            winit::event::MouseButton::Forward => MouseButton::Other(4),
            winit::event::MouseButton::Other(code) => MouseButton::Other(code),
        }
    }

    pub fn key_from_winit(key: winit::keyboard::KeyCode) -> KeyCode {
        use winit::keyboard::KeyCode as WinitKey;
        match key {
            WinitKey::KeyW => KeyCode::KeyW,
            WinitKey::KeyA => KeyCode::KeyA,
            WinitKey::KeyS => KeyCode::KeyS,
            WinitKey::KeyD => KeyCode::KeyD,
            WinitKey::KeyE => KeyCode::KeyE,
            WinitKey::KeyQ => KeyCode::KeyQ,
            WinitKey::F5 => KeyCode::F5,
            WinitKey::Escape => KeyCode::Escape,
            WinitKey::Space => KeyCode::Space,
            WinitKey::ShiftLeft => KeyCode::ShiftLeft,
            _ => KeyCode::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use winit::dpi::{PhysicalPosition, PhysicalSize};

    use super::*;

    #[test]
    fn test_window_events() {
        assert_eq!(WinitEventAdapter::from_winit_event(&WindowEvent::CloseRequested), Some(Event::WindowClose));
        assert_eq!(
            WinitEventAdapter::from_winit_event(&WindowEvent::Resized(PhysicalSize::new(800, 600))),
            Some(Event::WindowResize {
                width: 800,
                height: 600
            })
        );
        assert_eq!(WinitEventAdapter::from_winit_event(&WindowEvent::Focused(true)), None);
    }

    #[test]
    fn test_key_and_button_mapping() {
        assert_eq!(WinitEventAdapter::key_from_winit(winit::keyboard::KeyCode::F5), KeyCode::F5);
        assert_eq!(WinitEventAdapter::key_from_winit(winit::keyboard::KeyCode::KeyW), KeyCode::KeyW);
        assert_eq!(WinitEventAdapter::key_from_winit(winit::keyboard::KeyCode::KeyZ), KeyCode::Other);

        assert_eq!(WinitEventAdapter::button_from_winit(winit::event::MouseButton::Right), MouseButton::Right);
        assert_eq!(WinitEventAdapter::button_from_winit(winit::event::MouseButton::Other(7)), MouseButton::Other(7));
    }

    #[test]
    fn test_scroll_units() {
        assert_eq!(WinitEventAdapter::scroll_from_winit(MouseScrollDelta::LineDelta(0.0, -2.0)), (0.0, -2.0));
        assert_eq!(
            WinitEventAdapter::scroll_from_winit(MouseScrollDelta::PixelDelta(PhysicalPosition::new(50.0, 200.0))),
            (0.5, 2.0)
        );
    }
}
