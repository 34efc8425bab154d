use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::input_event::Event;

/// 事件的接收方
pub trait EventHandler {
    /// 返回 true 表示事件已被处理，不再向下传递
    fn on_event(&mut self, event: &Event) -> bool;
}

/// 可以在分发过程中继续投递事件，这些事件在下一次 drain 时才会被处理
#[derive(Clone)]
pub struct EventProxy {
    events: Rc<RefCell<VecDeque<Event>>>,
}
impl EventProxy {
    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push_back(event);
    }
}

/// 窗口回调只负责 push，每个 tick 统一 drain 一次
#[derive(Default)]
pub struct EventQueue {
    events: Rc<RefCell<VecDeque<Event>>>,
}
impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn proxy(&self) -> EventProxy {
        EventProxy {
            events: self.events.clone(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// 按 FIFO 顺序分发当前所有事件
    ///
    /// 每个事件从 `handlers` 的末尾（最上层）开始向前传递，遇到返回 true 的 handler 即停止。
    /// `observe` 在分发之前看到每一个事件，不影响传递。
    ///
    /// # return
    /// 本次分发的事件数量
    pub fn drain_into<H>(&self, handlers: &mut [Box<H>], mut observe: impl FnMut(&Event)) -> usize
    where
        H: EventHandler + ?Sized,
    {
        let _span = tracy_client::span!("EventQueue::drain_into");
        let batch = std::mem::take(&mut *self.events.borrow_mut());
        let count = batch.len();
        for event in batch {
            observe(&event);
            for handler in handlers.iter_mut().rev() {
                if handler.on_event(&event) {
                    log::trace!("event {:?} handled", event);
                    break;
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_event::KeyCode;

    struct Recorder {
        name: &'static str,
        consume: bool,
        log: Rc<RefCell<Vec<(&'static str, Event)>>>,
        proxy: Option<EventProxy>,
    }
    impl EventHandler for Recorder {
        fn on_event(&mut self, event: &Event) -> bool {
            self.log.borrow_mut().push((self.name, event.clone()));
            if let Some(proxy) = &self.proxy {
                proxy.push(Event::WindowClose);
            }
            self.consume
        }
    }

    fn recorder(name: &'static str, consume: bool, log: &Rc<RefCell<Vec<(&'static str, Event)>>>) -> Box<Recorder> {
        Box::new(Recorder {
            name,
            consume,
            log: log.clone(),
            proxy: None,
        })
    }

    #[test]
    fn test_fifo_and_top_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handlers = vec![recorder("bottom", false, &log), recorder("top", false, &log)];

        let queue = EventQueue::new();
        queue.push(Event::KeyPressed {
            key: KeyCode::KeyW,
            repeat: false,
        });
        queue.push(Event::WindowResize { width: 10, height: 20 });

        assert_eq!(queue.drain_into(&mut handlers, |_| {}), 2);
        let names: Vec<&str> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["top", "bottom", "top", "bottom"]);
        assert!(matches!(log.borrow()[0].1, Event::KeyPressed { .. }));
        assert!(matches!(log.borrow()[2].1, Event::WindowResize { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_handled_event_stops_propagation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handlers = vec![recorder("bottom", false, &log), recorder("top", true, &log)];

        let queue = EventQueue::new();
        queue.push(Event::WindowClose);
        let mut observed = 0;
        queue.drain_into(&mut handlers, |_| observed += 1);

        assert_eq!(observed, 1);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].0, "top");
    }

    #[test]
    fn test_events_pushed_during_dispatch_wait_for_next_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let queue = EventQueue::new();
        let mut handlers = vec![Box::new(Recorder {
            name: "pusher",
            consume: false,
            log: log.clone(),
            proxy: Some(queue.proxy()),
        })];

        queue.push(Event::MouseMoved { x: 1.0, y: 2.0 });
        assert_eq!(queue.drain_into(&mut handlers, |_| {}), 1);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain_into(&mut handlers, |_| {}), 1);
        assert_eq!(log.borrow()[1].1, Event::WindowClose);
    }
}
