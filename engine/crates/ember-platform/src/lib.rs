pub mod event_queue;
pub mod input_event;
pub mod input_state;
