pub mod app;
pub mod winit_event_adapter;
