pub mod fps_meter;
pub mod infrastructure;
pub mod latest_frame_slot;
pub mod pipeline_controller;
pub mod pipeline_event;
pub mod pipeline_logger;
pub mod pipeline_state;
