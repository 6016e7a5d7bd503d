pub mod camera;
pub mod detection;
pub mod pipeline;
pub mod shared;
