pub mod config;
pub mod constants;
pub mod frame;
pub mod label_table;
pub mod prediction;
pub mod rotation;
