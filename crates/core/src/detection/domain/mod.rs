pub mod inference_engine;
pub mod prediction_decoder;
pub mod preprocessor;
pub mod ranker;
pub mod stability_tracker;
