pub mod model_resolver;
pub mod onnx_inference_engine;
