pub const MODEL_NAME: &str = "face_detection_short.onnx";

/// Per-channel normalization constants of the bundled face model.
pub const DEFAULT_MEAN: f32 = 114.98212;
pub const DEFAULT_STD: f32 = 59.765034;

pub const DEFAULT_INPUT_WIDTH: u32 = 128;
pub const DEFAULT_INPUT_HEIGHT: u32 = 128;

/// Candidate slots produced per inference; fixed when the model is compiled.
pub const DEFAULT_CANDIDATE_COUNT: usize = 10;

pub const DEFAULT_POSITIVE_LABEL: &str = "Face";
pub const DEFAULT_NEGATIVE_LABEL: &str = "Not Face";

/// Consecutive positive frames required before freezing.
pub const DEFAULT_DEBOUNCE_THRESHOLD: u32 = 5;

pub const DEFAULT_FPS_WINDOW: u32 = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
