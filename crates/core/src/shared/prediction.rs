/// Frame-relative box in `(left, top, right, bottom)` order, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }
}

/// A single labeled candidate decoded from one inference call.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
    pub location: BoundingBox,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32, location: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bbox(left: f32, top: f32, right: f32, bottom: f32) -> BoundingBox {
        BoundingBox {
            left,
            top,
            right,
            bottom,
        }
    }

    #[test]
    fn test_width_and_height() {
        let b = bbox(0.2, 0.1, 0.8, 0.6);
        assert_relative_eq!(b.width(), 0.6, epsilon = 1e-6);
        assert_relative_eq!(b.height(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_inverted_box_has_zero_extent() {
        let b = bbox(0.8, 0.6, 0.2, 0.1);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
    }

    #[test]
    fn test_prediction_new_accepts_str() {
        let p = Prediction::new("Face", 0.9, BoundingBox::default());
        assert_eq!(p.label, "Face");
        assert_relative_eq!(p.score, 0.9);
    }
}
