//! The boundary between a detection model and the tracker.

use crate::tracker::{Detection, Rect};

/// A landmark attached to a detection, such as a pose joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Visibility or confidence reported by the model
    pub score: f32,
}

/// Output of a detection model for one object.
///
/// Models that do not produce keypoints leave `keypoints` as `None`; the
/// tracker only ever looks at `bbox` and `score`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDetection {
    /// Bounding box in image pixels (TLWH)
    pub bbox: Rect,
    pub score: f32,
    pub class_id: u32,
    pub keypoints: Option<Vec<Keypoint>>,
}

impl ObjectDetection {
    pub fn new(bbox: Rect, score: f32, class_id: u32) -> Self {
        Self {
            bbox,
            score,
            class_id,
            keypoints: None,
        }
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
        self.keypoints = Some(keypoints);
        self
    }

    /// The tracker input for this object.
    pub fn to_detection(&self) -> Detection {
        Detection::from_rect(self.bbox, self.score)
    }
}

/// Anything that turns one frame into a list of boxes.
///
/// # Example
///
/// ```
/// use bytetrack_core::{DetectionSource, ObjectDetection, Rect};
///
/// struct FixedDetector;
///
/// impl DetectionSource for FixedDetector {
///     type Error = std::convert::Infallible;
///
///     fn detect(&mut self, _input: &[u8], _width: u32, _height: u32) -> Result<Vec<ObjectDetection>, Self::Error> {
///         Ok(vec![ObjectDetection::new(Rect::new(10.0, 10.0, 20.0, 40.0), 0.9, 0)])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Detect objects in a `width` x `height` frame. How `input` is laid out
    /// is up to the implementation.
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<ObjectDetection>, Self::Error>;
}

/// Conversion from a model's native output into tracker input.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

impl IntoDetections for Vec<ObjectDetection> {
    fn into_detections(self) -> Vec<Detection> {
        self.iter().map(ObjectDetection::to_detection).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_detection_drops_class_and_keypoints() {
        let object = ObjectDetection::new(Rect::new(1.0, 2.0, 3.0, 4.0), 0.8, 5).with_keypoints(vec![
            Keypoint {
                x: 2.0,
                y: 3.0,
                score: 0.9,
            },
        ]);
        assert_eq!(object.keypoints.as_ref().map(Vec::len), Some(1));
        assert_eq!(object.to_detection(), Detection::new(1.0, 2.0, 3.0, 4.0, 0.8));
    }

    #[test]
    fn test_into_detections() {
        let objects = vec![
            ObjectDetection::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0.9, 0),
            ObjectDetection::new(Rect::new(5.0, 5.0, 10.0, 10.0), 0.4, 1),
        ];
        let detections = objects.into_detections();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].score, 0.4);
    }
}
