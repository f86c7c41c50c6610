//! Assemble detections from whichever box layout a model emits.

use crate::tracker::{Detection, Rect};

use super::{Keypoint, ObjectDetection};

/// Accumulates box, score, class and keypoints into an [`ObjectDetection`].
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class_id: u32,
    keypoints: Option<Vec<Keypoint>>,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corners `(x1, y1)` and `(x2, y2)`.
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Centre `(cx, cy)` plus size, as YOLO-style heads report it.
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Top-left corner plus size.
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.x2 = x + w;
        self.y2 = y + h;
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn keypoint(mut self, x: f32, y: f32, score: f32) -> Self {
        self.keypoints
            .get_or_insert_with(Vec::new)
            .push(Keypoint { x, y, score });
        self
    }

    /// Unset fields stay at their defaults: an empty box, score 0, class 0.
    pub fn build(self) -> ObjectDetection {
        ObjectDetection {
            bbox: Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2),
            score: self.score,
            class_id: self.class_id,
            keypoints: self.keypoints,
        }
    }

    /// Build a bare tracker input, dropping class and keypoints.
    pub fn build_detection(self) -> Detection {
        Detection::from_tlbr(self.x1, self.y1, self.x2, self.y2, self.score)
    }
}
