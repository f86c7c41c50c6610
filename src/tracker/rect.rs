//! Axis-aligned boxes and IoU.

use ndarray::Array2;

/// Box in image pixels, stored as top-left corner plus size.
///
/// Three layouts are used across the tracker:
/// - TLWH `[x, y, w, h]`, how detections arrive
/// - TLBR `[x1, y1, x2, y2]`, used for overlap tests
/// - XYAH `[cx, cy, w / h, h]`, the motion filter's measurement space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box spanning the corners `(x1, y1)` and `(x2, y2)`.
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Box of height `height` centred on `(cx, cy)`, `aspect_ratio` wide per
    /// unit of height.
    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - 0.5 * width, cy - 0.5 * height, width, height)
    }

    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.bottom()]
    }

    /// A zero-height box reports an aspect ratio of 0.
    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx, cy, aspect_ratio, self.height]
    }

    /// Same as [`Rect::to_xyah`], widened for the motion filter.
    #[inline]
    pub fn to_xyah_f64(&self) -> [f64; 4] {
        self.to_xyah().map(f64::from)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + 0.5 * self.width, self.y + 0.5 * self.height)
    }

    /// Area under the inclusive-pixel convention used by [`Rect::iou`].
    #[inline]
    pub fn area(&self) -> f32 {
        (self.width + 1.0) * (self.height + 1.0)
    }

    /// Intersection over union with `other`, in `[0, 1]`.
    ///
    /// Corners are treated as inclusive pixel coordinates, so extents are
    /// `x2 - x1 + 1`. Boxes whose overlap is empty on either axis score 0.
    pub fn iou(&self, other: &Rect) -> f32 {
        let overlap_w = self.right().min(other.right()) - self.x.max(other.x) + 1.0;
        if overlap_w <= 0.0 {
            return 0.0;
        }
        let overlap_h = self.bottom().min(other.bottom()) - self.y.max(other.y) + 1.0;
        if overlap_h <= 0.0 {
            return 0.0;
        }

        let overlap = overlap_w * overlap_h;
        let union = self.area() + other.area() - overlap;
        if union > 0.0 {
            (overlap / union).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Pairwise IoU, `rows[i]` against `cols[j]`.
///
/// The result is always `rows.len() x cols.len()`, so an empty side still
/// leaves the other side's length visible in the shape.
pub fn iou_batch(rows: &[Rect], cols: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| rows[i].iou(&cols[j]))
}
