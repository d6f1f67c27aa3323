//! Proposal decoding and greedy non-max suppression.

use crate::detect::{Letterbox, ProposalTensor};

/// A detected region in canonical-image pixel coordinates, clamped to the
/// image bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Left edge, inclusive.
    pub left: i32,
    /// Top edge, inclusive.
    pub top: i32,
    /// Right edge, inclusive.
    pub right: i32,
    /// Bottom edge, inclusive.
    pub bottom: i32,
    /// Detector confidence, above the session's threshold.
    pub confidence: f32,
}

impl Detection {
    fn area(&self) -> f32 {
        ((self.right - self.left).max(0) * (self.bottom - self.top).max(0)) as f32
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.left.max(other.left);
        let y1 = self.top.max(other.top);
        let x2 = self.right.min(other.right);
        let y2 = self.bottom.min(other.bottom);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = ((x2 - x1) * (y2 - y1)) as f32;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Turn a raw proposal tensor into confidence-filtered candidate boxes in
/// image space, in proposal order.
///
/// For proposal `i` the channels hold `cx, cy, w, h, score` in network
/// (letterboxed) coordinates; the letterbox geometry undoes the resize and
/// padding, and the result is clamped to `[0, dim − 1]` on both axes.
pub fn decode(
    tensor: &ProposalTensor,
    geometry: Letterbox,
    img_w: u32,
    img_h: u32,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let cx = tensor.channel(0);
    let cy = tensor.channel(1);
    let w = tensor.channel(2);
    let h = tensor.channel(3);
    let score = tensor.channel(4);

    let max_x = (img_w - 1) as f32;
    let max_y = (img_h - 1) as f32;

    let mut candidates = Vec::new();
    for i in 0..tensor.num_proposals() {
        if score[i] <= confidence_threshold {
            continue;
        }

        let xmin = ((cx[i] - w[i] / 2.0 - geometry.pad_w) * geometry.ratio_w).clamp(0.0, max_x);
        let ymin = ((cy[i] - h[i] / 2.0 - geometry.pad_h) * geometry.ratio_h).clamp(0.0, max_y);
        let xmax = ((cx[i] + w[i] / 2.0 - geometry.pad_w) * geometry.ratio_w).clamp(0.0, max_x);
        let ymax = ((cy[i] + h[i] / 2.0 - geometry.pad_h) * geometry.ratio_h).clamp(0.0, max_y);

        candidates.push(Detection {
            left: xmin as i32,
            top: ymin as i32,
            right: xmax as i32,
            bottom: ymax as i32,
            confidence: score[i],
        });
    }
    candidates
}

/// Greedy non-max suppression.
///
/// Candidates are visited in confidence-descending order (stable: equal
/// confidences keep their pre-sort order, so the earlier proposal wins) and
/// kept only when their IoU with every already-kept box stays at or below
/// the threshold. The result is confidence-descending.
pub fn non_max_suppression(candidates: &[Detection], nms_threshold: f32) -> Vec<Detection> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].confidence.total_cmp(&candidates[a].confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for &i in &order {
        let candidate = candidates[i];
        if kept.iter().all(|k| k.iou(&candidate) <= nms_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
