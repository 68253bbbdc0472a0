//! Target selection among raw detections.
//!
//! Keeps detections whose label matches and whose confidence reaches the
//! threshold, then picks the one closest to the image center.  The first
//! candidate at the minimal distance wins; exact floating-point ties are not
//! broken further.

use mantis_types::{Detection, DetectionFrame};
use tracing::debug;

/// Choose the detection to act on from `frame`.
///
/// Returns `None` when no detection has `label == label_filter` and
/// `score >= min_confidence`.
pub fn select_target<'a>(
    frame: &'a DetectionFrame,
    label_filter: &str,
    min_confidence: f32,
) -> Option<&'a Detection> {
    let center_x = frame.width as f32 / 2.0;
    let center_y = frame.height as f32 / 2.0;

    let mut target: Option<&Detection> = None;
    let mut min_distance = f32::INFINITY;

    for detection in &frame.detections {
        if detection.score < min_confidence || detection.label != label_filter {
            continue;
        }
        let distance = (detection.center_x - center_x).hypot(detection.center_y - center_y);
        if distance < min_distance {
            min_distance = distance;
            target = Some(detection);
        }
    }

    match target {
        Some(t) => debug!(
            label = %t.label,
            score = t.score,
            cx = t.center_x,
            cy = t.center_y,
            "target selected"
        ),
        None => debug!(label = label_filter, min_confidence, "no suitable target"),
    }
    target
}
