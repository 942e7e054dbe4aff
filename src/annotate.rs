use std::fmt::Write as _;

use crate::detection::Detection;
use crate::error::Error;

/// Most contour points emitted per segment annotation line.
pub const MAX_CONTOUR_POINTS: usize = 50;

/// Plain-text YOLO annotation emit and parse.
///
/// One detection per line, class id first, all geometry normalized to the
/// image dimensions and printed with six decimals and a `.` separator.
/// Lines are newline separated without a trailing newline.

fn push_value(line: &mut String, v: f32) {
    // Writing into a String cannot fail.
    let _ = write!(line, " {v:.6}");
}

fn normalized_centroid_box(det: &Detection, image_size: (u32, u32)) -> (f32, f32, f32, f32) {
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let (cx, cy) = det.centroid();
    (
        cx / img_w,
        cy / img_h,
        det.rect.width() as f32 / img_w,
        det.rect.height() as f32 / img_h,
    )
}

/// `class_id xc yc w h`
pub fn emit_detect(detections: &[Detection], image_size: (u32, u32)) -> String {
    let mut lines = Vec::with_capacity(detections.len());
    for det in detections {
        let (cx, cy, w, h) = normalized_centroid_box(det, image_size);
        let mut line = det.label.index.to_string();
        for v in [cx, cy, w, h] {
            push_value(&mut line, v);
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// `class_id x1 y1 x2 y2 x3 y3 x4 y4`, the box corners rotated around the
/// box center by the detection angle.
pub fn emit_obb(detections: &[Detection], image_size: (u32, u32)) -> String {
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let mut lines = Vec::with_capacity(detections.len());

    for det in detections {
        let (cx, cy) = det.centroid();
        let hw = det.rect.width() as f32 / 2.0;
        let hh = det.rect.height() as f32 / 2.0;
        let (sin, cos) = det.angle.sin_cos();

        let mut line = det.label.index.to_string();
        for (dx, dy) in [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)] {
            let x = cx + dx * cos - dy * sin;
            let y = cy + dx * sin + dy * cos;
            push_value(&mut line, x / img_w);
            push_value(&mut line, y / img_h);
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// `class_id x1 y1 … xn yn`: the mask contour polygon when it has at least
/// three points, otherwise the four box corners.
pub fn emit_segment(detections: &[Detection], image_size: (u32, u32)) -> String {
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let mut lines = Vec::with_capacity(detections.len());

    for det in detections {
        let mut line = det.label.index.to_string();

        let contour = det
            .mask
            .as_ref()
            .map(|m| m.trace_contour(MAX_CONTOUR_POINTS))
            .unwrap_or_default();

        if contour.len() >= 3 {
            // Contour points are local to the mask, anchored at the box
            // top-left corner.
            for (x, y) in contour {
                push_value(&mut line, (det.rect.left as f32 + x as f32) / img_w);
                push_value(&mut line, (det.rect.top as f32 + y as f32) / img_h);
            }
        } else {
            let r = det.rect;
            for (x, y) in [
                (r.left, r.top),
                (r.right, r.top),
                (r.right, r.bottom),
                (r.left, r.bottom),
            ] {
                push_value(&mut line, x as f32 / img_w);
                push_value(&mut line, y as f32 / img_h);
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// `class_id xc yc w h px1 py1 v1 …` with visibility 2 for keypoints at or
/// above `visibility_threshold`, 1 below.
pub fn emit_pose(
    detections: &[Detection],
    image_size: (u32, u32),
    visibility_threshold: f64,
) -> String {
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let mut lines = Vec::with_capacity(detections.len());

    for det in detections {
        let (cx, cy, w, h) = normalized_centroid_box(det, image_size);
        let mut line = det.label.index.to_string();
        for v in [cx, cy, w, h] {
            push_value(&mut line, v);
        }

        for kp in &det.keypoints {
            push_value(&mut line, kp.x as f32 / img_w);
            push_value(&mut line, kp.y as f32 / img_h);
            let visibility = if kp.confidence >= visibility_threshold {
                2
            } else {
                1
            };
            let _ = write!(line, " {visibility}");
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// `class_id xc yc w h`, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectAnnotation {
    pub class_id: usize,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObbAnnotation {
    pub class_id: usize,
    pub corners: [(f32, f32); 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAnnotation {
    pub class_id: usize,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseKeypoint {
    pub x: f32,
    pub y: f32,
    pub visibility: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseAnnotation {
    pub class_id: usize,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub keypoints: Vec<PoseKeypoint>,
}

struct LineTokens<'a> {
    line: usize,
    class_id: usize,
    values: Vec<&'a str>,
}

fn tokenize(text: &str) -> Result<Vec<LineTokens<'_>>, Error> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut tokens = trimmed.split_whitespace();
        let class_token = tokens.next().ok_or_else(|| Error::MalformedAnnotation {
            line,
            reason: "missing class id".into(),
        })?;
        let class_id = class_token
            .parse::<usize>()
            .map_err(|_| Error::MalformedAnnotation {
                line,
                reason: format!("class id {class_token:?} is not a non-negative integer"),
            })?;

        out.push(LineTokens {
            line,
            class_id,
            values: tokens.collect(),
        });
    }
    Ok(out)
}

fn parse_floats(tokens: &LineTokens<'_>) -> Result<Vec<f32>, Error> {
    tokens
        .values
        .iter()
        .map(|t| {
            t.parse::<f32>().map_err(|_| Error::MalformedAnnotation {
                line: tokens.line,
                reason: format!("value {t:?} is not a number"),
            })
        })
        .collect()
}

pub fn parse_detect(text: &str) -> Result<Vec<DetectAnnotation>, Error> {
    tokenize(text)?
        .iter()
        .map(|t| {
            let v = parse_floats(t)?;
            if v.len() != 4 {
                return Err(Error::MalformedAnnotation {
                    line: t.line,
                    reason: format!("expected 4 box values, got {}", v.len()),
                });
            }
            Ok(DetectAnnotation {
                class_id: t.class_id,
                cx: v[0],
                cy: v[1],
                w: v[2],
                h: v[3],
            })
        })
        .collect()
}

pub fn parse_obb(text: &str) -> Result<Vec<ObbAnnotation>, Error> {
    tokenize(text)?
        .iter()
        .map(|t| {
            let v = parse_floats(t)?;
            if v.len() != 8 {
                return Err(Error::MalformedAnnotation {
                    line: t.line,
                    reason: format!("expected 8 corner values, got {}", v.len()),
                });
            }
            Ok(ObbAnnotation {
                class_id: t.class_id,
                corners: [
                    (v[0], v[1]),
                    (v[2], v[3]),
                    (v[4], v[5]),
                    (v[6], v[7]),
                ],
            })
        })
        .collect()
}

pub fn parse_segment(text: &str) -> Result<Vec<SegmentAnnotation>, Error> {
    tokenize(text)?
        .iter()
        .map(|t| {
            let v = parse_floats(t)?;
            if v.len() < 6 || v.len() % 2 != 0 {
                return Err(Error::MalformedAnnotation {
                    line: t.line,
                    reason: format!(
                        "expected an even number of at least 6 polygon values, got {}",
                        v.len()
                    ),
                });
            }
            Ok(SegmentAnnotation {
                class_id: t.class_id,
                points: v.chunks_exact(2).map(|c| (c[0], c[1])).collect(),
            })
        })
        .collect()
}

pub fn parse_pose(text: &str) -> Result<Vec<PoseAnnotation>, Error> {
    tokenize(text)?
        .iter()
        .map(|t| {
            let v = parse_floats(t)?;
            if v.len() < 4 || (v.len() - 4) % 3 != 0 {
                return Err(Error::MalformedAnnotation {
                    line: t.line,
                    reason: format!(
                        "expected 4 box values plus keypoint triplets, got {}",
                        v.len()
                    ),
                });
            }

            let mut keypoints = Vec::with_capacity((v.len() - 4) / 3);
            for triplet in v[4..].chunks_exact(3) {
                let visibility = triplet[2];
                if visibility != 0.0 && visibility != 1.0 && visibility != 2.0 {
                    return Err(Error::MalformedAnnotation {
                        line: t.line,
                        reason: format!("keypoint visibility must be 0, 1 or 2, got {visibility}"),
                    });
                }
                keypoints.push(PoseKeypoint {
                    x: triplet[0],
                    y: triplet[1],
                    visibility: visibility as u8,
                });
            }

            Ok(PoseAnnotation {
                class_id: t.class_id,
                cx: v[0],
                cy: v[1],
                w: v[2],
                h: v[3],
                keypoints,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::Rect;
    use crate::detection::{KeyPoint, Label};
    use crate::mask::BitMask;

    fn detection(class_id: usize, rect: Rect) -> Detection {
        Detection {
            label: Label::new(class_id, format!("label{class_id}"), "#00ff00"),
            confidence: 0.9,
            rect,
            angle: 0.0,
            keypoints: Vec::new(),
            mask: None,
            tracking: None,
        }
    }

    #[test]
    fn detect_line_is_normalized_with_six_decimals() {
        let dets = vec![detection(2, Rect::new(10, 20, 50, 60))];
        let text = emit_detect(&dets, (100, 100));
        assert_eq!(text, "2 0.300000 0.400000 0.400000 0.400000");
    }

    #[test]
    fn detect_roundtrip_preserves_geometry() {
        let dets = vec![
            detection(0, Rect::new(10, 20, 50, 60)),
            detection(7, Rect::new(100, 200, 340, 420)),
        ];
        let text = emit_detect(&dets, (640, 480));
        let parsed = parse_detect(&text).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].class_id, 0);
        assert_eq!(parsed[1].class_id, 7);
        assert!((parsed[1].cx - 220.0 / 640.0).abs() < 1e-5);
        assert!((parsed[1].cy - 310.0 / 480.0).abs() < 1e-5);
        assert!((parsed[1].w - 240.0 / 640.0).abs() < 1e-5);
        assert!((parsed[1].h - 220.0 / 480.0).abs() < 1e-5);
    }

    #[test]
    fn obb_roundtrip_preserves_rotated_corners() {
        let mut det = detection(3, Rect::new(40, 40, 80, 60));
        det.angle = 0.3;

        let text = emit_obb(&[det], (200, 100));
        let parsed = parse_obb(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].class_id, 3);

        // First corner: center (60, 50), offset (-20, -10) rotated by 0.3.
        let (sin, cos) = 0.3f32.sin_cos();
        let x = (60.0 + (-20.0) * cos - (-10.0) * sin) / 200.0;
        let y = (50.0 + (-20.0) * sin + (-10.0) * cos) / 100.0;
        assert!((parsed[0].corners[0].0 - x).abs() < 1e-5);
        assert!((parsed[0].corners[0].1 - y).abs() < 1e-5);
    }

    #[test]
    fn segment_uses_mask_contour_when_present() {
        let mut mask = BitMask::new(10, 10);
        for y in 1..9 {
            for x in 1..9 {
                mask.set(x, y);
            }
        }

        let mut det = detection(1, Rect::new(20, 30, 30, 40));
        det.mask = Some(mask);

        let text = emit_segment(&[det], (100, 100));
        let parsed = parse_segment(&text).unwrap();

        assert_eq!(parsed[0].class_id, 1);
        assert!(parsed[0].points.len() >= 3);
        // First traced point is the mask's top-left set pixel (1, 1),
        // anchored at the box corner (20, 30).
        assert!((parsed[0].points[0].0 - 0.21).abs() < 1e-5);
        assert!((parsed[0].points[0].1 - 0.31).abs() < 1e-5);
    }

    #[test]
    fn segment_falls_back_to_box_corners_without_a_mask() {
        let det = detection(4, Rect::new(10, 10, 30, 20));
        let text = emit_segment(&[det], (100, 100));
        let parsed = parse_segment(&text).unwrap();

        assert_eq!(
            parsed[0].points,
            vec![(0.1, 0.1), (0.3, 0.1), (0.3, 0.2), (0.1, 0.2)]
        );
    }

    #[test]
    fn pose_visibility_reflects_keypoint_confidence() {
        let mut det = detection(0, Rect::new(10, 10, 50, 90));
        det.keypoints = vec![
            KeyPoint {
                x: 20,
                y: 30,
                confidence: 0.9,
            },
            KeyPoint {
                x: 40,
                y: 70,
                confidence: 0.3,
            },
        ];

        let text = emit_pose(&[det], (100, 100), 0.5);
        let parsed = parse_pose(&text).unwrap();

        assert_eq!(parsed[0].keypoints.len(), 2);
        assert_eq!(parsed[0].keypoints[0].visibility, 2);
        assert_eq!(parsed[0].keypoints[1].visibility, 1);
        assert!((parsed[0].keypoints[0].x - 0.2).abs() < 1e-5);
        assert!((parsed[0].keypoints[1].y - 0.7).abs() < 1e-5);
    }

    #[test]
    fn multiple_detections_are_newline_separated_without_trailing_newline() {
        let dets = vec![
            detection(0, Rect::new(0, 0, 10, 10)),
            detection(1, Rect::new(20, 20, 40, 40)),
        ];
        let text = emit_detect(&dets, (100, 100));

        assert_eq!(text.lines().count(), 2);
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn malformed_lines_report_their_line_number() {
        let err = parse_detect("0 0.1 0.2 0.3 0.4\n1 0.5 oops 0.1 0.1").unwrap_err();
        match err {
            Error::MalformedAnnotation { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }

        let err = parse_pose("0 0.5 0.5 0.2 0.2 0.1 0.1").unwrap_err();
        match err {
            Error::MalformedAnnotation { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let parsed = parse_detect("\n0 0.1 0.2 0.3 0.4\n\n").unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
