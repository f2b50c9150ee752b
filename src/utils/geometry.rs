//! Planar geometry for footprints, overlap and heading
//!
//! Footprints are convex, counter-clockwise polygons in the world frame. The
//! IoU of two objects is computed by clipping one footprint against the other.

use ::core::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{Point2, Vector2};

use crate::types::object::{Pose, Shape};

/// Areas below this are treated as empty.
const MIN_AREA: f64 = 1e-6;

/// Vertices used to approximate a cylinder footprint.
const CYLINDER_SEGMENTS: usize = 16;

// ============================================================================
// Angles
// ============================================================================

/// Normalizes an angle to `(-pi, pi]`.
pub fn normalize_radian(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a > PI {
        a - TAU
    } else {
        a
    }
}

/// Wraps into `[-range, range)`.
#[inline]
fn wrap_to_range(angle: f64, range: f64) -> f64 {
    (angle + range).rem_euclid(2.0 * range) - range
}

/// Signed angle between two headings.
///
/// When `distinguish_front_back` is false, opposite headings are treated as
/// equal and the result lies in `[-pi/2, pi/2)`; otherwise in `[-pi, pi)`.
pub fn formed_yaw_angle(yaw1: f64, yaw2: f64, distinguish_front_back: bool) -> f64 {
    let range = if distinguish_front_back { PI } else { FRAC_PI_2 };
    wrap_to_range(wrap_to_range(yaw1, range) - wrap_to_range(yaw2, range), range)
}

// ============================================================================
// Polygons
// ============================================================================

/// Absolute shoelace area.
pub fn polygon_area(points: &[Point2<f64>]) -> f64 {
    signed_area(points).abs()
}

fn signed_area(points: &[Point2<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    0.5 * twice
}

#[inline]
fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull in counter-clockwise order (monotone chain).
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut sorted: Vec<Point2<f64>> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(sorted.len() + 1);
    // lower hull
    for p in &sorted {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    // upper hull
    let lower_len = hull.len() + 1;
    for p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// World-frame footprint of an object.
pub fn footprint(pose: &Pose, shape: &Shape) -> Vec<Point2<f64>> {
    let local: Vec<Point2<f64>> = match shape {
        Shape::BoundingBox { length, width, .. } => {
            let (hl, hw) = (length * 0.5, width * 0.5);
            vec![
                Point2::new(hl, hw),
                Point2::new(-hl, hw),
                Point2::new(-hl, -hw),
                Point2::new(hl, -hw),
            ]
        }
        Shape::Cylinder { diameter, .. } => {
            let r = diameter * 0.5;
            (0..CYLINDER_SEGMENTS)
                .map(|i| {
                    let theta = TAU * i as f64 / CYLINDER_SEGMENTS as f64;
                    Point2::new(r * theta.cos(), r * theta.sin())
                })
                .collect()
        }
        Shape::Polygon { footprint, .. } => footprint.clone(),
    };

    let (sin_yaw, cos_yaw) = pose.yaw.sin_cos();
    let origin = Vector2::new(pose.position.x, pose.position.y);
    let world: Vec<Point2<f64>> = local
        .iter()
        .map(|p| {
            Point2::new(
                p.x * cos_yaw - p.y * sin_yaw + origin.x,
                p.x * sin_yaw + p.y * cos_yaw + origin.y,
            )
        })
        .collect();

    convex_hull(&world)
}

/// Clips `subject` against the convex counter-clockwise polygon `clip`.
pub fn clip_convex(subject: &[Point2<f64>], clip: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut output: Vec<Point2<f64>> = subject.to_vec();

    for (a, b) in clip.iter().zip(clip.iter().cycle().skip(1)) {
        if output.is_empty() {
            break;
        }
        let input = ::core::mem::take(&mut output);
        let inside = |p: &Point2<f64>| cross(a, b, p) >= 0.0;

        for (cur, next) in input.iter().zip(input.iter().cycle().skip(1)) {
            let cur_in = inside(cur);
            let next_in = inside(next);
            if cur_in {
                output.push(*cur);
            }
            if cur_in != next_in {
                if let Some(p) = line_intersection(cur, next, a, b) {
                    output.push(p);
                }
            }
        }
    }
    output
}

/// Intersection of segment `p1-p2` with the infinite line through `a-b`.
fn line_intersection(
    p1: &Point2<f64>,
    p2: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
) -> Option<Point2<f64>> {
    let d1 = cross(a, b, p1);
    let d2 = cross(a, b, p2);
    let denom = d1 - d2;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let t = d1 / denom;
    Some(p1 + (p2 - p1) * t)
}

/// Area shared by two convex footprints.
pub fn intersection_area(a: &[Point2<f64>], b: &[Point2<f64>]) -> f64 {
    if a.len() < 3 || b.len() < 3 {
        return 0.0;
    }
    polygon_area(&clip_convex(a, b))
}

/// 2D intersection over union of two object footprints.
///
/// Returns 0 for degenerate footprints and when the union is below
/// `min_union_area`.
pub fn get_2d_iou(
    pose_a: &Pose,
    shape_a: &Shape,
    pose_b: &Pose,
    shape_b: &Shape,
    min_union_area: f64,
) -> f64 {
    let poly_a = footprint(pose_a, shape_a);
    let area_a = polygon_area(&poly_a);
    if area_a < MIN_AREA {
        return 0.0;
    }
    let poly_b = footprint(pose_b, shape_b);
    let area_b = polygon_area(&poly_b);
    if area_b < MIN_AREA {
        return 0.0;
    }

    let intersection = intersection_area(&poly_a, &poly_b);
    if intersection < MIN_AREA {
        return 0.0;
    }
    let union = area_a + area_b - intersection;
    if union < min_union_area {
        return 0.0;
    }
    (intersection / union).min(1.0)
}

/// Axis-aligned (object frame) bounding box of a polygon footprint.
///
/// Returns the re-centred pose and the box, or `None` for fewer than three
/// points.
pub fn convex_hull_to_bounding_box(
    pose: &Pose,
    footprint: &[Point2<f64>],
    height: f64,
) -> Option<(Pose, Shape)> {
    if footprint.len() < 3 {
        return None;
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in footprint {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let local_center = Vector2::new((max_x + min_x) * 0.5, (max_y + min_y) * 0.5);
    let (sin_yaw, cos_yaw) = pose.yaw.sin_cos();
    let mut center = *pose;
    center.position.x += local_center.x * cos_yaw - local_center.y * sin_yaw;
    center.position.y += local_center.x * sin_yaw + local_center.y * cos_yaw;

    Some((center, Shape::bounding_box(max_x - min_x, max_y - min_y, height)))
}

// ============================================================================
// Anchor Points
// ============================================================================

/// Part of a box that faces an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxAnchor {
    FrontSurface,
    RightSurface,
    RearSurface,
    LeftSurface,
    FrontRightCorner,
    RearRightCorner,
    RearLeftCorner,
    FrontLeftCorner,
    /// The observer is inside the footprint.
    Inside,
}

/// `1` beyond `half`, `-1` beyond `-half`, `0` between.
#[inline]
fn band(v: f64, half: f64) -> i8 {
    if v > half {
        1
    } else if v > -half {
        0
    } else {
        -1
    }
}

/// Corner or surface of a `length` x `width` box centred at `pose` that is
/// nearest to `observer`.
pub fn nearest_corner_or_surface(
    pose: &Pose,
    length: f64,
    width: f64,
    observer: &Point2<f64>,
) -> BoxAnchor {
    let (sin_yaw, cos_yaw) = pose.yaw.sin_cos();
    let dx = observer.x - pose.position.x;
    let dy = observer.y - pose.position.y;
    let local_x = cos_yaw * dx + sin_yaw * dy;
    let local_y = -sin_yaw * dx + cos_yaw * dy;

    match (band(local_x, length * 0.5), band(local_y, width * 0.5)) {
        (1, 1) => BoxAnchor::FrontLeftCorner,
        (1, 0) => BoxAnchor::FrontSurface,
        (1, _) => BoxAnchor::FrontRightCorner,
        (0, 1) => BoxAnchor::LeftSurface,
        (0, 0) => BoxAnchor::Inside,
        (0, _) => BoxAnchor::RightSurface,
        (_, 1) => BoxAnchor::RearLeftCorner,
        (_, 0) => BoxAnchor::RearSurface,
        _ => BoxAnchor::RearRightCorner,
    }
}

/// Object-frame vector from the centre of a box resized by
/// `(d_length, d_width)` to the centre of the original box, with `anchor`
/// held in place.
pub fn anchor_offset(anchor: BoxAnchor, d_length: f64, d_width: f64) -> Vector2<f64> {
    let front = Vector2::new(d_length * 0.5, 0.0);
    let left = Vector2::new(0.0, d_width * 0.5);
    match anchor {
        BoxAnchor::FrontSurface => front,
        BoxAnchor::RightSurface => -left,
        BoxAnchor::RearSurface => -front,
        BoxAnchor::LeftSurface => left,
        BoxAnchor::FrontRightCorner => front - left,
        BoxAnchor::RearRightCorner => -front - left,
        BoxAnchor::RearLeftCorner => left - front,
        BoxAnchor::FrontLeftCorner => front + left,
        BoxAnchor::Inside => Vector2::zeros(),
    }
}
