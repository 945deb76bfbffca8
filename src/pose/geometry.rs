//! Planar geometry used by feature extraction.

/// A 2D position in detector image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Angle in radians at `pivot` between the rays `pivot -> a` and `pivot -> b`.
///
/// Uses `cos(θ) = (u · v) / (|u| |v|)` with the cosine clamped to `[-1, 1]` so
/// rounding drift never pushes `acos` out of its domain. A zero-length ray
/// (pivot coincides with `a` or `b`) yields exactly `0.0` so degenerate poses
/// still produce a fully defined feature vector.
pub fn angle_between(pivot: Point, a: Point, b: Point) -> f32 {
    let u = (a.x - pivot.x, a.y - pivot.y);
    let v = (b.x - pivot.x, b.y - pivot.y);

    let mag_u = (u.0 * u.0 + u.1 * u.1).sqrt();
    let mag_v = (v.0 * v.0 + v.1 * v.1).sqrt();
    if mag_u == 0.0 || mag_v == 0.0 {
        return 0.0;
    }

    let dot = u.0 * v.0 + u.1 * v.1;
    let cos_theta = (dot / (mag_u * mag_v)).clamp(-1.0, 1.0);
    cos_theta.acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn distance_of_three_four_five_triangle() {
        assert_eq!(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn distance_is_non_negative_and_zero_on_itself() {
        let a = Point::new(-12.5, 40.25);
        let b = Point::new(3.0, -7.0);
        assert!(distance(a, b) >= 0.0);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, a), 0.0);
    }

    #[test]
    fn right_angle_at_pivot() {
        let angle = angle_between(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 2.0),
        );
        assert!((angle - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn opposite_rays_are_pi_apart() {
        let angle = angle_between(
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
            Point::new(5.0, 1.0),
        );
        assert!((angle - PI).abs() < 1e-6);
    }

    #[test]
    fn swapping_rays_gives_same_angle() {
        let pivot = Point::new(0.3, -1.2);
        let a = Point::new(4.0, 2.5);
        let b = Point::new(-3.1, 0.7);
        assert_eq!(angle_between(pivot, a, b), angle_between(pivot, b, a));
    }

    #[test]
    fn zero_length_ray_returns_zero() {
        let pivot = Point::new(2.0, 2.0);
        assert_eq!(angle_between(pivot, pivot, Point::new(5.0, 1.0)), 0.0);
        assert_eq!(angle_between(pivot, Point::new(5.0, 1.0), pivot), 0.0);
    }

    #[test]
    fn collinear_same_direction_stays_finite() {
        let angle = angle_between(
            Point::new(0.0, 0.0),
            Point::new(1e-3, 1e-3),
            Point::new(1e3, 1e3),
        );
        assert!(angle.is_finite());
        assert!(angle.abs() < 1e-3);
    }
}
