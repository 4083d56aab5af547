//! Minimal rigid-body math for the pose graph
//!
//! Only what frame conversion needs: vectors, unit quaternions and
//! position+orientation transforms that compose along a reference chain.

use std::ops::{Add, Mul, Neg, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Time(elapsed.as_secs_f64())
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Time(seconds)
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }

    /// Seconds from `earlier` to `self`.
    pub fn since(&self, earlier: Time) -> f64 {
        self.0 - earlier.0
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length_squared(&self) -> f64 {
        self.dot(self)
    }

    pub fn distance_squared(&self, other: &Vector3) -> f64 {
        (*self - *other).length_squared()
    }

    pub fn scale(&self, s: f64) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn lerp(&self, other: &Vector3, t: f64) -> Vector3 {
        *self + (*other - *self).scale(t)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn approx_eq(&self, other: &Vector3, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Vector3::new(v[0], v[1], v[2])
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

/// Rotation as `x, y, z, w` with `w` the scalar part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about `axis` (need not be normalized).
    pub fn from_axis_angle(axis: Vector3, angle: f64) -> Self {
        let len = axis.length_squared().sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let s = (angle / 2.0).sin() / len;
        Quaternion::new(axis.x * s, axis.y * s, axis.z * s, (angle / 2.0).cos())
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    pub fn normalize(&self) -> Quaternion {
        let n = self.norm_squared().sqrt();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        Quaternion::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn inverse(&self) -> Quaternion {
        let n = self.norm_squared();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        let c = self.conjugate();
        Quaternion::new(c.x / n, c.y / n, c.z / n, c.w / n)
    }

    /// Hamilton product: applying `self` after `rhs`.
    pub fn multiply(&self, rhs: &Quaternion) -> Quaternion {
        let (a, b) = (self, rhs);
        Quaternion::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }

    pub fn rotate(&self, v: &Vector3) -> Vector3 {
        // v' = v + 2w(q×v) + 2q×(q×v)
        let q = Vector3::new(self.x, self.y, self.z);
        let t = q.cross(v).scale(2.0);
        *v + t.scale(self.w) + q.cross(&t)
    }

    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Normalized linear interpolation along the shorter arc.
    pub fn nlerp(&self, other: &Quaternion, t: f64) -> Quaternion {
        let sign = if self.dot(other) < 0.0 { -1.0 } else { 1.0 };
        Quaternion::new(
            self.x + (other.x * sign - self.x) * t,
            self.y + (other.y * sign - self.y) * t,
            self.z + (other.z * sign - self.z) * t,
            self.w + (other.w * sign - self.w) * t,
        )
        .normalize()
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Equal as rotations (q and -q are the same rotation).
    pub fn approx_eq(&self, other: &Quaternion, epsilon: f64) -> bool {
        (self.dot(other).abs() - 1.0).abs() <= epsilon
    }
}

impl From<[f64; 4]> for Quaternion {
    fn from(v: [f64; 4]) -> Self {
        Quaternion::new(v[0], v[1], v[2], v[3])
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;
    fn mul(self, rhs: Quaternion) -> Quaternion {
        self.multiply(&rhs)
    }
}

/// Position and orientation of a child basis expressed in a parent basis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vector3::ZERO,
        orientation: Quaternion::IDENTITY,
    };

    pub fn new(position: Vector3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// `self` maps child→parent, `child` maps grandchild→child; the result
    /// maps grandchild→parent.
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform {
            position: self.position + self.orientation.rotate(&child.position),
            orientation: (self.orientation * child.orientation).normalize(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let inv = self.orientation.inverse();
        Transform {
            position: -inv.rotate(&self.position),
            orientation: inv,
        }
    }
}

/// Values a sampled property can blend between.
pub trait Interpolate: Clone {
    fn interpolate(&self, other: &Self, t: f64) -> Self;
}

impl Interpolate for Vector3 {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        self.lerp(other, t)
    }
}

impl Interpolate for Quaternion {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        self.nlerp(other, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_rotate_quarter_turn_about_y() {
        let q = Quaternion::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), FRAC_PI_2);
        let v = q.rotate(&Vector3::new(1.0, 0.0, 0.0));
        assert!(v.approx_eq(&Vector3::new(0.0, 0.0, -1.0), EPS), "{:?}", v);
    }

    #[test]
    fn test_compose_then_inverse_is_identity() {
        let a = Transform::new(
            Vector3::new(1.0, 2.0, 3.0),
            Quaternion::from_axis_angle(Vector3::new(1.0, 1.0, 0.0), 0.7),
        );
        let round = a.compose(&a.inverse());
        assert!(round.position.approx_eq(&Vector3::ZERO, EPS));
        assert!(round.orientation.approx_eq(&Quaternion::IDENTITY, EPS));
    }

    #[test]
    fn test_compose_offsets_child_in_parent_basis() {
        let parent = Transform::new(
            Vector3::new(10.0, 0.0, 0.0),
            Quaternion::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), FRAC_PI_2),
        );
        let child = Transform::new(Vector3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY);
        let world = parent.compose(&child);
        assert!(world.position.approx_eq(&Vector3::new(10.0, 1.0, 0.0), EPS));
    }

    #[test]
    fn test_nlerp_takes_short_arc() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::new(0.0, 0.0, 0.0, -1.0);
        let mid = a.nlerp(&b, 0.5);
        assert!(mid.approx_eq(&Quaternion::IDENTITY, EPS));
    }

    #[test]
    fn test_time_ordering() {
        assert!(Time(1.0) < Time(2.0));
        assert_eq!(Time(3.5).since(Time(1.0)), 2.5);
    }
}
