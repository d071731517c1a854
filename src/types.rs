//! Common geometry types shared by the layout and scene modules.
//!
//! Everything here is unit-agnostic: the same `Vec3` carries centimeter
//! dimensions, pixel dimensions and scene-space positions.

use std::ops::{Add, Mul, Sub};

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for dimension comparisons and grid-tiling checks.
#[allow(dead_code)]
pub const EPSILON_GENERAL: f64 = 1e-6;

/// A 3D vector or point.
///
/// Axis convention follows the renderer: `x` is screen width (length),
/// `y` is screen height (height), `z` is screen depth (width).
///
/// # Examples
/// ```
/// use cartonizer::types::Vec3;
///
/// let center = Vec3::zero();
/// let dims = Vec3::new(40.0, 20.0, 30.0);
/// let corner = center - dims * 0.5;
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Creates a vector with the same value on all three axes.
    #[inline]
    #[allow(dead_code)]
    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Calculates the volume (product of all components).
    ///
    /// Meaningful for dimension vectors.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// The largest of the three components.
    ///
    /// Drives canvas normalization: the longest master edge maps onto the
    /// configured canvas size.
    #[inline]
    pub fn max_component(&self) -> f64 {
        self.x.max(self.y).max(self.z)
    }

    /// Checks if all components are positive and finite.
    #[inline]
    #[allow(dead_code)]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

    /// Component-wise division, used to slice a parent box by a layout.
    #[inline]
    pub fn div_components(&self, other: &Self) -> Self {
        Self::new(self.x / other.x, self.y / other.y, self.z / other.z)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

impl<T: Dimensional + ?Sized> Dimensional for &T {
    fn dimensions(&self) -> Vec3 {
        (**self).dimensions()
    }
}

/// Trait for objects with a center point in scene space.
pub trait Positioned {
    /// Returns the center point.
    fn center(&self) -> Vec3;
}

impl<T: Positioned + ?Sized> Positioned for &T {
    fn center(&self) -> Vec3 {
        (**self).center()
    }
}

/// Axis-Aligned Bounding Box (AABB).
///
/// Used for scene extents and for verifying that grid cells tile their
/// parent exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[inline]
    #[allow(dead_code)]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from a center point and dimensions.
    #[inline]
    pub fn from_center_and_dims(center: Vec3, dims: Vec3) -> Self {
        let half = dims * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// The smallest box enclosing both `self` and `other`.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// The enclosing box of every centered item, or `None` for an empty set.
    pub fn around<T, I>(items: I) -> Option<Self>
    where
        T: Positioned + Dimensional,
        I: IntoIterator<Item = T>,
    {
        items
            .into_iter()
            .map(|item| Self::from_center_and_dims(item.center(), item.dimensions()))
            .reduce(|acc, bb| acc.union(&bb))
    }

    /// Returns the center point.
    #[inline]
    #[allow(dead_code)]
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }

    /// Returns the dimensions (width, height, depth).
    #[inline]
    #[allow(dead_code)]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    /// Checks equality against another box within `tolerance`.
    #[allow(dead_code)]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        let d_min = self.min - other.min;
        let d_max = self.max - other.max;
        d_min.x.abs() <= tolerance
            && d_min.y.abs() <= tolerance
            && d_min.z.abs() <= tolerance
            && d_max.x.abs() <= tolerance
            && d_max.y.abs() <= tolerance
            && d_max.z.abs() <= tolerance
    }
}
