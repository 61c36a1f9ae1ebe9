//! Axis-aligned boxes and triangles in world and grid space

use glam::{IVec3, UVec3, Vec3};

/// Point types an [`AaBox`] can be built from
pub trait BoxCorner: Copy + PartialEq + std::fmt::Debug {
    fn component_min(self, other: Self) -> Self;
    fn component_max(self, other: Self) -> Self;
    /// True when every component of `self` is `<=` the matching one in `other`
    fn all_le(self, other: Self) -> bool;
}

macro_rules! impl_box_corner {
    ($t:ty) => {
        impl BoxCorner for $t {
            #[inline]
            fn component_min(self, other: Self) -> Self {
                self.min(other)
            }

            #[inline]
            fn component_max(self, other: Self) -> Self {
                self.max(other)
            }

            #[inline]
            fn all_le(self, other: Self) -> bool {
                self.cmple(other).all()
            }
        }
    };
}

impl_box_corner!(Vec3);
impl_box_corner!(UVec3);
impl_box_corner!(IVec3);

/// Axis-aligned box with inclusive `min` and `max` corners
///
/// Used with float corners in world space and integer corners in grid space.
/// Overlap is a closed-interval test, so boxes that only touch still overlap.
///
/// # Example
///
/// ```
/// use svo::geometry::AaBox;
/// use glam::Vec3;
///
/// let a = AaBox::new(Vec3::ZERO, Vec3::ONE);
/// let b = AaBox::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
/// assert!(a.overlaps(&b)); // shared face
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AaBox<T> {
    pub min: T,
    pub max: T,
}

impl<T: BoxCorner> AaBox<T> {
    pub fn new(min: T, max: T) -> Self {
        debug_assert!(min.all_le(max), "box min {min:?} exceeds max {max:?}");
        Self { min, max }
    }

    /// Smallest box containing all three points
    pub fn from_points(a: T, b: T, c: T) -> Self {
        Self {
            min: a.component_min(b).component_min(c),
            max: a.component_max(b).component_max(c),
        }
    }

    /// Closed-interval overlap test
    pub fn overlaps(&self, other: &AaBox<T>) -> bool {
        self.min.all_le(other.max) && other.min.all_le(self.max)
    }

    pub fn contains(&self, p: T) -> bool {
        self.min.all_le(p) && p.all_le(self.max)
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &AaBox<T>) -> Self {
        Self {
            min: self.min.component_min(other.min),
            max: self.max.component_max(other.max),
        }
    }
}

impl AaBox<Vec3> {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grow the box around its center until every side has the longest length
    pub fn to_cube(&self) -> Self {
        let size = self.size();
        let longest = size.max_element();
        let pad = (Vec3::splat(longest) - size) * 0.5;
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }
}

/// Mesh triangle with a face normal and per-vertex colors
///
/// Geometry-only inputs carry no colors; they read back as white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub normal: Vec3,
    pub colors: [Vec3; 3],
}

impl Triangle {
    /// Triangle with a computed face normal and white vertices
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self {
            v0,
            v1,
            v2,
            normal: face_normal(v0, v1, v2),
            colors: [Vec3::ONE; 3],
        }
    }

    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_colors(mut self, colors: [Vec3; 3]) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_color(self, color: Vec3) -> Self {
        self.with_colors([color; 3])
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn bbox(&self) -> AaBox<Vec3> {
        AaBox::from_points(self.v0, self.v1, self.v2)
    }

    /// Same triangle moved by `offset`
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            v0: self.v0 + offset,
            v1: self.v1 + offset,
            v2: self.v2 + offset,
            ..*self
        }
    }
}

/// Unit normal of the plane through three points (zero for degenerate input)
pub fn face_normal(v0: Vec3, v1: Vec3, v2: Vec3) -> Vec3 {
    (v1 - v0).cross(v2 - v1).normalize_or_zero()
}
