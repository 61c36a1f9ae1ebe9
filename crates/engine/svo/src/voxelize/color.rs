//! Voxel color sampling and recoloring

use crate::error::SvoError;
use crate::geometry::Triangle;
use crate::morton;
use crate::voxel::VoxelData;
use glam::Vec3;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How a filled cell picks its color from the triangle that claimed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Mean of the three vertex colors
    Flat,
    /// Vertex colors weighted at the closest point on the triangle
    #[default]
    Barycentric,
}

impl Interpolation {
    /// Color of the triangle at (or nearest to) point `p`
    ///
    /// A triangle with three equal vertex colors yields exactly that color.
    pub fn color_at(self, t: &Triangle, p: Vec3) -> Vec3 {
        let [c0, c1, c2] = t.colors;
        if c0 == c1 && c1 == c2 {
            return c0;
        }
        match self {
            Interpolation::Flat => (c0 + c1 + c2) / 3.0,
            Interpolation::Barycentric => {
                let (_, w) = closest_point_on_triangle(p, t.v0, t.v1, t.v2);
                c0 * w.x + c1 * w.y + c2 * w.z
            }
        }
    }
}

impl FromStr for Interpolation {
    type Err = SvoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" | "average" => Ok(Interpolation::Flat),
            "barycentric" => Ok(Interpolation::Barycentric),
            other => Err(SvoError::Config(format!(
                "unknown interpolation '{other}' (expected flat or barycentric)"
            ))),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Flat => write!(f, "flat"),
            Interpolation::Barycentric => write!(f, "barycentric"),
        }
    }
}

/// Closest point to `p` on triangle `(a, b, c)` and its barycentric weights
///
/// Walks the Voronoi regions of the vertices and edges before falling back to
/// the face. Degenerate triangles get equal weights.
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (Vec3, Vec3) {
    let ab = b - a;
    let ac = c - a;
    let at = |w: Vec3| (a * w.x + b * w.y + c * w.z, w);

    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return at(Vec3::X);
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return at(Vec3::Y);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return at(Vec3::new(1.0 - v, v, 0.0));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return at(Vec3::Z);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return at(Vec3::new(1.0 - w, 0.0, w));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && d4 - d3 >= 0.0 && d5 - d6 >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return at(Vec3::new(0.0, 1.0 - w, w));
    }

    let sum = va + vb + vc;
    if sum <= 0.0 {
        return at(Vec3::splat(1.0 / 3.0));
    }
    let v = vb / sum;
    let w = vc / sum;
    at(Vec3::new(1.0 - v - w, v, w))
}

/// Final coloring applied to every voxel before it reaches the octree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Keep the color sampled from the mesh
    #[default]
    FromModel,
    /// Everything white
    Fixed,
    /// Ramp over the grid by position
    Linear,
    /// Visualize the normal
    Normal,
}

impl ColorMode {
    pub fn apply(self, mut voxel: VoxelData, gridlength: u32) -> VoxelData {
        voxel.color = match self {
            ColorMode::FromModel => voxel.color,
            ColorMode::Fixed => Vec3::ONE,
            ColorMode::Linear => Vec3::from(morton::to_rgb(voxel.morton, gridlength)),
            ColorMode::Normal => (voxel.normal.normalize_or_zero() + Vec3::ONE) * 0.5,
        };
        voxel
    }
}

impl FromStr for ColorMode {
    type Err = SvoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" | "from_model" => Ok(ColorMode::FromModel),
            "fixed" => Ok(ColorMode::Fixed),
            "linear" | "linear-by-morton" => Ok(ColorMode::Linear),
            "normal" | "from-normal" => Ok(ColorMode::Normal),
            other => Err(SvoError::Config(format!(
                "unknown color mode '{other}' (expected model, fixed, linear or normal)"
            ))),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorMode::FromModel => "from_model",
            ColorMode::Fixed => "fixed",
            ColorMode::Linear => "linear",
            ColorMode::Normal => "normal",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_triangle() -> Triangle {
        Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y).with_colors([Vec3::X, Vec3::Y, Vec3::Z])
    }

    #[test]
    fn test_identical_colors_are_exact() {
        let color = Vec3::new(0.3, 0.7, 0.1);
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y).with_color(color);
        for p in [Vec3::ZERO, Vec3::splat(0.33), Vec3::new(5.0, -2.0, 1.0)] {
            assert_eq!(Interpolation::Flat.color_at(&t, p), color);
            assert_eq!(Interpolation::Barycentric.color_at(&t, p), color);
        }
    }

    #[test]
    fn test_flat_is_mean() {
        let c = Interpolation::Flat.color_at(&rgb_triangle(), Vec3::ZERO);
        assert!((c - Vec3::splat(1.0 / 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_barycentric_at_vertices_and_inside() {
        let t = rgb_triangle();
        let interp = Interpolation::Barycentric;
        assert!((interp.color_at(&t, Vec3::ZERO) - Vec3::X).length() < 1e-6);
        assert!((interp.color_at(&t, Vec3::X) - Vec3::Y).length() < 1e-6);
        assert!((interp.color_at(&t, Vec3::Y) - Vec3::Z).length() < 1e-6);

        // off-plane points project onto the face
        let c = interp.color_at(&t, Vec3::new(0.25, 0.25, 3.0));
        assert!((c - Vec3::new(0.5, 0.25, 0.25)).length() < 1e-5);
    }

    #[test]
    fn test_closest_point_regions() {
        let (v0, v1, v2) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        let (p, w) = closest_point_on_triangle(Vec3::new(2.0, 2.0, 0.0), v0, v1, v2);
        assert!((p - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-6);
        assert!((w - Vec3::new(0.0, 0.5, 0.5)).length() < 1e-6);

        let (p, _) = closest_point_on_triangle(Vec3::new(-1.0, -1.0, 0.0), v0, v1, v2);
        assert!(p.length() < 1e-6);

        let (p, _) = closest_point_on_triangle(Vec3::new(0.5, -1.0, 0.0), v0, v1, v2);
        assert!((p - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_color_modes() {
        let voxel = VoxelData::new(crate::morton::encode(1, 2, 3), Vec3::NEG_Y, Vec3::new(0.2, 0.4, 0.6));
        assert_eq!(ColorMode::FromModel.apply(voxel, 4).color, voxel.color);
        assert_eq!(ColorMode::Fixed.apply(voxel, 4).color, Vec3::ONE);
        assert_eq!(ColorMode::Linear.apply(voxel, 4).color, Vec3::new(0.25, 0.5, 0.75));
        assert_eq!(ColorMode::Normal.apply(voxel, 4).color, Vec3::new(0.5, 0.0, 0.5));
        assert_eq!(ColorMode::Normal.apply(voxel, 4).normal, Vec3::NEG_Y);
    }

    #[test]
    fn test_normal_color_ignores_normal_length() {
        let long = VoxelData::new(0, Vec3::new(0.0, 0.0, 4.0), Vec3::ONE);
        assert_eq!(ColorMode::Normal.apply(long, 4).color, Vec3::new(0.5, 0.5, 1.0));
        // the stored normal is left as it came in
        assert_eq!(ColorMode::Normal.apply(long, 4).normal, Vec3::new(0.0, 0.0, 4.0));

        let none = VoxelData::new(0, Vec3::ZERO, Vec3::ONE);
        assert_eq!(ColorMode::Normal.apply(none, 4).color, Vec3::splat(0.5));
    }

    #[test]
    fn test_color_mode_spellings() {
        assert_eq!("model".parse::<ColorMode>().unwrap(), ColorMode::FromModel);
        assert_eq!("from_model".parse::<ColorMode>().unwrap(), ColorMode::FromModel);
        assert_eq!("fixed".parse::<ColorMode>().unwrap(), ColorMode::Fixed);
        assert_eq!("linear-by-morton".parse::<ColorMode>().unwrap(), ColorMode::Linear);
        assert_eq!("from-normal".parse::<ColorMode>().unwrap(), ColorMode::Normal);
        assert!(matches!("rainbow".parse::<ColorMode>(), Err(SvoError::Config(_))));
        for mode in [ColorMode::FromModel, ColorMode::Fixed, ColorMode::Linear, ColorMode::Normal] {
            assert_eq!(mode.to_string().parse::<ColorMode>().unwrap(), mode);
        }
    }
}
