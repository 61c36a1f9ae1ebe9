//! OBJ meshes to `.tri` triangle files

use anyhow::{bail, Context, Result};
use glam::Vec3;
use std::path::{Path, PathBuf};
use svo::{AaBox, TriFormat, TriInfo, TriWriter, Triangle};

/// Load every model in an OBJ file as triangles
///
/// Vertex colors are used when the file has them, otherwise triangles stay
/// white. Normals are the average of the vertex normals unless the file has
/// none or `recompute_normals` is set, in which case the face normal is used.
pub fn load_obj(path: &Path, recompute_normals: bool) -> Result<Vec<Triangle>> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj(path, &options)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut triangles = Vec::new();
    for model in &models {
        tracing::debug!(
            "model '{}': {} faces",
            model.name,
            model.mesh.indices.len() / 3
        );
        mesh_triangles(&model.mesh, recompute_normals, &mut triangles);
    }
    Ok(triangles)
}

fn mesh_triangles(mesh: &tobj::Mesh, recompute_normals: bool, out: &mut Vec<Triangle>) {
    let has_colors = !mesh.vertex_color.is_empty();
    let has_normals = !recompute_normals && !mesh.normals.is_empty();

    for face in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [face[0], face[1], face[2]];
        let mut t = Triangle::new(
            vec3_at(&mesh.positions, a),
            vec3_at(&mesh.positions, b),
            vec3_at(&mesh.positions, c),
        );
        if has_colors {
            t = t.with_colors([
                vec3_at(&mesh.vertex_color, a),
                vec3_at(&mesh.vertex_color, b),
                vec3_at(&mesh.vertex_color, c),
            ]);
        }
        if has_normals {
            let n = (vec3_at(&mesh.normals, a) + vec3_at(&mesh.normals, b) + vec3_at(&mesh.normals, c))
                .normalize_or_zero();
            // opposing vertex normals cancel out; keep the face normal then
            if n != Vec3::ZERO {
                t = t.with_normal(n);
            }
        }
        out.push(t);
    }
}

fn vec3_at(data: &[f32], index: u32) -> Vec3 {
    let i = index as usize * 3;
    Vec3::from_slice(&data[i..i + 3])
}

/// Move the mesh so its bounding cube starts at the origin
///
/// The mesh bbox is grown around its center into a cube first. Returns the
/// cube in the new coordinates, or an error for an empty or flat-to-a-point mesh.
pub fn fit_to_cube(triangles: &mut [Triangle]) -> Result<AaBox<Vec3>> {
    let Some(bbox) = triangles
        .iter()
        .map(Triangle::bbox)
        .reduce(|a, b| a.union(&b))
    else {
        bail!("mesh has no triangles");
    };
    let cube = bbox.to_cube();
    let side = cube.size().x;
    if side <= 0.0 {
        bail!("mesh has zero extent");
    }

    let offset = -cube.min;
    for t in triangles.iter_mut() {
        *t = t.translated(offset);
    }
    Ok(AaBox::new(Vec3::ZERO, Vec3::splat(side)))
}

/// Write triangles as `<base>.tri` plus `<base>.tridata`
pub fn write_tri(
    base: impl Into<PathBuf>,
    triangles: &[Triangle],
    format: TriFormat,
    bbox: AaBox<Vec3>,
) -> Result<TriInfo> {
    let base = base.into();
    let mut writer = TriWriter::create(&base, format)
        .with_context(|| format!("failed to create {}", base.display()))?;
    for t in triangles {
        writer.write(t)?;
    }
    Ok(writer.finish(bbox)?)
}
