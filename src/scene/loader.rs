//! Path-based triangle-soup loading.
//!
//! Meshes are STL files; the loader returns raw vertex triples in model
//! space. Transforms and materials are applied by the scene builder.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::util::{Error, Result, Vec3};

/// Load the triangle soup from an STL file.
///
/// Returns one `[v0, v1, v2]` triple per face. Any open or parse failure
/// maps to [`Error::MeshLoad`] so callers can skip the offending instance.
pub fn load_triangle_soup(path: &Path) -> Result<Vec<[Vec3; 3]>> {
    let file = File::open(path).map_err(|source| Error::MeshLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mesh = stl_io::read_stl(&mut reader).map_err(|source| Error::MeshLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let vertices: Vec<Vec3> = mesh
        .vertices
        .iter()
        .map(|v| Vec3::from(<[f32; 3]>::from(*v)))
        .collect();

    let mut soup = Vec::with_capacity(mesh.faces.len());
    for face in &mesh.faces {
        let [a, b, c] = face.vertices;
        soup.push([vertices[a], vertices[b], vertices[c]]);
    }

    tracing::debug!(path = %path.display(), triangles = soup.len(), "loaded mesh");
    Ok(soup)
}
