//! Triangle mesh interface for scene loaders.
//!
//! Loaders (OBJ and friends live outside this workspace) fill a `Mesh`;
//! the renderer turns it into triangle surfaces. Winding is counter-clockwise
//! when viewed from the side the face normal points to.

use ivar_math::{Aabb, Vec3};

use crate::error::{SceneError, SceneResult};

/// Indexed triangle soup with optional per-vertex attributes.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    /// One per vertex when present
    pub normals: Option<Vec<Vec3>>,
    /// One `[u, v]` per vertex when present
    pub uvs: Option<Vec<[f64; 2]>>,
    /// Three per triangle
    pub indices: Vec<u32>,
    /// `None` when there are no vertices
    pub bounds: Option<Aabb>,
}

impl Mesh {
    /// Normals are used as given; `None` leaves triangles flat shaded.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        Self::new_with_uvs(positions, indices, normals, None)
    }

    pub fn new_with_uvs(
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        normals: Option<Vec<Vec3>>,
        uvs: Option<Vec<[f64; 2]>>,
    ) -> Self {
        let bounds = Aabb::from_point_cloud(positions.iter().copied());
        Self {
            positions,
            normals,
            uvs,
            indices,
            bounds,
        }
    }

    /// Check index ranges and per-vertex attribute lengths.
    pub fn validate(&self) -> SceneResult<()> {
        let invalid = |msg: String| Err(SceneError::InvalidMesh(msg));
        let count = self.positions.len();

        if self.indices.len() % 3 != 0 {
            return invalid(format!("index count {} is not a multiple of 3", self.indices.len()));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return invalid(format!("index {} out of range for {} vertices", bad, count));
        }
        match (&self.normals, &self.uvs) {
            (Some(n), _) if n.len() != count => invalid(format!("{} normals for {} vertices", n.len(), count)),
            (_, Some(uv)) if uv.len() != count => invalid(format!("{} uvs for {} vertices", uv.len(), count)),
            _ => Ok(()),
        }
    }

    /// Replace the normals with area-weighted averages of the face normals.
    ///
    /// A vertex touching only degenerate faces gets +Y.
    pub fn compute_normals(&mut self) {
        let mut sums = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.faces() {
            if a.max(b).max(c) >= sums.len() {
                continue;
            }
            let p = &self.positions;
            let n = (p[b] - p[a]).cross(p[c] - p[a]);
            sums[a] += n;
            sums[b] += n;
            sums[c] += n;
        }
        self.normals = Some(sums.into_iter().map(|n| n.try_normalize().unwrap_or(Vec3::Y)).collect());
    }

    /// Compute normals unless a complete set is already present.
    pub fn ensure_normals(&mut self) {
        let complete = matches!(&self.normals, Some(n) if n.len() == self.positions.len());
        if !complete {
            if self.normals.is_some() {
                log::debug!("Mesh normals don't match its {} vertices, recomputing", self.positions.len());
            }
            self.compute_normals();
        }
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Index triplets, one per triangle.
    pub fn faces(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
    }
}
