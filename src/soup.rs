// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A polygon soup: points plus polygons with no connectivity invariants.
//! Soups are the robust representation used while cleaning up raw input,
//! before it is promoted to a manifold [`crate::mesh::HalfEdgeMesh`].

use anyhow::Result;
use glam::DVec3;

use crate::mesh::HalfEdgeMesh;

#[derive(Clone, Debug, Default)]
pub struct PolygonSoup {
    pub points: Vec<DVec3>,
    /// Each polygon is an ordered list of indices into `points`.
    pub polygons: Vec<Vec<u32>>,
}

impl PolygonSoup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounding_box(&self) -> (DVec3, DVec3) {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for &p in &self.points {
            min = min.min(p);
            max = max.max(p);
        }
        if !min.is_finite() {
            return (DVec3::ZERO, DVec3::ZERO);
        }
        (min, max)
    }

    pub fn bounding_box_diagonal(&self) -> f64 {
        let (min, max) = self.bounding_box();
        (max - min).length()
    }

    /// Converts this soup into a half-edge mesh. Fails if the soup cannot
    /// form a manifold surface (degenerate/duplicate-vertex polygons,
    /// inconsistent orientation, or a non-manifold vertex/edge).
    pub fn into_mesh(self) -> Result<HalfEdgeMesh> {
        HalfEdgeMesh::build_from_polygons(&self.points, &self.polygons)
    }
}

impl From<&HalfEdgeMesh> for PolygonSoup {
    fn from(mesh: &HalfEdgeMesh) -> Self {
        let mut points = Vec::with_capacity(mesh.num_vertices());
        let mut old_to_new = slotmap::SecondaryMap::new();
        for (v, _) in mesh.conn.iter_vertices() {
            old_to_new.insert(v, points.len() as u32);
            points.push(mesh.position(v));
        }
        let mut polygons = Vec::with_capacity(mesh.num_faces());
        for (f, _) in mesh.conn.iter_faces() {
            let verts = mesh.conn.face_vertices(f);
            polygons.push(verts.iter().map(|v| old_to_new[*v]).collect());
        }
        PolygonSoup { points, polygons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_to_soup_and_back_preserves_counts() {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let polys: Vec<[u32; 3]> = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &polys).unwrap();
        let soup = PolygonSoup::from(&mesh);
        assert_eq!(soup.points.len(), 4);
        assert_eq!(soup.polygons.len(), 4);
        let rebuilt = soup.into_mesh().unwrap();
        assert_eq!(rebuilt.num_vertices(), 4);
        assert_eq!(rebuilt.num_faces(), 4);
    }
}
