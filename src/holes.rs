// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use glam::DVec3;

use crate::mesh::{HalfEdgeId, HalfEdgeMesh, VertexId};
use crate::util::SVec;

/// A maximal boundary cycle: its reference half-edge, its ordered boundary
/// vertices, and cheap size estimates used for eligibility filtering.
#[derive(Debug, Clone)]
pub struct HoleInfo {
    pub boundary_halfedge: HalfEdgeId,
    pub boundary_vertices: SVec<VertexId>,
    pub boundary_size: usize,
    pub diameter: f64,
    pub area_estimate: f64,
}

impl HoleInfo {
    fn from_loop(mesh: &HalfEdgeMesh, loop_halfedges: &[HalfEdgeId]) -> Self {
        let boundary_vertices: SVec<VertexId> = loop_halfedges
            .iter()
            .map(|&h| mesh.conn[h].vertex.expect("border halfedge has no vertex"))
            .collect();

        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for &v in &boundary_vertices {
            let p = mesh.position(v);
            min = min.min(p);
            max = max.max(p);
        }
        let diameter = if min.is_finite() { (max - min).length() } else { 0.0 };
        let area_estimate = std::f64::consts::PI * (diameter / 2.0).powi(2);

        HoleInfo {
            boundary_halfedge: loop_halfedges[0],
            boundary_size: boundary_vertices.len(),
            boundary_vertices,
            diameter,
            area_estimate,
        }
    }
}

/// Enumerates every boundary cycle in a mesh by tracing `next` pointers
/// starting from each not-yet-visited border half-edge.
pub struct HoleDetector;

impl HoleDetector {
    pub fn detect(mesh: &HalfEdgeMesh) -> Vec<HoleInfo> {
        let mut visited = HashSet::new();
        let mut holes = Vec::new();

        for h0 in mesh.border_halfedges() {
            if visited.contains(&h0) {
                continue;
            }
            let loop_halfedges = mesh.conn.halfedge_loop(h0);
            for &h in &loop_halfedges {
                visited.insert(h);
            }
            holes.push(HoleInfo::from_loop(mesh, &loop_halfedges));
        }

        holes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_with_one_face_removed() -> HalfEdgeMesh {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(0.0, 1.0, 1.0),
        ];
        // Closed cube minus the bottom face (0,1,2,3).
        let polys: Vec<[u32; 3]> = vec![
            // top (4,5,6,7)
            [4, 6, 5],
            [4, 7, 6],
            // sides
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        HalfEdgeMesh::build_from_polygons(&positions, &polys).unwrap()
    }

    #[test]
    fn detects_exactly_one_quad_hole() {
        let mesh = cube_with_one_face_removed();
        let holes = HoleDetector::detect(&mesh);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].boundary_size, 4);
    }

    #[test]
    fn closed_mesh_has_no_holes() {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let polys: Vec<[u32; 3]> = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &polys).unwrap();
        assert!(HoleDetector::detect(&mesh).is_empty());
    }
}
