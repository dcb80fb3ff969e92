// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod connectivity;
pub mod id_types;
pub mod mesh;
pub mod point_ord;
pub mod traversals;

pub use connectivity::{Face, HalfEdge, MeshConnectivity, Vertex};
pub use id_types::{FaceId, HalfEdgeId, VertexId};
pub use mesh::HalfEdgeMesh;
pub use point_ord::{PointKey, ToPointKey};
pub use traversals::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn unit_triangle() -> HalfEdgeMesh {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let polys: Vec<[u32; 3]> = vec![[0, 1, 2]];
        HalfEdgeMesh::build_from_polygons(&positions, &polys).unwrap()
    }

    #[test]
    fn single_triangle_has_three_border_halfedges() {
        let mesh = unit_triangle();
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.border_halfedges().count(), 3);
    }

    #[test]
    fn closed_tetrahedron_has_no_border() {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let polys: Vec<[u32; 3]> = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &polys).unwrap();
        assert_eq!(mesh.border_halfedges().count(), 0);
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        let positions = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        let polys: Vec<[u32; 2]> = vec![[0, 1]];
        assert!(HalfEdgeMesh::build_from_polygons(&positions, &polys).is_err());
    }
}
