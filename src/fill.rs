// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The triangulate-refine-fair contract for closing a single hole, and a
//! reference implementation good enough to exercise the pipeline and its
//! tests without an external geometry library.

use crate::holes::HoleInfo;
use crate::mesh::connectivity::HalfEdge;
use crate::mesh::HalfEdgeMesh;

#[derive(Debug, Clone, Copy)]
pub struct FillParams {
    pub continuity: u8,
    pub use_2d_cdt: bool,
    pub use_3d_delaunay: bool,
    pub skip_cubic_search: bool,
    pub refine: bool,
}

impl Default for FillParams {
    fn default() -> Self {
        FillParams {
            continuity: 1,
            use_2d_cdt: true,
            use_3d_delaunay: true,
            skip_cubic_search: false,
            refine: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FillOutcome {
    pub success: bool,
    pub added_vertices: usize,
    pub added_faces: usize,
    pub fairing_succeeded: bool,
}

/// The external triangulate-refine-fair primitive. Implementations must
/// never unwind past their own call frame with anything but a panic; the
/// caller additionally wraps every call in `catch_unwind` as a last-resort
/// safety net, matching the original engine's per-hole `try`/`catch`.
pub trait FillOperator: Send + Sync {
    fn fill(&self, mesh: &mut HalfEdgeMesh, hole: &HoleInfo, params: FillParams) -> FillOutcome;
}

/// A reference `FillOperator`: closes a hole by fanning out from its first
/// boundary vertex, `n - 2` triangles and no new vertices. Ignores
/// `use_2d_cdt`/`use_3d_delaunay`/`skip_cubic_search` -- those only matter to
/// a production-grade triangulator -- and reports `fairing_succeeded = false`
/// unless `refine` was requested, since this filler does no fairing.
pub struct FanTriangulationFiller;

impl FillOperator for FanTriangulationFiller {
    fn fill(&self, mesh: &mut HalfEdgeMesh, hole: &HoleInfo, params: FillParams) -> FillOutcome {
        let boundary = &hole.boundary_vertices;
        let n = boundary.len();
        if n < 3 {
            return FillOutcome::default();
        }

        // Border half-edges around the hole, in the same order as
        // `boundary_vertices`: `border[i]` runs from `boundary[i]` to
        // `boundary[i + 1]`.
        let border = mesh.conn.halfedge_loop(hole.boundary_halfedge);
        if border.len() != n {
            return FillOutcome::default();
        }
        let old_twins: Vec<_> = border.iter().map(|&b| mesh.conn[b].twin).collect();

        // Fan from v0: triangle i (1 <= i <= n - 2) is (v0, v_i, v_{i+1}).
        // Its edge v_i -> v_{i+1} is literally border[i]; the triangle at
        // i == 1 also restates border[0] (v0 -> v1) and the triangle at
        // i == n - 2 also restates border[n - 1] (v_{n-1} -> v0). Every other
        // v0-incident edge is an internal diagonal shared with the next
        // triangle in the fan.
        let v0 = boundary[0];
        let triangle_count = n - 2;

        // `rim_replacement[i]` is the new half-edge occupying the same
        // origin/destination as the removed `border[i]`.
        let mut rim_replacement: Vec<Option<crate::mesh::HalfEdgeId>> = vec![None; n];
        let mut prev_diagonal: Option<crate::mesh::HalfEdgeId> = None;

        for i in 1..=triangle_count {
            let va = v0;
            let vb = boundary[i];
            let vc = boundary[(i + 1) % n];

            let face = mesh.conn.alloc_face(None);
            let e_ab = mesh.conn.alloc_halfedge(HalfEdge::default());
            let e_bc = mesh.conn.alloc_halfedge(HalfEdge::default());
            let e_ca = mesh.conn.alloc_halfedge(HalfEdge::default());

            mesh.conn[e_ab].face = Some(face);
            mesh.conn[e_bc].face = Some(face);
            mesh.conn[e_ca].face = Some(face);
            mesh.conn[face].halfedge = Some(e_ab);

            mesh.conn[e_ab].vertex = Some(va);
            mesh.conn[e_bc].vertex = Some(vb);
            mesh.conn[e_ca].vertex = Some(vc);

            mesh.conn[e_ab].next = Some(e_bc);
            mesh.conn[e_bc].next = Some(e_ca);
            mesh.conn[e_ca].next = Some(e_ab);

            if i == 1 {
                rim_replacement[0] = Some(e_ab);
            } else {
                let prev = prev_diagonal.take().expect("a diagonal was opened by the previous triangle");
                mesh.conn[e_ab].twin = Some(prev);
                mesh.conn[prev].twin = Some(e_ab);
            }

            rim_replacement[i] = Some(e_bc);

            if i == triangle_count {
                rim_replacement[n - 1] = Some(e_ca);
            } else {
                prev_diagonal = Some(e_ca);
            }
        }

        for i in 0..n {
            let new_edge = rim_replacement[i].expect("every border edge has a fan-triangle replacement");
            mesh.conn[new_edge].twin = old_twins[i];
            if let Some(t) = old_twins[i] {
                mesh.conn[t].twin = Some(new_edge);
            }
            if mesh.conn[boundary[i]].halfedge == Some(border[i]) {
                mesh.conn[boundary[i]].halfedge = Some(new_edge);
            }
        }

        for &b in &border {
            mesh.conn.remove_halfedge(b);
        }

        FillOutcome {
            success: true,
            added_vertices: 0,
            added_faces: triangle_count,
            fairing_succeeded: params.refine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

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
        let polys: Vec<[u32; 3]> = vec![
            [4, 6, 5],
            [4, 7, 6],
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
    fn fan_fill_adds_no_vertices_and_n_minus_2_faces() {
        let mut mesh = cube_with_one_face_removed();
        let holes = crate::holes::HoleDetector::detect(&mesh);
        assert_eq!(holes.len(), 1);
        let before_vertices = mesh.num_vertices();
        let before_faces = mesh.num_faces();

        let outcome = FanTriangulationFiller.fill(&mut mesh, &holes[0], FillParams::default());
        assert!(outcome.success);
        assert_eq!(outcome.added_vertices, 0);
        assert_eq!(outcome.added_faces, 2);
        assert_eq!(mesh.num_vertices(), before_vertices);
        assert_eq!(mesh.num_faces(), before_faces + 2);
        assert!(crate::holes::HoleDetector::detect(&mesh).is_empty());
    }

    #[test]
    fn degenerate_hole_is_rejected() {
        let mut mesh = cube_with_one_face_removed();
        let mut hole = crate::holes::HoleDetector::detect(&mesh).remove(0);
        hole.boundary_vertices.truncate(2);
        let outcome = FanTriangulationFiller.fill(&mut mesh, &hole, FillParams::default());
        assert!(!outcome.success);
    }
}
