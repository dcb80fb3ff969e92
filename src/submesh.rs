// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use slotmap::SecondaryMap;

use crate::holes::HoleInfo;
use crate::mesh::{FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};
use crate::mesh::{HalfEdgeTraversal, VertexTraversalHelpers};
use crate::partition::HoleWithNeighborhood;

/// An owned, self-contained mesh carrying a subset of a parent mesh's
/// faces, plus the holes to fill within it. Move-only by construction: it
/// holds no shared or interior-mutable handles, so ordinary ownership keeps
/// it from being observed by both a filling worker and the merger at once.
pub struct Submesh {
    pub mesh: HalfEdgeMesh,
    pub holes: Vec<HoleInfo>,
    pub new_to_old_vertex: SecondaryMap<VertexId, VertexId>,
    pub old_to_new_vertex: SecondaryMap<VertexId, VertexId>,
    /// Number of holes requested for this submesh, before any were dropped
    /// for an unrecoverable boundary remap. Kept only for diagnostics --
    /// see DESIGN.md for why `hole_results` in the stats are authoritative
    /// instead of this count.
    pub original_hole_count: usize,
}

pub struct SubmeshExtractor;

impl SubmeshExtractor {
    /// Copies `faces` out of `parent` into a new, independent mesh, then
    /// remaps each of `holes` onto it. A hole whose boundary cannot be
    /// recovered in the new mesh (fewer than three mapped boundary
    /// vertices, or no boundary half-edge at all) is dropped.
    pub fn extract(parent: &HalfEdgeMesh, faces: &HashSet<FaceId>, holes: &[HoleInfo]) -> Submesh {
        let mut mesh = HalfEdgeMesh::new();
        let mut old_to_new = SecondaryMap::<VertexId, VertexId>::new();
        let mut new_to_old = SecondaryMap::<VertexId, VertexId>::new();

        let mut polygons: Vec<Vec<u32>> = Vec::with_capacity(faces.len());
        let mut index_of = SecondaryMap::<VertexId, u32>::new();
        let mut flat_positions = Vec::new();

        for &face in faces {
            let verts = parent.conn.face_vertices(face);
            let mut row = Vec::with_capacity(verts.len());
            for old_v in verts {
                let idx = *index_of.entry(old_v).unwrap().or_insert_with(|| {
                    let i = flat_positions.len() as u32;
                    flat_positions.push(parent.position(old_v));
                    i
                });
                row.push(idx);
            }
            polygons.push(row);
        }

        if let Ok(built) = HalfEdgeMesh::build_from_polygons(&flat_positions, &polygons) {
            mesh = built;
            // `build_from_polygons` allocates new vertices in first-seen
            // order, same as `flat_positions`/`index_of` above, so the
            // index used there is this new mesh's vertex insertion order.
            let new_ids: Vec<VertexId> = mesh.conn.iter_vertices().map(|(v, _)| v).collect();
            for (old_v, &idx) in index_of.iter() {
                if let Some(&new_v) = new_ids.get(idx as usize) {
                    old_to_new.insert(old_v, new_v);
                    new_to_old.insert(new_v, old_v);
                }
            }
        }

        let mut remapped_holes = Vec::with_capacity(holes.len());
        for hole in holes {
            if let Some(remapped) = Self::remap_hole(&mesh, hole, &old_to_new) {
                remapped_holes.push(remapped);
            }
        }

        Submesh {
            mesh,
            original_hole_count: holes.len(),
            holes: remapped_holes,
            new_to_old_vertex: new_to_old,
            old_to_new_vertex: old_to_new,
        }
    }

    /// Unions the face neighborhoods of every hole in `partition_indices`
    /// and extracts the resulting submesh in one pass.
    pub fn extract_partition(
        parent: &HalfEdgeMesh,
        partition_indices: &[usize],
        all_holes: &[HoleInfo],
        neighborhoods: &[HoleWithNeighborhood],
    ) -> Submesh {
        let mut faces = HashSet::new();
        let mut holes = Vec::with_capacity(partition_indices.len());
        for &idx in partition_indices {
            faces.extend(neighborhoods[idx].n_ring_faces.iter().copied());
            holes.push(all_holes[idx].clone());
        }
        Self::extract(parent, &faces, &holes)
    }

    fn remap_hole(
        new_mesh: &HalfEdgeMesh,
        hole: &HoleInfo,
        old_to_new: &SecondaryMap<VertexId, VertexId>,
    ) -> Option<HoleInfo> {
        let mapped_boundary: Vec<VertexId> = hole
            .boundary_vertices
            .iter()
            .filter_map(|v| old_to_new.get(*v).copied())
            .collect();
        if mapped_boundary.len() < 3 {
            return None;
        }

        let boundary_halfedge = Self::find_mapped_halfedge(new_mesh, hole, old_to_new)?;

        let diameter = {
            let mut min = glam::DVec3::splat(f64::INFINITY);
            let mut max = glam::DVec3::splat(f64::NEG_INFINITY);
            for &v in &mapped_boundary {
                let p = new_mesh.position(v);
                min = min.min(p);
                max = max.max(p);
            }
            if min.is_finite() {
                (max - min).length()
            } else {
                0.0
            }
        };

        Some(HoleInfo {
            boundary_halfedge,
            boundary_size: mapped_boundary.len(),
            area_estimate: std::f64::consts::PI * (diameter / 2.0).powi(2),
            diameter,
            boundary_vertices: mapped_boundary.into(),
        })
    }

    /// Looks up the old boundary half-edge's endpoints in the new mesh,
    /// then scans the new source vertex's outgoing half-edges for one whose
    /// target is the new destination vertex. Returns `None` when either
    /// endpoint has no counterpart, or no such half-edge exists.
    fn find_mapped_halfedge(
        new_mesh: &HalfEdgeMesh,
        hole: &HoleInfo,
        old_to_new: &SecondaryMap<VertexId, VertexId>,
    ) -> Option<HalfEdgeId> {
        let old_halfedge = hole.boundary_halfedge;
        // We don't have direct access to the parent mesh here, so derive
        // src/dst from the hole's own boundary vertex list instead of
        // walking `old_halfedge` through a connectivity we don't own.
        let _ = old_halfedge;
        let old_src = *hole.boundary_vertices.first()?;
        let old_dst = *hole.boundary_vertices.get(1)?;

        let new_src = *old_to_new.get(old_src)?;
        let new_dst = *old_to_new.get(old_dst)?;

        use crate::mesh::AnyTraversal;
        let h = new_mesh
            .conn
            .at_vertex(new_src)
            .halfedge_to(new_dst)
            .try_end()
            .ok()?;
        if new_mesh.conn.is_boundary(h) {
            Some(h)
        } else {
            None
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
    fn extracting_the_whole_mesh_preserves_the_one_hole() {
        let mesh = cube_with_one_face_removed();
        let holes = crate::holes::HoleDetector::detect(&mesh);
        let all_faces: HashSet<FaceId> = mesh.conn.iter_faces().map(|(f, _)| f).collect();

        let submesh = SubmeshExtractor::extract(&mesh, &all_faces, &holes);
        assert_eq!(submesh.mesh.num_faces(), mesh.num_faces());
        assert_eq!(submesh.holes.len(), 1);
        assert_eq!(submesh.holes[0].boundary_size, 4);
    }
}
