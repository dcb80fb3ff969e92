// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reassembles filled submeshes into the parent mesh. Each submesh restates
//! its neighborhood of the parent; soup-level dedup and non-manifold repair
//! resolve the overlap, rather than stitching boundaries geometrically.

use std::collections::HashSet;

use anyhow::Result;
use slotmap::Key;

use crate::mesh::HalfEdgeMesh;
use crate::soup::PolygonSoup;
use crate::soup_repair;
use crate::submesh::Submesh;

#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub holes_only: bool,
    pub keep_largest_component: bool,
    pub non_manifold_passes: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            holes_only: false,
            keep_largest_component: true,
            non_manifold_passes: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    pub duplicate_points_merged: usize,
    pub duplicate_polygons_removed: usize,
    pub non_manifold_polygons_removed: usize,
    pub isolated_vertices_removed: usize,
}

pub struct Merger;

impl Merger {
    pub fn merge(parent: &HalfEdgeMesh, submeshes: Vec<Submesh>, options: MergeOptions) -> Result<(HalfEdgeMesh, MergeStats)> {
        let mut soup = if options.holes_only {
            PolygonSoup::new()
        } else {
            PolygonSoup::from(parent)
        };

        let parent_face_keys: HashSet<Vec<crate::mesh::VertexId>> = if options.holes_only {
            parent
                .conn
                .iter_faces()
                .map(|(f, _)| {
                    let mut verts = parent.conn.face_vertices(f).to_vec();
                    verts.sort_unstable_by_key(|v| v.data().as_ffi());
                    verts
                })
                .collect()
        } else {
            HashSet::new()
        };

        for submesh in &submeshes {
            let offset = soup.points.len() as u32;
            let sub_soup = PolygonSoup::from(&submesh.mesh);

            soup.points.extend(sub_soup.points.iter().copied());

            for (face_idx, poly) in sub_soup.polygons.iter().enumerate() {
                if options.holes_only && Self::is_redundant_parent_face(submesh, face_idx, &parent_face_keys) {
                    continue;
                }
                soup.polygons.push(poly.iter().map(|&i| i + offset).collect());
            }
        }

        let mut stats = MergeStats::default();
        stats.duplicate_points_merged = soup_repair::dedup_points(&mut soup);
        stats.duplicate_polygons_removed = soup_repair::dedup_polygons(&mut soup);
        let (removed, _hit_max) = soup_repair::remove_non_manifold(&mut soup, options.non_manifold_passes);
        stats.non_manifold_polygons_removed = removed;
        soup_repair::orient_consistently(&mut soup);

        let mut mesh = soup.into_mesh()?;

        stats.isolated_vertices_removed = soup_repair::remove_isolated_vertices(&mut mesh)?;
        if !options.holes_only && options.keep_largest_component {
            mesh = soup_repair::keep_largest_component(&mesh)?;
        }

        Ok((mesh, stats))
    }

    /// A submesh face is a redundant re-statement of a parent face when
    /// every one of its vertices maps back to a parent vertex (i.e. none of
    /// them are new, fill-introduced vertices) and its sorted vertex-identity
    /// triple is already one of the parent's faces.
    fn is_redundant_parent_face(submesh: &Submesh, face_idx: usize, parent_face_keys: &HashSet<Vec<crate::mesh::VertexId>>) -> bool {
        let Some((face, _)) = submesh.mesh.conn.iter_faces().nth(face_idx) else {
            return false;
        };
        let verts = submesh.mesh.conn.face_vertices(face);
        let mut mapped = Vec::with_capacity(verts.len());
        for v in verts {
            match submesh.new_to_old_vertex.get(v) {
                Some(&old) => mapped.push(old),
                None => return false,
            }
        }
        mapped.sort_unstable_by_key(|v| v.data().as_ffi());
        parent_face_keys.contains(&mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::{FanTriangulationFiller, FillOperator, FillParams};
    use crate::holes::HoleDetector;
    use crate::submesh::SubmeshExtractor;
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
    fn merging_the_filled_whole_mesh_yields_a_closed_cube() {
        let parent = cube_with_one_face_removed();
        let holes = HoleDetector::detect(&parent);
        let all_faces: HashSet<_> = parent.conn.iter_faces().map(|(f, _)| f).collect();
        let mut submesh = SubmeshExtractor::extract(&parent, &all_faces, &holes);

        for hole in submesh.holes.clone() {
            FanTriangulationFiller.fill(&mut submesh.mesh, &hole, FillParams::default());
        }

        let (merged, stats) = Merger::merge(&parent, vec![submesh], MergeOptions::default()).unwrap();
        assert_eq!(merged.num_vertices(), 8);
        assert_eq!(merged.num_faces(), 12);
        assert!(HoleDetector::detect(&merged).is_empty());
        assert_eq!(stats.duplicate_points_merged, 0);
    }
}
