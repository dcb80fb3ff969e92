// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};
use glam::DVec3;
use itertools::Itertools;
use slotmap::SecondaryMap;
use std::collections::HashMap;

use super::connectivity::{HalfEdge, MeshConnectivity};
use super::id_types::{FaceId, HalfEdgeId, VertexId};
use super::traversals::{AnyTraversal, HalfEdgeTraversal, HalfedgeTraversalHelpers};
use crate::util::SVec;

/// A manifold (or, mid-repair, soon-to-be-manifold) triangle mesh: a
/// half-edge connectivity graph plus a position for every vertex.
#[derive(Clone, Default)]
pub struct HalfEdgeMesh {
    pub conn: MeshConnectivity,
    pub positions: SecondaryMap<VertexId, DVec3>,
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vertices(&self) -> usize {
        self.conn.num_vertices()
    }
    pub fn num_faces(&self) -> usize {
        self.conn.num_faces()
    }
    pub fn num_halfedges(&self) -> usize {
        self.conn.num_halfedges()
    }

    pub fn position(&self, v: VertexId) -> DVec3 {
        self.positions[v]
    }

    pub fn bounding_box(&self) -> (DVec3, DVec3) {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for (_, &p) in self.positions.iter() {
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

    pub(crate) fn alloc_vertex(&mut self, position: DVec3, halfedge: Option<HalfEdgeId>) -> VertexId {
        let v = self.conn.alloc_vertex_raw(halfedge);
        self.positions.insert(v, position);
        v
    }

    /// Builds a mesh from a flat vertex array and polygons of indices into
    /// it. Validates that polygons have at least 3 distinct vertices and
    /// performs a final manifoldness check (every vertex's incident faces
    /// must form a single fan, matching its polygon degree).
    #[profiling::function]
    pub fn build_from_polygons<Index, Polygon>(positions: &[DVec3], polygons: &[Polygon]) -> Result<Self>
    where
        Index: num_traits::AsPrimitive<usize> + 'static + Eq + std::hash::Hash + Copy,
        Polygon: AsRef<[Index]>,
    {
        let mut mesh = Self::new();

        let mut index_to_vertex = HashMap::<Index, VertexId>::new();
        let mut vertex_degree = HashMap::<VertexId, u32>::new();

        for polygon in polygons.iter().map(|p| p.as_ref()) {
            if polygon.len() < 3 {
                bail!("Cannot build meshes where polygons have less than three vertices.")
            }
            if polygon.iter().duplicates().next().is_some() {
                bail!("Cannot build meshes where a polygon has duplicate vertices")
            }
            for index in polygon {
                let position = positions
                    .get(index.as_())
                    .ok_or_else(|| anyhow::anyhow!("Out-of-bounds index in the polygon array {}", index.as_()))?;
                let v_id = index_to_vertex
                    .entry(*index)
                    .or_insert_with(|| mesh.alloc_vertex(*position, None));
                *vertex_degree.entry(*v_id).or_insert(0) += 1;
            }
        }

        let mut pair_to_halfedge = HashMap::<(Index, Index), HalfEdgeId>::new();

        for polygon in polygons.iter().map(|p| p.as_ref()) {
            let mut half_edges_in_face = SVec::new();
            let face = mesh.conn.alloc_face(None);

            for (&a, &b) in polygon.iter().circular_tuple_windows() {
                if pair_to_halfedge.contains_key(&(a, b)) {
                    bail!(
                        "Found multiple oriented edges with the same indices. \
                         This means either (i) the surface is non-manifold or (ii) faces \
                         are not oriented consistently"
                    )
                }

                let h = mesh.conn.alloc_halfedge(HalfEdge::default());
                mesh.conn[h].face = Some(face);
                mesh.conn[face].halfedge = Some(h);

                let v_a = index_to_vertex[&a];
                mesh.conn[h].vertex = Some(v_a);
                mesh.conn[v_a].halfedge = Some(h);

                half_edges_in_face.push(h);
                pair_to_halfedge.insert((a, b), h);

                if let Some(&other) = pair_to_halfedge.get(&(b, a)) {
                    mesh.conn[h].twin = Some(other);
                    mesh.conn[other].twin = Some(h);
                }
            }

            for (&h1, &h2) in half_edges_in_face.iter().circular_tuple_windows() {
                mesh.conn[h1].next = Some(h2);
            }
        }

        mesh.conn.add_boundary_halfedges();

        for (v, vertex) in mesh.conn.iter_vertices() {
            if vertex.halfedge.is_none() {
                bail!("There is at least one vertex disconnected from any polygon");
            }
            let h0 = mesh.conn.at_vertex(v).halfedge().end();
            let mut h = h0;
            let mut count = 0;
            loop {
                if !mesh.conn.at_halfedge(h).is_boundary().unwrap() {
                    count += 1;
                }
                h = mesh.conn.at_halfedge(h).twin().next().end();
                if h == h0 {
                    break;
                }
            }
            if count != vertex_degree.get(&v).copied().unwrap_or(0) {
                bail!("At least one vertex is not a polygon fan, but some other non-manifold structure instead.")
            }
        }

        Ok(mesh)
    }

    /// Appends `other`'s connectivity and positions into `self`. No
    /// additional connectivity is generated between the two meshes; callers
    /// that need the union to be manifold must run soup repair afterwards.
    #[profiling::function]
    pub fn merge_with(&mut self, other: &HalfEdgeMesh) {
        let mut vmap = SecondaryMap::<VertexId, VertexId>::new();
        let mut hmap = SecondaryMap::<HalfEdgeId, HalfEdgeId>::new();
        let mut fmap = SecondaryMap::<FaceId, FaceId>::new();

        for (vertex_id, _) in other.conn.iter_vertices() {
            vmap.insert(vertex_id, self.conn.alloc_vertex_raw(None));
        }
        for (face_id, _) in other.conn.iter_faces() {
            fmap.insert(face_id, self.conn.alloc_face(None));
        }
        for (halfedge_id, _) in other.conn.iter_halfedges() {
            hmap.insert(halfedge_id, self.conn.alloc_halfedge(HalfEdge::default()));
        }

        for (vertex_id, vertex) in other.conn.iter_vertices() {
            if let Some(h) = vertex.halfedge {
                self.conn[vmap[vertex_id]].halfedge = Some(hmap[h]);
            }
            self.positions.insert(vmap[vertex_id], other.positions[vertex_id]);
        }
        for (face_id, face) in other.conn.iter_faces() {
            if let Some(h) = face.halfedge {
                self.conn[fmap[face_id]].halfedge = Some(hmap[h]);
            }
        }
        for (halfedge_id, halfedge) in other.conn.iter_halfedges() {
            let dst = hmap[halfedge_id];
            if let Some(twin) = halfedge.twin {
                self.conn[dst].twin = Some(hmap[twin]);
            }
            if let Some(next) = halfedge.next {
                self.conn[dst].next = Some(hmap[next]);
            }
            if let Some(vertex) = halfedge.vertex {
                self.conn[dst].vertex = Some(vmap[vertex]);
            }
            if let Some(face) = halfedge.face {
                self.conn[dst].face = Some(fmap[face]);
            }
        }
    }

    /// Every border half-edge in the mesh, in slotmap iteration order (not
    /// grouped into cycles -- see [`crate::holes::HoleDetector`] for that).
    pub fn border_halfedges(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        self.conn
            .iter_halfedges()
            .filter(|(_, h)| h.face.is_none())
            .map(|(h, _)| h)
    }
}
