// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use itertools::Itertools;
use slotmap::{SecondaryMap, SlotMap};

use super::id_types::{FaceId, HalfEdgeId, VertexId};
use crate::util::SVec;

/// The maximum number of iterations any half-edge loop traversal will take
/// before giving up. Guards against malformed connectivity looping forever.
pub const MAX_LOOP_ITERATIONS: usize = 8196;

#[derive(Default, Clone, Copy, Debug)]
pub struct HalfEdge {
    pub twin: Option<HalfEdgeId>,
    pub next: Option<HalfEdgeId>,
    pub vertex: Option<VertexId>,
    pub face: Option<FaceId>,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Vertex {
    pub halfedge: Option<HalfEdgeId>,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Face {
    pub halfedge: Option<HalfEdgeId>,
}

/// Owns the topology of a mesh: vertices, faces and half-edges, with no
/// associated geometric data. Positions live alongside this in
/// [`crate::mesh::HalfEdgeMesh`].
#[derive(Clone, Default)]
pub struct MeshConnectivity {
    pub(crate) vertices: SlotMap<VertexId, Vertex>,
    pub(crate) faces: SlotMap<FaceId, Face>,
    pub(crate) halfedges: SlotMap<HalfEdgeId, HalfEdge>,
}

impl std::ops::Index<VertexId> for MeshConnectivity {
    type Output = Vertex;
    fn index(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }
}
impl std::ops::IndexMut<VertexId> for MeshConnectivity {
    fn index_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id]
    }
}
impl std::ops::Index<FaceId> for MeshConnectivity {
    type Output = Face;
    fn index(&self, id: FaceId) -> &Face {
        &self.faces[id]
    }
}
impl std::ops::IndexMut<FaceId> for MeshConnectivity {
    fn index_mut(&mut self, id: FaceId) -> &mut Face {
        &mut self.faces[id]
    }
}
impl std::ops::Index<HalfEdgeId> for MeshConnectivity {
    type Output = HalfEdge;
    fn index(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id]
    }
}
impl std::ops::IndexMut<HalfEdgeId> for MeshConnectivity {
    fn index_mut(&mut self, id: HalfEdgeId) -> &mut HalfEdge {
        &mut self.halfedges[id]
    }
}

impl MeshConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }
    pub fn iter_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces.iter()
    }
    pub fn iter_halfedges(&self) -> impl Iterator<Item = (HalfEdgeId, &HalfEdge)> {
        self.halfedges.iter()
    }

    pub fn vertex_exists(&self, v: VertexId) -> bool {
        self.vertices.contains_key(v)
    }
    pub fn face_exists(&self, f: FaceId) -> bool {
        self.faces.contains_key(f)
    }

    pub(crate) fn alloc_vertex_raw(&mut self, halfedge: Option<HalfEdgeId>) -> VertexId {
        self.vertices.insert(Vertex { halfedge })
    }
    pub(crate) fn alloc_face(&mut self, halfedge: Option<HalfEdgeId>) -> FaceId {
        self.faces.insert(Face { halfedge })
    }
    pub(crate) fn alloc_halfedge(&mut self, h: HalfEdge) -> HalfEdgeId {
        self.halfedges.insert(h)
    }

    pub(crate) fn remove_vertex(&mut self, v: VertexId) {
        self.vertices.remove(v);
    }
    pub(crate) fn remove_face(&mut self, f: FaceId) {
        self.faces.remove(f);
    }
    pub(crate) fn remove_halfedge(&mut self, h: HalfEdgeId) {
        self.halfedges.remove(h);
    }

    /// The ordered half-edges bounding a face, starting at the face's
    /// reference half-edge.
    pub fn face_edges(&self, face_id: FaceId) -> SVec<HalfEdgeId> {
        self.halfedge_loop(self.faces[face_id].halfedge.expect("face has no halfedge"))
    }

    /// The ordered vertices bounding a face.
    pub fn face_vertices(&self, face_id: FaceId) -> SVec<VertexId> {
        self.face_edges(face_id)
            .into_iter()
            .map(|h| self.halfedges[h].vertex.expect("halfedge has no vertex"))
            .collect()
    }

    pub fn edge_endpoints(&self, edge: HalfEdgeId) -> (VertexId, VertexId) {
        let src = self.halfedges[edge].vertex.expect("halfedge has no vertex");
        let next = self.halfedges[edge].next.expect("halfedge has no next");
        let dst = self.halfedges[next].vertex.expect("halfedge has no vertex");
        (src, dst)
    }

    /// Follows `next` pointers starting at `h0` until the loop closes.
    pub fn halfedge_loop(&self, h0: HalfEdgeId) -> SVec<HalfEdgeId> {
        let mut ret = smallvec::smallvec![h0];
        let mut h = h0;
        let mut count = 0;
        loop {
            if count > MAX_LOOP_ITERATIONS {
                panic!("Max number of iterations reached. Is the mesh malformed?");
            }
            count += 1;
            h = self.halfedges[h].next.expect("halfedges should form a loop");
            if h == h0 {
                break;
            }
            ret.push(h);
        }
        ret
    }

    /// Fills in twin half-edges for every incomplete (border) edge, linking
    /// them into closed boundary loops that run opposite to their matching
    /// interior edges.
    pub(crate) fn add_boundary_halfedges(&mut self) {
        let halfedges: Vec<HalfEdgeId> = self.iter_halfedges().map(|(h, _)| h).collect();

        for &h0 in halfedges.iter() {
            let mut boundary_halfedges = Vec::<HalfEdgeId>::new();
            if self[h0].twin.is_none() {
                let mut h_it = h0;
                loop {
                    let t = self.alloc_halfedge(HalfEdge::default());
                    boundary_halfedges.push(t);
                    self[h_it].twin = Some(t);
                    self[t].twin = Some(h_it);
                    let next = self[h_it].next.expect("halfedge has no next");
                    self[t].vertex = Some(self[next].vertex.expect("halfedge has no vertex"));

                    h_it = self[h_it].next.expect("halfedge has no next");
                    while h_it != h0 && self[h_it].twin.is_some() {
                        let twin = self[h_it].twin.expect("just checked");
                        h_it = self[twin].next.expect("halfedge has no next");
                    }

                    if h_it == h0 {
                        break;
                    }
                }
            }

            for (&b_h, &b_h_next) in boundary_halfedges.iter().rev().circular_tuple_windows() {
                self[b_h].next = Some(b_h_next);
            }
        }
    }

    pub fn is_boundary(&self, h: HalfEdgeId) -> bool {
        self.halfedges[h].face.is_none()
    }
}
