// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use glam::DVec3;

use crate::holes::HoleInfo;
use crate::mesh::{FaceId, HalfEdgeMesh, VertexId};
use crate::mesh::{AnyTraversal, HalfEdgeTraversal, VertexTraversalHelpers};

/// A hole plus everything within `n_rings` half-edge hops of its boundary:
/// the vertices and faces that make up the submesh built around it.
#[derive(Debug, Clone)]
pub struct HoleWithNeighborhood {
    pub hole: HoleInfo,
    pub n_ring_vertices: HashSet<VertexId>,
    pub n_ring_faces: HashSet<FaceId>,
    pub bbox: (DVec3, DVec3),
}

fn compute_neighborhood(mesh: &HalfEdgeMesh, hole: &HoleInfo, n_rings: usize) -> HoleWithNeighborhood {
    let mut visited: HashSet<VertexId> = hole.boundary_vertices.iter().copied().collect();
    let mut frontier: Vec<VertexId> = hole.boundary_vertices.to_vec();

    for _ in 0..n_rings {
        let mut next_frontier = Vec::new();
        for v in frontier {
            if let Ok(neighbors) = mesh.conn.at_vertex(v).outgoing_halfedges() {
                for h in neighbors {
                    if let Ok(dst) = mesh.conn.at_halfedge(h).next().vertex().try_end() {
                        if visited.insert(dst) {
                            next_frontier.push(dst);
                        }
                    }
                }
            }
        }
        frontier = next_frontier;
    }

    let mut faces = HashSet::new();
    for &v in &visited {
        if let Ok(adjacent) = mesh.conn.at_vertex(v).adjacent_faces() {
            faces.extend(adjacent);
        }
    }

    let mut min = DVec3::splat(f64::INFINITY);
    let mut max = DVec3::splat(f64::NEG_INFINITY);
    for &v in &visited {
        let p = mesh.position(v);
        min = min.min(p);
        max = max.max(p);
    }
    let bbox = if min.is_finite() { (min, max) } else { (DVec3::ZERO, DVec3::ZERO) };

    HoleWithNeighborhood {
        hole: hole.clone(),
        n_ring_vertices: visited,
        n_ring_faces: faces,
        bbox,
    }
}

/// Builds per-hole neighborhoods and groups holes into boundary-edge-balanced
/// partitions via a longest-processing-time-first greedy bin packing. This
/// supersedes the original engine's plain count-based partitioning (dividing
/// holes evenly by index), since submesh-extraction cost is roughly linear
/// in boundary edges, not hole count.
pub struct Partitioner<'a> {
    mesh: &'a HalfEdgeMesh,
    n_rings: usize,
}

impl<'a> Partitioner<'a> {
    pub fn new(mesh: &'a HalfEdgeMesh, continuity: usize) -> Self {
        Partitioner {
            mesh,
            n_rings: (continuity + 1).max(1),
        }
    }

    pub fn neighborhoods(&self, holes: &[HoleInfo]) -> Vec<HoleWithNeighborhood> {
        holes
            .iter()
            .map(|h| compute_neighborhood(self.mesh, h, self.n_rings))
            .collect()
    }

    /// Groups hole indices (into `neighborhoods`) into disjoint partitions.
    /// Each returned `Vec<usize>` is one partition's hole indices.
    pub fn partition(
        &self,
        neighborhoods: &[HoleWithNeighborhood],
        worker_threads: usize,
        min_partition_boundary_edges: usize,
    ) -> Vec<Vec<usize>> {
        if neighborhoods.is_empty() {
            return Vec::new();
        }

        let total_boundary_edges: usize = neighborhoods.iter().map(|n| n.hole.boundary_size).sum();
        let max_by_edge_budget = if min_partition_boundary_edges > 0 {
            (total_boundary_edges / min_partition_boundary_edges).max(1)
        } else {
            worker_threads.max(1)
        };
        let partition_count = worker_threads.max(1).min(max_by_edge_budget).min(neighborhoods.len());

        let mut order: Vec<usize> = (0..neighborhoods.len()).collect();
        order.sort_by(|&a, &b| {
            neighborhoods[b]
                .hole
                .boundary_size
                .cmp(&neighborhoods[a].hole.boundary_size)
        });

        let mut partitions: Vec<Vec<usize>> = vec![Vec::new(); partition_count];
        let mut partition_weight = vec![0usize; partition_count];

        for idx in order {
            let (smallest, _) = partition_weight
                .iter()
                .enumerate()
                .min_by_key(|&(_, &w)| w)
                .expect("partition_count is at least 1");
            partitions[smallest].push(idx);
            partition_weight[smallest] += neighborhoods[idx].hole.boundary_size;
        }

        partitions.retain(|p| !p.is_empty());
        partitions
    }
}
