// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure, idempotent repair primitives over a [`PolygonSoup`]. Each function
//! reports how much it changed instead of throwing; deciding whether the
//! result is still viable is the caller's job.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;

use crate::mesh::{FaceId, HalfEdgeMesh, ToPointKey};
use crate::soup::PolygonSoup;

fn canonical_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Collapses bit-exact duplicate points and rewrites polygon indices through
/// the resulting remap. Returns the number of points merged away.
pub fn dedup_points(soup: &mut PolygonSoup) -> usize {
    let mut seen = HashMap::new();
    let mut new_points = Vec::with_capacity(soup.points.len());
    let mut remap = vec![0u32; soup.points.len()];

    for (i, &p) in soup.points.iter().enumerate() {
        let key = p.to_point_key();
        let new_index = *seen.entry(key).or_insert_with(|| {
            new_points.push(p);
            (new_points.len() - 1) as u32
        });
        remap[i] = new_index;
    }

    let merged = soup.points.len() - new_points.len();
    soup.points = new_points;
    for polygon in &mut soup.polygons {
        for idx in polygon.iter_mut() {
            *idx = remap[*idx as usize];
        }
    }
    merged
}

/// Collapses repeated-index runs within each polygon (`a,a,b -> a,b`), drops
/// polygons left with fewer than 3 distinct vertices, then drops any
/// polygon whose sorted vertex set duplicates one already kept. Returns the
/// number of polygons dropped.
pub fn dedup_polygons(soup: &mut PolygonSoup) -> usize {
    let before = soup.polygons.len();
    let mut seen_keys = HashSet::new();
    let mut kept = Vec::with_capacity(before);

    for polygon in soup.polygons.drain(..) {
        let mut collapsed = Vec::with_capacity(polygon.len());
        for &idx in &polygon {
            if collapsed.last() != Some(&idx) {
                collapsed.push(idx);
            }
        }
        if collapsed.len() > 1 && collapsed.first() == collapsed.last() {
            collapsed.pop();
        }
        let distinct: HashSet<u32> = collapsed.iter().copied().collect();
        if distinct.len() < 3 {
            continue;
        }
        let mut sorted = collapsed.clone();
        sorted.sort_unstable();
        if seen_keys.insert(sorted) {
            kept.push(collapsed);
        }
    }

    let dropped = before - kept.len();
    soup.polygons = kept;
    dropped
}

/// Drops polygons of size < 3 or with fewer than 3 distinct vertices.
/// `dedup_polygons` already performs this check; this pass is kept
/// separate so it can run on its own (e.g. right after loading, before any
/// dedup pass is wanted).
pub fn purge_degenerate(soup: &mut PolygonSoup) -> usize {
    let before = soup.polygons.len();
    soup.polygons.retain(|p| {
        let distinct: HashSet<u32> = p.iter().copied().collect();
        distinct.len() >= 3
    });
    before - soup.polygons.len()
}

/// Checks whether the polygons incident to a vertex form a single umbrella:
/// an undirected graph over those polygons, with an edge between two
/// polygons iff they share an edge incident to the vertex, must be
/// connected.
fn is_single_umbrella(vertex: u32, incident: &[usize], polygons: &[Vec<u32>]) -> bool {
    if incident.len() <= 1 {
        return true;
    }
    // Build adjacency: polygons sharing an edge incident to `vertex`.
    let mut edge_to_polys: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for &pi in incident {
        let poly = &polygons[pi];
        let n = poly.len();
        for i in 0..n {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            if a == vertex || b == vertex {
                edge_to_polys.entry(canonical_edge(a, b)).or_default().push(pi);
            }
        }
    }
    let mut adjacency: HashMap<usize, HashSet<usize>> = HashMap::new();
    for polys in edge_to_polys.values() {
        for &p1 in polys {
            for &p2 in polys {
                if p1 != p2 {
                    adjacency.entry(p1).or_default().insert(p2);
                }
            }
        }
    }
    // BFS/connectivity check over `incident`.
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(incident[0]);
    visited.insert(incident[0]);
    while let Some(cur) = queue.pop_front() {
        if let Some(neighbors) = adjacency.get(&cur) {
            for &n in neighbors {
                if visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }
    }
    visited.len() == incident.len()
}

/// Iteratively removes polygons that make a vertex or edge non-manifold,
/// restricting each subsequent pass to vertices touched by the previous
/// removal. Terminates when a pass removes nothing, or after `max_depth`
/// passes (in which case the remaining non-manifold structure is reported
/// via the returned `hit_max_iterations` flag).
pub fn remove_non_manifold(soup: &mut PolygonSoup, max_depth: usize) -> (usize, bool) {
    let mut total_removed = 0;
    let mut restrict: Option<HashSet<u32>> = None;

    for _pass in 0..max_depth.max(1) {
        let mut vertex_to_polys: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut edge_to_polys: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (pi, poly) in soup.polygons.iter().enumerate() {
            let n = poly.len();
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                vertex_to_polys.entry(a).or_default().push(pi);
                edge_to_polys.entry(canonical_edge(a, b)).or_default().push(pi);
            }
        }

        let mut to_remove: HashSet<usize> = HashSet::new();
        for polys in edge_to_polys.values() {
            if polys.len() > 2 {
                to_remove.extend(polys.iter().copied());
            }
        }
        for (&v, incident) in vertex_to_polys.iter() {
            if let Some(r) = &restrict {
                if !r.contains(&v) {
                    continue;
                }
            }
            if incident.len() >= 2 && !is_single_umbrella(v, incident, &soup.polygons) {
                to_remove.extend(incident.iter().copied());
            }
        }

        if to_remove.is_empty() {
            return (total_removed, false);
        }

        // Affected set for the next pass: every vertex of a removed polygon,
        // plus every vertex of any polygon sharing an edge with one.
        let mut affected = HashSet::new();
        for &pi in &to_remove {
            for &v in &soup.polygons[pi] {
                affected.insert(v);
            }
        }
        for (edge, polys) in edge_to_polys.iter() {
            if polys.iter().any(|p| to_remove.contains(p)) {
                affected.insert(edge.0);
                affected.insert(edge.1);
            }
        }

        let mut kept = Vec::with_capacity(soup.polygons.len() - to_remove.len());
        for (pi, poly) in soup.polygons.drain(..).enumerate() {
            if !to_remove.contains(&pi) {
                kept.push(poly);
            }
        }
        total_removed += to_remove.len();
        soup.polygons = kept;
        restrict = Some(affected);
    }

    (total_removed, true)
}

/// Reorders each polygon's vertex list, via a breadth-first flood fill of
/// edge-adjacent polygons, to produce consistent winding. Returns the
/// number of polygons flipped.
pub fn orient_consistently(soup: &mut PolygonSoup) -> usize {
    let mut edge_to_polys: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (pi, poly) in soup.polygons.iter().enumerate() {
        let n = poly.len();
        for i in 0..n {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            edge_to_polys.entry(canonical_edge(a, b)).or_default().push(pi);
        }
    }

    let mut visited = vec![false; soup.polygons.len()];
    let mut flipped = 0;

    for start in 0..soup.polygons.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(pi) = queue.pop_front() {
            let poly = soup.polygons[pi].clone();
            let n = poly.len();
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                let Some(neighbors) = edge_to_polys.get(&canonical_edge(a, b)) else {
                    continue;
                };
                for &nj in neighbors {
                    if nj == pi || visited[nj] {
                        continue;
                    }
                    // Consistent winding means the shared edge runs in
                    // opposite directions between the two polygons.
                    let nb = &soup.polygons[nj];
                    let has_same_direction = nb
                        .iter()
                        .enumerate()
                        .any(|(k, &v)| v == a && nb[(k + 1) % nb.len()] == b);
                    if has_same_direction {
                        soup.polygons[nj].reverse();
                        flipped += 1;
                    }
                    visited[nj] = true;
                    queue.push_back(nj);
                }
            }
        }
    }
    flipped
}

/// Drops vertices with no incident face. Mesh-level, not soup-level: runs
/// by round-tripping through a soup since dropping a slotmap vertex outright
/// would leave dangling half-edge pointers.
pub fn remove_isolated_vertices(mesh: &mut HalfEdgeMesh) -> Result<usize> {
    let referenced: HashSet<_> = mesh.conn.iter_faces().flat_map(|(f, _)| mesh.conn.face_vertices(f).into_iter()).collect();
    let keep: Vec<bool> = mesh.conn.iter_vertices().map(|(v, _)| referenced.contains(&v)).collect();
    let removed = keep.iter().filter(|&&k| !k).count();
    if removed == 0 {
        return Ok(0);
    }

    // `PolygonSoup::from` walks vertices in the same `iter_vertices` order,
    // so `keep[i]` lines up with `soup.points[i]`.
    let mut soup = PolygonSoup::from(&*mesh);
    let mut remap = vec![0u32; soup.points.len()];
    let mut new_points = Vec::with_capacity(soup.points.len() - removed);
    for (i, &k) in keep.iter().enumerate() {
        if k {
            remap[i] = new_points.len() as u32;
            new_points.push(soup.points[i]);
        }
    }
    soup.points = new_points;
    for poly in &mut soup.polygons {
        for idx in poly.iter_mut() {
            *idx = remap[*idx as usize];
        }
    }

    *mesh = soup.into_mesh()?;
    Ok(removed)
}

/// Splits the mesh into face-connectivity components (face adjacency across
/// shared edges) and keeps the one with the most faces; ties are broken by
/// whichever component is discovered first in face-iteration order.
pub fn keep_largest_component(mesh: &HalfEdgeMesh) -> Result<HalfEdgeMesh> {
    let mut visited = HashSet::<FaceId>::new();
    let mut best: Vec<FaceId> = Vec::new();

    for (start, _) in mesh.conn.iter_faces() {
        if visited.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);

        while let Some(face) = queue.pop_front() {
            component.push(face);
            for h in mesh.conn.face_edges(face) {
                if let Some(twin) = mesh.conn[h].twin {
                    if let Some(neighbor_face) = mesh.conn[twin].face {
                        if visited.insert(neighbor_face) {
                            queue.push_back(neighbor_face);
                        }
                    }
                }
            }
        }

        if component.len() > best.len() {
            best = component;
        }
    }

    let keep: HashSet<FaceId> = best.into_iter().collect();
    let mut soup = PolygonSoup::new();
    let mut index_of = slotmap::SecondaryMap::new();

    for &face in &keep {
        let mut row = Vec::new();
        for v in mesh.conn.face_vertices(face) {
            let idx = *index_of.entry(v).unwrap().or_insert_with(|| {
                let i = soup.points.len() as u32;
                soup.points.push(mesh.position(v));
                i
            });
            row.push(idx);
        }
        soup.polygons.push(row);
    }

    soup.into_mesh()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn square_two_tris_duplicated() -> PolygonSoup {
        PolygonSoup {
            points: vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
            ],
            polygons: vec![vec![0, 1, 2], vec![0, 2, 3], vec![4, 2, 1]],
        }
    }

    #[test]
    fn dedup_points_merges_bit_exact_duplicates() {
        let mut soup = square_two_tris_duplicated();
        let merged = dedup_points(&mut soup);
        assert_eq!(merged, 2);
        assert_eq!(soup.points.len(), 4);
        assert_eq!(soup.polygons[2], vec![0, 2, 1]);
    }

    #[test]
    fn dedup_polygons_drops_exact_repeat() {
        let mut soup = PolygonSoup {
            points: vec![DVec3::ZERO, DVec3::X, DVec3::Y],
            polygons: vec![vec![0, 1, 2], vec![1, 2, 0]],
        };
        let dropped = dedup_polygons(&mut soup);
        assert_eq!(dropped, 1);
        assert_eq!(soup.polygons.len(), 1);
    }

    #[test]
    fn purge_degenerate_drops_collinear_index_runs() {
        let mut soup = PolygonSoup {
            points: vec![DVec3::ZERO, DVec3::X, DVec3::Y],
            polygons: vec![vec![0, 0, 1], vec![0, 1, 2]],
        };
        let removed = purge_degenerate(&mut soup);
        assert_eq!(removed, 1);
        assert_eq!(soup.polygons.len(), 1);
    }

    #[test]
    fn non_manifold_edge_removed() {
        // Three triangles sharing one edge: a non-manifold "book" edge.
        let mut soup = PolygonSoup {
            points: vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(0.0, -1.0, 0.0),
                DVec3::new(0.0, 0.0, 1.0),
            ],
            polygons: vec![vec![0, 1, 2], vec![0, 3, 1], vec![0, 4, 1]],
        };
        let (removed, hit_max) = remove_non_manifold(&mut soup, 8);
        assert_eq!(removed, 3);
        assert!(!hit_max);
        assert!(soup.polygons.is_empty());
    }

    #[test]
    fn orientation_flood_fill_flips_inconsistent_triangle() {
        let mut soup = PolygonSoup {
            points: vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            // Second triangle's winding around the shared edge (0,2) runs
            // the same direction as the first -- inconsistent.
            polygons: vec![vec![0, 1, 2], vec![0, 2, 3]],
        };
        let flipped = orient_consistently(&mut soup);
        assert_eq!(flipped, 0, "these two are already consistent");

        soup.polygons[1] = vec![2, 0, 3];
        let flipped = orient_consistently(&mut soup);
        assert_eq!(flipped, 1);
    }
}
