// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed ordered cleanup pipeline over a [`PolygonSoup`], converting to
//! a [`HalfEdgeMesh`] exactly once at the end.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::mesh::HalfEdgeMesh;
use crate::soup::PolygonSoup;
use crate::soup_repair;
use crate::stats::MeshStatistics;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PreprocessOptions {
    pub remove_duplicates: bool,
    pub remove_non_manifold: bool,
    pub remove_3_face_fans: bool,
    pub remove_isolated: bool,
    pub keep_largest_component: bool,
    pub remove_long_edges: bool,
    pub long_edge_max_ratio: f64,
    pub non_manifold_passes: usize,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            remove_duplicates: true,
            remove_non_manifold: true,
            remove_3_face_fans: false,
            remove_isolated: true,
            keep_largest_component: false,
            remove_long_edges: false,
            long_edge_max_ratio: 10.0,
            non_manifold_passes: 8,
        }
    }
}

pub struct Preprocessor;

impl Preprocessor {
    pub fn run(mut soup: PolygonSoup, options: PreprocessOptions, stats: &mut MeshStatistics) -> Result<HalfEdgeMesh> {
        if options.remove_duplicates {
            let t0 = Instant::now();
            stats.duplicate_points_merged = soup_repair::dedup_points(&mut soup);
            stats.duplicate_polygons_removed = soup_repair::dedup_polygons(&mut soup);
            stats.record_stage("preprocess.dedup", t0.elapsed());
        }

        let t0 = Instant::now();
        let degenerate_removed = soup_repair::purge_degenerate(&mut soup);
        stats.degenerate_polygons_removed += degenerate_removed;
        stats.record_stage("preprocess.degenerate", t0.elapsed());

        if options.remove_non_manifold {
            let t0 = Instant::now();
            let (removed, _hit_max) = soup_repair::remove_non_manifold(&mut soup, options.non_manifold_passes);
            stats.non_manifold_polygons_removed += removed;
            stats.record_stage("preprocess.non_manifold", t0.elapsed());
        }

        if options.remove_3_face_fans {
            let t0 = Instant::now();
            remove_3_face_fans(&mut soup);
            stats.record_stage("preprocess.fan_collapse", t0.elapsed());
        }

        if options.remove_long_edges {
            let t0 = Instant::now();
            purge_long_edges(&mut soup, options.long_edge_max_ratio);
            stats.record_stage("preprocess.long_edges", t0.elapsed());
        }

        let t0 = Instant::now();
        soup_repair::orient_consistently(&mut soup);
        stats.record_stage("preprocess.orient", t0.elapsed());

        let t0 = Instant::now();
        let mut mesh = soup.into_mesh()?;
        stats.record_stage("preprocess.convert", t0.elapsed());

        if options.remove_isolated {
            let t0 = Instant::now();
            stats.isolated_vertices_removed += soup_repair::remove_isolated_vertices(&mut mesh)?;
            stats.record_stage("preprocess.isolated", t0.elapsed());
        }

        if options.keep_largest_component {
            let t0 = Instant::now();
            mesh = soup_repair::keep_largest_component(&mesh)?;
            stats.record_stage("preprocess.largest_component", t0.elapsed());
        }

        Ok(mesh)
    }
}

/// A 3-face fan: a vertex with exactly three incident faces whose umbrella
/// boundary is itself a triangle. Collapsing it drops the vertex and
/// replaces its three incident faces with the single boundary triangle --
/// the rule this crate picked for an otherwise geometrically-underspecified
/// cleanup pass (see DESIGN.md). Returns the number of vertices collapsed.
fn remove_3_face_fans(soup: &mut PolygonSoup) -> usize {
    let mut vertex_to_polys: HashMap<u32, Vec<usize>> = HashMap::new();
    for (pi, poly) in soup.polygons.iter().enumerate() {
        for &v in poly {
            vertex_to_polys.entry(v).or_default().push(pi);
        }
    }

    let mut collapsed = 0;
    let mut to_remove: HashSet<usize> = HashSet::new();
    let mut to_add: Vec<Vec<u32>> = Vec::new();

    for (&vertex, incident) in vertex_to_polys.iter() {
        if incident.len() != 3 || incident.iter().any(|i| to_remove.contains(i)) {
            continue;
        }
        let mut boundary_edges = Vec::new();
        for &pi in incident {
            let poly = &soup.polygons[pi];
            let n = poly.len();
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                if a != vertex && b != vertex {
                    boundary_edges.push((a, b));
                }
            }
        }
        if boundary_edges.len() != 3 {
            continue;
        }
        // The three opposite edges must themselves form a closed triangle.
        let mut verts: Vec<u32> = boundary_edges.iter().map(|&(a, _)| a).collect();
        verts.sort_unstable();
        verts.dedup();
        if verts.len() != 3 {
            continue;
        }

        to_remove.extend(incident.iter().copied());
        to_add.push(boundary_edges.iter().map(|&(a, _)| a).collect());
        collapsed += 1;
    }

    if collapsed == 0 {
        return 0;
    }

    let mut kept = Vec::with_capacity(soup.polygons.len());
    for (pi, poly) in soup.polygons.drain(..).enumerate() {
        if !to_remove.contains(&pi) {
            kept.push(poly);
        }
    }
    kept.extend(to_add);
    soup.polygons = kept;
    collapsed
}

fn purge_long_edges(soup: &mut PolygonSoup, max_ratio: f64) -> usize {
    let diagonal = soup.bounding_box_diagonal();
    if diagonal <= 0.0 {
        return 0;
    }
    let threshold = max_ratio * diagonal;
    let before = soup.polygons.len();
    soup.polygons.retain(|poly| {
        let n = poly.len();
        !(0..n).any(|i| {
            let a = soup.points[poly[i] as usize];
            let b = soup.points[poly[(i + 1) % n] as usize];
            (a - b).length() > threshold
        })
    });
    before - soup.polygons.len()
}
