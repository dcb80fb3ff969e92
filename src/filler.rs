// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatches per-submesh filling across a worker pool, with eligibility
//! checks and cooperative cancellation in front of every hole.

use std::sync::mpsc;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::fill::{FillOperator, FillParams};
use crate::stats::{HoleOutcome, HoleResult};
use crate::submesh::Submesh;
use crate::workerpool::ThreadPool;

#[derive(Debug, Clone, Copy)]
pub struct FillEligibility {
    pub max_hole_boundary_vertices: usize,
    pub max_hole_diameter_ratio: f64,
}

impl Default for FillEligibility {
    fn default() -> Self {
        FillEligibility {
            max_hole_boundary_vertices: 256,
            max_hole_diameter_ratio: 0.3,
        }
    }
}

impl FillEligibility {
    /// A hole whose diameter exceeds `max_hole_diameter_ratio` of the whole
    /// mesh's bounding-box diagonal is assumed to be a real opening (a
    /// window, a missing wall) rather than damage, and is skipped.
    fn is_eligible(&self, boundary_size: usize, hole_diameter: f64, mesh_diagonal: f64) -> bool {
        if boundary_size > self.max_hole_boundary_vertices {
            return false;
        }
        if mesh_diagonal > 0.0 && hole_diameter / mesh_diagonal > self.max_hole_diameter_ratio {
            return false;
        }
        true
    }
}

pub struct FilledSubmesh {
    pub submesh: Submesh,
    pub hole_results: Vec<HoleResult>,
}

/// Fills every eligible hole of every submesh across `pool`, honoring
/// `cancel` between submeshes and between holes within a submesh.
pub struct ParallelFiller<'a> {
    pool: &'a ThreadPool,
    filler: Arc<dyn FillOperator>,
    eligibility: FillEligibility,
    params: FillParams,
}

impl<'a> ParallelFiller<'a> {
    pub fn new(pool: &'a ThreadPool, filler: Arc<dyn FillOperator>, eligibility: FillEligibility, params: FillParams) -> Self {
        ParallelFiller {
            pool,
            filler,
            eligibility,
            params,
        }
    }

    /// Consumes `submeshes`, filling each on the pool, and returns them (in
    /// arbitrary order) once every task has completed or been cancelled.
    pub fn fill_all(&self, submeshes: Vec<Submesh>, cancel: &CancelToken) -> Vec<FilledSubmesh> {
        let (tx, rx) = mpsc::channel();
        let expected = submeshes.len();

        for submesh in submeshes {
            let tx = tx.clone();
            let filler = Arc::clone(&self.filler);
            let eligibility = self.eligibility;
            let params = self.params;
            let cancel = cancel.clone();

            self.pool.enqueue(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    fill_submesh(submesh, filler.as_ref(), eligibility, params, &cancel)
                }));
                if let Ok(filled) = result {
                    let _ = tx.send(filled);
                }
            });
        }
        drop(tx);

        let mut out = Vec::with_capacity(expected);
        for filled in rx {
            out.push(filled);
        }
        out
    }
}

fn fill_submesh(
    mut submesh: Submesh,
    filler: &dyn FillOperator,
    eligibility: FillEligibility,
    params: FillParams,
    cancel: &CancelToken,
) -> FilledSubmesh {
    let diagonal = submesh.mesh.bounding_box_diagonal();
    let mut results = Vec::with_capacity(submesh.holes.len());

    for hole in submesh.holes.clone() {
        if cancel.is_cancelled() {
            results.push(HoleResult {
                boundary_size: hole.boundary_size,
                outcome: HoleOutcome::Cancelled,
                added_vertices: 0,
                added_faces: 0,
                error_message: None,
            });
            continue;
        }

        if !eligibility.is_eligible(hole.boundary_size, hole.diameter, diagonal) {
            results.push(HoleResult {
                boundary_size: hole.boundary_size,
                outcome: HoleOutcome::Skipped,
                added_vertices: 0,
                added_faces: 0,
                error_message: None,
            });
            continue;
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            filler.fill(&mut submesh.mesh, &hole, params)
        }));

        match outcome {
            Ok(outcome) if outcome.success => results.push(HoleResult {
                boundary_size: hole.boundary_size,
                outcome: HoleOutcome::Filled,
                added_vertices: outcome.added_vertices,
                added_faces: outcome.added_faces,
                error_message: None,
            }),
            Ok(_) => results.push(HoleResult {
                boundary_size: hole.boundary_size,
                outcome: HoleOutcome::Failed,
                added_vertices: 0,
                added_faces: 0,
                error_message: Some("filler reported failure".to_string()),
            }),
            Err(_) => results.push(HoleResult {
                boundary_size: hole.boundary_size,
                outcome: HoleOutcome::Failed,
                added_vertices: 0,
                added_faces: 0,
                error_message: Some("filler panicked".to_string()),
            }),
        }
    }

    FilledSubmesh {
        submesh,
        hole_results: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::FanTriangulationFiller;
    use crate::holes::HoleDetector;
    use crate::mesh::HalfEdgeMesh;
    use crate::submesh::SubmeshExtractor;
    use glam::DVec3;
    use std::collections::HashSet;

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
    fn fills_one_hole_through_the_pool() {
        let mesh = cube_with_one_face_removed();
        let holes = HoleDetector::detect(&mesh);
        let all_faces: HashSet<_> = mesh.conn.iter_faces().map(|(f, _)| f).collect();
        let submesh = SubmeshExtractor::extract(&mesh, &all_faces, &holes);

        let pool = ThreadPool::new(2);
        let filler = ParallelFiller::new(&pool, Arc::new(FanTriangulationFiller), FillEligibility::default(), FillParams::default());
        let cancel = CancelToken::new();

        let results = filler.fill_all(vec![submesh], &cancel);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].hole_results.len(), 1);
        assert_eq!(results[0].hole_results[0].outcome, HoleOutcome::Filled);
        assert!(HoleDetector::detect(&results[0].submesh.mesh).is_empty());
    }

    #[test]
    fn oversized_hole_is_skipped() {
        let mesh = cube_with_one_face_removed();
        let holes = HoleDetector::detect(&mesh);
        let all_faces: HashSet<_> = mesh.conn.iter_faces().map(|(f, _)| f).collect();
        let submesh = SubmeshExtractor::extract(&mesh, &all_faces, &holes);

        let pool = ThreadPool::new(1);
        let eligibility = FillEligibility {
            max_hole_boundary_vertices: 2,
            ..Default::default()
        };
        let filler = ParallelFiller::new(&pool, Arc::new(FanTriangulationFiller), eligibility, FillParams::default());
        let cancel = CancelToken::new();

        let results = filler.fill_all(vec![submesh], &cancel);
        assert_eq!(results[0].hole_results[0].outcome, HoleOutcome::Skipped);
    }
}
