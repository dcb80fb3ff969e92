// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::RepairJobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleOutcome {
    Filled,
    Failed,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct HoleResult {
    pub boundary_size: usize,
    pub outcome: HoleOutcome,
    pub added_vertices: usize,
    pub added_faces: usize,
    pub error_message: Option<String>,
}

/// Aggregate counters and per-stage timings for one repair job, plus the
/// per-hole detail that produced them.
#[derive(Debug, Clone, Default)]
pub struct MeshStatistics {
    pub original_vertices: usize,
    pub original_faces: usize,
    pub final_vertices: usize,
    pub final_faces: usize,

    pub num_holes_detected: usize,
    pub num_holes_filled: usize,
    pub num_holes_failed: usize,
    pub num_holes_skipped: usize,

    pub duplicate_points_merged: usize,
    pub duplicate_polygons_removed: usize,
    pub degenerate_polygons_removed: usize,
    pub non_manifold_polygons_removed: usize,
    pub isolated_vertices_removed: usize,

    pub stage_timings_ms: HashMap<String, u128>,
    pub hole_results: Vec<HoleResult>,
}

impl MeshStatistics {
    pub fn record_stage(&mut self, name: &str, elapsed: Duration) {
        self.stage_timings_ms.insert(name.to_string(), elapsed.as_millis());
    }

    /// Authoritative per-hole accounting: the per-hole result vector, not
    /// any submesh's recollection of how many holes it started with.
    pub fn recompute_hole_totals(&mut self) {
        self.num_holes_filled = self
            .hole_results
            .iter()
            .filter(|h| h.outcome == HoleOutcome::Filled)
            .count();
        self.num_holes_failed = self
            .hole_results
            .iter()
            .filter(|h| h.outcome == HoleOutcome::Failed)
            .count();
        self.num_holes_skipped = self
            .hole_results
            .iter()
            .filter(|h| matches!(h.outcome, HoleOutcome::Skipped | HoleOutcome::Cancelled))
            .count();
    }

    pub fn to_report_string(&self, status: RepairJobStatus) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "status: {status}");
        let _ = writeln!(
            s,
            "vertices: {} -> {}",
            self.original_vertices, self.final_vertices
        );
        let _ = writeln!(s, "faces: {} -> {}", self.original_faces, self.final_faces);
        let _ = writeln!(
            s,
            "holes: detected={} filled={} failed={} skipped={}",
            self.num_holes_detected, self.num_holes_filled, self.num_holes_failed, self.num_holes_skipped
        );
        if !self.stage_timings_ms.is_empty() {
            let mut stages: Vec<_> = self.stage_timings_ms.iter().collect();
            stages.sort_by_key(|(name, _)| name.clone());
            for (name, ms) in stages {
                let _ = writeln!(s, "  {name}: {ms}ms");
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_hole_totals_ignores_original_counts() {
        let mut stats = MeshStatistics::default();
        stats.hole_results.push(HoleResult {
            boundary_size: 4,
            outcome: HoleOutcome::Filled,
            added_vertices: 1,
            added_faces: 4,
            error_message: None,
        });
        stats.hole_results.push(HoleResult {
            boundary_size: 200,
            outcome: HoleOutcome::Skipped,
            added_vertices: 0,
            added_faces: 0,
            error_message: None,
        });
        stats.recompute_hole_totals();
        assert_eq!(stats.num_holes_filled, 1);
        assert_eq!(stats.num_holes_skipped, 1);
        assert_eq!(stats.num_holes_failed, 0);
    }
}
