// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-mesh repair pipeline: a linear state machine from a freshly
//! loaded soup to a saved, repaired mesh. One [`RepairJobConfig`] in, one
//! [`RepairJobResult`] out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::debug_dump;
use crate::error::{RepairJobStatus, RepairStage, StageError};
use crate::fill::{FanTriangulationFiller, FillOperator, FillParams};
use crate::filler::{FillEligibility, ParallelFiller};
use crate::holes::{HoleDetector, HoleInfo};
use crate::io;
use crate::mesh::HalfEdgeMesh;
use crate::merge::{MergeOptions, Merger};
use crate::partition::Partitioner;
use crate::preprocess::{PreprocessOptions, Preprocessor};
use crate::soup::PolygonSoup;
use crate::stats::{HoleOutcome, HoleResult, MeshStatistics};
use crate::submesh::SubmeshExtractor;
use crate::threads::{ThreadManager, ThreadingConfig};

/// State labels of the linear per-mesh pipeline, kept around only for
/// diagnostics (e.g. a `verbose` trace of which stage is running).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Ready,
    Loaded,
    Preprocessed,
    Detected,
    Partitioned,
    Filled,
    Merged,
    Saved,
    Cancelled,
    Failed(RepairStage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    Partitioned,
    Legacy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillingOptions {
    pub fairing_continuity: u8,
    pub max_hole_boundary_vertices: usize,
    pub max_hole_diameter_ratio: f64,
    pub use_2d_cdt: bool,
    pub use_3d_delaunay: bool,
    pub skip_cubic_search: bool,
    pub refine: bool,
    pub min_partition_boundary_edges: usize,
    pub holes_only: bool,
    pub keep_largest_component: bool,
    pub show_progress: bool,
    pub verbose: bool,
    pub reference_bbox_diagonal: Option<f64>,
    pub guard_selection_boundary: bool,
    /// Positions of input vertices the caller wants protected from filling
    /// (e.g. a user selection in an interactive tool). Matched against hole
    /// boundary vertices by nearest position, not by id -- ids don't survive
    /// preprocessing, but positions are stable to floating-point epsilon.
    pub selection_boundary_vertices: Vec<[f64; 3]>,
}

impl Default for FillingOptions {
    fn default() -> Self {
        let params = FillParams::default();
        let eligibility = FillEligibility::default();
        FillingOptions {
            fairing_continuity: params.continuity,
            max_hole_boundary_vertices: eligibility.max_hole_boundary_vertices,
            max_hole_diameter_ratio: eligibility.max_hole_diameter_ratio,
            use_2d_cdt: params.use_2d_cdt,
            use_3d_delaunay: params.use_3d_delaunay,
            skip_cubic_search: params.skip_cubic_search,
            refine: params.refine,
            min_partition_boundary_edges: 64,
            holes_only: false,
            keep_largest_component: true,
            show_progress: false,
            verbose: false,
            reference_bbox_diagonal: None,
            guard_selection_boundary: false,
            selection_boundary_vertices: Vec::new(),
        }
    }
}

impl FillingOptions {
    fn fill_params(&self) -> FillParams {
        FillParams {
            continuity: self.fairing_continuity,
            use_2d_cdt: self.use_2d_cdt,
            use_3d_delaunay: self.use_3d_delaunay,
            skip_cubic_search: self.skip_cubic_search,
            refine: self.refine,
        }
    }

    fn eligibility(&self) -> FillEligibility {
        FillEligibility {
            max_hole_boundary_vertices: self.max_hole_boundary_vertices,
            max_hole_diameter_ratio: self.max_hole_diameter_ratio,
        }
    }
}

/// A value-typed job description: everything a repair run needs to know,
/// with no borrowed state. `cancel_token` is the one field that carries
/// shared, mutable state on purpose -- it's how an outside caller stops a
/// job already handed off to a worker thread.
#[derive(Clone, Serialize, Deserialize)]
pub struct RepairJobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub enable_preprocessing: bool,
    pub preprocess_opt: PreprocessOptions,
    pub filling_options: FillingOptions,
    pub use_partitioned: bool,
    pub validate_input: bool,
    pub ascii_ply: bool,
    pub force_cgal_loader: bool,
    pub verbose: bool,
    pub debug_dump: bool,
    pub temp_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    #[serde(skip)]
    pub cancel_token: CancelToken,
    pub thread_count: usize,
    pub queue_size: usize,
}

impl Default for RepairJobConfig {
    fn default() -> Self {
        RepairJobConfig {
            input_path: PathBuf::new(),
            output_path: PathBuf::new(),
            enable_preprocessing: true,
            preprocess_opt: PreprocessOptions::default(),
            filling_options: FillingOptions::default(),
            use_partitioned: true,
            validate_input: true,
            ascii_ply: false,
            force_cgal_loader: false,
            verbose: false,
            debug_dump: false,
            temp_dir: None,
            timeout_ms: None,
            cancel_token: CancelToken::new(),
            thread_count: 0,
            queue_size: 10,
        }
    }
}

impl RepairJobConfig {
    /// Overlays a TOML document onto `self`. Unknown keys are a hard error;
    /// the config layer never silently drops a typo'd field.
    pub fn merge_toml(&mut self, toml_text: &str) -> Result<()> {
        #[derive(Deserialize, Default)]
        #[serde(deny_unknown_fields)]
        struct Overlay {
            input_path: Option<PathBuf>,
            output_path: Option<PathBuf>,
            enable_preprocessing: Option<bool>,
            preprocess_opt: Option<PreprocessOptions>,
            use_partitioned: Option<bool>,
            validate_input: Option<bool>,
            ascii_ply: Option<bool>,
            force_cgal_loader: Option<bool>,
            verbose: Option<bool>,
            debug_dump: Option<bool>,
            temp_dir: Option<PathBuf>,
            timeout_ms: Option<u64>,
            thread_count: Option<usize>,
            queue_size: Option<usize>,
        }

        let overlay: Overlay = toml::from_str(toml_text)?;
        if let Some(v) = overlay.input_path {
            self.input_path = v;
        }
        if let Some(v) = overlay.output_path {
            self.output_path = v;
        }
        if let Some(v) = overlay.enable_preprocessing {
            self.enable_preprocessing = v;
        }
        if let Some(v) = overlay.preprocess_opt {
            self.preprocess_opt = v;
        }
        if let Some(v) = overlay.use_partitioned {
            self.use_partitioned = v;
        }
        if let Some(v) = overlay.validate_input {
            self.validate_input = v;
        }
        if let Some(v) = overlay.ascii_ply {
            self.ascii_ply = v;
        }
        if let Some(v) = overlay.force_cgal_loader {
            self.force_cgal_loader = v;
        }
        if let Some(v) = overlay.verbose {
            self.verbose = v;
        }
        if let Some(v) = overlay.debug_dump {
            self.debug_dump = v;
        }
        if let Some(v) = overlay.temp_dir {
            self.temp_dir = Some(v);
        }
        if let Some(v) = overlay.timeout_ms {
            self.timeout_ms = Some(v);
        }
        if let Some(v) = overlay.thread_count {
            self.thread_count = v;
        }
        if let Some(v) = overlay.queue_size {
            self.queue_size = v;
        }
        Ok(())
    }

    /// A config that touches no filesystem, for queue/worker plumbing
    /// tests: loading a missing path fails fast with `LoadFailed`, which is
    /// all those tests need to observe.
    pub fn in_memory_noop() -> Self {
        RepairJobConfig {
            input_path: PathBuf::from("/nonexistent/meshmend-noop.obj"),
            output_path: PathBuf::from("/nonexistent/meshmend-noop-out.obj"),
            ..RepairJobConfig::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepairJobResult {
    pub status: RepairJobStatus,
    pub stats: MeshStatistics,
    pub error: Option<String>,
    pub total_ms: u128,
    pub final_state: PipelineState,
}

pub struct PerMeshPipeline;

impl PerMeshPipeline {
    pub fn run(config: &RepairJobConfig) -> Result<RepairJobResult> {
        let start = Instant::now();
        if let Some(dir) = &config.temp_dir {
            if config.debug_dump {
                debug_dump::set_base_dir(dir.clone());
            }
        }

        let mut stats = MeshStatistics::default();
        let mut state = PipelineState::Ready;
        let result = Self::run_stages(config, &mut stats, &mut state);

        let (status, error) = match result {
            Ok(()) => (RepairJobStatus::Ok, None),
            Err(PipelineError::Cancelled) => {
                state = PipelineState::Cancelled;
                (RepairJobStatus::Cancelled, None)
            }
            Err(PipelineError::Stage(err)) => {
                state = PipelineState::Failed(err.stage);
                (RepairJobStatus::from(err.stage), Some(err.to_string()))
            }
        };
        tracing::debug!(?state, %status, "job finished");

        Ok(RepairJobResult {
            status,
            stats,
            error,
            total_ms: start.elapsed().as_millis(),
            final_state: state,
        })
    }

    #[profiling::function]
    fn run_stages(config: &RepairJobConfig, stats: &mut MeshStatistics, state: &mut PipelineState) -> std::result::Result<(), PipelineError> {
        Self::check_cancel(config)?;

        let (soup, _load_time) = io::load(&config.input_path)
            .map_err(|e| PipelineError::stage(RepairStage::Load, &config.input_path, e))?;
        *state = PipelineState::Loaded;
        debug_dump::dump_step("original_loaded", &soup);
        stats.original_vertices = soup.points.len();
        stats.original_faces = soup.polygons.len();

        Self::check_cancel(config)?;

        let mut mesh = if config.enable_preprocessing {
            let mesh = Preprocessor::run(soup, config.preprocess_opt, stats)
                .map_err(|e| PipelineError::stage(RepairStage::Preprocess, &config.input_path, e))?;
            debug_dump::dump_mesh_step("after_soup_cleanup", &mesh);
            mesh
        } else {
            soup.into_mesh()
                .map_err(|e| PipelineError::stage(RepairStage::Preprocess, &config.input_path, e))?
        };
        *state = PipelineState::Preprocessed;

        if config.validate_input && mesh.num_faces() == 0 {
            return Err(PipelineError::stage(RepairStage::Validate, &config.input_path, "mesh has no faces"));
        }

        Self::check_cancel(config)?;

        let holes = HoleDetector::detect(&mesh);
        stats.num_holes_detected = holes.len();
        *state = PipelineState::Detected;

        let filler: Arc<dyn FillOperator> = Arc::new(FanTriangulationFiller);
        let strategy = if config.use_partitioned { FillStrategy::Partitioned } else { FillStrategy::Legacy };
        let holes_only = config.filling_options.holes_only && matches!(strategy, FillStrategy::Partitioned);

        match strategy {
            FillStrategy::Partitioned => {
                *state = PipelineState::Partitioned;
                Self::fill_partitioned(config, &mut mesh, holes, filler, holes_only, stats)?;
            }
            FillStrategy::Legacy => {
                Self::fill_legacy(config, &mut mesh, holes, filler.as_ref(), stats)?;
            }
        }
        *state = PipelineState::Filled;
        stats.recompute_hole_totals();

        *state = PipelineState::Merged;
        debug_dump::dump_mesh_step("final_merged", &mesh);
        stats.final_vertices = mesh.num_vertices();
        stats.final_faces = mesh.num_faces();

        Self::check_cancel(config)?;

        io::save(&config.output_path, &PolygonSoup::from(&mesh))
            .map_err(|e| PipelineError::stage(RepairStage::Save, &config.output_path, e))?;
        *state = PipelineState::Saved;

        Ok(())
    }

    fn fill_partitioned(
        config: &RepairJobConfig,
        mesh: &mut HalfEdgeMesh,
        holes: Vec<HoleInfo>,
        filler: Arc<dyn FillOperator>,
        holes_only: bool,
        stats: &mut MeshStatistics,
    ) -> std::result::Result<(), PipelineError> {
        let (protected, to_fill) = Self::split_protected_holes(config, mesh, holes);
        stats.hole_results.extend(protected);

        let threading = ThreadingConfig {
            num_threads: config.thread_count,
            queue_size: config.queue_size,
        };
        let mut thread_manager = ThreadManager::new(threading);

        thread_manager.enter_detection_phase();
        let partitioner = Partitioner::new(mesh, config.filling_options.fairing_continuity as usize);
        let neighborhoods = partitioner.neighborhoods(&to_fill);
        // Partitions feed the filling pool, not the detection pool -- size
        // the split to however many filling workers will actually consume it.
        let partitions = partitioner.partition(
            &neighborhoods,
            thread_manager.get_filling_threads(),
            config.filling_options.min_partition_boundary_edges,
        );

        debug_dump::dump_mesh_step("partition_input", mesh);

        let submeshes: Vec<_> = partitions
            .iter()
            .map(|indices| SubmeshExtractor::extract_partition(mesh, indices, &to_fill, &neighborhoods))
            .collect();
        for (i, s) in submeshes.iter().enumerate() {
            debug_dump::dump_partition_step("partition_unfilled", i, &s.mesh);
        }

        thread_manager.enter_filling_phase();
        let parallel = ParallelFiller::new(
            thread_manager.filling_pool(),
            filler,
            config.filling_options.eligibility(),
            config.filling_options.fill_params(),
        );
        let filled = parallel.fill_all(submeshes, &config.cancel_token);

        for (i, f) in filled.iter().enumerate() {
            debug_dump::dump_partition_step("partition_filled", i, &f.submesh.mesh);
        }
        stats.hole_results.extend(filled.iter().flat_map(|f| f.hole_results.clone()));

        thread_manager.enter_pipeline_phase();

        let submeshes: Vec<_> = filled.into_iter().map(|f| f.submesh).collect();
        let merge_options = MergeOptions {
            holes_only,
            keep_largest_component: config.filling_options.keep_largest_component,
            non_manifold_passes: config.preprocess_opt.non_manifold_passes,
        };
        let (merged, merge_stats) = Merger::merge(mesh, submeshes, merge_options)
            .map_err(|e| PipelineError::stage(RepairStage::Process, &config.input_path, e))?;

        stats.duplicate_points_merged += merge_stats.duplicate_points_merged;
        stats.duplicate_polygons_removed += merge_stats.duplicate_polygons_removed;
        stats.non_manifold_polygons_removed += merge_stats.non_manifold_polygons_removed;
        stats.isolated_vertices_removed += merge_stats.isolated_vertices_removed;

        *mesh = merged;
        Ok(())
    }

    /// Sequential detect-then-fill over the whole mesh at once, with no
    /// partitioning and no parallelism beyond the single filling worker. The
    /// baseline the partitioned path is checked against.
    fn fill_legacy(
        config: &RepairJobConfig,
        mesh: &mut HalfEdgeMesh,
        holes: Vec<HoleInfo>,
        filler: &dyn FillOperator,
        stats: &mut MeshStatistics,
    ) -> std::result::Result<(), PipelineError> {
        let (protected, to_fill) = Self::split_protected_holes(config, mesh, holes);
        stats.hole_results.extend(protected);

        let diagonal = config.filling_options.reference_bbox_diagonal.unwrap_or_else(|| mesh.bounding_box_diagonal());
        let eligibility = config.filling_options.eligibility();
        let params = config.filling_options.fill_params();

        for hole in to_fill {
            if config.cancel_token.is_cancelled() {
                stats.hole_results.push(HoleResult {
                    boundary_size: hole.boundary_size,
                    outcome: HoleOutcome::Cancelled,
                    added_vertices: 0,
                    added_faces: 0,
                    error_message: None,
                });
                continue;
            }
            if boundary_or_diameter_ineligible(&eligibility, hole.boundary_size, hole.diameter, diagonal) {
                stats.hole_results.push(HoleResult {
                    boundary_size: hole.boundary_size,
                    outcome: HoleOutcome::Skipped,
                    added_vertices: 0,
                    added_faces: 0,
                    error_message: None,
                });
                continue;
            }
            let outcome = filler.fill(mesh, &hole, params);
            stats.hole_results.push(HoleResult {
                boundary_size: hole.boundary_size,
                outcome: if outcome.success { HoleOutcome::Filled } else { HoleOutcome::Failed },
                added_vertices: outcome.added_vertices,
                added_faces: outcome.added_faces,
                error_message: if outcome.success { None } else { Some("filler reported failure".to_string()) },
            });
        }

        if config.filling_options.keep_largest_component {
            let kept = crate::soup_repair::keep_largest_component(mesh)
                .map_err(|e| PipelineError::stage(RepairStage::Process, &config.input_path, e))?;
            *mesh = kept;
        }

        Ok(())
    }

    /// Splits `holes` into ones protected by `guard_selection_boundary` and
    /// ones eligible for filling. A hole is protected when any of its
    /// boundary vertices lies within epsilon of one of the caller-supplied
    /// selection points -- ids don't survive preprocessing, but positions do.
    /// Protected holes are recorded as `Skipped` up front so they never
    /// reach a filler.
    fn split_protected_holes(config: &RepairJobConfig, mesh: &HalfEdgeMesh, holes: Vec<HoleInfo>) -> (Vec<HoleResult>, Vec<HoleInfo>) {
        if !config.filling_options.guard_selection_boundary || config.filling_options.selection_boundary_vertices.is_empty() {
            return (Vec::new(), holes);
        }

        const EPSILON: f64 = 1e-6;
        let selection: Vec<DVec3> = config
            .filling_options
            .selection_boundary_vertices
            .iter()
            .map(|&[x, y, z]| DVec3::new(x, y, z))
            .collect();

        let mut protected = Vec::new();
        let mut to_fill = Vec::new();

        for hole in holes {
            let is_protected = hole.boundary_vertices.iter().any(|&v| {
                let p = mesh.position(v);
                selection.iter().any(|&s| (p - s).length() <= EPSILON)
            });
            if is_protected {
                protected.push(HoleResult {
                    boundary_size: hole.boundary_size,
                    outcome: HoleOutcome::Skipped,
                    added_vertices: 0,
                    added_faces: 0,
                    error_message: Some("protected by selection boundary".to_string()),
                });
            } else {
                to_fill.push(hole);
            }
        }
        (protected, to_fill)
    }

    fn check_cancel(config: &RepairJobConfig) -> std::result::Result<(), PipelineError> {
        if config.cancel_token.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn boundary_or_diameter_ineligible(eligibility: &FillEligibility, boundary_size: usize, diameter: f64, mesh_diagonal: f64) -> bool {
    boundary_size > eligibility.max_hole_boundary_vertices
        || (mesh_diagonal > 0.0 && diameter / mesh_diagonal > eligibility.max_hole_diameter_ratio)
}

enum PipelineError {
    Cancelled,
    Stage(StageError),
}

impl PipelineError {
    fn stage(stage: RepairStage, input: impl std::fmt::Display, detail: impl std::fmt::Display) -> Self {
        PipelineError::Stage(StageError::new(stage, input.to_string(), detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_cube_minus_face_obj(path: &std::path::Path) {
        let obj = "\
v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 0 0 1\nv 1 0 1\nv 1 1 1\nv 0 1 1\n\
f 5 7 6\nf 5 8 7\nf 1 2 6\nf 1 6 5\nf 2 3 7\nf 2 7 6\nf 3 4 8\nf 3 8 7\nf 4 1 5\nf 4 5 8\n";
        std::fs::write(path, obj).unwrap();
    }

    #[test]
    fn end_to_end_job_fills_the_hole_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cube.obj");
        let output = dir.path().join("cube_repaired.obj");
        write_cube_minus_face_obj(&input);

        let config = RepairJobConfig {
            input_path: input,
            output_path: output.clone(),
            thread_count: 2,
            ..RepairJobConfig::default()
        };

        let result = PerMeshPipeline::run(&config).unwrap();
        assert_eq!(result.status, RepairJobStatus::Ok);
        assert_eq!(result.stats.num_holes_detected, 1);
        assert_eq!(result.stats.final_vertices, 8);
        assert_eq!(result.stats.final_faces, 12);
        assert!(output.exists());
    }

    #[test]
    fn legacy_strategy_also_fills_the_hole() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cube.obj");
        let output = dir.path().join("cube_repaired.obj");
        write_cube_minus_face_obj(&input);

        let config = RepairJobConfig {
            input_path: input,
            output_path: output,
            use_partitioned: false,
            ..RepairJobConfig::default()
        };

        let result = PerMeshPipeline::run(&config).unwrap();
        assert_eq!(result.status, RepairJobStatus::Ok);
        assert_eq!(result.stats.final_faces, 12);
    }

    #[test]
    fn missing_input_reports_load_failed() {
        let config = RepairJobConfig::in_memory_noop();
        let result = PerMeshPipeline::run(&config).unwrap();
        assert_eq!(result.status, RepairJobStatus::LoadFailed);
        assert!(result.error.is_some());
    }

    #[test]
    fn pre_cancelled_job_reports_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cube.obj");
        write_cube_minus_face_obj(&input);

        let mut config = RepairJobConfig {
            input_path: input,
            output_path: dir.path().join("out.obj"),
            ..RepairJobConfig::default()
        };
        config.cancel_token.cancel();

        let result = PerMeshPipeline::run(&config).unwrap();
        assert_eq!(result.status, RepairJobStatus::Cancelled);
    }

    #[test]
    fn toml_overlay_rejects_unknown_keys() {
        let mut config = RepairJobConfig::default();
        let err = config.merge_toml("bogus_field = true").unwrap_err();
        assert!(err.to_string().contains("bogus_field") || err.to_string().to_lowercase().contains("unknown"));
    }

    #[test]
    fn toml_overlay_applies_known_fields() {
        let mut config = RepairJobConfig::default();
        config.merge_toml("use_partitioned = false\nthread_count = 4").unwrap();
        assert!(!config.use_partitioned);
        assert_eq!(config.thread_count, 4);
    }
}
