// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios run through the real OBJ loader/saver and the
//! public pipeline/queue API, exercising the whole repair job rather than
//! any one module in isolation.

use meshmend::error::RepairJobStatus;
use meshmend::pipeline::{PerMeshPipeline, RepairJobConfig};
use meshmend::queue::RepairQueue;

const CLOSED_CUBE_OBJ: &str = "\
v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 0 0 1\nv 1 0 1\nv 1 1 1\nv 0 1 1\n\
f 5 7 6\nf 5 8 7\nf 1 2 6\nf 1 6 5\nf 2 3 7\nf 2 7 6\nf 3 4 8\nf 3 8 7\nf 4 1 5\nf 4 5 8\nf 1 4 3\nf 1 3 2\n";

const CUBE_MISSING_FACE_OBJ: &str = "\
v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 0 0 1\nv 1 0 1\nv 1 1 1\nv 0 1 1\n\
f 5 7 6\nf 5 8 7\nf 1 2 6\nf 1 6 5\nf 2 3 7\nf 2 7 6\nf 3 4 8\nf 3 8 7\nf 4 1 5\nf 4 5 8\n";

fn shell(shift: f64) -> String {
    let v = |x: f64, y: f64, z: f64| format!("v {} {} {}\n", x + shift, y, z);
    let mut s = String::new();
    s += &v(0.0, 0.0, 0.0);
    s += &v(1.0, 0.0, 0.0);
    s += &v(1.0, 1.0, 0.0);
    s += &v(0.0, 1.0, 0.0);
    s += &v(0.0, 0.0, 1.0);
    s += &v(1.0, 0.0, 1.0);
    s += &v(1.0, 1.0, 1.0);
    s += &v(0.0, 1.0, 1.0);
    s
}

fn write(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn s1_closed_cube_has_no_holes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.obj", CLOSED_CUBE_OBJ);
    let output = dir.path().join("out.obj");

    let config = RepairJobConfig {
        input_path: input,
        output_path: output,
        enable_preprocessing: false,
        ..RepairJobConfig::default()
    };
    let result = PerMeshPipeline::run(&config).unwrap();

    assert_eq!(result.status, RepairJobStatus::Ok);
    assert_eq!(result.stats.num_holes_detected, 0);
    assert_eq!(result.stats.final_vertices, 8);
    assert_eq!(result.stats.final_faces, 12);
}

#[test]
fn s2_cube_missing_one_face_gets_filled() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.obj", CUBE_MISSING_FACE_OBJ);
    let output = dir.path().join("out.obj");

    let config = RepairJobConfig {
        input_path: input,
        output_path: output,
        enable_preprocessing: false,
        ..RepairJobConfig::default()
    };
    let result = PerMeshPipeline::run(&config).unwrap();

    assert_eq!(result.status, RepairJobStatus::Ok);
    assert_eq!(result.stats.num_holes_detected, 1);
    assert_eq!(result.stats.hole_results[0].boundary_size, 4);
    assert_eq!(result.stats.num_holes_filled, 1);
    assert_eq!(result.stats.final_vertices, 8);
    assert_eq!(result.stats.final_faces, 12);
}

#[test]
fn s3_oversized_hole_is_skipped_not_filled() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.obj", CUBE_MISSING_FACE_OBJ);
    let output = dir.path().join("out.obj");

    let mut config = RepairJobConfig {
        input_path: input,
        output_path: output,
        enable_preprocessing: false,
        ..RepairJobConfig::default()
    };
    config.filling_options.max_hole_boundary_vertices = 3;

    let result = PerMeshPipeline::run(&config).unwrap();

    assert_eq!(result.status, RepairJobStatus::Ok);
    assert_eq!(result.stats.num_holes_skipped, 1);
    assert_eq!(result.stats.num_holes_filled, 0);
    assert_eq!(result.stats.final_vertices, 8);
    assert_eq!(result.stats.final_faces, 10);
}

#[test]
fn s4_two_disjoint_shells_partition_and_fill_independently() {
    let dir = tempfile::tempdir().unwrap();
    let local: [[u32; 3]; 10] = [
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
    let mut obj = String::new();
    obj += &shell(0.0);
    obj += &shell(10.0);
    for base in [0u32, 8] {
        for tri in local {
            obj += &format!("f {} {} {}\n", base + tri[0] + 1, base + tri[1] + 1, base + tri[2] + 1);
        }
    }

    let input = write(dir.path(), "in.obj", &obj);
    let output = dir.path().join("out.obj");

    let config = RepairJobConfig {
        input_path: input,
        output_path: output,
        enable_preprocessing: false,
        thread_count: 4,
        ..RepairJobConfig::default()
    };
    let result = PerMeshPipeline::run(&config).unwrap();

    assert_eq!(result.status, RepairJobStatus::Ok);
    assert_eq!(result.stats.num_holes_detected, 2);
    assert_eq!(result.stats.num_holes_filled, 2);
    assert_eq!(result.stats.final_vertices, 16);
    assert_eq!(result.stats.final_faces, 24);
}

#[test]
fn s5_duplicate_vertices_are_merged_before_filling() {
    let dir = tempfile::tempdir().unwrap();
    // Every one of the 8 cube vertices listed twice; faces reference only
    // the first copy of each, so dedup must fold the second copy away.
    let mut obj = String::new();
    for line in CLOSED_CUBE_OBJ.lines().filter(|l| l.starts_with("v ")) {
        obj += line;
        obj += "\n";
    }
    for line in CLOSED_CUBE_OBJ.lines().filter(|l| l.starts_with("v ")) {
        obj += line;
        obj += "\n";
    }
    for line in CLOSED_CUBE_OBJ.lines().filter(|l| l.starts_with("f ")) {
        obj += line;
        obj += "\n";
    }

    let input = write(dir.path(), "in.obj", &obj);
    let output = dir.path().join("out.obj");

    let config = RepairJobConfig {
        input_path: input,
        output_path: output,
        ..RepairJobConfig::default()
    };
    let result = PerMeshPipeline::run(&config).unwrap();

    assert_eq!(result.status, RepairJobStatus::Ok);
    assert_eq!(result.stats.duplicate_points_merged, 8);
    assert_eq!(result.stats.num_holes_detected, 0);
    assert_eq!(result.stats.final_vertices, 8);
    assert_eq!(result.stats.final_faces, 12);
}

#[test]
fn s6_batch_queue_backpressure_and_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.obj", CUBE_MISSING_FACE_OBJ);

    let mut queue = RepairQueue::new(4, 2);
    let mut accepted_ids = Vec::new();

    for i in 0..10 {
        let config = RepairJobConfig {
            input_path: input.clone(),
            output_path: dir.path().join(format!("out_{i}.obj")),
            enable_preprocessing: false,
            ..RepairJobConfig::default()
        };
        let (accepted, job_id) = queue.enqueue(config);
        if accepted {
            accepted_ids.push(job_id);
        } else {
            // Drain one result to make room, then retry the same job.
            assert!(queue.pop_result(true).is_some());
            let config_retry = RepairJobConfig {
                input_path: input.clone(),
                output_path: dir.path().join(format!("out_{i}.obj")),
                enable_preprocessing: false,
                ..RepairJobConfig::default()
            };
            let (accepted, job_id) = queue.enqueue(config_retry);
            assert!(accepted);
            accepted_ids.push(job_id);
        }
    }

    let mut completed = 0;
    for _ in 0..accepted_ids.len() {
        let result = queue.pop_result(true).unwrap();
        assert_eq!(result.status, RepairJobStatus::Ok);
        completed += 1;
    }
    assert_eq!(completed, accepted_ids.len());

    let mut sorted_ids = accepted_ids.clone();
    sorted_ids.sort_unstable();
    sorted_ids.dedup();
    assert_eq!(sorted_ids.len(), accepted_ids.len(), "job ids must be distinct");

    queue.shutdown();
}
