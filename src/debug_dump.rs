// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Optional OBJ snapshots of intermediate pipeline state, for diagnosing a
//! mesh that repairs badly. Disabled (a no-op) unless [`set_base_dir`] has
//! been called for this process.

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::io;
use crate::soup::PolygonSoup;

static BASE_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Enables dumping for the rest of the process's lifetime. Only the first
/// call has any effect; later calls are ignored.
pub fn set_base_dir(dir: PathBuf) {
    let _ = BASE_DIR.set(Some(dir));
}

fn is_enabled() -> bool {
    matches!(BASE_DIR.get(), Some(Some(_)))
}

/// Writes `soup` as `<base_dir>/<step_name>.obj`. Logs and swallows any I/O
/// error rather than failing the job over a diagnostic artifact.
pub fn dump_step(step_name: &str, soup: &PolygonSoup) {
    let Some(Some(dir)) = BASE_DIR.get() else {
        return;
    };
    if let Err(err) = std::fs::create_dir_all(dir) {
        tracing::warn!("debug_dump: could not create {}: {err}", dir.display());
        return;
    }
    let path = dir.join(format!("{step_name}.obj"));
    if let Err(err) = io::obj::save(&path, soup) {
        tracing::warn!("debug_dump: could not write {}: {err}", path.display());
    }
}

/// Convenience for dumping a [`crate::mesh::HalfEdgeMesh`] step.
pub fn dump_mesh_step(step_name: &str, mesh: &crate::mesh::HalfEdgeMesh) {
    if is_enabled() {
        dump_step(step_name, &PolygonSoup::from(mesh));
    }
}

/// Dumps one numbered submesh (e.g. `partition_003_unfilled`).
pub fn dump_partition_step(step_name: &str, index: usize, mesh: &crate::mesh::HalfEdgeMesh) {
    if is_enabled() {
        dump_mesh_step(&format!("{step_name}_{index:03}"), mesh);
    }
}
