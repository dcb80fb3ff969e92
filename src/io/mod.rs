// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File loading and saving. OBJ is the only format implemented; the module
//! is split out so a binary format can be added later without touching
//! callers.

pub mod obj;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::soup::PolygonSoup;

/// Loads `path` based on its extension, timing the read.
pub fn load(path: &Path) -> Result<(PolygonSoup, Duration)> {
    let t0 = Instant::now();
    let soup = match extension_of(path) {
        "obj" => obj::load(path).with_context(|| format!("loading {}", path.display()))?,
        other => bail!("unsupported input format: .{other}"),
    };
    Ok((soup, t0.elapsed()))
}

pub fn save(path: &Path, soup: &PolygonSoup) -> Result<()> {
    match extension_of(path) {
        "obj" => obj::save(path, soup),
        other => bail!("unsupported output format: .{other}"),
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}
