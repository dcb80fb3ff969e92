// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembles a [`RepairJobConfig`] in three layers: hard defaults, an
//! optional TOML file, then CLI flags. Each layer only overrides what it
//! actually sets.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::pipeline::RepairJobConfig;

/// CLI-supplied overrides, applied last. `None` fields mean "not given on
/// the command line" and leave the prior layer's value untouched.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub thread_count: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub holes_only: Option<bool>,
    pub use_partitioned: Option<bool>,
    pub verbose: bool,
    pub debug: bool,
    pub debug_dump_dir: Option<PathBuf>,
}

/// Builds a job config from `config_file` (if given) overlaid with `cli`.
pub fn build_config(config_file: Option<&std::path::Path>, cli: CliOverrides) -> Result<RepairJobConfig> {
    let mut config = RepairJobConfig::default();

    if let Some(path) = config_file {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        config.merge_toml(&text).with_context(|| format!("parsing config file {}", path.display()))?;
    }

    if let Some(v) = cli.input_path {
        config.input_path = v;
    }
    if let Some(v) = cli.output_path {
        config.output_path = v;
    }
    if let Some(v) = cli.thread_count {
        config.thread_count = v;
    }
    if let Some(v) = cli.timeout_ms {
        config.timeout_ms = Some(v);
    }
    if let Some(v) = cli.holes_only {
        config.filling_options.holes_only = v;
    }
    if let Some(v) = cli.use_partitioned {
        config.use_partitioned = v;
    }
    if cli.verbose {
        config.verbose = true;
    }
    if let Some(dir) = cli.debug_dump_dir {
        config.debug_dump = true;
        config.temp_dir = Some(dir);
    }
    let _ = cli.debug;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("job.toml");
        std::fs::write(&config_path, "thread_count = 2\nuse_partitioned = false\n").unwrap();

        let cli = CliOverrides {
            thread_count: Some(8),
            ..Default::default()
        };
        let config = build_config(Some(&config_path), cli).unwrap();

        assert_eq!(config.thread_count, 8);
        assert!(!config.use_partitioned);
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = build_config(None, CliOverrides::default()).unwrap();
        assert!(config.use_partitioned);
        assert_eq!(config.thread_count, 0);
    }
}
