// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global `tracing` subscriber setup. The CLI (and any embedder) calls
//! [`init_subscriber`] once at startup; later calls are a no-op error, not a
//! panic, since a library being initialized twice by accident shouldn't
//! crash the host process.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// `verbose` raises the default level to `info`, `debug` raises it further
/// to `debug`. `MESHMEND_LOG` overrides both when set.
pub fn init_subscriber(verbose: bool, debug: bool) -> Result<(), &'static str> {
    let mut did_init = false;
    INITIALIZED.get_or_init(|| {
        let default_level = if debug {
            "debug"
        } else if verbose {
            "info"
        } else {
            "warn"
        };
        let filter = EnvFilter::try_from_env("MESHMEND_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
        did_init = true;
    });

    if did_init {
        Ok(())
    } else {
        Err("logging subscriber already initialized")
    }
}
