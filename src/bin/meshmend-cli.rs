// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `meshmend repair <input> <output>`: runs one job at a time through a
//! capacity-1 `RepairQueue` and prints its statistics report.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use meshmend::config::{build_config, CliOverrides};
use meshmend::queue::RepairQueue;

#[derive(Parser)]
#[command(name = "meshmend", version, about = "A concurrent triangle-mesh hole-repair engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repair a single mesh file.
    Repair {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        threads: Option<usize>,

        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(long)]
        holes_only: bool,

        #[arg(long)]
        legacy: bool,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        verbose: bool,

        #[arg(long)]
        debug: bool,

        #[arg(long)]
        debug_dump: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Command::Repair {
        input,
        output,
        threads,
        timeout_ms,
        holes_only,
        legacy,
        config,
        verbose,
        debug,
        debug_dump,
    } = cli.command;

    if let Err(err) = meshmend::logging::init_subscriber(verbose, debug) {
        eprintln!("warning: {err}");
    }

    let overrides = CliOverrides {
        input_path: Some(input),
        output_path: Some(output),
        thread_count: threads,
        timeout_ms,
        holes_only: holes_only.then_some(true),
        use_partitioned: legacy.then_some(false),
        verbose,
        debug,
        debug_dump_dir: debug_dump,
    };

    let job_config = match build_config(config.as_deref(), overrides) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("error: invalid configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut queue = RepairQueue::new(1, 1);
    let (accepted, _job_id) = queue.enqueue(job_config);
    if !accepted {
        eprintln!("error: could not enqueue job");
        return ExitCode::FAILURE;
    }

    let Some(completed) = queue.pop_result(true) else {
        eprintln!("error: worker exited without producing a result");
        return ExitCode::FAILURE;
    };

    print!("{}", completed.stats.to_report_string(completed.status));

    if completed.status.is_success() {
        ExitCode::SUCCESS
    } else {
        if let Some(err) = &completed.error {
            eprintln!("error: {err}");
        }
        ExitCode::FAILURE
    }
}
