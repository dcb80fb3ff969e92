// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Public, typed error surface. Internal plumbing still uses `anyhow`
//! (see [`crate::prelude`]); this module only covers the few error shapes
//! that cross the crate boundary.

use std::fmt;

/// Which stage of the per-mesh pipeline produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RepairStage {
    #[error("load")]
    Load,
    #[error("preprocess")]
    Preprocess,
    #[error("validate")]
    Validate,
    #[error("process")]
    Process,
    #[error("save")]
    Save,
}

/// A stage-tagged failure, formatted as `"<Stage> failed (<input>): <detail>"`.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed ({input}): {detail}")]
pub struct StageError {
    pub stage: RepairStage,
    pub input: String,
    pub detail: String,
}

impl StageError {
    pub fn new(stage: RepairStage, input: impl Into<String>, detail: impl fmt::Display) -> Self {
        StageError {
            stage,
            input: input.into(),
            detail: detail.to_string(),
        }
    }
}

/// The terminal status of a completed repair job. Not itself an error type:
/// a value placed in [`crate::stats::RepairJobResult`] once the job stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairJobStatus {
    Ok,
    LoadFailed,
    PreprocessFailed,
    ValidationFailed,
    ProcessFailed,
    SaveFailed,
    Cancelled,
    InternalError,
}

impl RepairJobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RepairJobStatus::Ok)
    }
}

impl From<RepairStage> for RepairJobStatus {
    fn from(stage: RepairStage) -> Self {
        match stage {
            RepairStage::Load => RepairJobStatus::LoadFailed,
            RepairStage::Preprocess => RepairJobStatus::PreprocessFailed,
            RepairStage::Validate => RepairJobStatus::ValidationFailed,
            RepairStage::Process => RepairJobStatus::ProcessFailed,
            RepairStage::Save => RepairJobStatus::SaveFailed,
        }
    }
}

impl fmt::Display for RepairJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepairJobStatus::Ok => "Ok",
            RepairJobStatus::LoadFailed => "LoadFailed",
            RepairJobStatus::PreprocessFailed => "PreprocessFailed",
            RepairJobStatus::ValidationFailed => "ValidationFailed",
            RepairJobStatus::ProcessFailed => "ProcessFailed",
            RepairJobStatus::SaveFailed => "SaveFailed",
            RepairJobStatus::Cancelled => "Cancelled",
            RepairJobStatus::InternalError => "InternalError",
        };
        f.write_str(s)
    }
}
