use std::fmt;
use std::io;

use thiserror::Error;

/// Step of the transplant protocol, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransplantStep {
    CloneDestination,
    InspectDestination,
    CloneSource,
    StripHistory,
    InitHistory,
    AddRemote,
    FetchRemote,
    Stage,
    Commit,
    Push,
}

impl fmt::Display for TransplantStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CloneDestination => "clone destination",
            Self::InspectDestination => "inspect destination",
            Self::CloneSource => "clone starter",
            Self::StripHistory => "strip starter history",
            Self::InitHistory => "init history",
            Self::AddRemote => "add remote",
            Self::FetchRemote => "fetch remote",
            Self::Stage => "stage files",
            Self::Commit => "commit",
            Self::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TransplantError {
    #[error("failed to allocate scratch directory: {0}")]
    Scratch(#[source] io::Error),

    #[error("failed to start git for step '{step}': {source}")]
    Spawn {
        step: TransplantStep,
        #[source]
        source: io::Error,
    },

    #[error("git step '{step}' failed: {stderr}")]
    Command { step: TransplantStep, stderr: String },

    #[error("step '{step}' failed on the filesystem: {source}")]
    Filesystem {
        step: TransplantStep,
        #[source]
        source: io::Error,
    },

    #[error("failed to inspect destination clone: {0}")]
    Inspect(#[from] git2::Error),
}

impl TransplantError {
    pub fn step(&self) -> Option<TransplantStep> {
        match self {
            Self::Spawn { step, .. } | Self::Command { step, .. } | Self::Filesystem { step, .. } => {
                Some(*step)
            }
            Self::Inspect(_) => Some(TransplantStep::InspectDestination),
            Self::Scratch(_) => None,
        }
    }
}
