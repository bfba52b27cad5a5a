use std::fmt;

use crate::config::StateKind;
use crate::gpu::BackendError;

/// Every way a bake can fail. All are detected before any frame runs
/// against the result.
#[derive(Debug, Clone, PartialEq)]
pub enum BakeError {
    /// A pass samples a target with no earlier producer and no seed.
    UnresolvedRead {
        /// Offending pass.
        pass: String,
        /// Sampled target.
        target: String,
    },
    /// A pass references a target that is not registered.
    UnknownTarget {
        /// Offending pass.
        pass: String,
        /// Referenced name.
        target: String,
    },
    /// A physical target (declared or auxiliary) could not be created.
    TargetCreation {
        /// Target label.
        target: String,
        /// Backend failure.
        source: BackendError,
    },
    /// Simultaneous outputs of one pass resolve to different sizes.
    DimensionMismatch {
        /// Offending pass.
        pass: String,
        /// First output.
        target: String,
        /// Its size.
        size: (u32, u32),
        /// Disagreeing output.
        other: String,
        /// Its size.
        other_size: (u32, u32),
    },
    /// A pass would read and write the same physical buffer.
    ReadWriteHazard {
        /// Offending pass.
        pass: String,
        /// Target both read and written.
        target: String,
    },
    /// A pass names a render state that is not declared.
    UnknownState {
        /// Offending pass.
        pass: String,
        /// State kind.
        kind: StateKind,
        /// Referenced name.
        name: String,
    },
    /// A state or pipeline object could not be created.
    StateCreation {
        /// State or technique label.
        name: String,
        /// Backend failure.
        source: BackendError,
    },
    /// Two targets share a name.
    DuplicateTarget(String),
    /// A target declaration is inconsistent.
    InvalidTarget {
        /// Target name.
        target: String,
        /// What is wrong.
        reason: String,
    },
    /// A pass declaration is inconsistent.
    InvalidPass {
        /// Pass name.
        pass: String,
        /// What is wrong.
        reason: String,
    },
    /// The active view set cannot be scheduled.
    InvalidViewSet {
        /// View set name.
        set: String,
        /// What is wrong.
        reason: String,
    },
}

impl fmt::Display for BakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedRead { pass, target } => write!(
                f,
                "pass '{pass}' samples '{target}' which has no earlier \
                 producer and no read_from seed"
            ),
            Self::UnknownTarget { pass, target } => {
                write!(f, "pass '{pass}' references unknown target '{target}'")
            }
            Self::TargetCreation { target, source } => {
                write!(f, "failed to create target '{target}': {source}")
            }
            Self::DimensionMismatch {
                pass,
                target,
                size,
                other,
                other_size,
            } => write!(
                f,
                "pass '{pass}' writes '{target}' ({}x{}) and '{other}' \
                 ({}x{}) simultaneously",
                size.0, size.1, other_size.0, other_size.1
            ),
            Self::ReadWriteHazard { pass, target } => write!(
                f,
                "pass '{pass}' reads and writes the same buffer for \
                 '{target}'"
            ),
            Self::UnknownState { pass, kind, name } => write!(
                f,
                "pass '{pass}' references unknown {} state '{name}'",
                kind.label()
            ),
            Self::StateCreation { name, source } => {
                write!(f, "failed to create state '{name}': {source}")
            }
            Self::DuplicateTarget(name) => {
                write!(f, "target '{name}' is declared more than once")
            }
            Self::InvalidTarget { target, reason } => {
                write!(f, "invalid target '{target}': {reason}")
            }
            Self::InvalidPass { pass, reason } => {
                write!(f, "invalid pass '{pass}': {reason}")
            }
            Self::InvalidViewSet { set, reason } => {
                write!(f, "invalid view set '{set}': {reason}")
            }
        }
    }
}

impl std::error::Error for BakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TargetCreation { source, .. }
            | Self::StateCreation { source, .. } => Some(source),
            _ => None,
        }
    }
}
