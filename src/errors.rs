use thiserror::Error;

use crate::ingest::IngestError;
use crate::kernel::ParseStatus;

/// Fallible outcomes of `Graph::init`/`Graph::build`. Anything past this
/// boundary — a kernel's own `forward` on an already-`Complete` graph — is
/// considered a fatal precondition violation and panics instead, matching
/// the original engine's abort-the-process semantics once a graph is live.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to ingest model: {0}")]
    Ingest(#[from] IngestError),
    #[error("operator {op_name:?} ({op_type:?}) failed to parse: {status:?}")]
    Parse { op_name: String, op_type: String, status: ParseStatus },
    #[error("graph has no sentinel named {0:?}")]
    MissingSentinel(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
