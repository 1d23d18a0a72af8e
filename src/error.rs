//! Error taxonomy for the diagram model and the project-file format.
//!
//! Model-level invariant violations (self-loops, duplicate pairs, unknown
//! ids) are *not* errors: the mutation operations on [`crate::types::Diagram`]
//! reject them through `bool`/`Option` returns. The variants here cover the
//! cases that have to be reported to a caller: bad element-type names coming
//! from the outside world, and persisted state that cannot be used.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by diagram construction and persistence.
#[derive(Error, Debug)]
pub enum DiagramError {
    /// A node-creation request named a type outside the supported set.
    #[error("unknown element type '{0}' (expected start, task or gateway)")]
    InvalidElementType(String),

    /// A persisted record is missing required fields or has the wrong shape.
    /// During a load the offending record is skipped, not fatal.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// An edge record references a node id that did not survive pass 1.
    #[error("edge {edge} references missing node {node}")]
    UnresolvedReference {
        /// Id of the edge record being resolved.
        edge: Uuid,
        /// The endpoint id that had no corresponding node.
        node: Uuid,
    },

    /// The file was written by a newer version of the format.
    #[error("unsupported file version {0} (newest supported is {current})", current = crate::persist::FORMAT_VERSION)]
    UnsupportedVersion(u32),

    /// The file is not valid JSON at all.
    #[error("failed to parse project file: {0}")]
    Json(#[from] serde_json::Error),
}
