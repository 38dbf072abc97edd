//! Error types for the glTF property graph and codec.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for graph, document and codec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of a binary container
    #[error("Invalid GLB file: expected 'glTF' magic bytes")]
    InvalidMagic,

    /// Unsupported container version
    #[error("Unsupported GLB version: {0}")]
    UnsupportedVersion(u32),

    /// Container is truncated
    #[error("Unexpected end of data at byte {0}")]
    UnexpectedEof(u64),

    /// Invalid manifest or container structure
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Manifest references an index past the end of its array
    #[error("{kind} index {index} out of range (count: {count})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    /// A required container chunk is absent
    #[error("Missing {0} chunk")]
    MissingChunk(&'static str),

    /// Extension is required by the asset but not registered with the reader
    #[error("Unsupported required extension: {0}")]
    UnsupportedExtension(String),

    /// Two nodes from different graphs were linked
    #[error("Cannot link nodes belonging to different graphs")]
    CrossGraph,

    /// Operation on a disposed node
    #[error("{0} has been disposed")]
    Disposed(String),

    /// Extension property attached to a parent type it does not allow
    #[error("Extension {extension} cannot be attached to {parent}")]
    InvalidParentType {
        extension: String,
        parent: String,
    },

    /// Extension is not registered with the document
    #[error("Extension not registered with document: {0}")]
    UnknownExtension(String),

    /// Primitive attributes disagree on vertex count
    #[error("Vertex count mismatch for {semantic}: expected {expected}, got {actual}")]
    VertexCountMismatch {
        semantic: String,
        expected: usize,
        actual: usize,
    },

    /// Primitives of one mesh disagree on morph target count
    #[error("Morph target count mismatch: expected {expected}, got {actual}")]
    TargetCountMismatch { expected: usize, actual: usize },

    /// Array length is not a multiple of the element size
    #[error("Array length {len} is not a multiple of element size {element_size}")]
    InvalidArrayLength { len: usize, element_size: usize },

    /// Type mismatch when reading or writing data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Property type cannot be copied through the generic copy path
    #[error("{0} cannot be copied; clone the whole document instead")]
    NotCopyable(&'static str),

    /// Copy resolver had no mapping for a referenced node
    #[error("Unresolved reference to {0} during copy")]
    UnresolvedReference(String),

    /// Node hierarchy would contain a cycle
    #[error("Adding {child} under {parent} would create a cycle")]
    Cycle { parent: String, child: String },

    /// Accessor is used in incompatible buffer usage classes
    #[error("Accessor {accessor} used as both {first} and {second}")]
    UsageConflict {
        accessor: String,
        first: &'static str,
        second: &'static str,
    },

    /// External tool (compressor, encoder) failed for one entity
    #[error("{entity} failed: {message}")]
    ExternalTool { entity: String, message: String },

    /// A transform aborted
    #[error("Transform '{name}' failed: {source}")]
    Transform {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON manifest error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data URI payload is not valid base64
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an out-of-range index error.
    pub fn out_of_range(kind: &'static str, index: usize, count: usize) -> Self {
        Self::IndexOutOfRange { kind, index, count }
    }

    /// True for malformed-input errors raised while reading a container.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic
                | Self::UnsupportedVersion(_)
                | Self::UnexpectedEof(_)
                | Self::InvalidStructure(_)
                | Self::IndexOutOfRange { .. }
                | Self::MissingChunk(_)
                | Self::UnsupportedExtension(_)
                | Self::Json(_)
                | Self::Base64(_)
        )
    }
}

/// Result type alias for graph and codec operations.
pub type Result<T> = std::result::Result<T, Error>;
