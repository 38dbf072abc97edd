//! Container constants and layout options.

/// GLB magic, `glTF` read as a little-endian u32.
pub const GLB_MAGIC: u32 = 0x4654_6C67;

/// Supported GLB container version.
pub const GLB_VERSION: u32 = 2;

/// JSON chunk type (`JSON`).
pub const CHUNK_JSON: u32 = 0x4E4F_534A;

/// Binary chunk type (`BIN\0`).
pub const CHUNK_BIN: u32 = 0x004E_4942;

/// Size of the GLB file header.
pub const HEADER_SIZE: usize = 12;

/// Size of each chunk header (length + type).
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Alignment of chunks, buffer views and vertex strides.
pub const ALIGNMENT: usize = 4;

/// Round `n` up to the next multiple of 4.
#[inline]
pub const fn pad4(n: usize) -> usize {
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Output container form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// Single binary file with embedded JSON and BIN chunks
    #[default]
    Glb,
    /// JSON manifest plus external resources
    Json,
}

impl Format {
    /// Pick the form from a path extension (`.glb` or anything else).
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("glb") => Self::Glb,
            _ => Self::Json,
        }
    }
}

/// How vertex attributes of a primitive are packed into buffer views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// One strided view per primitive holding all its attributes
    #[default]
    Interleaved,
    /// One view per accessor, stride padded to 4 bytes
    Separate,
}
