//! File-system entry points.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use tracing::{debug, info_span};

use super::context::Dependencies;
use super::format::{Format, GLB_MAGIC};
use super::reader::{parse_glb, read_document, JsonDocument};
use super::schema::Gltf;
use super::uri::{decode_uri_path, is_data_uri};
use super::writer::{write_document, write_glb, WriterOptions};
use crate::document::Document;
use crate::extensions::Extension;
use crate::util::{Error, Result};

/// Reader settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Memory-map input files instead of reading them into memory
    pub use_mmap: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { use_mmap: true }
    }
}

/// Bytes of an input file.
enum Loaded {
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Loaded {
    fn bytes(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mapped(m) => &m[..],
            Self::Owned(v) => v.as_slice(),
        }
    }
}

#[cfg(feature = "mmap")]
fn map_file(file: &File) -> Result<Option<Loaded>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // Safety: the file is opened read-only and the map is dropped before
    // the read call returns its document.
    let map = unsafe { Mmap::map(file) }?;
    Ok(Some(Loaded::Mapped(map)))
}

#[cfg(not(feature = "mmap"))]
fn map_file(_file: &File) -> Result<Option<Loaded>> {
    Ok(None)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Reads and writes documents, holding registered extensions, their
/// dependencies and an optional per-call logger.
///
/// ```no_run
/// use gltf_graph::io::Io;
///
/// let io = Io::new().register_extensions(gltf_graph::extensions::builtin());
/// let doc = io.read("scene.glb")?;
/// io.write("scene.gltf", &doc)?;
/// # Ok::<(), gltf_graph::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct Io {
    extensions: Vec<Arc<dyn Extension>>,
    dependencies: Arc<Dependencies>,
    reader: ReaderOptions,
    writer: WriterOptions,
    dispatch: Option<tracing::Dispatch>,
}

impl fmt::Debug for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Io")
            .field("extensions", &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("dependencies", &self.dependencies.keys().collect::<Vec<_>>())
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish()
    }
}

impl Io {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extensions understood by the reader; later registrations of the
    /// same name replace earlier ones.
    pub fn register_extensions(mut self, extensions: impl IntoIterator<Item = Arc<dyn Extension>>) -> Self {
        for ext in extensions {
            self.extensions.retain(|e| e.name() != ext.name());
            self.extensions.push(ext);
        }
        self
    }

    /// Add modules handed to extensions through the reader/writer contexts.
    pub fn register_dependencies(mut self, dependencies: Dependencies) -> Self {
        let mut merged = (*self.dependencies).clone();
        merged.extend(dependencies);
        self.dependencies = Arc::new(merged);
        self
    }

    /// Route this instance's log output to `dispatch` instead of the global
    /// subscriber.
    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_reader_options(mut self, options: ReaderOptions) -> Self {
        self.reader = options;
        self
    }

    pub fn with_writer_options(mut self, options: WriterOptions) -> Self {
        self.writer = options;
        self
    }

    pub fn writer_options(&self) -> &WriterOptions {
        &self.writer
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    fn load(&self, path: &Path) -> Result<Loaded> {
        let mut file = open(path)?;
        if self.reader.use_mmap {
            if let Some(mapped) = map_file(&file)? {
                return Ok(mapped);
            }
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Loaded::Owned(data))
    }

    /// Read a `.glb` or `.gltf` file; external resources are resolved
    /// relative to its directory.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Document> {
        let path = path.as_ref();
        self.scoped(|| {
            let _span = info_span!("read", path = %path.display()).entered();
            let loaded = self.load(path)?;
            let data = loaded.bytes();
            if data.len() >= 4 && data[..4] == GLB_MAGIC.to_le_bytes() {
                return self.read_glb_bytes(data);
            }
            let json: Gltf = serde_json::from_slice(data)?;
            let dir = path.parent().unwrap_or_else(|| Path::new(""));
            let resources = load_resources(&json, dir)?;
            read_document(&JsonDocument { json, resources }, &self.extensions, Arc::clone(&self.dependencies))
        })
    }

    fn read_glb_bytes(&self, data: &[u8]) -> Result<Document> {
        let input = parse_glb(data)?;
        read_document(&input, &self.extensions, Arc::clone(&self.dependencies))
    }

    /// Read GLB bytes.
    pub fn read_binary(&self, data: &[u8]) -> Result<Document> {
        self.scoped(|| {
            let _span = info_span!("read", bytes = data.len()).entered();
            self.read_glb_bytes(data)
        })
    }

    /// Read a manifest whose resources are already in memory.
    pub fn read_json(&self, input: &JsonDocument) -> Result<Document> {
        self.scoped(|| {
            let _span = info_span!("read", resources = input.resources.len()).entered();
            read_document(input, &self.extensions, Arc::clone(&self.dependencies))
        })
    }

    /// Write `doc` to `path`; the form follows the extension (`.glb` or not).
    /// The JSON form writes its resources next to the manifest.
    pub fn write(&self, path: impl AsRef<Path>, doc: &Document) -> Result<()> {
        let path = path.as_ref();
        match Format::from_path(path) {
            Format::Glb => {
                let data = self.write_binary(doc)?;
                fs::write(path, data)?;
            }
            Format::Json => {
                let basename = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&self.writer.basename)
                    .to_string();
                let out = self.write_json(doc, &basename)?;
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                fs::write(path, serde_json::to_vec_pretty(&out.json)?)?;
                for (uri, data) in &out.resources {
                    let target = dir.join(decode_uri_path(uri));
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&target, data)?;
                }
                debug!(path = %path.display(), resources = out.resources.len(), "wrote JSON form");
            }
        }
        Ok(())
    }

    /// Serialize `doc` as GLB bytes.
    pub fn write_binary(&self, doc: &Document) -> Result<Vec<u8>> {
        self.scoped(|| {
            let _span = info_span!("write", format = "glb").entered();
            write_glb(doc, &self.writer, Arc::clone(&self.dependencies))
        })
    }

    /// Serialize `doc` as a manifest plus named resources.
    pub fn write_json(&self, doc: &Document, basename: &str) -> Result<JsonDocument> {
        self.scoped(|| {
            let _span = info_span!("write", format = "json", basename).entered();
            let options = WriterOptions {
                format: Format::Json,
                basename: basename.to_string(),
                ..self.writer.clone()
            };
            write_document(doc, &options, Arc::clone(&self.dependencies))
        })
    }
}

/// Load every non-`data:` buffer and image URI of `json` from `dir`.
fn load_resources(json: &Gltf, dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let uris = json
        .buffers
        .iter()
        .filter_map(|b| b.uri.as_deref())
        .chain(json.images.iter().filter_map(|i| i.uri.as_deref()))
        .filter(|u| !is_data_uri(u));
    let mut resources = BTreeMap::new();
    for uri in uris {
        if resources.contains_key(uri) {
            continue;
        }
        let path = dir.join(decode_uri_path(uri));
        let data = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.clone())
            } else {
                Error::Io(e)
            }
        })?;
        resources.insert(uri.to_string(), data);
    }
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_missing_file() {
        let err = Io::new().read("/nonexistent/scene.glb").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let io = Io::new()
            .register_extensions(crate::extensions::builtin())
            .register_extensions(crate::extensions::builtin());
        assert_eq!(io.extensions.len(), 2);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_receives_phases() {
        let capture = Capture::default();
        let sink = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let io = Io::new().with_dispatch(tracing::Dispatch::new(subscriber));
        let doc = Document::new();
        let glb = io.write_binary(&doc).unwrap();
        io.read_binary(&glb).unwrap();
        let log = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("ReadJsonChunk"));
        assert!(log.contains("PlanLayout"));
    }
}
