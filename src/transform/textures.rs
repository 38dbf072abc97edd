//! Parallel texture compression through a caller-supplied encoder.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::Transform;
use crate::document::Document;
use crate::io::is_data_uri;
use crate::properties::Texture;
use crate::util::image::extension_for_mime;
use crate::util::{Error, Result};

/// Encoder taking image bytes and MIME type, returning new bytes and MIME type.
pub type Compressor = dyn Fn(&[u8], &str) -> Result<(Vec<u8>, String)> + Send + Sync;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureCompressOptions {
    /// Worker threads; 0 uses rayon's default
    pub concurrency: usize,
    /// Abort on the first failure instead of skipping the texture
    pub fail_fast: bool,
    /// Only textures of this MIME type
    pub filter: Option<String>,
}

impl Default for TextureCompressOptions {
    fn default() -> Self {
        Self {
            concurrency: 0,
            fail_fast: true,
            filter: None,
        }
    }
}

/// One texture's input, copied out of the document for the workers.
struct Job {
    index: usize,
    texture: Texture,
    image: Vec<u8>,
    mime: String,
}

type Outcome = (usize, Texture, Result<(Vec<u8>, String)>);

fn run(compressor: &Compressor, job: Job) -> Outcome {
    let result = compressor(&job.image, &job.mime).map_err(|e| Error::ExternalTool {
        entity: format!("texture {}", job.index),
        message: e.to_string(),
    });
    (job.index, job.texture, result)
}

/// `uri` with its file extension replaced by the one `mime` implies.
fn with_extension(uri: &str, mime: &str) -> String {
    let name_start = uri.rfind('/').map_or(0, |i| i + 1);
    let stem = match uri[name_start..].rfind('.') {
        Some(dot) => &uri[..name_start + dot],
        None => uri,
    };
    format!("{stem}.{}", extension_for_mime(mime))
}

/// Compress every texture with an image, optionally filtered by MIME type.
///
/// Encoding runs on a dedicated rayon pool; results are written back in
/// texture order once all jobs finish. With `fail_fast` the first failure
/// is returned and the document is left unchanged; otherwise failed
/// textures are logged and keep their original image. Returns the number
/// of textures replaced.
pub fn compress_textures(
    doc: &mut Document,
    compressor: &Compressor,
    options: &TextureCompressOptions,
) -> Result<usize> {
    let with_image: Vec<(usize, Texture)> = doc
        .root()
        .list_textures(doc)
        .into_iter()
        .enumerate()
        .filter(|(_, t)| !t.image(doc).is_empty())
        .collect();
    let available = with_image.len();
    let jobs: Vec<Job> = with_image
        .into_iter()
        .filter(|(_, t)| options.filter.as_deref().map_or(true, |m| t.mime_type(doc) == m))
        .map(|(index, texture)| Job {
            index,
            texture,
            image: texture.image(doc).to_vec(),
            mime: texture.mime_type(doc).to_string(),
        })
        .collect();
    if jobs.len() < available {
        debug!(
            skipped = available - jobs.len(),
            filter = options.filter.as_deref().unwrap_or(""),
            "textures excluded by filter"
        );
    }
    if jobs.is_empty() {
        return Ok(0);
    }
    debug!(textures = jobs.len(), threads = options.concurrency, "compressing textures");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency)
        .build()
        .map_err(|e| Error::other(format!("cannot start texture workers: {e}")))?;

    let outcomes: Vec<Outcome> = if options.fail_fast {
        pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    let (index, texture, result) = run(compressor, job);
                    result.map(|out| (index, texture, Ok(out)))
                })
                .collect::<Result<Vec<_>>>()
        })?
    } else {
        pool.install(|| jobs.into_par_iter().map(|job| run(compressor, job)).collect::<Vec<_>>())
    };

    let mut replaced = 0;
    for (index, texture, result) in outcomes {
        match result {
            Ok((image, mime)) => {
                let renamed = texture
                    .uri(doc)
                    .filter(|u| !is_data_uri(u))
                    .map(|u| with_extension(u, &mime));
                if renamed.is_some() {
                    texture.set_uri(doc, renamed);
                }
                texture.set_image(doc, image);
                texture.set_mime_type(doc, mime);
                replaced += 1;
            }
            Err(e) => warn!(texture = index, error = %e, "texture compression skipped"),
        }
    }
    info!(replaced, "texture compression finished");
    Ok(replaced)
}

/// [`compress_textures`] as a [`Transform`].
#[derive(Clone)]
pub struct CompressTextures {
    pub compressor: Arc<Compressor>,
    pub options: TextureCompressOptions,
}

impl CompressTextures {
    pub fn new(compressor: Arc<Compressor>) -> Self {
        Self {
            compressor,
            options: TextureCompressOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TextureCompressOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for CompressTextures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressTextures").field("options", &self.options).finish()
    }
}

impl Transform for CompressTextures {
    fn name(&self) -> &str {
        "compress_textures"
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        compress_textures(doc, self.compressor.as_ref(), &self.options).map(|_| ())
    }
}
