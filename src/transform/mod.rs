//! Document transforms.
//!
//! A [`Transform`] mutates a document in place. [`Document::transform`] runs a
//! list of them in order; [`Pipeline`] adds hooks around each step. Built-ins:
//!
//! - [`prune`]: drop properties nothing uses
//! - [`dedup`]: merge identical accessors, textures and materials
//! - [`unpartition`]: move all accessors into one buffer
//! - [`metadata`]: stamp generator and copyright
//! - [`compress_textures`]: run an external image compressor in parallel

mod dedup;
mod metadata;
mod prune;
mod textures;
mod unpartition;

pub use dedup::{dedup, Dedup, DedupOptions};
pub use metadata::{metadata, Metadata};
pub use prune::{prune, Prune, PruneOptions};
pub use textures::{compress_textures, CompressTextures, Compressor, TextureCompressOptions};
pub use unpartition::{unpartition, Unpartition};

use std::fmt;

use tracing::debug;

use crate::document::Document;
use crate::util::Result;

/// One step of document processing.
pub trait Transform {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn apply(&self, doc: &mut Document) -> Result<()>;
}

/// A named closure as a transform.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").field("name", &self.name).finish()
    }
}

/// Wrap `f` as a transform called `name`.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnTransform<F>
where
    F: Fn(&mut Document) -> Result<()>,
{
    FnTransform { name: name.into(), f }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&mut Document) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        (self.f)(doc)
    }
}

/// Called with the transform name and the document before or after a step.
pub type Hook<'a> = Box<dyn Fn(&str, &Document) + 'a>;

/// Ordered transforms with pre/post hooks. Runs sequentially; a failure
/// stops the run and keeps earlier changes.
#[derive(Default)]
pub struct Pipeline<'a> {
    steps: Vec<Box<dyn Transform + 'a>>,
    pre: Vec<Hook<'a>>,
    post: Vec<Hook<'a>>,
}

impl fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline").field("steps", &names).finish()
    }
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: impl Transform + 'a) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn before(mut self, hook: impl Fn(&str, &Document) + 'a) -> Self {
        self.pre.push(Box::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Fn(&str, &Document) + 'a) -> Self {
        self.post.push(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn run(&self, doc: &mut Document) -> Result<()> {
        for step in &self.steps {
            let name = step.name();
            self.pre.iter().for_each(|h| h(name, doc));
            doc.transform(&[step.as_ref()])?;
            self.post.iter().for_each(|h| h(name, doc));
        }
        debug!(steps = self.steps.len(), "pipeline finished");
        Ok(())
    }
}

impl Transform for Pipeline<'_> {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        self.run(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Error;
    use crate::properties::Property;
    use std::cell::RefCell;

    #[test]
    fn test_order_and_hooks() {
        let log = RefCell::new(Vec::new());
        let pipeline = Pipeline::new()
            .before(|name, _| log.borrow_mut().push(format!("pre {name}")))
            .after(|name, _| log.borrow_mut().push(format!("post {name}")))
            .then(from_fn("a", |doc| {
                doc.create_node("a");
                Ok(())
            }))
            .then(from_fn("b", |doc| {
                doc.create_node("b");
                Ok(())
            }));
        let mut doc = Document::new();
        pipeline.run(&mut doc).unwrap();
        let names: Vec<_> = doc
            .root()
            .list_nodes(&doc)
            .iter()
            .map(|n| n.name(&doc).to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(*log.borrow(), vec!["pre a", "post a", "pre b", "post b"]);
    }

    #[test]
    fn test_failure_keeps_earlier_changes() {
        let mut doc = Document::new();
        let first = from_fn("first", |doc| {
            doc.create_node("kept");
            Ok(())
        });
        let failing = from_fn("failing", |_| Err(Error::other("boom")));
        let never = from_fn("never", |doc| {
            doc.create_node("never");
            Ok(())
        });
        let err = doc.transform(&[&first, &failing, &never]).unwrap_err();
        assert!(matches!(err, Error::Transform { ref name, .. } if name == "failing"));
        assert_eq!(doc.root().list_nodes(&doc).len(), 1);
    }
}
