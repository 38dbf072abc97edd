//! Extension properties: data attached to a core property under an
//! extension name.

use super::property::{get_ref, set_ref};
use super::{Property, PropertyType};
use crate::document::Document;
use crate::graph::{LinkMeta, NodeId, Value};
use crate::util::Result;

/// A property defined by an [`Extension`](crate::extensions::Extension).
///
/// The node label is the extension name, so one handle type serves every
/// extension. Attributes are free-form: each extension decides which
/// literals and references it stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionProperty(pub(crate) NodeId);

impl Property for ExtensionProperty {
    #[inline]
    fn id(self) -> NodeId {
        self.0
    }

    #[inline]
    fn from_id(id: NodeId) -> Self {
        Self(id)
    }

    #[inline]
    fn accepts(ty: PropertyType) -> bool {
        matches!(ty, PropertyType::Extension(_))
    }
}

impl ExtensionProperty {
    pub fn extension_name(self, doc: &Document) -> &'static str {
        doc.graph().node(self.0).label()
    }

    pub fn get<'a>(self, doc: &'a Document, attr: &str) -> Option<&'a Value> {
        doc.graph().get(self.0, attr)
    }

    pub fn get_f32(self, doc: &Document, attr: &str) -> Option<f32> {
        self.get(doc, attr).and_then(Value::as_float)
    }

    pub fn set(self, doc: &mut Document, attr: &'static str, value: impl Into<Value>) {
        doc.graph_mut().set(self.0, attr, value);
    }

    pub fn get_ref<P: Property>(self, doc: &Document, attr: &str) -> Option<P> {
        get_ref(doc, self.0, attr)
    }

    pub fn set_ref<P: Property>(self, doc: &mut Document, attr: &'static str, child: Option<P>, meta: LinkMeta) -> Result<()> {
        set_ref(doc, self.0, attr, child, meta)
    }
}
