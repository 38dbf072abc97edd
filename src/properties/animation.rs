//! Keyframe animations.

use super::property::{get_ref, get_str, list_refs, parents_via, set_ref, AttrSpec};
use super::{Accessor, Node, PropertyType};
use crate::document::Document;
use crate::graph::{BufferUsage, LinkMeta, Value};
use crate::util::Result;

property_handle!(
    /// A set of channels played together.
    Animation => PropertyType::Animation
);

property_handle!(
    /// Binds a sampler to one animated property of a node.
    AnimationChannel => PropertyType::AnimationChannel
);

property_handle!(
    /// Keyframe times (`input`) and values (`output`) with an interpolation.
    AnimationSampler => PropertyType::AnimationSampler
);

pub(crate) const ANIMATION_ATTRS: &[AttrSpec] = &[AttrSpec::list("channels"), AttrSpec::list("samplers")];

pub(crate) const CHANNEL_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("targetPath", || Value::Null),
    AttrSpec::reference("targetNode"),
    AttrSpec::reference("sampler"),
];

pub(crate) const SAMPLER_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("interpolation", || Value::from(Interpolation::Linear.name())),
    AttrSpec::reference("input"),
    AttrSpec::reference("output"),
];

/// Node property driven by a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl TargetPath {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Rotation => "rotation",
            Self::Scale => "scale",
            Self::Weights => "weights",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Translation, Self::Rotation, Self::Scale, Self::Weights]
            .into_iter()
            .find(|p| p.name() == name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

impl Interpolation {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "LINEAR",
            Self::Step => "STEP",
            Self::CubicSpline => "CUBICSPLINE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Linear, Self::Step, Self::CubicSpline]
            .into_iter()
            .find(|i| i.name() == name)
    }
}

impl Animation {
    pub fn list_channels(self, doc: &Document) -> Vec<AnimationChannel> {
        list_refs(doc, self.0, "channels")
    }

    pub fn add_channel(self, doc: &mut Document, channel: AnimationChannel) -> Result<()> {
        doc.graph_mut()
            .push_ref(self.0, "channels", channel.0, LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_channel(self, doc: &mut Document, channel: AnimationChannel) {
        doc.graph_mut().remove_ref(self.0, "channels", channel.0);
    }

    pub fn list_samplers(self, doc: &Document) -> Vec<AnimationSampler> {
        list_refs(doc, self.0, "samplers")
    }

    pub fn add_sampler(self, doc: &mut Document, sampler: AnimationSampler) -> Result<()> {
        doc.graph_mut()
            .push_ref(self.0, "samplers", sampler.0, LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_sampler(self, doc: &mut Document, sampler: AnimationSampler) {
        doc.graph_mut().remove_ref(self.0, "samplers", sampler.0);
    }
}

impl AnimationChannel {
    pub fn target_path(self, doc: &Document) -> Option<TargetPath> {
        get_str(doc, self.0, "targetPath").and_then(TargetPath::from_name)
    }

    pub fn set_target_path(self, doc: &mut Document, path: Option<TargetPath>) {
        doc.graph_mut()
            .set(self.0, "targetPath", path.map(TargetPath::name));
    }

    pub fn target_node(self, doc: &Document) -> Option<Node> {
        get_ref(doc, self.0, "targetNode")
    }

    pub fn set_target_node(self, doc: &mut Document, node: Option<Node>) -> Result<()> {
        set_ref(doc, self.0, "targetNode", node, LinkMeta::default())
    }

    pub fn sampler(self, doc: &Document) -> Option<AnimationSampler> {
        get_ref(doc, self.0, "sampler")
    }

    pub fn set_sampler(self, doc: &mut Document, sampler: Option<AnimationSampler>) -> Result<()> {
        set_ref(doc, self.0, "sampler", sampler, LinkMeta::default())
    }

    pub fn list_animations(self, doc: &Document) -> Vec<Animation> {
        parents_via(doc, self.0, "channels")
    }
}

impl AnimationSampler {
    pub fn interpolation(self, doc: &Document) -> Interpolation {
        get_str(doc, self.0, "interpolation")
            .and_then(Interpolation::from_name)
            .unwrap_or_default()
    }

    pub fn set_interpolation(self, doc: &mut Document, interpolation: Interpolation) {
        doc.graph_mut()
            .set(self.0, "interpolation", interpolation.name());
    }

    /// Keyframe times.
    pub fn input(self, doc: &Document) -> Option<Accessor> {
        get_ref(doc, self.0, "input")
    }

    pub fn set_input(self, doc: &mut Document, input: Option<Accessor>) -> Result<()> {
        set_ref(doc, self.0, "input", input, LinkMeta::usage(BufferUsage::Other))
    }

    /// Keyframe values.
    pub fn output(self, doc: &Document) -> Option<Accessor> {
        get_ref(doc, self.0, "output")
    }

    pub fn set_output(self, doc: &mut Document, output: Option<Accessor>) -> Result<()> {
        set_ref(doc, self.0, "output", output, LinkMeta::usage(BufferUsage::Other))
    }

    pub fn list_animations(self, doc: &Document) -> Vec<Animation> {
        parents_via(doc, self.0, "samplers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Property;

    #[test]
    fn test_channel_wiring() {
        let mut doc = Document::new();
        let anim = doc.create_animation("walk");
        let node = doc.create_node("hip");
        let sampler = doc.create_animation_sampler();
        let channel = doc.create_animation_channel();
        let times = doc.create_accessor("t");

        sampler.set_input(&mut doc, Some(times)).unwrap();
        sampler.set_interpolation(&mut doc, Interpolation::Step);
        channel.set_sampler(&mut doc, Some(sampler)).unwrap();
        channel.set_target_node(&mut doc, Some(node)).unwrap();
        channel.set_target_path(&mut doc, Some(TargetPath::Rotation));
        anim.add_sampler(&mut doc, sampler).unwrap();
        anim.add_channel(&mut doc, channel).unwrap();

        assert_eq!(anim.list_channels(&doc), vec![channel]);
        assert_eq!(channel.target_path(&doc), Some(TargetPath::Rotation));
        assert_eq!(sampler.interpolation(&doc), Interpolation::Step);
        assert_eq!(channel.list_animations(&doc), vec![anim]);

        let usage = doc.graph().get_ref_link(sampler.id(), "input").unwrap().meta().usage;
        assert_eq!(usage, Some(BufferUsage::Other));

        node.dispose(&mut doc).unwrap();
        assert_eq!(channel.target_node(&doc), None);
    }
}
