//! Cameras.

use super::property::{get_f32, get_opt_f32, get_str, AttrSpec};
use super::PropertyType;
use crate::document::Document;
use crate::graph::Value;

property_handle!(
    /// Perspective or orthographic projection.
    Camera => PropertyType::Camera
);

pub(crate) const ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("type", || Value::from(CameraType::Perspective.name())),
    AttrSpec::literal("yfov", || Value::Float(std::f32::consts::FRAC_PI_4)),
    AttrSpec::literal("znear", || Value::Float(0.1)),
    AttrSpec::literal("zfar", || Value::Null),
    AttrSpec::literal("aspectRatio", || Value::Null),
    AttrSpec::literal("xmag", || Value::Float(1.0)),
    AttrSpec::literal("ymag", || Value::Float(1.0)),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CameraType {
    #[default]
    Perspective,
    Orthographic,
}

impl CameraType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Perspective => "perspective",
            Self::Orthographic => "orthographic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "perspective" => Some(Self::Perspective),
            "orthographic" => Some(Self::Orthographic),
            _ => None,
        }
    }
}

impl Camera {
    pub fn camera_type(self, doc: &Document) -> CameraType {
        get_str(doc, self.0, "type")
            .and_then(CameraType::from_name)
            .unwrap_or_default()
    }

    pub fn set_camera_type(self, doc: &mut Document, ty: CameraType) {
        doc.graph_mut().set(self.0, "type", ty.name());
    }

    /// Vertical field of view in radians.
    pub fn yfov(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "yfov", std::f32::consts::FRAC_PI_4)
    }

    pub fn set_yfov(self, doc: &mut Document, yfov: f32) {
        doc.graph_mut().set(self.0, "yfov", yfov);
    }

    pub fn znear(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "znear", 0.1)
    }

    pub fn set_znear(self, doc: &mut Document, znear: f32) {
        doc.graph_mut().set(self.0, "znear", znear);
    }

    /// Far plane; `None` is an infinite projection.
    pub fn zfar(self, doc: &Document) -> Option<f32> {
        get_opt_f32(doc, self.0, "zfar")
    }

    pub fn set_zfar(self, doc: &mut Document, zfar: Option<f32>) {
        doc.graph_mut().set(self.0, "zfar", zfar);
    }

    pub fn aspect_ratio(self, doc: &Document) -> Option<f32> {
        get_opt_f32(doc, self.0, "aspectRatio")
    }

    pub fn set_aspect_ratio(self, doc: &mut Document, ratio: Option<f32>) {
        doc.graph_mut().set(self.0, "aspectRatio", ratio);
    }

    pub fn xmag(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "xmag", 1.0)
    }

    pub fn set_xmag(self, doc: &mut Document, xmag: f32) {
        doc.graph_mut().set(self.0, "xmag", xmag);
    }

    pub fn ymag(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "ymag", 1.0)
    }

    pub fn set_ymag(self, doc: &mut Document, ymag: f32) {
        doc.graph_mut().set(self.0, "ymag", ymag);
    }
}
