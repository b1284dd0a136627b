//! Name-based property access for editors and scripting hosts.
//!
//! [`NoiseTexture::property_list`] describes the editable surface, and
//! [`NoiseTexture::get_property`] / [`NoiseTexture::set_property`] route
//! dynamic values to the typed setters, so the same validation and change
//! checks apply no matter how a property is edited.

use std::sync::Arc;

use bevy::math::Vec2;

use crate::{
    generator::{MAX_DIMENSION, TextureError},
    noise::NoiseSource,
    texture::NoiseTexture,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Int,
    Float,
    Bool,
    Vector2,
    /// Reference to a shared [`NoiseSource`]; may be empty.
    Noise,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyHint {
    None,
    /// Suggested editor range.  `or_greater` allows values above `max`.
    Range {
        min: f64,
        max: f64,
        step: f64,
        or_greater: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyUsage {
    /// Shown in editors and stored.
    Editor,
    /// Stored but not shown.
    Hidden,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub hint: PropertyHint,
    pub usage: PropertyUsage,
}

/// A dynamically typed property value.
#[derive(Clone)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Vector2(Vec2),
    Noise(Option<Arc<dyn NoiseSource>>),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Vector2(_) => PropertyKind::Vector2,
            PropertyValue::Noise(_) => PropertyKind::Noise,
        }
    }
}

impl std::fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            PropertyValue::Float(v) => f.debug_tuple("Float").field(v).finish(),
            PropertyValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            PropertyValue::Vector2(v) => f.debug_tuple("Vector2").field(v).finish(),
            PropertyValue::Noise(n) => f
                .debug_tuple("Noise")
                .field(&n.as_ref().map(|_| "NoiseSource"))
                .finish(),
        }
    }
}

/// Error returned by [`NoiseTexture::set_property`] and
/// [`NoiseTexture::get_property`].
#[derive(Debug)]
pub enum PropertyError {
    UnknownProperty(String),
    TypeMismatch {
        property: &'static str,
        expected: PropertyKind,
        got: PropertyKind,
    },
    Invalid(TextureError),
}

impl std::fmt::Display for PropertyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyError::UnknownProperty(name) => write!(f, "unknown property `{name}`"),
            PropertyError::TypeMismatch {
                property,
                expected,
                got,
            } => write!(f, "property `{property}` expects {expected:?}, got {got:?}"),
            PropertyError::Invalid(e) => write!(f, "invalid value: {e}"),
        }
    }
}

impl std::error::Error for PropertyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PropertyError::Invalid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TextureError> for PropertyError {
    fn from(e: TextureError) -> Self {
        PropertyError::Invalid(e)
    }
}

const DIMENSION_HINT: PropertyHint = PropertyHint::Range {
    min: 1.0,
    max: 2048.0,
    step: 1.0,
    or_greater: true,
};

impl NoiseTexture {
    /// The editable properties, in display order.  `bump_strength` is hidden
    /// unless the texture is a normal map.
    pub fn property_list(&self) -> Vec<PropertyInfo> {
        let editor = |name: &'static str, kind: PropertyKind, hint: PropertyHint| PropertyInfo {
            name,
            kind,
            hint,
            usage: PropertyUsage::Editor,
        };
        vec![
            editor("width", PropertyKind::Int, DIMENSION_HINT),
            editor("height", PropertyKind::Int, DIMENSION_HINT),
            editor("seamless", PropertyKind::Bool, PropertyHint::None),
            editor("as_normal_map", PropertyKind::Bool, PropertyHint::None),
            PropertyInfo {
                name: "bump_strength",
                kind: PropertyKind::Float,
                hint: PropertyHint::Range {
                    min: 0.0,
                    max: 32.0,
                    step: 0.1,
                    or_greater: true,
                },
                usage: if self.as_normal_map() {
                    PropertyUsage::Editor
                } else {
                    PropertyUsage::Hidden
                },
            },
            editor("noise", PropertyKind::Noise, PropertyHint::None),
            editor("noise_offset", PropertyKind::Vector2, PropertyHint::None),
        ]
    }

    pub fn get_property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        Ok(match name {
            "width" => PropertyValue::Int(self.width() as i64),
            "height" => PropertyValue::Int(self.height() as i64),
            "seamless" => PropertyValue::Bool(self.seamless()),
            "as_normal_map" => PropertyValue::Bool(self.as_normal_map()),
            "bump_strength" => PropertyValue::Float(self.bump_strength() as f64),
            "noise" => PropertyValue::Noise(self.noise().cloned()),
            "noise_offset" => PropertyValue::Vector2(self.noise_offset()),
            _ => return Err(PropertyError::UnknownProperty(name.to_owned())),
        })
    }

    /// Apply `value` through the matching typed setter.  Rejected values are
    /// logged and leave the texture untouched.
    pub fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        let result = self.apply_property(name, value);
        if let Err(e) = &result {
            bevy::log::warn!("noise texture {:?}: cannot set `{name}`: {e}", self.id());
        }
        result
    }

    fn apply_property(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match (name, value) {
            ("width", PropertyValue::Int(v)) => self.set_width(to_dimension(v))?,
            ("height", PropertyValue::Int(v)) => self.set_height(to_dimension(v))?,
            ("seamless", PropertyValue::Bool(v)) => self.set_seamless(v),
            ("as_normal_map", PropertyValue::Bool(v)) => self.set_as_normal_map(v),
            ("bump_strength", PropertyValue::Float(v)) => self.set_bump_strength(v as f32)?,
            ("bump_strength", PropertyValue::Int(v)) => self.set_bump_strength(v as f32)?,
            ("noise", PropertyValue::Noise(v)) => self.set_noise(v),
            ("noise_offset", PropertyValue::Vector2(v)) => self.set_noise_offset(v)?,
            (name, value) => {
                let info = self
                    .property_list()
                    .into_iter()
                    .find(|p| p.name == name)
                    .ok_or_else(|| PropertyError::UnknownProperty(name.to_owned()))?;
                return Err(PropertyError::TypeMismatch {
                    property: info.name,
                    expected: info.kind,
                    got: value.kind(),
                });
            }
        }
        Ok(())
    }
}

/// Negative values become 0 and huge ones saturate, so both fail validation
/// with a meaningful error instead of wrapping.
fn to_dimension(v: i64) -> u32 {
    v.clamp(0, MAX_DIMENSION as i64 + 1) as u32
}
