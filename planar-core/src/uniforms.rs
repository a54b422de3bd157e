/// Named shader uniforms with typed uploads
use std::fmt;
use std::str::FromStr;

use crate::diagnostics::Diagnostics;
use crate::gl::{GlContext, UniformData};
use crate::program::CompiledProgram;

/// Upload function selected for a uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Int1,
    Int1v,
    Float1,
    Float1v,
    Int2,
    Int2v,
    Float2,
    Float2v,
    Int3,
    Int3v,
    Float3,
    Float3v,
    Int4,
    Int4v,
    Float4,
    Float4v,
    Mat2,
    Mat3,
    Mat4,
}

const TAGS: [(UniformType, &str); 19] = [
    (UniformType::Int1, "1i"),
    (UniformType::Int1v, "1iv"),
    (UniformType::Float1, "1f"),
    (UniformType::Float1v, "1fv"),
    (UniformType::Int2, "2i"),
    (UniformType::Int2v, "2iv"),
    (UniformType::Float2, "2f"),
    (UniformType::Float2v, "2fv"),
    (UniformType::Int3, "3i"),
    (UniformType::Int3v, "3iv"),
    (UniformType::Float3, "3f"),
    (UniformType::Float3v, "3fv"),
    (UniformType::Int4, "4i"),
    (UniformType::Int4v, "4iv"),
    (UniformType::Float4, "4f"),
    (UniformType::Float4v, "4fv"),
    (UniformType::Mat2, "mat2"),
    (UniformType::Mat3, "mat3"),
    (UniformType::Mat4, "mat4"),
];

impl UniformType {
    pub fn as_str(self) -> &'static str {
        TAGS.iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, tag)| *tag)
            .unwrap_or("1f")
    }

    pub fn is_int(self) -> bool {
        self.as_str().contains('i')
    }

    pub fn is_vector(self) -> bool {
        self.as_str().ends_with('v')
    }

    /// Components per element; matrices report their dimension.
    pub fn components(self) -> u8 {
        let tag = self.as_str();
        match tag.strip_prefix("mat") {
            Some(dim) => dim.parse().unwrap_or(4),
            None => tag[..1].parse().unwrap_or(1),
        }
    }

    /// Number of values a single (non array) upload takes.
    pub fn len(self) -> usize {
        let components = self.components() as usize;
        if self.as_str().starts_with("mat") {
            components * components
        } else {
            components
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownUniformType(pub String);

impl fmt::Display for UnknownUniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown uniform type {:?}", self.0)
    }
}

impl std::error::Error for UnknownUniformType {}

impl FromStr for UniformType {
    type Err = UnknownUniformType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TAGS.iter()
            .find(|(_, tag)| *tag == s)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| UnknownUniformType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Ints(Vec<i32>),
    Float(f32),
    Floats(Vec<f32>),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

impl UniformValue {
    /// Type picked when none was given, and whether the guess is ambiguous.
    pub fn infer_type(&self) -> (UniformType, bool) {
        match self {
            UniformValue::Int(_) => (UniformType::Int1, false),
            UniformValue::Ints(values) => (UniformType::Int1v, values.len() != 1),
            UniformValue::Float(_) => (UniformType::Float1, false),
            UniformValue::Floats(values) => match values.len() {
                2 => (UniformType::Float2, false),
                3 => (UniformType::Float3, false),
                4 => (UniformType::Float4, false),
                16 => (UniformType::Mat4, false),
                _ => (UniformType::Float1v, true),
            },
            UniformValue::Vec2(_) => (UniformType::Float2, false),
            UniformValue::Vec3(_) => (UniformType::Float3, false),
            UniformValue::Vec4(_) => (UniformType::Float4, false),
            UniformValue::Mat4(_) => (UniformType::Mat4, false),
        }
    }

    fn floats(&self) -> Vec<f32> {
        match self {
            UniformValue::Int(value) => vec![*value as f32],
            UniformValue::Ints(values) => values.iter().map(|v| *v as f32).collect(),
            UniformValue::Float(value) => vec![*value],
            UniformValue::Floats(values) => values.clone(),
            UniformValue::Vec2(values) => values.to_vec(),
            UniformValue::Vec3(values) => values.to_vec(),
            UniformValue::Vec4(values) => values.to_vec(),
            UniformValue::Mat4(values) => values.to_vec(),
        }
    }

    fn ints(&self) -> Vec<i32> {
        match self {
            UniformValue::Int(value) => vec![*value],
            UniformValue::Ints(values) => values.clone(),
            other => other.floats().iter().map(|v| *v as i32).collect(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<nalgebra::Matrix4<f32>> for UniformValue {
    fn from(value: nalgebra::Matrix4<f32>) -> Self {
        let mut data = [0.0; 16];
        data.copy_from_slice(value.as_slice());
        UniformValue::Mat4(data)
    }
}

/// Declaration passed when creating a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDef {
    /// Name in the shader source, e.g. `uTime`.
    pub name: String,
    pub kind: Option<UniformType>,
    pub value: UniformValue,
}

impl UniformDef {
    pub fn new(name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            value: value.into(),
        }
    }

    pub fn with_type(mut self, kind: UniformType) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Clone)]
struct Uniform {
    key: String,
    name: String,
    kind: UniformType,
    value: UniformValue,
    uploaded: Option<UniformValue>,
}

/// Uniforms of one mesh, keyed by a user facing name
#[derive(Debug, Clone, Default)]
pub struct Uniforms {
    entries: Vec<Uniform>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, def: UniformDef, diagnostics: &Diagnostics) {
        let key = key.into();
        let (inferred, ambiguous) = def.value.infer_type();
        let kind = match def.kind {
            Some(kind) => kind,
            None => {
                if ambiguous {
                    diagnostics.warn(
                        format!("Uniform: {}", def.name),
                        format!("type could not be detected from the value, using {inferred}"),
                    );
                }
                inferred
            }
        };
        let uniform = Uniform {
            key: key.clone(),
            name: def.name,
            kind,
            value: def.value,
            uploaded: None,
        };
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(existing) => *existing = uniform,
            None => self.entries.push(uniform),
        }
    }

    /// Replaces a value; returns false when the key is unknown.
    pub fn set(&mut self, key: &str, value: impl Into<UniformValue>) -> bool {
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&UniformValue> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn kind(&self, key: &str) -> Option<UniformType> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets what was uploaded so the next update sends everything.
    pub fn invalidate(&mut self) {
        for entry in &mut self.entries {
            entry.uploaded = None;
        }
    }

    /// Uploads changed values. Shared programs get every value, every time,
    /// since their locations hold whatever the previous mesh wrote.
    pub fn update(&mut self, gl: &dyn GlContext, program: &CompiledProgram, diagnostics: &Diagnostics) {
        let force = program.is_shared();
        for entry in &mut self.entries {
            if !force && entry.uploaded.as_ref() == Some(&entry.value) {
                continue;
            }
            let Some(location) = program.location(&entry.name) else {
                continue;
            };
            let expected = entry.kind.len();
            if entry.kind.is_int() {
                let data = entry.value.ints();
                if !entry.kind.is_vector() && data.len() != expected {
                    diagnostics.warn(
                        format!("Uniform: {}", entry.name),
                        format!("{} expects {expected} values, got {}", entry.kind, data.len()),
                    );
                    entry.uploaded = Some(entry.value.clone());
                    continue;
                }
                gl.uniform(
                    location,
                    UniformData::Int {
                        components: entry.kind.components(),
                        data: &data,
                    },
                );
            } else {
                let data = entry.value.floats();
                let valid = if entry.kind.is_vector() {
                    !data.is_empty() && data.len() % expected == 0
                } else {
                    data.len() == expected
                };
                if !valid {
                    diagnostics.warn(
                        format!("Uniform: {}", entry.name),
                        format!("{} expects {expected} values, got {}", entry.kind, data.len()),
                    );
                    entry.uploaded = Some(entry.value.clone());
                    continue;
                }
                let payload = match entry.kind {
                    UniformType::Mat2 | UniformType::Mat3 | UniformType::Mat4 => UniformData::Matrix {
                        dim: entry.kind.components(),
                        data: &data,
                    },
                    kind => UniformData::Float {
                        components: kind.components(),
                        data: &data,
                    },
                };
                gl.uniform(location, payload);
            }
            entry.uploaded = Some(entry.value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;

    #[test]
    fn test_tags_round_trip() {
        for (kind, tag) in TAGS {
            assert_eq!(tag.parse::<UniformType>(), Ok(kind));
            assert_eq!(kind.to_string(), tag);
        }
        assert!("5f".parse::<UniformType>().is_err());
    }

    #[test]
    fn test_components() {
        assert_eq!(UniformType::Float3v.components(), 3);
        assert_eq!(UniformType::Mat3.len(), 9);
        assert!(UniformType::Int2v.is_int());
        assert!(!UniformType::Mat4.is_int());
    }

    #[test]
    fn test_inference() {
        assert_eq!(UniformValue::Float(1.0).infer_type(), (UniformType::Float1, false));
        assert_eq!(UniformValue::Floats(vec![0.0; 16]).infer_type(), (UniformType::Mat4, false));
        assert_eq!(UniformValue::Floats(vec![0.0; 5]).infer_type(), (UniformType::Float1v, true));
    }

    #[test]
    fn test_ambiguous_inference_warns() {
        let sink = MemorySink::new();
        let diagnostics = Diagnostics::new(Box::new(sink.clone()), false);
        let mut uniforms = Uniforms::new();
        uniforms.insert("time", UniformDef::new("uTime", 0.0), &diagnostics);
        uniforms.insert(
            "weights",
            UniformDef::new("uWeights", UniformValue::Floats(vec![1.0; 5])),
            &diagnostics,
        );
        assert_eq!(sink.warnings(), 1);
        assert_eq!(uniforms.kind("weights"), Some(UniformType::Float1v));
        assert!(uniforms.set("time", 2.0));
        assert!(!uniforms.set("missing", 2.0));
        assert_eq!(uniforms.get("time"), Some(&UniformValue::Float(2.0)));
    }
}
