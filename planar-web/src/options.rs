/// Plane and pass options handed over from JavaScript as plain objects
use std::collections::BTreeMap;

use planar_core::context::CullMode;
use planar_core::texture::FloatingPoint;
use planar_core::{
    DrawCheckMargins, PlaneParams, RenderTargetId, ShaderPassParams, TextureParams, UniformDef,
    UniformType, UniformValue,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UniformOptions {
    pub name: String,
    /// Upload tag such as `1f`, `3fv` or `mat4`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarginOptions {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextureOptions {
    pub premultiply_alpha: Option<bool>,
    pub anisotropy: Option<f32>,
    pub generate_mipmap: Option<bool>,
    /// `none`, `half-float` or `float`.
    pub floating_point: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaneOptions {
    pub vertex_shader: Option<String>,
    pub fragment_shader: Option<String>,
    pub width_segments: Option<u32>,
    pub height_segments: Option<u32>,
    pub share_program: Option<bool>,
    pub depth_test: Option<bool>,
    /// `back`, `front` or `none`.
    pub cull_face: Option<String>,
    pub transparent: Option<bool>,
    pub visible: Option<bool>,
    pub always_draw: Option<bool>,
    pub draw_check_margins: Option<MarginOptions>,
    pub watch_scroll: Option<bool>,
    pub fov: Option<f32>,
    pub render_target: Option<u32>,
    pub uniforms: BTreeMap<String, UniformOptions>,
    pub texture_options: Option<TextureOptions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShaderPassOptions {
    pub vertex_shader: Option<String>,
    pub fragment_shader: Option<String>,
    pub render_target: Option<u32>,
    pub depth: Option<bool>,
    pub depth_test: Option<bool>,
    pub visible: Option<bool>,
    pub uniforms: BTreeMap<String, UniformOptions>,
    pub texture_options: Option<TextureOptions>,
}

/// Reads a JSON value the way a page would write a uniform: numbers,
/// arrays of numbers, or arrays of integers when the type says so.
pub fn uniform_value(value: &Value, kind: Option<UniformType>) -> Result<UniformValue, String> {
    let is_int = kind.is_some_and(UniformType::is_int);
    match value {
        Value::Bool(flag) => Ok(UniformValue::Int(*flag as i32)),
        Value::Number(number) if is_int => number
            .as_i64()
            .map(|number| UniformValue::Int(number as i32))
            .ok_or_else(|| format!("{number} is not an integer")),
        Value::Number(number) => number
            .as_f64()
            .map(|number| UniformValue::Float(number as f32))
            .ok_or_else(|| format!("{number} is not a number")),
        Value::Array(items) if is_int => items
            .iter()
            .map(|item| item.as_i64().map(|item| item as i32))
            .collect::<Option<Vec<_>>>()
            .map(UniformValue::Ints)
            .ok_or_else(|| "expected an array of integers".to_string()),
        Value::Array(items) => {
            let floats = items
                .iter()
                .map(|item| item.as_f64().map(|item| item as f32))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| "expected an array of numbers".to_string())?;
            Ok(match floats.as_slice() {
                [x, y] => UniformValue::Vec2([*x, *y]),
                [x, y, z] => UniformValue::Vec3([*x, *y, *z]),
                [x, y, z, w] => UniformValue::Vec4([*x, *y, *z, *w]),
                _ => UniformValue::Floats(floats),
            })
        }
        other => Err(format!("unsupported uniform value {other}")),
    }
}

fn uniform_defs(uniforms: &BTreeMap<String, UniformOptions>) -> Result<Vec<(String, UniformDef)>, String> {
    uniforms
        .iter()
        .map(|(key, options)| {
            let kind = options
                .kind
                .as_deref()
                .map(str::parse::<UniformType>)
                .transpose()
                .map_err(|error| format!("uniform {key}: {error}"))?;
            let value = uniform_value(&options.value, kind).map_err(|error| format!("uniform {key}: {error}"))?;
            let name = if options.name.is_empty() {
                key.clone()
            } else {
                options.name.clone()
            };
            let mut def = UniformDef::new(name, value);
            if let Some(kind) = kind {
                def = def.with_type(kind);
            }
            Ok((key.clone(), def))
        })
        .collect()
}

fn texture_params(options: Option<&TextureOptions>) -> Result<TextureParams, String> {
    let mut params = TextureParams::default();
    let Some(options) = options else {
        return Ok(params);
    };
    if let Some(premultiply_alpha) = options.premultiply_alpha {
        params.premultiply_alpha = premultiply_alpha;
    }
    if let Some(anisotropy) = options.anisotropy {
        params.anisotropy = anisotropy;
    }
    params.generate_mipmap = options.generate_mipmap;
    params.floating_point = match options.floating_point.as_deref() {
        None | Some("none") => FloatingPoint::None,
        Some("half-float") => FloatingPoint::HalfFloat,
        Some("float") => FloatingPoint::Float,
        Some(other) => return Err(format!("unknown floating point mode {other}")),
    };
    Ok(params)
}

fn cull_mode(name: &str) -> Result<CullMode, String> {
    match name {
        "back" => Ok(CullMode::Back),
        "front" => Ok(CullMode::Front),
        "none" => Ok(CullMode::None),
        other => Err(format!("unknown cull face {other}")),
    }
}

impl PlaneOptions {
    pub fn into_params(self) -> Result<PlaneParams, String> {
        let defaults = PlaneParams::default();
        let margins = self.draw_check_margins.unwrap_or_default();
        Ok(PlaneParams {
            uniforms: uniform_defs(&self.uniforms)?,
            texture: texture_params(self.texture_options.as_ref())?,
            cull_face: self.cull_face.as_deref().map(cull_mode).transpose()?.unwrap_or(defaults.cull_face),
            vertex_shader: self.vertex_shader,
            fragment_shader: self.fragment_shader,
            width_segments: self.width_segments.unwrap_or(defaults.width_segments),
            height_segments: self.height_segments.unwrap_or(defaults.height_segments),
            share_program: self.share_program.unwrap_or(defaults.share_program),
            depth_test: self.depth_test.unwrap_or(defaults.depth_test),
            transparent: self.transparent.unwrap_or(defaults.transparent),
            visible: self.visible.unwrap_or(defaults.visible),
            always_draw: self.always_draw.unwrap_or(defaults.always_draw),
            draw_check_margins: DrawCheckMargins {
                top: margins.top,
                right: margins.right,
                bottom: margins.bottom,
                left: margins.left,
            },
            watch_scroll: self.watch_scroll,
            fov: self.fov.unwrap_or(defaults.fov),
            render_target: self.render_target.map(RenderTargetId),
        })
    }
}

impl ShaderPassOptions {
    pub fn into_params(self) -> Result<ShaderPassParams, String> {
        let defaults = ShaderPassParams::default();
        Ok(ShaderPassParams {
            uniforms: uniform_defs(&self.uniforms)?,
            texture: texture_params(self.texture_options.as_ref())?,
            vertex_shader: self.vertex_shader,
            fragment_shader: self.fragment_shader,
            render_target: self.render_target.map(RenderTargetId),
            depth: self.depth.unwrap_or(defaults.depth),
            depth_test: self.depth_test.unwrap_or(defaults.depth_test),
            visible: self.visible.unwrap_or(defaults.visible),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_options_keep_defaults() {
        let options: PlaneOptions = serde_json::from_str(r#"{"widthSegments": 8}"#).unwrap();
        let params = options.into_params().unwrap();
        assert_eq!(params.width_segments, 8);
        assert_eq!(params.height_segments, 1);
        assert!(params.depth_test);
        assert_eq!(params.watch_scroll, None);
    }

    #[test]
    fn test_uniforms_from_page_object() {
        let options: PlaneOptions = serde_json::from_str(
            r#"{
                "uniforms": {
                    "time": {"name": "uTime", "type": "1f", "value": 0},
                    "mouse": {"name": "uMouse", "value": [0.5, 0.5]},
                    "steps": {"name": "uSteps", "type": "1i", "value": 4}
                }
            }"#,
        )
        .unwrap();
        let params = options.into_params().unwrap();
        let find = |key: &str| params.uniforms.iter().find(|(k, _)| k == key).map(|(_, def)| def.clone()).unwrap();
        assert_eq!(find("time").value, UniformValue::Float(0.0));
        assert_eq!(find("time").kind, Some(UniformType::Float1));
        assert_eq!(find("mouse").value, UniformValue::Vec2([0.5, 0.5]));
        assert_eq!(find("steps").value, UniformValue::Int(4));
    }

    #[test]
    fn test_unknown_uniform_type_is_rejected() {
        let options: PlaneOptions =
            serde_json::from_str(r#"{"uniforms": {"a": {"name": "uA", "type": "5f", "value": 1}}}"#).unwrap();
        let error = options.into_params().unwrap_err();
        assert!(error.starts_with("uniform a"));
    }

    #[test]
    fn test_matrix_values_stay_flat() {
        let value = Value::Array((0..16).map(|i| Value::from(i as f64)).collect());
        let parsed = uniform_value(&value, None).unwrap();
        assert!(matches!(parsed, UniformValue::Floats(ref values) if values.len() == 16));
    }

    #[test]
    fn test_pass_options() {
        let options: ShaderPassOptions = serde_json::from_str(
            r#"{"renderTarget": 3, "textureOptions": {"floatingPoint": "half-float"}, "cullFace": "front"}"#,
        )
        .unwrap();
        let params = options.into_params().unwrap();
        assert_eq!(params.render_target, Some(RenderTargetId(3)));
        assert_eq!(params.texture.floating_point, FloatingPoint::HalfFloat);
    }

    #[test]
    fn test_bad_cull_face() {
        let options: PlaneOptions = serde_json::from_str(r#"{"cullFace": "sideways"}"#).unwrap();
        assert!(options.into_params().is_err());
    }
}
