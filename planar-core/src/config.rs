/// Renderer configuration
use serde::Deserialize;

use crate::gl::ContextAttributes;

/// Options recognised by [`crate::Renderer::new`].
///
/// Field names deserialize in camelCase so a page can hand over the same
/// object it would pass to a JavaScript constructor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererConfig {
    pub alpha: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub depth: bool,
    pub fail_if_major_performance_caveat: bool,
    pub preserve_drawing_buffer: bool,
    pub stencil: bool,
    pub pixel_ratio: f32,
    /// Fraction of the pixel ratio actually rendered, 0.25 to 1.
    pub rendering_scale: f32,
    pub auto_resize: bool,
    pub auto_render: bool,
    pub watch_scroll: bool,
    /// Skips shader checks and silences warnings.
    pub production: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: true,
            premultiplied_alpha: false,
            depth: true,
            fail_if_major_performance_caveat: true,
            preserve_drawing_buffer: false,
            stencil: false,
            pixel_ratio: 1.0,
            rendering_scale: 1.0,
            auto_resize: true,
            auto_render: true,
            watch_scroll: true,
            production: false,
        }
    }
}

impl RendererConfig {
    pub fn context_attributes(&self) -> ContextAttributes {
        ContextAttributes {
            alpha: self.alpha,
            antialias: self.antialias,
            premultiplied_alpha: self.premultiplied_alpha,
            depth: self.depth,
            fail_if_major_performance_caveat: self.fail_if_major_performance_caveat,
            preserve_drawing_buffer: self.preserve_drawing_buffer,
            stencil: self.stencil,
        }
    }

    /// Clamps out of range values, returning a message for each fix.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut fixes = Vec::new();
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            fixes.push(format!("invalid pixel ratio {}, using 1", self.pixel_ratio));
            self.pixel_ratio = 1.0;
        }
        let scale = if self.rendering_scale.is_nan() {
            1.0
        } else {
            self.rendering_scale.clamp(0.25, 1.0)
        };
        if scale != self.rendering_scale {
            fixes.push(format!(
                "rendering scale {} out of range, using {scale}",
                self.rendering_scale
            ));
            self.rendering_scale = scale;
        }
        fixes
    }

    /// Pixel ratio the canvas is sized with.
    pub fn effective_pixel_ratio(&self) -> f32 {
        self.pixel_ratio * self.rendering_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: RendererConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn test_camel_case_fields() {
        let config: RendererConfig = serde_json::from_str(
            r#"{"premultipliedAlpha": true, "renderingScale": 0.5, "autoRender": false}"#,
        )
        .unwrap();
        assert!(config.premultiplied_alpha);
        assert!(!config.auto_render);
        assert_eq!(config.rendering_scale, 0.5);
        assert!(config.context_attributes().premultiplied_alpha);
    }

    #[test]
    fn test_sanitize_clamps() {
        let mut config = RendererConfig {
            pixel_ratio: 0.0,
            rendering_scale: 0.1,
            ..RendererConfig::default()
        };
        let fixes = config.sanitize();
        assert_eq!(fixes.len(), 2);
        assert_eq!(config.pixel_ratio, 1.0);
        assert_eq!(config.rendering_scale, 0.25);
        assert_eq!(config.effective_pixel_ratio(), 0.25);
    }
}
