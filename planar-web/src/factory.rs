/// Context creation on a canvas element
use js_sys::{Object, Reflect};
use planar_core::gl::{ContextAttributes, ContextFactory, GlContext, GlVersion};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext, WebGlRenderingContext};

use crate::context::WebGlBackend;

pub struct CanvasContextFactory {
    canvas: HtmlCanvasElement,
}

impl CanvasContextFactory {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }

    fn options(attributes: &ContextAttributes) -> Result<Object, JsValue> {
        let options = Object::new();
        for (key, value) in [
            ("alpha", attributes.alpha),
            ("antialias", attributes.antialias),
            ("premultipliedAlpha", attributes.premultiplied_alpha),
            ("depth", attributes.depth),
            ("failIfMajorPerformanceCaveat", attributes.fail_if_major_performance_caveat),
            ("preserveDrawingBuffer", attributes.preserve_drawing_buffer),
            ("stencil", attributes.stencil),
        ] {
            Reflect::set(&options, &JsValue::from_str(key), &JsValue::from_bool(value))?;
        }
        Ok(options)
    }

    fn try_create(
        &self,
        version: GlVersion,
        attributes: &ContextAttributes,
    ) -> Result<Option<Box<dyn GlContext>>, JsValue> {
        let options = Self::options(attributes)?;
        let Some(context) = self
            .canvas
            .get_context_with_context_options(version.context_id(), &options)?
        else {
            return Ok(None);
        };
        let backend = match version {
            GlVersion::WebGl2 => {
                WebGlBackend::webgl2(self.canvas.clone(), context.dyn_into::<WebGl2RenderingContext>()?)
            }
            GlVersion::WebGl1 => {
                WebGlBackend::webgl1(self.canvas.clone(), context.dyn_into::<WebGlRenderingContext>()?)
            }
        };
        Ok(Some(Box::new(backend)))
    }
}

impl ContextFactory for CanvasContextFactory {
    fn create(
        &self,
        version: GlVersion,
        attributes: &ContextAttributes,
    ) -> Option<Box<dyn GlContext>> {
        match self.try_create(version, attributes) {
            Ok(context) => context,
            Err(error) => {
                log::debug!("{} context unavailable: {error:?}", version.context_id());
                None
            }
        }
    }
}
