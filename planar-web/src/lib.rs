/// Planar Web - WebGL backend and JavaScript bindings
///
/// Wraps [`planar_core::Renderer`] for the browser: a canvas context factory,
/// DOM media sources, element measurement and a `requestAnimationFrame` loop.
pub mod context;
pub mod dom;
pub mod factory;
pub mod options;
pub mod render_loop;
pub mod source;

use std::cell::RefCell;
use std::rc::Rc;

use planar_core::{PlaneId, Renderer, RendererConfig, ShaderPassId};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlCanvasElement};

use crate::dom::{device_pixel_ratio, ElementRect};
use crate::factory::CanvasContextFactory;
use crate::options::{uniform_value, PlaneOptions, ShaderPassOptions};
use crate::render_loop::{RenderLoop, SharedRenderer};
use crate::source::ImageSource;

fn js_error(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Serializes a JS object and reads it with serde; `undefined` gives defaults.
fn from_js<T: serde::de::DeserializeOwned + Default>(value: &JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    let json: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&json).map_err(js_error)
}

/// Reads the renderer options, using the device pixel ratio when the page
/// gives none.
fn renderer_config(value: &JsValue) -> Result<RendererConfig, JsValue> {
    let raw: serde_json::Value = from_js(value)?;
    let has_ratio = raw.get("pixelRatio").is_some();
    let mut config: RendererConfig = if raw.is_null() {
        RendererConfig::default()
    } else {
        serde_json::from_value(raw).map_err(js_error)?
    };
    if !has_ratio {
        config.pixel_ratio = device_pixel_ratio();
    }
    Ok(config)
}

#[wasm_bindgen]
pub struct WebRenderer {
    renderer: SharedRenderer,
    canvas: HtmlCanvasElement,
    render_loop: Option<RenderLoop>,
}

impl WebRenderer {
    fn with_renderer<R>(&self, f: impl FnOnce(&mut Renderer) -> R) -> Result<R, JsValue> {
        let mut renderer = self
            .renderer
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("renderer is busy"))?;
        Ok(f(&mut renderer))
    }
}

#[wasm_bindgen]
impl WebRenderer {
    /// Appends a canvas filling `container` and starts the frame loop.
    #[wasm_bindgen(constructor)]
    pub fn new(container: Element, config: JsValue) -> Result<WebRenderer, JsValue> {
        let config = renderer_config(&config)?;
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
        canvas.set_attribute("style", "display: block; width: 100%; height: 100%;")?;
        container.append_child(&canvas)?;

        let factory = CanvasContextFactory::new(canvas.clone());
        let mut renderer = Renderer::new(config, &factory, Box::new(ElementRect::new(container)));
        renderer.on_error(|_, error| log::error!("{error}"));
        let renderer = Rc::new(RefCell::new(renderer));
        let render_loop = RenderLoop::start(Rc::clone(&renderer), &canvas)?;
        log::info!("planar renderer attached");
        Ok(WebRenderer {
            renderer,
            canvas,
            render_loop: Some(render_loop),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn canvas(&self) -> HtmlCanvasElement {
        self.canvas.clone()
    }

    /// Binds a plane to `element` and loads the images, videos and canvases
    /// it contains. Returns the plane id.
    #[wasm_bindgen(js_name = addPlane)]
    pub fn add_plane(&self, element: Element, options: JsValue) -> Result<u32, JsValue> {
        let params = from_js::<PlaneOptions>(&options)?.into_params().map_err(js_error)?;
        let media = element.query_selector_all("img, video, canvas")?;
        self.with_renderer(|renderer| {
            let id = renderer
                .add_plane(Box::new(ElementRect::new(element)), &params)
                .map_err(js_error)?;
            if let Some((plane, ctx)) = renderer.plane_context(id) {
                for index in 0..media.length() {
                    let Some(source) = media
                        .item(index)
                        .and_then(|node| node.dyn_into::<Element>().ok())
                        .and_then(source::from_element)
                    else {
                        continue;
                    };
                    plane.load_source(ctx, source, None, None).map_err(js_error)?;
                }
            }
            Ok(id.0)
        })?
    }

    #[wasm_bindgen(js_name = removePlane)]
    pub fn remove_plane(&self, plane: u32) -> Result<(), JsValue> {
        self.with_renderer(|renderer| renderer.remove_plane(PlaneId(plane)).map_err(js_error))?
    }

    /// Loads an image by url into a new texture of `plane`.
    #[wasm_bindgen(js_name = loadImage)]
    pub fn load_image(&self, plane: u32, url: &str) -> Result<(), JsValue> {
        let source = Rc::new(ImageSource::from_url(url)?);
        self.with_renderer(|renderer| {
            let (plane, ctx) = renderer
                .plane_context(PlaneId(plane))
                .ok_or_else(|| js_error(format!("no plane {plane}")))?;
            plane.load_source(ctx, source, None, None).map(|_| ()).map_err(js_error)
        })?
    }

    /// Sets a uniform declared when the plane was added.
    #[wasm_bindgen(js_name = setUniform)]
    pub fn set_uniform(&self, plane: u32, key: &str, value: JsValue) -> Result<(), JsValue> {
        let value: serde_json::Value = from_js(&value)?;
        self.with_renderer(|renderer| {
            let plane = renderer
                .plane_mut(PlaneId(plane))
                .ok_or_else(|| js_error(format!("no plane {plane}")))?;
            let uniforms = &mut plane.mesh_mut().uniforms;
            let value = uniform_value(&value, uniforms.kind(key)).map_err(js_error)?;
            if uniforms.set(key, value) {
                Ok(())
            } else {
                Err(js_error(format!("unknown uniform {key}")))
            }
        })?
    }

    #[wasm_bindgen(js_name = addShaderPass)]
    pub fn add_shader_pass(&self, options: JsValue) -> Result<u32, JsValue> {
        let params = from_js::<ShaderPassOptions>(&options)?.into_params().map_err(js_error)?;
        self.with_renderer(|renderer| renderer.add_shader_pass(&params).map(|id| id.0).map_err(js_error))?
    }

    #[wasm_bindgen(js_name = removeShaderPass)]
    pub fn remove_shader_pass(&self, pass: u32) -> Result<(), JsValue> {
        self.with_renderer(|renderer| renderer.remove_shader_pass(ShaderPassId(pass)).map_err(js_error))?
    }

    /// Draws one frame; only needed when `autoRender` is off.
    pub fn render(&self) -> Result<(), JsValue> {
        self.with_renderer(Renderer::render)
    }

    pub fn resize(&self) -> Result<(), JsValue> {
        self.with_renderer(Renderer::resize)
    }

    #[wasm_bindgen(js_name = setPixelRatio)]
    pub fn set_pixel_ratio(&self, pixel_ratio: f32) -> Result<(), JsValue> {
        self.with_renderer(|renderer| renderer.set_pixel_ratio(pixel_ratio))
    }

    #[wasm_bindgen(js_name = updateScrollValues)]
    pub fn update_scroll_values(&self, x: f32, y: f32) -> Result<(), JsValue> {
        self.with_renderer(|renderer| renderer.update_scroll_values(x, y))
    }

    #[wasm_bindgen(js_name = enableDrawing)]
    pub fn enable_drawing(&self) -> Result<(), JsValue> {
        self.with_renderer(Renderer::enable_drawing)
    }

    #[wasm_bindgen(js_name = disableDrawing)]
    pub fn disable_drawing(&self) -> Result<(), JsValue> {
        self.with_renderer(Renderer::disable_drawing)
    }

    #[wasm_bindgen(js_name = needRender)]
    pub fn need_render(&self) -> Result<(), JsValue> {
        self.with_renderer(Renderer::need_render)
    }

    /// Forces a context loss, for testing pages against it.
    #[wasm_bindgen(js_name = loseContext)]
    pub fn lose_context(&self) -> Result<bool, JsValue> {
        self.with_renderer(Renderer::lose_context)
    }

    #[wasm_bindgen(js_name = restoreContext)]
    pub fn restore_context(&self) -> Result<bool, JsValue> {
        self.with_renderer(Renderer::restore_context)
    }

    /// Calls `callback` at the start of every frame.
    #[wasm_bindgen(js_name = onRender)]
    pub fn on_render(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_renderer(|renderer| {
            renderer.on_render(move |_| {
                if let Err(error) = callback.call0(&JsValue::NULL) {
                    log::error!("render callback failed: {error:?}");
                }
            });
        })
    }

    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_renderer(|renderer| {
            renderer.on_error(move |_, error| {
                log::error!("{error}");
                if let Err(thrown) = callback.call1(&JsValue::NULL, &JsValue::from_str(&error.to_string())) {
                    log::error!("error callback failed: {thrown:?}");
                }
            });
        })
    }

    /// Frees every GPU object, stops the loop and removes the canvas.
    pub fn dispose(&mut self) -> Result<(), JsValue> {
        self.with_renderer(Renderer::dispose)?;
        // lets the queued cleanup run before the loop goes away
        self.with_renderer(Renderer::render)?;
        self.render_loop.take();
        self.canvas.remove();
        Ok(())
    }
}

#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    // a second module instance finds the logger already set
    let _ = console_log::init_with_level(log::Level::Info);
    Ok(())
}
