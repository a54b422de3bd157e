/// Frame loop and browser event wiring
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use planar_core::Renderer;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, EventTarget, HtmlCanvasElement};

use crate::dom::scroll_offsets;

pub type SharedRenderer = Rc<RefCell<Renderer>>;

type FrameClosure = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

/// Drives `render` with `requestAnimationFrame` and forwards canvas and
/// window events. Dropping it detaches everything.
pub struct RenderLoop {
    frame: FrameClosure,
    frame_id: Rc<Cell<Option<i32>>>,
    listeners: Vec<Listener>,
}

impl RenderLoop {
    pub fn start(renderer: SharedRenderer, canvas: &HtmlCanvasElement) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let config = renderer.borrow().config().clone();
        let mut render_loop = Self {
            frame: Rc::new(RefCell::new(None)),
            frame_id: Rc::new(Cell::new(None)),
            listeners: Vec::new(),
        };

        let lost = Rc::clone(&renderer);
        render_loop.listen(canvas, "webglcontextlost", move |event| {
            if let Ok(mut renderer) = lost.try_borrow_mut() {
                // without preventDefault the browser never restores
                if !renderer.is_disposing() {
                    event.prevent_default();
                }
                renderer.context_lost();
            }
        })?;
        let restored = Rc::clone(&renderer);
        render_loop.listen(canvas, "webglcontextrestored", move |_| {
            if let Ok(mut renderer) = restored.try_borrow_mut() {
                renderer.context_restored();
            }
        })?;
        if config.auto_resize {
            let resized = Rc::clone(&renderer);
            render_loop.listen(&window, "resize", move |_| {
                if let Ok(mut renderer) = resized.try_borrow_mut() {
                    renderer.resize();
                }
            })?;
        }
        if config.watch_scroll {
            let scrolled = Rc::clone(&renderer);
            render_loop.listen(&window, "scroll", move |_| {
                let (x, y) = scroll_offsets();
                if let Ok(mut renderer) = scrolled.try_borrow_mut() {
                    renderer.update_scroll_values(x, y);
                }
            })?;
        }

        if config.auto_render {
            render_loop.run(renderer)?;
        }
        Ok(render_loop)
    }

    fn listen(
        &mut self,
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<(), JsValue> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        self.listeners.push(Listener {
            target: target.clone(),
            event,
            closure,
        });
        Ok(())
    }

    fn run(&mut self, renderer: SharedRenderer) -> Result<(), JsValue> {
        let frame = Rc::clone(&self.frame);
        let frame_id = Rc::clone(&self.frame_id);
        *self.frame.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            match renderer.try_borrow_mut() {
                Ok(mut renderer) => renderer.render(),
                Err(_) => log::debug!("renderer busy, skipping frame"),
            }
            if frame_id.get().is_some() {
                frame_id.set(request_frame(&frame).ok());
            }
        }) as Box<dyn FnMut()>));
        self.frame_id.set(Some(request_frame(&self.frame)?));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.frame_id.get().is_some()
    }

    pub fn stop(&mut self) {
        if let Some(id) = self.frame_id.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(id);
            }
        }
        for listener in self.listeners.drain(..) {
            let _ = listener
                .target
                .remove_event_listener_with_callback(listener.event, listener.closure.as_ref().unchecked_ref());
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
        // breaks the closure's reference to its own slot
        self.frame.borrow_mut().take();
    }
}

fn request_frame(frame: &FrameClosure) -> Result<i32, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let frame = frame.borrow();
    let closure = frame.as_ref().ok_or_else(|| JsValue::from_str("frame loop stopped"))?;
    window.request_animation_frame(closure.as_ref().unchecked_ref())
}
