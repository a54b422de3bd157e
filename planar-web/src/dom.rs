/// Element measurement in the browser
use planar_core::{DomBounds, ElementBounds};
use web_sys::Element;

/// Reads `getBoundingClientRect` every time the core asks.
pub struct ElementRect {
    element: Element,
}

impl ElementRect {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl ElementBounds for ElementRect {
    fn bounds(&self) -> DomBounds {
        let rect = self.element.get_bounding_client_rect();
        DomBounds::new(
            rect.top() as f32,
            rect.left() as f32,
            rect.width() as f32,
            rect.height() as f32,
        )
    }
}

/// Current page scroll as (x, y).
pub fn scroll_offsets() -> (f32, f32) {
    web_sys::window()
        .map(|window| {
            (
                window.page_x_offset().unwrap_or(0.0) as f32,
                window.page_y_offset().unwrap_or(0.0) as f32,
            )
        })
        .unwrap_or((0.0, 0.0))
}

pub fn device_pixel_ratio() -> f32 {
    web_sys::window()
        .map(|window| window.device_pixel_ratio() as f32)
        .unwrap_or(1.0)
}
