/// DOM media elements as texture sources
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use planar_core::{LoadState, MediaSource, SourceKind};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlCanvasElement, HtmlImageElement, HtmlVideoElement};

/// `HAVE_CURRENT_DATA`
const VIDEO_HAS_FRAME: u16 = 2;
/// `NETWORK_NO_SOURCE`
const VIDEO_NO_SOURCE: u16 = 3;

/// Wraps an `<img>`, `<video>` or `<canvas>`; other elements give `None`.
pub fn from_element(element: Element) -> Option<Rc<dyn MediaSource>> {
    match SourceKind::from_tag_name(&element.tag_name())? {
        SourceKind::Image => element
            .dyn_into::<HtmlImageElement>()
            .ok()
            .map(|image| Rc::new(ImageSource::new(image)) as Rc<dyn MediaSource>),
        SourceKind::Video => element
            .dyn_into::<HtmlVideoElement>()
            .ok()
            .map(|video| Rc::new(VideoSource::new(video)) as Rc<dyn MediaSource>),
        SourceKind::Canvas => element
            .dyn_into::<HtmlCanvasElement>()
            .ok()
            .map(|canvas| Rc::new(CanvasSource::new(canvas)) as Rc<dyn MediaSource>),
    }
}

pub struct ImageSource {
    element: HtmlImageElement,
}

impl ImageSource {
    pub fn new(element: HtmlImageElement) -> Self {
        Self { element }
    }

    /// Starts loading `url` into a detached image.
    pub fn from_url(url: &str) -> Result<Self, wasm_bindgen::JsValue> {
        let element = HtmlImageElement::new()?;
        element.set_cross_origin(Some("anonymous"));
        element.set_src(url);
        Ok(Self::new(element))
    }

    pub fn element(&self) -> &HtmlImageElement {
        &self.element
    }
}

impl MediaSource for ImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn url(&self) -> Option<String> {
        Some(self.element.current_src()).filter(|src| !src.is_empty())
    }

    fn size(&self) -> (u32, u32) {
        (self.element.natural_width(), self.element.natural_height())
    }

    fn load_state(&self) -> LoadState {
        if !self.element.complete() {
            LoadState::Loading
        } else if self.element.natural_width() == 0 {
            // complete with no pixels means the fetch or decode failed
            LoadState::Failed(format!("could not load image {}", self.element.src()))
        } else {
            LoadState::Loaded
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct VideoSource {
    element: HtmlVideoElement,
    last_time: Cell<f64>,
}

impl VideoSource {
    pub fn new(element: HtmlVideoElement) -> Self {
        Self {
            element,
            last_time: Cell::new(f64::NAN),
        }
    }

    pub fn element(&self) -> &HtmlVideoElement {
        &self.element
    }
}

impl MediaSource for VideoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn url(&self) -> Option<String> {
        None
    }

    fn size(&self) -> (u32, u32) {
        (self.element.video_width(), self.element.video_height())
    }

    fn load_state(&self) -> LoadState {
        if self.element.ready_state() >= VIDEO_HAS_FRAME {
            LoadState::Loaded
        } else if self.element.network_state() == VIDEO_NO_SOURCE {
            LoadState::Failed(format!("no playable source for video {}", self.element.src()))
        } else {
            LoadState::Loading
        }
    }

    /// A new frame is one with a different playback time.
    fn has_new_frame(&self) -> bool {
        let time = self.element.current_time();
        if time == self.last_time.get() {
            return false;
        }
        self.last_time.set(time);
        self.element.ready_state() >= VIDEO_HAS_FRAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct CanvasSource {
    element: HtmlCanvasElement,
}

impl CanvasSource {
    pub fn new(element: HtmlCanvasElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &HtmlCanvasElement {
        &self.element
    }
}

impl MediaSource for CanvasSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Canvas
    }

    fn url(&self) -> Option<String> {
        None
    }

    fn size(&self) -> (u32, u32) {
        (self.element.width(), self.element.height())
    }

    fn load_state(&self) -> LoadState {
        LoadState::Loaded
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
