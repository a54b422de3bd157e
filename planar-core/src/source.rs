/// Media a texture can be filled from
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Image,
    Video,
    Canvas,
}

impl SourceKind {
    /// Classifies an element by tag name, case insensitive.
    pub fn from_tag_name(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "img" => Some(SourceKind::Image),
            "video" => Some(SourceKind::Video),
            "canvas" => Some(SourceKind::Canvas),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Image => f.write_str("image"),
            SourceKind::Video => f.write_str("video"),
            SourceKind::Canvas => f.write_str("canvas"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

/// Something that can be uploaded with `texImage2D`.
pub trait MediaSource {
    fn kind(&self) -> SourceKind;
    /// Identity used by the texture cache; only images have one that counts.
    fn url(&self) -> Option<String>;
    fn size(&self) -> (u32, u32);
    fn load_state(&self) -> LoadState;
    /// Videos report whether a frame arrived since the last call.
    fn has_new_frame(&self) -> bool {
        true
    }
    fn as_any(&self) -> &dyn Any;
}

/// RGBA pixels held in memory
#[derive(Debug, Clone)]
pub struct PixelSource {
    kind: SourceKind,
    url: Option<String>,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    state: Rc<Cell<u8>>,
    frames: Rc<Cell<u32>>,
    error: Option<String>,
}

const LOADING: u8 = 0;
const LOADED: u8 = 1;
const FAILED: u8 = 2;

impl PixelSource {
    /// Loaded image with a solid color.
    pub fn image(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(SourceKind::Image, Some(url.into()), width, height)
    }

    pub fn with_kind(kind: SourceKind, url: Option<String>, width: u32, height: u32) -> Self {
        Self {
            kind,
            url,
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
            state: Rc::new(Cell::new(LOADED)),
            frames: Rc::new(Cell::new(0)),
            error: None,
        }
    }

    /// Starts in the loading state until [`PixelSource::finish_loading`].
    pub fn loading(mut self) -> Self {
        self.state = Rc::new(Cell::new(LOADING));
        self
    }

    /// Fails to load with `reason`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.state = Rc::new(Cell::new(FAILED));
        self.error = Some(reason.into());
        self
    }

    /// Clones share the load state, so a caller can keep one to flip it.
    pub fn finish_loading(&self) {
        self.state.set(LOADED);
    }

    /// Marks a new video frame as available.
    pub fn push_frame(&self) {
        self.frames.set(self.frames.get() + 1);
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl MediaSource for PixelSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn load_state(&self) -> LoadState {
        match self.state.get() {
            LOADING => LoadState::Loading,
            FAILED => LoadState::Failed(self.error.clone().unwrap_or_default()),
            _ => LoadState::Loaded,
        }
    }

    fn has_new_frame(&self) -> bool {
        let frames = self.frames.get();
        self.frames.set(0);
        frames > 0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names() {
        assert_eq!(SourceKind::from_tag_name("IMG"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_tag_name("video"), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_tag_name("Canvas"), Some(SourceKind::Canvas));
        assert_eq!(SourceKind::from_tag_name("div"), None);
    }

    #[test]
    fn test_loading_state_is_shared() {
        let source = PixelSource::image("a.png", 4, 4).loading();
        let handle = source.clone();
        assert_eq!(source.load_state(), LoadState::Loading);
        handle.finish_loading();
        assert_eq!(source.load_state(), LoadState::Loaded);
        assert_eq!(source.pixels().len(), 64);
    }

    #[test]
    fn test_frames_consumed_once() {
        let video = PixelSource::with_kind(SourceKind::Video, None, 2, 2);
        assert!(!video.has_new_frame());
        video.push_frame();
        assert!(video.has_new_frame());
        assert!(!video.has_new_frame());
    }
}
