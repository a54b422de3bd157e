/// Layout data exchanged with the page
use std::cell::Cell;
use std::rc::Rc;

/// Element box in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DomBounds {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl DomBounds {
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn scaled(&self, ratio: f32) -> Self {
        Self {
            top: self.top * ratio,
            left: self.left * ratio,
            width: self.width * ratio,
            height: self.height * ratio,
        }
    }
}

/// Something that can report where an element sits in the page.
pub trait ElementBounds {
    fn bounds(&self) -> DomBounds;
}

impl ElementBounds for DomBounds {
    fn bounds(&self) -> DomBounds {
        *self
    }
}

/// Shared, mutable bounds; lets callers move an element after it is bound.
impl ElementBounds for Rc<Cell<DomBounds>> {
    fn bounds(&self) -> DomBounds {
        self.get()
    }
}

/// Extra pixels around the viewport in which a plane still counts as visible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawCheckMargins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl DrawCheckMargins {
    pub fn uniform(margin: f32) -> Self {
        Self {
            top: margin,
            right: margin,
            bottom: margin,
            left: margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges() {
        let bounds = DomBounds::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(bounds.right(), 120.0);
        assert_eq!(bounds.bottom(), 60.0);
        assert_eq!(bounds.scaled(2.0), DomBounds::new(20.0, 40.0, 200.0, 100.0));
    }

    #[test]
    fn test_shared_bounds_follow_updates() {
        let shared = Rc::new(Cell::new(DomBounds::default()));
        let handle: Box<dyn ElementBounds> = Box::new(shared.clone());
        shared.set(DomBounds::new(5.0, 0.0, 10.0, 10.0));
        assert_eq!(handle.bounds().top, 5.0);
    }
}
