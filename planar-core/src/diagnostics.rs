/// Per-renderer diagnostics
///
/// Warnings and errors raised while building or drawing objects go through a
/// [`Diagnostics`] instance owned by the renderer, which forwards them to an
/// injectable [`DiagnosticSink`].
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Warnings emitted before the sink goes quiet.
pub const MAX_WARNINGS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Object that raised the diagnostic, e.g. `Plane: 3`.
    pub origin: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.message)
    }
}

pub trait DiagnosticSink {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
        }
    }
}

/// Keeps every diagnostic in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Rc<RefCell<Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| entry.message.contains(needle))
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.entries.borrow_mut().push(diagnostic.clone());
    }
}

pub struct Diagnostics {
    sink: Box<dyn DiagnosticSink>,
    production: bool,
    warnings: Cell<usize>,
}

impl Diagnostics {
    pub fn new(sink: Box<dyn DiagnosticSink>, production: bool) -> Self {
        Self {
            sink,
            production,
            warnings: Cell::new(0),
        }
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    pub fn set_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    pub fn warn(&self, origin: impl fmt::Display, message: impl Into<String>) {
        if self.production {
            return;
        }
        let emitted = self.warnings.get();
        if emitted > MAX_WARNINGS {
            return;
        }
        self.warnings.set(emitted + 1);
        let message = if emitted == MAX_WARNINGS {
            "too many warnings thrown, stop logging".to_string()
        } else {
            message.into()
        };
        self.sink.emit(&Diagnostic {
            severity: Severity::Warning,
            origin: origin.to_string(),
            message,
        });
    }

    pub fn error(&self, origin: impl fmt::Display, message: impl Into<String>) {
        self.sink.emit(&Diagnostic {
            severity: Severity::Error,
            origin: origin.to_string(),
            message: message.into(),
        });
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Box::new(LogSink), false)
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("production", &self.production)
            .field("warnings", &self.warnings.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_capped() {
        let sink = MemorySink::new();
        let diagnostics = Diagnostics::new(Box::new(sink.clone()), false);
        for i in 0..150 {
            diagnostics.warn("Plane: 0", format!("warning {i}"));
        }
        assert_eq!(sink.warnings(), MAX_WARNINGS + 1);
        assert!(sink.contains("too many warnings"));
    }

    #[test]
    fn test_production_silences_warnings_only() {
        let sink = MemorySink::new();
        let diagnostics = Diagnostics::new(Box::new(sink.clone()), true);
        diagnostics.warn("Texture: 1", "ignored");
        diagnostics.error("Renderer", "still reported");
        assert_eq!(sink.warnings(), 0);
        assert_eq!(sink.errors(), 1);
        assert_eq!(sink.entries()[0].to_string(), "Renderer: still reported");
    }
}
