/// Errors surfaced by the renderer and its objects
use thiserror::Error;

use crate::gl::ShaderKind;

pub type Result<T> = std::result::Result<T, PlanarError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanarError {
    #[error("WebGL context could not be created")]
    ContextUnavailable,

    #[error("renderer is not active")]
    RendererInactive,

    #[error("WebGL context is lost")]
    ContextLost,

    #[error("{kind} shader failed to compile: {log}")]
    ShaderCompile { kind: ShaderKind, log: String },

    #[error("program failed to link: {0}")]
    ProgramLink(String),

    #[error("could not create {0}")]
    ResourceCreation(&'static str),

    #[error("failed to load source {url}: {reason}")]
    SourceLoad { url: String, reason: String },

    #[error("no {kind} with id {id}")]
    UnknownObject { kind: &'static str, id: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let error = PlanarError::ShaderCompile {
            kind: ShaderKind::Fragment,
            log: "ERROR: 0:3".to_string(),
        };
        assert_eq!(error.to_string(), "fragment shader failed to compile: ERROR: 0:3");

        let error = PlanarError::UnknownObject { kind: "plane", id: 4 };
        assert_eq!(error.to_string(), "no plane with id 4");
    }
}
