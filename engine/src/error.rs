use thiserror::Error;

/// Errors surfaced by the engine run loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A collaborator failed while loading. No ticks were executed and the
    /// unload callback was not invoked.
    #[error("engine load failed: {0}")]
    Load(Box<dyn std::error::Error + Send + Sync>),
}
