use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures while loading the handler component.
///
/// Any of these means the handler cannot be invoked at all; callers abort
/// before entering the replay loop.
#[derive(Debug, Error)]
pub enum HandlerLoadError {
    #[error("could not read handler at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("handler is not a valid component: {0}")]
    CompilationFailed(String),

    #[error("handler could not be instantiated: {0}")]
    InstantiationFailed(String),

    #[error("component has no invocable 'handler' export")]
    NotInvocable,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Failure of a single handler invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("invocation failed: {0}")]
    InvocationFailed(String),

    #[error("handler returned an error: {0}")]
    HandlerFailed(String),
}
