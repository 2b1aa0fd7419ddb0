use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlyError>;

#[derive(Debug, Error)]
pub enum FlyError {
    #[error("machine '{machine}' not found in app '{app}'")]
    MachineNotFound { app: String, machine: String },

    #[error("machines api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
