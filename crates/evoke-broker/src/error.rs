use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("could not receive SQS messages: {0}")]
    Receive(String),

    #[error("could not delete SQS message: {0}")]
    Delete(String),

    #[error("could not compose event batch: {0}")]
    Batch(#[from] serde_json::Error),

    #[error(transparent)]
    Fly(#[from] evoke_fly::FlyError),
}
