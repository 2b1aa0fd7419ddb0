use aws_sdk_sqs::types::Message;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, sleep};

use crate::config::EvokeConfig;
use crate::error::BrokerError;

/// Message attributes the broker reads off each event.
pub const ATTR_IMAGE: &str = "image";
pub const ATTR_SIZE: &str = "size";
pub const ATTR_COMMAND: &str = "command";

/// Mirrors the queue's default visibility timeout.
const VISIBILITY_TIMEOUT_SECONDS: i32 = 30;

/// Long-polling SQS intake.
pub struct EventSource {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    max_messages: i32,
    wait_seconds: i32,
}

impl EventSource {
    pub fn new(client: aws_sdk_sqs::Client, config: &EvokeConfig) -> Self {
        Self {
            client,
            queue_url: config.sqs_queue_url.clone(),
            max_messages: config.events_per_machine,
            wait_seconds: config.sqs_long_poll_seconds,
        }
    }

    /// Receive loop. Each non-empty receive is sent down `tx` as one batch;
    /// the loop ends when `shutdown` flips or the receiver side goes away.
    pub async fn listen(
        &self,
        mut shutdown: watch::Receiver<bool>,
        tx: mpsc::Sender<Vec<Message>>,
    ) -> Result<(), BrokerError> {
        tracing::info!(queue = %self.queue_url, "listening on SQS queue");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("shutdown: no longer listening for messages");
                    return Ok(());
                }
                received = self.receive() => {
                    let messages = received?;
                    if !messages.is_empty() {
                        tracing::debug!(count = messages.len(), "messages received");
                        if tx.send(messages).await.is_err() {
                            // Dispatcher is gone; nothing left to feed.
                            return Ok(());
                        }
                    }

                    // Add time between calls if we don't long poll.
                    if self.wait_seconds < 1 {
                        sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        }
    }

    async fn receive(&self) -> Result<Vec<Message>, BrokerError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.max_messages)
            .wait_time_seconds(self.wait_seconds)
            .visibility_timeout(VISIBILITY_TIMEOUT_SECONDS)
            .message_attribute_names(ATTR_IMAGE)
            .message_attribute_names(ATTR_SIZE)
            .message_attribute_names(ATTR_COMMAND)
            .send()
            .await
            .map_err(|e| BrokerError::Receive(e.to_string()))?;

        Ok(response.messages.unwrap_or_default())
    }

    /// Delete one handled message by receipt handle.
    pub async fn acknowledge(&self, receipt: &str) -> Result<(), BrokerError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| BrokerError::Delete(e.to_string()))?;
        Ok(())
    }
}
