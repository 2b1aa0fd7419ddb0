use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::batch::{Event, EventBatch};

/// Error raised by a single handler invocation.
///
/// Whatever the cause (a trap, an error value returned by the handler, a
/// failure setting up the call), it collapses into this one wrapper and the
/// replay loop treats it the same. Only failures surfaced synchronously by
/// the `invoke` call are captured; nothing is guaranteed about work the
/// handler hands off elsewhere.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerExecutionError(pub String);

/// The user-supplied handler: one invocable of one argument, returning
/// nothing usable, possibly failing.
pub trait Handler: Send + Sync {
    fn invoke<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerExecutionError>> + Send + 'a>>;
}

/// Outcome counts for one replay pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl ReplayReport {
    /// Total invocation attempts. Always equals the batch length.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Invoke the handler once per event, in batch order.
///
/// Invocations are strictly sequential: invocation *i + 1* does not begin
/// until invocation *i* has resolved. A failed invocation is logged and
/// suppressed; the loop always runs to the end of the batch.
pub async fn replay(handler: &dyn Handler, batch: &EventBatch) -> ReplayReport {
    let mut report = ReplayReport::default();

    for (index, event) in batch.iter().enumerate() {
        match handler.invoke(event).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!(index, error = %e, "handler execution error");
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every event it sees and fails on the 1-indexed calls listed.
    struct RecordingHandler {
        seen: Mutex<Vec<Event>>,
        fail_on: Vec<usize>,
    }

    impl RecordingHandler {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_on,
            }
        }

        fn seen(&self) -> Vec<Event> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Handler for RecordingHandler {
        fn invoke<'a>(
            &'a self,
            event: &'a Event,
        ) -> Pin<Box<dyn Future<Output = Result<(), HandlerExecutionError>> + Send + 'a>> {
            Box::pin(async move {
                let call = {
                    let mut seen = self.seen.lock().unwrap();
                    seen.push(event.clone());
                    seen.len()
                };
                if self.fail_on.contains(&call) {
                    Err(HandlerExecutionError(format!("boom on call {call}")))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn invokes_once_per_event_in_order() {
        let handler = RecordingHandler::new(vec![]);
        let batch = EventBatch::from_json(r#"[{"id":1},{"id":2},{"id":3}]"#).unwrap();

        let report = replay(&handler, &batch).await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(
            handler.seen(),
            vec![json!({"id":1}), json!({"id":2}), json!({"id":3})]
        );
    }

    #[tokio::test]
    async fn a_failure_does_not_stop_the_batch() {
        let handler = RecordingHandler::new(vec![1]);
        let batch = EventBatch::from_json(r#"[{"id":1},{"id":2}]"#).unwrap();

        let report = replay(&handler, &batch).await;

        assert_eq!(report.attempted(), 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(handler.seen().len(), 2);
    }

    #[tokio::test]
    async fn runs_to_completion_when_every_call_fails() {
        let handler = RecordingHandler::new(vec![1, 2, 3]);
        let batch = EventBatch::from_json(r#"[1, 2, 3]"#).unwrap();

        let report = replay(&handler, &batch).await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failed, 3);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test]
    async fn empty_batch_invokes_nothing() {
        let handler = RecordingHandler::new(vec![]);
        let batch = EventBatch::from_json("[]").unwrap();

        let report = replay(&handler, &batch).await;

        assert_eq!(report.attempted(), 0);
        assert!(handler.seen().is_empty());
    }

    #[tokio::test]
    async fn events_pass_through_unchanged() {
        let handler = RecordingHandler::new(vec![]);
        let batch =
            EventBatch::from_json(r#"[{"nested":{"deep":[1,2]}}, "scalar", null]"#).unwrap();

        replay(&handler, &batch).await;

        assert_eq!(
            handler.seen(),
            vec![json!({"nested":{"deep":[1,2]}}), json!("scalar"), json!(null)]
        );
    }
}
