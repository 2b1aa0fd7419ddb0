use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use wasmtime::Store;
use wasmtime::component::{Component, InstancePre, Val};

use evoke_core::{Event, Handler, HandlerExecutionError};

use crate::context::RuntimeContext;
use crate::error::{HandlerLoadError, InvokeError};
use crate::wasistate::WasiState;

/// Name of the export every handler component must provide.
pub const HANDLER_EXPORT: &str = "handler";

/// A loaded, pre-instantiated handler component.
///
/// Loading happens once; each [`invoke`](Self::invoke) creates a fresh store,
/// so invocations cannot observe each other's state.
pub struct HandlerComponent {
    runtime: RuntimeContext,
    instance_pre: InstancePre<WasiState>,
}

impl HandlerComponent {
    /// Load and verify the handler component at `path`.
    ///
    /// The component is compiled, pre-instantiated, and probed once to check
    /// that it exports an invocable named `handler`. Every failure here is
    /// fatal to the caller; there is nothing to replay without a handler.
    pub async fn load(path: &Path) -> Result<Self, HandlerLoadError> {
        let runtime = RuntimeContext::new()?;

        tracing::info!(path = %path.display(), "loading handler component");

        let bytes = std::fs::read(path).map_err(|source| HandlerLoadError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let component = Component::from_binary(&runtime.engine, &bytes)
            .map_err(|e| HandlerLoadError::CompilationFailed(e.to_string()))?;

        // Pre-instantiate (expensive; done once)
        let instance_pre = runtime
            .linker
            .instantiate_pre(&component)
            .map_err(|e| HandlerLoadError::InstantiationFailed(e.to_string()))?;

        // Probe once so a missing export fails the load, not the first event.
        let mut store = Store::new(&runtime.engine, WasiState::new()?);
        let instance = instance_pre
            .instantiate_async(&mut store)
            .await
            .map_err(|e| HandlerLoadError::InstantiationFailed(e.to_string()))?;

        if instance.get_func(&mut store, HANDLER_EXPORT).is_none() {
            return Err(HandlerLoadError::NotInvocable);
        }

        tracing::info!("handler component loaded and ready");

        Ok(Self {
            runtime,
            instance_pre,
        })
    }

    /// Invoke the handler with one event.
    ///
    /// The event is serialized to JSON and passed to the component's
    /// `handler(event: string) -> result<string, string>` export. The `Ok`
    /// payload is logged at debug and discarded; the harness uses no return
    /// value.
    pub async fn invoke(&self, event: &Event) -> Result<(), InvokeError> {
        let wasi_state =
            WasiState::new().map_err(|e| InvokeError::InvocationFailed(e.to_string()))?;
        let mut store = Store::new(&self.runtime.engine, wasi_state);

        let instance = self
            .instance_pre
            .instantiate_async(&mut store)
            .await
            .map_err(|e| InvokeError::InvocationFailed(e.to_string()))?;

        let handler_func = instance
            .get_func(&mut store, HANDLER_EXPORT)
            .ok_or_else(|| {
                InvokeError::InvocationFailed(format!("no '{HANDLER_EXPORT}' export found"))
            })?;

        let input_json = serde_json::to_string(event)
            .map_err(|e| InvokeError::InvocationFailed(format!("could not encode event: {e}")))?;

        let params = [Val::String(input_json)];
        let mut results = vec![Val::Bool(false)]; // placeholder; overwritten by the call

        handler_func
            .call_async(&mut store, &params, &mut results)
            .await
            .map_err(|e| InvokeError::InvocationFailed(e.to_string()))?;

        // Required after any component call that may return results
        handler_func
            .post_return_async(&mut store)
            .await
            .map_err(|e| InvokeError::InvocationFailed(format!("post_return: {e}")))?;

        if let Some(output) = decode_handler_result(results)? {
            tracing::debug!(output, "handler returned a value (discarded)");
        }

        Ok(())
    }
}

impl Handler for HandlerComponent {
    fn invoke<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            HandlerComponent::invoke(self, event)
                .await
                .map_err(|e| HandlerExecutionError(e.to_string()))
        })
    }
}

/// Decode the `result<string, string>` value returned by a handler call.
fn decode_handler_result(results: Vec<Val>) -> Result<Option<String>, InvokeError> {
    match results.into_iter().next() {
        Some(Val::Result(Ok(Some(boxed)))) => match *boxed {
            Val::String(s) => Ok(Some(s)),
            other => Err(InvokeError::InvocationFailed(format!(
                "expected string in Ok variant, got {other:?}"
            ))),
        },
        Some(Val::Result(Ok(None))) => Ok(None),
        Some(Val::Result(Err(Some(boxed)))) => match *boxed {
            Val::String(e) => Err(InvokeError::HandlerFailed(e)),
            other => Err(InvokeError::HandlerFailed(format!("{other:?}"))),
        },
        Some(Val::Result(Err(None))) => Err(InvokeError::HandlerFailed("(no error detail)".into())),
        Some(other) => Err(InvokeError::InvocationFailed(format!(
            "unexpected return value: {other:?}"
        ))),
        None => Err(InvokeError::InvocationFailed(
            "component returned no values".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_an_ok_payload() {
        let results = vec![Val::Result(Ok(Some(Box::new(Val::String("{}".into())))))];
        assert_eq!(decode_handler_result(results).unwrap(), Some("{}".into()));
    }

    #[test]
    fn decodes_an_empty_ok() {
        let results = vec![Val::Result(Ok(None))];
        assert_eq!(decode_handler_result(results).unwrap(), None);
    }

    #[test]
    fn err_payload_is_a_handler_failure() {
        let results = vec![Val::Result(Err(Some(Box::new(Val::String(
            "bad event".into(),
        )))))];
        let err = decode_handler_result(results).unwrap_err();
        assert!(matches!(err, InvokeError::HandlerFailed(msg) if msg == "bad event"));
    }

    #[test]
    fn empty_err_is_a_handler_failure() {
        let results = vec![Val::Result(Err(None))];
        assert!(matches!(
            decode_handler_result(results).unwrap_err(),
            InvokeError::HandlerFailed(_)
        ));
    }

    #[test]
    fn non_result_value_is_an_invocation_failure() {
        let results = vec![Val::Bool(true)];
        assert!(matches!(
            decode_handler_result(results).unwrap_err(),
            InvokeError::InvocationFailed(_)
        ));
    }

    #[test]
    fn missing_return_value_is_an_invocation_failure() {
        assert!(matches!(
            decode_handler_result(Vec::new()).unwrap_err(),
            InvokeError::InvocationFailed(_)
        ));
    }
}
