use wasmtime::component::ResourceTable;
use wasmtime_wasi::{WasiCtx, WasiCtxBuilder, WasiCtxView, WasiView};
use wasmtime_wasi_http::{WasiHttpCtx, WasiHttpView};

/// Per-invocation WASI state.
///
/// A fresh `WasiState` is created for every handler call, so handlers are
/// stateless across invocations.
///
/// Sandbox shape:
/// - stdout/stderr inherited; handler output belongs to the machine's log
///   stream
/// - no filesystem preopens
/// - no host environment variables; the event argument is the only input
/// - outbound network via WASI HTTP only
pub struct WasiState {
    ctx: WasiCtx,
    table: ResourceTable,
    http: WasiHttpCtx,
}

impl WasiView for WasiState {
    fn ctx(&mut self) -> WasiCtxView<'_> {
        WasiCtxView {
            ctx: &mut self.ctx,
            table: &mut self.table,
        }
    }
}

impl WasiHttpView for WasiState {
    fn ctx(&mut self) -> &mut WasiHttpCtx {
        &mut self.http
    }
    fn table(&mut self) -> &mut ResourceTable {
        &mut self.table
    }
}

impl WasiState {
    pub fn new() -> anyhow::Result<Self> {
        let ctx = WasiCtxBuilder::new()
            .inherit_stdout()
            .inherit_stderr()
            .build();

        Ok(Self {
            ctx,
            table: ResourceTable::new(),
            http: WasiHttpCtx::new(),
        })
    }
}
