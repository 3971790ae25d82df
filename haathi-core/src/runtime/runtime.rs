//! The host runtime: one guest module, one [`HostState`], driven a frame at a time.

use anyhow::{Context, anyhow};
use wasmtime::{Engine, Linker, Store};

use crate::abi::GuestEntrypoints;
use crate::canvas::Canvas2d;
use crate::config::HostConfig;
use crate::input::{GuestEvent, InputEvent};
use crate::loader;
use crate::state::HostState;

/// Host-side runtime container.
pub struct HaathiRuntime {
    engine: Engine,
    store: Store<HostState>,
    linker: Linker<HostState>,
    guest: Option<GuestEntrypoints>,
}

impl HaathiRuntime {
    /// Build host state from `config` and a runtime around it.
    pub fn new(config: &HostConfig) -> anyhow::Result<Self> {
        Self::with_state(HostState::new(config)?)
    }

    /// Create a runtime with imports defined over an existing `state`.
    pub fn with_state(state: HostState) -> anyhow::Result<Self> {
        let mut cfg = wasmtime::Config::new();
        cfg.wasm_multi_value(true);
        cfg.wasm_bulk_memory(true);
        cfg.wasm_reference_types(true);
        cfg.wasm_simd(true);

        let engine = Engine::new(&cfg)?;
        let store = Store::new(&engine, state);
        let mut linker = Linker::new(&engine);
        super::imports::define_imports(&mut linker)?;

        Ok(Self {
            engine,
            store,
            linker,
            guest: None,
        })
    }

    /// Compile and instantiate a `.wasm` or `.wat` module, then run its `init` if exported.
    pub fn load(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let module = loader::compile_module(&self.engine, bytes)?;
        let instance = self
            .linker
            .instantiate(&mut self.store, &module)
            .context("failed to instantiate guest")?;
        let guest = GuestEntrypoints::resolve(&instance, &mut self.store)?;
        self.store.data_mut().memory = Some(guest.memory);

        if let Some(init) = &guest.init {
            init.call(&mut self.store, ())
                .map_err(|e| trapped("init", e))?;
        }
        tracing::info!(
            update = guest.update.is_some(),
            keys = guest.key_down.is_some() || guest.key_up.is_some(),
            "guest loaded"
        );
        self.guest = Some(guest);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.guest.is_some()
    }

    /// Queue an input event for the next frame.
    pub fn push_input(&mut self, event: InputEvent) {
        self.store.data_mut().input.push(event);
    }

    /// Run one frame at timestamp `millis` and return its interleaved stereo audio.
    pub fn frame(&mut self, millis: i64) -> anyhow::Result<Vec<i16>> {
        let guest = self
            .guest
            .clone()
            .ok_or_else(|| anyhow!("no guest module loaded"))?;

        let state = self.store.data_mut();
        state.clock.advance_to(millis);
        let height = state.surface.canvas().height();
        let mut events = state.input.drain().into_iter();
        while let Some(event) = events.next() {
            if let Err(e) = self.dispatch(&guest, event.to_guest(height)) {
                let pending: Vec<_> = events.collect();
                if !pending.is_empty() {
                    tracing::warn!(pending = pending.len(), "requeued input after guest trap");
                    self.store.data_mut().input.requeue_front(pending);
                }
                return Err(e);
            }
        }

        if let Some(update) = &guest.update {
            update
                .call(&mut self.store, millis)
                .map_err(|e| trapped("update", e))?;
        }
        guest
            .render
            .call(&mut self.store, ())
            .map_err(|e| trapped("render", e))?;

        let state = self.store.data_mut();
        let mut samples = vec![0; state.samples_per_frame()];
        state.audio.mix(&mut samples);
        Ok(samples)
    }

    fn dispatch(&mut self, guest: &GuestEntrypoints, event: GuestEvent) -> anyhow::Result<()> {
        let (name, result) = match event {
            GuestEvent::KeyDown(code) => ("keyDown", call1(&guest.key_down, &mut self.store, code)),
            GuestEvent::KeyUp(code) => ("keyUp", call1(&guest.key_up, &mut self.store, code)),
            GuestEvent::MouseDown(button) => (
                "mouseDown",
                call1(&guest.mouse_down, &mut self.store, button),
            ),
            GuestEvent::MouseUp(button) => {
                ("mouseUp", call1(&guest.mouse_up, &mut self.store, button))
            }
            GuestEvent::MouseMove(x, y) => (
                "mouseMove",
                guest
                    .mouse_move
                    .as_ref()
                    .map(|f| f.call(&mut self.store, (x, y))),
            ),
        };
        match result {
            Some(r) => r.map_err(|e| trapped(name, e)),
            None => {
                tracing::trace!(export = name, "guest does not handle event; dropped");
                Ok(())
            }
        }
    }

    pub fn state(&self) -> &HostState {
        self.store.data()
    }

    pub fn state_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }

    /// The guest's linear memory, once a module is loaded.
    pub fn guest_memory(&self) -> Option<&[u8]> {
        self.guest.as_ref().map(|g| g.memory.data(&self.store))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

fn call1(
    func: &Option<wasmtime::TypedFunc<i32, ()>>,
    store: &mut Store<HostState>,
    arg: u32,
) -> Option<wasmtime::Result<()>> {
    func.as_ref().map(|f| f.call(&mut *store, arg as i32))
}

fn trapped(export: &str, error: wasmtime::Error) -> anyhow::Error {
    tracing::error!(export, error = %format!("{error:#}"), "guest trapped");
    error.context(format!("guest `{export}` trapped"))
}
