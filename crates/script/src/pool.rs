//! Pool of sandboxed `rhai::Engine`s. Mirrors the lock-free get/put shape
//! of a WASM-plugin pool, even though a single `rhai::Engine` built with
//! the `sync` feature is already `Send + Sync` on its own: pooling still
//! buys each concurrent script run its own scope and avoids engines
//! accumulating compiled-AST cache bloat from unrelated callers.

use crossbeam_queue::ArrayQueue;
use rhai::Engine;
use std::sync::Arc;

use crate::bot::register_bot_api;

pub struct EnginePool {
    engines: Arc<ArrayQueue<Engine>>,
}

impl EnginePool {
    pub fn new(capacity: usize) -> Self {
        let engines = Arc::new(ArrayQueue::new(capacity));
        for _ in 0..capacity {
            let _ = engines.push(new_sandboxed_engine());
        }
        Self { engines }
    }

    /// Pop a ready engine or build a fresh one if the pool is momentarily
    /// drained (bursts beyond `capacity` still run, just without reuse).
    pub fn checkout(&self) -> Engine {
        self.engines.pop().unwrap_or_else(new_sandboxed_engine)
    }

    /// Return an engine to the pool. Dropped silently if the pool is full,
    /// which only happens if `capacity` grew smaller than the number of
    /// engines in flight.
    pub fn checkin(&self, engine: Engine) {
        let _ = self.engines.push(engine);
    }
}

fn new_sandboxed_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_expr_depths(64, 32);
    engine.set_max_operations(10_000_000);
    engine.set_max_string_size(1_000_000);
    engine.set_max_array_size(100_000);
    engine.set_max_map_size(100_000);
    register_bot_api(&mut engine);
    engine
}
