//! Ties the engine pool, persisted storage and the three call sites
//! (query interceptor, HTTP task handler, scheduled job) together behind
//! one `ScriptHost` (spec §4.5).

use rhai::{Dynamic, Engine, Map, Scope, AST};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::bot::BotHandle;
use crate::bot_api::{AiBridge, BotApi};
use crate::error::ScriptError;
use crate::pool::EnginePool;
use crate::storage::Storage;

pub struct ScriptHost {
    pool: EnginePool,
    storage: Storage,
    bot: Arc<dyn BotApi>,
    ai: Arc<dyn AiBridge>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub redirect: Option<String>,
}

#[derive(Clone)]
struct ResHandle {
    inner: Arc<parking_lot::Mutex<ResHandleState>>,
}

struct ResHandleState {
    response: TaskResponse,
    written: bool,
}

impl ResHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(ResHandleState {
                response: TaskResponse { status: 200, ..Default::default() },
                written: false,
            })),
        }
    }

    fn status(&mut self, code: i64) -> bool {
        let mut s = self.inner.lock();
        if s.written {
            return false;
        }
        s.response.status = code.clamp(100, 599) as u16;
        true
    }

    fn set(&mut self, key: String, value: String) -> bool {
        let mut s = self.inner.lock();
        if s.written {
            return false;
        }
        s.response.headers.insert(key, value);
        true
    }

    fn send(&mut self, text: String) -> bool {
        let mut s = self.inner.lock();
        if s.written {
            return false;
        }
        s.response.body = text.into_bytes();
        s.written = true;
        true
    }

    fn json(&mut self, value: Dynamic) -> bool {
        let mut s = self.inner.lock();
        if s.written {
            return false;
        }
        let json: serde_json::Value = rhai::serde::from_dynamic(&value).unwrap_or(serde_json::Value::Null);
        s.response.body = json.to_string().into_bytes();
        s.response.headers.insert("content-type".into(), "application/json".into());
        s.written = true;
        true
    }

    fn redirect(&mut self, url: String) -> bool {
        let mut s = self.inner.lock();
        if s.written {
            return false;
        }
        s.response.status = 302;
        s.response.redirect = Some(url);
        s.written = true;
        true
    }

    fn take(self) -> TaskResponse {
        Arc::try_unwrap(self.inner)
            .map(|m| m.into_inner().response)
            .unwrap_or_else(|arc| arc.lock().response.clone())
    }
}

fn register_res_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<ResHandle>("Response")
        .register_fn("status", ResHandle::status)
        .register_fn("set", ResHandle::set)
        .register_fn("send", ResHandle::send)
        .register_fn("json", ResHandle::json)
        .register_fn("redirect", ResHandle::redirect);
}

fn request_to_map(req: &TaskRequest) -> Map {
    let mut map = Map::new();
    map.insert("method".into(), req.method.clone().into());
    map.insert("url".into(), req.url.clone().into());
    map.insert("body".into(), req.body.clone().into());
    map.insert("headers".into(), string_map_to_dynamic(&req.headers));
    map.insert("params".into(), string_map_to_dynamic(&req.params));
    map.insert("query".into(), string_map_to_dynamic(&req.query));
    map
}

fn string_map_to_dynamic(map: &HashMap<String, String>) -> Dynamic {
    let rhai_map: Map = map.iter().map(|(k, v)| (k.as_str().into(), v.clone().into())).collect();
    Dynamic::from(rhai_map)
}

impl ScriptHost {
    pub fn new(pool_capacity: usize, storage: Storage, bot: Arc<dyn BotApi>, ai: Arc<dyn AiBridge>) -> Self {
        Self { pool: EnginePool::new(pool_capacity), storage, bot, ai }
    }

    fn bot_handle(&self) -> BotHandle {
        BotHandle { bot: self.bot.clone(), ai: self.ai.clone(), handle: Handle::current() }
    }

    fn compile(engine: &Engine, source: &str) -> Result<AST, ScriptError> {
        engine.compile(source).map_err(|e| ScriptError::Compile(e.to_string()))
    }

    /// Query interceptor: scripts see `query: string` and set `handled:
    /// bool` to short-circuit the normal ask-LLM path (spec §4.5 item 1).
    pub async fn run_query_interceptor(&self, source: &str, query: String) -> Result<bool, ScriptError> {
        let engine = self.pool.checkout();
        let storage_snapshot = self.storage.snapshot();
        let bot_handle = self.bot_handle();
        let source = source.to_string();

        let (result, engine, storage_map) = tokio::task::spawn_blocking(move || {
            let ast = match Self::compile(&engine, &source) {
                Ok(ast) => ast,
                Err(e) => return (Err(e), engine, Map::new()),
            };
            let mut scope = Scope::new();
            scope.push("bot", bot_handle);
            scope.push("storage", storage_snapshot);
            scope.push("query", query);
            scope.push("handled", false);

            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| engine.run_ast_with_scope(&mut scope, &ast)));
            let storage_map = scope.get_value::<Map>("storage").unwrap_or_default();
            let handled = scope.get_value::<bool>("handled").unwrap_or(false);
            let result = match outcome {
                Ok(Ok(())) => Ok(handled),
                Ok(Err(e)) => Err(ScriptError::Runtime(e.to_string())),
                Err(panic) => Err(ScriptError::Panic(panic_message(panic))),
            };
            (result, engine, storage_map)
        })
        .await
        .map_err(|e| ScriptError::Panic(e.to_string()))?;

        self.pool.checkin(engine);
        if !storage_map.is_empty() {
            self.storage.commit(storage_map)?;
        }
        result
    }

    /// HTTP task handler: scripts see `req` (read-only) and a mutable
    /// `res` object; only the first write-capable call on `res` sticks
    /// (spec §4.5 item 2, "single WriteHeader").
    pub async fn run_task(&self, source: &str, request: TaskRequest) -> Result<TaskResponse, ScriptError> {
        let mut engine = self.pool.checkout();
        register_res_type(&mut engine);
        let storage_snapshot = self.storage.snapshot();
        let bot_handle = self.bot_handle();
        let req_map = request_to_map(&request);
        let res_handle = ResHandle::new();
        let res_for_read = res_handle.clone();
        let source = source.to_string();

        let (result, engine, storage_map) = tokio::task::spawn_blocking(move || {
            let ast = match ScriptHost::compile(&engine, &source) {
                Ok(ast) => ast,
                Err(e) => return (Err(e), engine, Map::new()),
            };
            let mut scope = Scope::new();
            scope.push("bot", bot_handle);
            scope.push("storage", storage_snapshot);
            scope.push("req", req_map);
            scope.push("res", res_handle);

            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| engine.run_ast_with_scope(&mut scope, &ast)));
            let storage_map = scope.get_value::<Map>("storage").unwrap_or_default();
            let result = match outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ScriptError::Runtime(e.to_string())),
                Err(panic) => Err(ScriptError::Panic(panic_message(panic))),
            };
            (result, engine, storage_map)
        })
        .await
        .map_err(|e| ScriptError::Panic(e.to_string()))?;

        self.pool.checkin(engine);
        if !storage_map.is_empty() {
            self.storage.commit(storage_map)?;
        }
        result?;
        Ok(res_for_read.take())
    }

    /// Scheduled job: scripts see only `bot` and `storage`, no request
    /// context (spec §4.4/§4.5, cron-triggered scripts).
    pub async fn run_scheduled_job(&self, source: &str) -> Result<(), ScriptError> {
        let engine = self.pool.checkout();
        let storage_snapshot = self.storage.snapshot();
        let bot_handle = self.bot_handle();
        let source = source.to_string();

        let (result, engine, storage_map) = tokio::task::spawn_blocking(move || {
            let ast = match ScriptHost::compile(&engine, &source) {
                Ok(ast) => ast,
                Err(e) => return (Err(e), engine, Map::new()),
            };
            let mut scope = Scope::new();
            scope.push("bot", bot_handle);
            scope.push("storage", storage_snapshot);

            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| engine.run_ast_with_scope(&mut scope, &ast)));
            let storage_map = scope.get_value::<Map>("storage").unwrap_or_default();
            let result = match outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ScriptError::Runtime(e.to_string())),
                Err(panic) => Err(ScriptError::Panic(panic_message(panic))),
            };
            (result, engine, storage_map)
        })
        .await
        .map_err(|e| ScriptError::Panic(e.to_string()))?;

        self.pool.checkin(engine);
        if !storage_map.is_empty() {
            self.storage.commit(storage_map)?;
        }
        result
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
