//! The LLM Adapter Layer (spec §4.6).
//!
//! A per-model script ("`<model>.adapter`") is pre-compiled once and then
//! invoked for each of the three directions the host needs: outgoing
//! request, non-streaming response, and streaming response (once per
//! non-empty line). The script sees injected globals (`request`,
//! `response`, `header`) and its single top-level expression is the value
//! the host reads back.
//!
//! Unlike the bot-script host (`conversant-script`), an adapter script has
//! no `bot.*` API: it is a pure data-reshaping function, so it gets its own
//! lightweight `rhai::Engine` rather than going through the pooled sandbox.

use crate::chat::{ChatCompletionRequest, ChatCompletionResponse, StreamChunk};
use crate::error::LLMError;
use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use std::collections::HashMap;

/// A compiled adapter script plus the engine it was compiled with.
#[derive(Clone)]
pub struct LlmAdapter {
    engine: Engine,
    ast: AST,
}

impl LlmAdapter {
    /// Compile adapter source. Called once at startup and cached for the
    /// lifetime of the process, per spec: "pre-compiled and stored".
    pub fn compile(source: &str) -> Result<Self, LLMError> {
        let engine = Engine::new();
        let ast = engine
            .compile(source)
            .map_err(|e| LLMError::AdapterError(format!("compile failed: {e}")))?;
        Ok(Self { engine, ast })
    }

    fn run(&self, scope: &mut Scope) -> Result<Dynamic, LLMError> {
        self.engine
            .eval_ast_with_scope::<Dynamic>(scope, &self.ast)
            .map_err(|e| LLMError::AdapterError(e.to_string()))
    }

    /// Request direction: canonical request in, wire-format body object out.
    /// `extra_headers` starts empty and collects anything the script added
    /// via `header["X-Foo"] = "bar"`.
    pub fn transform_request(
        &self,
        request: &ChatCompletionRequest,
        extra_headers: &mut HashMap<String, String>,
    ) -> Result<Value, LLMError> {
        let canonical = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": request.stream,
        });
        let mut scope = Scope::new();
        scope.push(
            "request",
            to_dynamic(&canonical).map_err(|e| LLMError::AdapterError(e.to_string()))?,
        );
        scope.push("response", Dynamic::UNIT);
        scope.push("header", rhai::Map::new());

        let result = self.run(&mut scope)?;

        if let Some(header_map) = scope.get_value::<rhai::Map>("header") {
            for (k, v) in header_map {
                if let Ok(s) = v.into_string() {
                    extra_headers.insert(k.to_string(), s);
                }
            }
        }

        dynamic_to_json(result)
    }

    /// Non-streaming response direction: backend body in, canonical
    /// response out.
    pub fn transform_response(&self, backend_body: &Value) -> Result<ChatCompletionResponse, LLMError> {
        let mut scope = Scope::new();
        scope.push("request", Dynamic::UNIT);
        scope.push(
            "response",
            to_dynamic(backend_body).map_err(|e| LLMError::AdapterError(e.to_string()))?,
        );
        scope.push("header", rhai::Map::new());

        let result = self.run(&mut scope)?;
        let value = dynamic_to_json(result)?;
        from_dynamic(&to_dynamic(&value).map_err(|e| LLMError::AdapterError(e.to_string()))?)
            .map_err(|e| LLMError::AdapterError(format!("adapter returned unexpected shape: {e}")))
    }

    /// Streaming response direction: one call per non-empty line already
    /// stripped of an `SSE` `data:` prefix. Returns `None` when the line
    /// carries no visible delta (e.g. a role-only chunk).
    pub fn transform_stream_line(&self, line_payload: &Value) -> Result<Option<StreamChunk>, LLMError> {
        let mut scope = Scope::new();
        scope.push("request", Dynamic::UNIT);
        let mut response_obj = line_payload.clone();
        if let Value::Object(ref mut map) = response_obj {
            map.insert("stream".to_string(), Value::Bool(true));
        }
        scope.push(
            "response",
            to_dynamic(&response_obj).map_err(|e| LLMError::AdapterError(e.to_string()))?,
        );
        scope.push("header", rhai::Map::new());

        let result = self.run(&mut scope)?;
        let value = dynamic_to_json(result)?;
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => match map.get("content").and_then(|v| v.as_str()) {
                Some(text) if !text.is_empty() => Ok(Some(StreamChunk::Delta(text.to_string()))),
                _ => Ok(None),
            },
            Value::String(text) if !text.is_empty() => Ok(Some(StreamChunk::Delta(text))),
            _ => Ok(None),
        }
    }
}

fn dynamic_to_json(value: Dynamic) -> Result<Value, LLMError> {
    rhai::serde::from_dynamic(&value).map_err(|e| LLMError::AdapterError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatRole};

    #[test]
    fn request_adapter_rewrites_body_and_headers() {
        let adapter = LlmAdapter::compile(
            r#"
            header["X-Adapter"] = "v1";
            #{
                "input": request.messages,
                "model_id": request.model,
            }
            "#,
        )
        .unwrap();

        let req = ChatCompletionRequest {
            model: "demo".into(),
            messages: vec![ChatMessage::user("hi")],
            stream: false,
            options: Default::default(),
        };
        let mut headers = HashMap::new();
        let wire = adapter.transform_request(&req, &mut headers).unwrap();
        assert_eq!(wire["model_id"], "demo");
        assert_eq!(headers.get("X-Adapter").unwrap(), "v1");
    }

    #[test]
    fn response_adapter_produces_canonical_shape() {
        let adapter = LlmAdapter::compile(
            r#"
            #{
                "message": #{ "role": "assistant", "content": response.reply },
            }
            "#,
        )
        .unwrap();
        let backend = serde_json::json!({"reply": "hello there"});
        let canonical = adapter.transform_response(&backend).unwrap();
        assert_eq!(canonical.message.role, ChatRole::Assistant);
        assert_eq!(canonical.text(), "hello there");
    }

    #[test]
    fn stream_adapter_emits_delta_or_none() {
        let adapter = LlmAdapter::compile(
            r#"
            if "delta" in response {
                #{ "content": response.delta }
            } else {
                ()
            }
            "#,
        )
        .unwrap();
        let chunk = adapter
            .transform_stream_line(&serde_json::json!({"delta": "hi"}))
            .unwrap();
        assert!(matches!(chunk, Some(StreamChunk::Delta(ref s)) if s == "hi"));

        let none = adapter
            .transform_stream_line(&serde_json::json!({"other": 1}))
            .unwrap();
        assert!(none.is_none());
    }
}
