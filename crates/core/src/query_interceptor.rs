//! The query interceptor call site (spec §4.5 item 1): the Orchestrator
//! hands every accepted query to `query.bot` before anything else runs,
//! and a script setting `handled = true` short-circuits the turn
//! entirely (the script is expected to have spoken its own answer via
//! `bot.tts`, per spec §2 "F triggers B for query scripts").

use async_trait::async_trait;
use conversant_script::ScriptHost;
use std::path::PathBuf;
use std::sync::Arc;

#[async_trait]
pub trait QueryInterceptor: Send + Sync {
    /// Returns whether the script handled the query itself.
    async fn intercept(&self, query: &str) -> bool;
}

/// Reads `query.bot` fresh on every call (scripts are editable at
/// runtime via `/query/script`) and runs it through the `ScriptHost`.
/// A missing script file, or the script erroring, is treated as
/// "not handled" so the normal turn proceeds.
pub struct ScriptQueryInterceptor {
    host: Arc<ScriptHost>,
    script_path: PathBuf,
}

impl ScriptQueryInterceptor {
    pub fn new(host: Arc<ScriptHost>, script_path: PathBuf) -> Self {
        Self { host, script_path }
    }
}

#[async_trait]
impl QueryInterceptor for ScriptQueryInterceptor {
    async fn intercept(&self, query: &str) -> bool {
        let source = match tokio::fs::read_to_string(&self.script_path).await {
            Ok(s) => s,
            Err(_) => return false,
        };
        match self.host.run_query_interceptor(&source, query.to_string()).await {
            Ok(handled) => handled,
            Err(e) => {
                tracing::warn!(error = %e, "query interceptor script failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHandles;
    struct NeverHandles;

    #[async_trait]
    impl QueryInterceptor for AlwaysHandles {
        async fn intercept(&self, _query: &str) -> bool {
            true
        }
    }

    #[async_trait]
    impl QueryInterceptor for NeverHandles {
        async fn intercept(&self, _query: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn fake_interceptors_report_their_configured_outcome() {
        assert!(AlwaysHandles.intercept("hi").await);
        assert!(!NeverHandles.intercept("hi").await);
    }
}
