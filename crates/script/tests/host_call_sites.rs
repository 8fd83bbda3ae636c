//! Integration coverage for `ScriptHost`'s three call sites (spec §4.5)
//! against fake `BotApi`/`AiBridge` implementations, exercising the
//! `storage` global's cross-run visibility and the HTTP task call
//! site's single-write-wins `res` guard end to end.

use async_trait::async_trait;
use conversant_script::{ScriptHost, Storage, TaskRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct FakeBotApi {
    tts_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl conversant_script::BotApi for FakeBotApi {
    async fn tts(&self, _text: String, _wait: bool) -> Result<(), String> {
        self.tts_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn action(&self, _name: String, _args: Vec<String>) -> Result<String, String> {
        Ok(String::new())
    }
    async fn play_url(&self, _url: String) -> Result<(), String> {
        Ok(())
    }
    async fn wake_up(&self) -> Result<(), String> {
        Ok(())
    }
    async fn stop_speaker(&self) -> Result<(), String> {
        Ok(())
    }
    async fn wait(&self, _seconds: f64) {}
    async fn monitor(&self, _step: i64) {}
}

struct FakeAiBridge;

#[async_trait]
impl conversant_script::AiBridge for FakeAiBridge {
    async fn ask(&self, query: String) -> Result<String, String> {
        Ok(format!("answer to {query}"))
    }
}

fn host() -> (ScriptHost, Arc<AtomicUsize>) {
    let tts_calls = Arc::new(AtomicUsize::new(0));
    let bot = Arc::new(FakeBotApi { tts_calls: tts_calls.clone() });
    let ai = Arc::new(FakeAiBridge);
    let storage = Storage::new();
    (ScriptHost::new(2, storage, bot, ai), tts_calls)
}

#[tokio::test]
async fn query_interceptor_can_short_circuit_and_call_bot() {
    let (host, tts_calls) = host();
    let handled = host
        .run_query_interceptor(r#"if query == "weather" { bot.tts("no need to ask the LLM", false); handled = true; }"#, "weather".to_string())
        .await
        .unwrap();
    assert!(handled);
    assert_eq!(tts_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn query_interceptor_leaves_handled_false_when_untouched() {
    let (host, _) = host();
    let handled = host.run_query_interceptor("let x = 1;", "anything".to_string()).await.unwrap();
    assert!(!handled);
}

#[tokio::test]
async fn task_handler_only_honors_the_first_write_to_res() {
    let (host, _) = host();
    let request = TaskRequest { method: "GET".into(), url: "/task/double-write".into(), ..Default::default() };
    let response = host
        .run_task(r#"res.send("first"); res.send("second");"#, request)
        .await
        .unwrap();
    assert_eq!(response.body, b"first");
}

#[tokio::test]
async fn task_handler_reads_params_and_can_ask_the_ai_bridge() {
    let (host, _) = host();
    let mut request = TaskRequest { method: "GET".into(), url: "/task/greet".into(), ..Default::default() };
    request.params.insert("name".into(), "world".into());
    let response = host
        .run_task(r#"let reply = bot.askAI(req.params["name"]); res.send(reply);"#, request)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(response.body).unwrap(), "answer to world");
}

#[tokio::test]
async fn scheduled_job_storage_write_is_visible_to_the_next_run() {
    let (host, _) = host();
    host.run_scheduled_job(r#"storage["runs"] = (if "runs" in storage { storage["runs"] } else { 0 }) + 1;"#)
        .await
        .unwrap();
    host.run_scheduled_job(r#"storage["runs"] = (if "runs" in storage { storage["runs"] } else { 0 }) + 1;"#)
        .await
        .unwrap();

    // A third run checks-out whichever pooled engine is free; the write
    // from the first two runs must still be visible (spec §8: "value
    // written within an engine is visible to all subsequent engines").
    let request = TaskRequest { method: "GET".into(), url: "/task/read-runs".into(), ..Default::default() };
    let response = host
        .run_task(r#"res.send(storage["runs"].to_string());"#, request)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(response.body).unwrap(), "2");
}

#[tokio::test]
async fn scheduled_job_sees_no_request_context() {
    let (host, _) = host();
    // `req`/`res` are not injected for scheduled jobs; referencing them
    // must fail the script rather than silently resolve to something.
    let result = host.run_scheduled_job(r#"res.send("should not exist");"#).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn a_failing_script_returns_its_engine_to_the_pool() {
    let (host, _) = host();
    let first = host.run_scheduled_job(r#"let v = [1, 2, 3]; v[10];"#).await;
    assert!(first.is_err());

    // The pool (capacity 2) must still be usable after a failing run.
    let second = host.run_scheduled_job("let x = 1 + 1;").await;
    assert!(second.is_ok());
}
