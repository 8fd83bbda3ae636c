//! Bridges a fired [`conversant_cron::CronJob`] to its script body and
//! runs it through the scheduled-job entry point (spec §4.4 "plus").

use crate::scripts;
use async_trait::async_trait;
use conversant_cron::{CronHandler, CronJob};
use conversant_script::ScriptHost;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ScriptCronHandler {
    scripts_dir: PathBuf,
    host: Arc<ScriptHost>,
}

impl ScriptCronHandler {
    pub fn new(scripts_dir: PathBuf, host: Arc<ScriptHost>) -> Self {
        Self { scripts_dir, host }
    }
}

#[async_trait]
impl CronHandler for ScriptCronHandler {
    async fn run(&self, job: &CronJob) {
        if !job.is_active {
            return;
        }
        let path = scripts::job_script_path(&self.scripts_dir, &job.filename);
        let source = match scripts::read_script(&path) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(filename = %job.filename, error = %e, "cron job has no readable script");
                return;
            }
        };

        let fire = || {
            let host = self.host.clone();
            let source = source.clone();
            async move {
                if let Err(e) = host.run_scheduled_job(&source).await {
                    tracing::error!(error = %e, "cron job script failed");
                }
            }
        };

        fire().await;

        if let Some(window) = job.repeat_window() {
            let host = self.host.clone();
            let source = source.clone();
            let interval = window.interval.to_std().unwrap_or(std::time::Duration::from_secs(1));
            let count = window.repeat_count;
            tokio::spawn(async move {
                for _ in 0..count {
                    tokio::time::sleep(interval).await;
                    if let Err(e) = host.run_scheduled_job(&source).await {
                        tracing::error!(error = %e, "cron repeat-window script failed");
                    }
                }
            });
        }
    }
}
