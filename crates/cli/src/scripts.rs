//! Script file conventions (spec §6 "Script files"): everything under the
//! config directory that isn't the config file itself or the holiday
//! cache (owned directly by [`conversant_cron::HolidayCalendar`]).

use anyhow::{Context, Result};
use conversant_cron::CronJob;
use std::path::{Path, PathBuf};

pub const QUERY_SCRIPT_NAME: &str = "query.bot";

pub fn task_script_path(scripts_dir: &Path, name: &str) -> PathBuf {
    scripts_dir.join(format!("{name}.bot"))
}

pub fn adapter_script_path(scripts_dir: &Path, model: &str) -> PathBuf {
    scripts_dir.join(format!("{model}.adapter"))
}

pub fn query_script_path(scripts_dir: &Path) -> PathBuf {
    scripts_dir.join(QUERY_SCRIPT_NAME)
}

pub fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read script {}", path.display()))
}

pub fn save_script(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, source).with_context(|| format!("failed to write script {}", path.display()))
}

/// One `clockNNNN.json` descriptor plus its sibling `.job` script body.
pub struct CronEntry {
    pub filename: String,
    pub job: CronJob,
    pub script: String,
}

pub fn job_script_path(scripts_dir: &Path, filename: &str) -> PathBuf {
    let stem = filename.strip_suffix(".json").unwrap_or(filename);
    scripts_dir.join(format!("{stem}.job"))
}

/// Scans `scripts_dir` for `clockNNNN.json` descriptors, pairing each
/// with its sibling `.job` script (spec §6 "sibling `.job` file is its
/// script"). Entries with no readable script are skipped and logged.
pub fn discover_cron_jobs(scripts_dir: &Path) -> Vec<CronEntry> {
    let Ok(entries) = std::fs::read_dir(scripts_dir) else {
        return Vec::new();
    };
    let mut jobs = Vec::new();
    for entry in entries.flatten() {
        let filename = entry.file_name().to_string_lossy().to_string();
        if !filename.starts_with("clock") || !filename.ends_with(".json") {
            continue;
        }
        let job = match std::fs::read_to_string(entry.path()).ok().and_then(|text| serde_json::from_str::<CronJob>(&text).ok()) {
            Some(j) => j,
            None => {
                tracing::warn!(filename, "skipping unreadable cron descriptor");
                continue;
            }
        };
        let script = match read_script(&job_script_path(scripts_dir, &filename)) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(filename, error = %e, "skipping cron descriptor with no script");
                continue;
            }
        };
        jobs.push(CronEntry { filename, job, script });
    }
    jobs.sort_by(|a, b| a.filename.cmp(&b.filename));
    jobs
}

/// Picks the next unused `clockNNNN.json` name in `scripts_dir`.
pub fn next_cron_filename(scripts_dir: &Path) -> String {
    let mut n = 1u32;
    loop {
        let candidate = format!("clock{n:04}.json");
        if !scripts_dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

pub fn save_cron_job(scripts_dir: &Path, filename: &str, job: &CronJob, script: &str) -> Result<()> {
    std::fs::create_dir_all(scripts_dir)?;
    let json = serde_json::to_string_pretty(job)?;
    std::fs::write(scripts_dir.join(filename), json)?;
    save_script(&job_script_path(scripts_dir, filename), script)?;
    Ok(())
}

pub fn delete_cron_job(scripts_dir: &Path, filename: &str) -> Result<()> {
    std::fs::remove_file(scripts_dir.join(filename)).ok();
    std::fs::remove_file(job_script_path(scripts_dir, filename)).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conversant_cron::{Cycle, EndCondition};
    use std::collections::HashSet;

    fn sample_job(filename: &str) -> CronJob {
        CronJob {
            filename: filename.to_string(),
            is_active: true,
            name: "test".into(),
            start_time: chrono::Local::now().naive_local(),
            lunar: false,
            cycle: Cycle::Once,
            cycle_details: HashSet::new(),
            skip_holidays: false,
            skip_weekdays: false,
            repeat: false,
            repeat_interval_secs: 0.0,
            repeat_duration_secs: 0.0,
            end: EndCondition::Forever,
            end_count: 0,
            end_date: None,
        }
    }

    #[test]
    fn next_cron_filename_skips_existing() {
        let dir = std::env::temp_dir().join(format!("conversant-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clock0001.json"), "{}").unwrap();
        assert_eq!(next_cron_filename(&dir), "clock0002.json");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_and_discover_round_trips() {
        let dir = std::env::temp_dir().join(format!("conversant-cli-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let job = sample_job("clock0001.json");
        save_cron_job(&dir, "clock0001.json", &job, "bot.tts(\"hi\", false);").unwrap();

        let found = discover_cron_jobs(&dir);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].script, "bot.tts(\"hi\", false);");

        delete_cron_job(&dir, "clock0001.json").unwrap();
        assert!(discover_cron_jobs(&dir).is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
