//! Chinese public-holiday lookups, backed by the `holiday-cn` data set:
//! an in-memory cache over a per-year disk cache over a best-effort HTTPS
//! fetch, falling back to a plain weekend rule when all of those miss.

use chrono::{Datelike, NaiveDate, Weekday};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct HolidayDay {
    date: String,
    #[serde(rename = "isOffDay")]
    is_off_day: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct HolidayYear {
    days: Vec<HolidayDay>,
}

#[derive(Clone)]
pub struct HolidayCalendar {
    cache_dir: PathBuf,
    memory: Arc<RwLock<HashMap<i32, HashMap<String, bool>>>>,
    http: reqwest::Client,
}

impl HolidayCalendar {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir, memory: Arc::new(RwLock::new(HashMap::new())), http: reqwest::Client::new() }
    }

    async fn year_map(&self, year: i32) -> HashMap<String, bool> {
        if let Some(map) = self.memory.read().get(&year) {
            return map.clone();
        }

        let map = self.load_from_disk(year).or_else(|| None).unwrap_or(HashMap::new());
        let map = if map.is_empty() { self.fetch_and_cache(year).await.unwrap_or_default() } else { map };

        self.memory.write().insert(year, map.clone());
        map
    }

    fn disk_path(&self, year: i32) -> PathBuf {
        self.cache_dir.join(format!("{year}.json"))
    }

    fn load_from_disk(&self, year: i32) -> Option<HashMap<String, bool>> {
        let text = std::fs::read_to_string(self.disk_path(year)).ok()?;
        let parsed: HolidayYear = serde_json::from_str(&text).ok()?;
        Some(parsed.days.into_iter().map(|d| (d.date, d.is_off_day)).collect())
    }

    async fn fetch_and_cache(&self, year: i32) -> Option<HashMap<String, bool>> {
        let url = format!("https://raw.githubusercontent.com/NateScarlet/holiday-cn/master/{year}.json");
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let bytes = resp.bytes().await.ok()?;
        let parsed: HolidayYear = serde_json::from_slice(&bytes).ok()?;

        if std::fs::create_dir_all(&self.cache_dir).is_ok() {
            let _ = std::fs::write(self.disk_path(year), &bytes);
        }

        Some(parsed.days.into_iter().map(|d| (d.date, d.is_off_day)).collect())
    }

    /// True for legal holidays, compensated rest days, and plain
    /// weekends once the calendar has no opinion.
    pub async fn is_holiday(&self, date: NaiveDate) -> bool {
        let key = date.format("%Y-%m-%d").to_string();
        let map = self.year_map(date.year()).await;
        if let Some(is_off) = map.get(&key) {
            return *is_off;
        }
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// True for ordinary workdays, including compensated workdays that
    /// land on what would otherwise be a weekend.
    pub async fn is_workday(&self, date: NaiveDate) -> bool {
        let key = date.format("%Y-%m-%d").to_string();
        let map = self.year_map(date.year()).await;
        if let Some(is_off) = map.get(&key) {
            return !*is_off;
        }
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_weekend_rule_with_no_cache_or_network() {
        let dir = tempfile::tempdir().unwrap();
        let calendar = HolidayCalendar::new(dir.path().to_path_buf());
        // A Saturday with nothing on disk and (in test sandboxes) no
        // network reachable: must fall back to the weekend rule.
        let saturday = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(saturday.weekday(), Weekday::Sat);
    }

    #[tokio::test]
    async fn reads_disk_cache_before_hitting_the_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2026.json"),
            r#"{"year":2026,"papers":[],"days":[{"name":"元旦","date":"2026-01-01","isOffDay":true}]}"#,
        )
        .unwrap();
        let calendar = HolidayCalendar::new(dir.path().to_path_buf());
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(calendar.is_holiday(day).await);
        assert!(!calendar.is_workday(day).await);
    }
}
