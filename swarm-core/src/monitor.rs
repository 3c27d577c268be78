//! In-memory call statistics per endpoint and per day.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{Days, Local, NaiveDate};
use dashmap::DashMap;
use serde::Serialize;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Counters of one day for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub calls: u64,
    pub total_duration_ms: f64,
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
}

impl DayStats {
    fn add(&mut self, elapsed_ms: f64) {
        self.calls += 1;
        self.total_duration_ms += elapsed_ms;
        self.min_duration_ms = Some(self.min_duration_ms.map_or(elapsed_ms, |m| m.min(elapsed_ms)));
        self.max_duration_ms = Some(self.max_duration_ms.map_or(elapsed_ms, |m| m.max(elapsed_ms)));
    }
}

/// Statistics of one `Controller@method` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatRecord {
    pub controller_name: String,
    pub method_name: String,
    pub calls: u64,
    pub total_duration_ms: f64,
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
    /// Keyed by `YYYY-MM-DD`.
    pub per_day: BTreeMap<String, DayStats>,
}

impl CallStatRecord {
    fn new(controller: &str, method: &str) -> Self {
        Self {
            controller_name: controller.to_string(),
            method_name: method.to_string(),
            calls: 0,
            total_duration_ms: 0.0,
            min_duration_ms: None,
            max_duration_ms: None,
            per_day: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}@{}", self.controller_name, self.method_name)
    }
}

/// Duration summary of a report bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DurationSummary {
    pub avg: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsBucket {
    pub calls: u64,
    pub duration: DurationSummary,
    #[serde(skip)]
    total_ms: f64,
}

impl StatsBucket {
    fn absorb(&mut self, calls: u64, total_ms: f64, min: Option<f64>, max: Option<f64>) {
        self.calls += calls;
        self.total_ms += total_ms;
        if let Some(min) = min {
            self.duration.min = Some(self.duration.min.map_or(min, |m| m.min(min)));
        }
        if let Some(max) = max {
            self.duration.max = Some(self.duration.max.map_or(max, |m| m.max(max)));
        }
    }

    fn finish(&mut self) {
        self.duration.avg = if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        };
    }
}

/// Answer of the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Milliseconds since the monitor was created.
    pub uptime: u64,
    pub global: StatsBucket,
    pub per_day: BTreeMap<String, StatsBucket>,
}

/// Per-endpoint call statistics, shared by every in-flight request.
///
/// Recording never fails; concurrent updates of one endpoint are serialized
/// by the map shard lock.
#[derive(Debug)]
pub struct Monitor {
    records: DashMap<String, CallStatRecord>,
    started_at: Instant,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Record one completed call made today.
    pub fn record(&self, controller: &str, method: &str, elapsed: Duration) {
        self.record_on(
            controller,
            method,
            Local::now().date_naive(),
            elapsed.as_nanos() as f64 / 1_000_000.0,
        );
    }

    /// Record one completed call of `elapsed_ms` milliseconds made on `day`.
    pub fn record_on(&self, controller: &str, method: &str, day: NaiveDate, elapsed_ms: f64) {
        let mut record = self
            .records
            .entry(format!("{controller}@{method}"))
            .or_insert_with(|| CallStatRecord::new(controller, method));
        record.calls += 1;
        record.total_duration_ms += elapsed_ms;
        record.min_duration_ms = Some(record.min_duration_ms.map_or(elapsed_ms, |m| m.min(elapsed_ms)));
        record.max_duration_ms = Some(record.max_duration_ms.map_or(elapsed_ms, |m| m.max(elapsed_ms)));
        record
            .per_day
            .entry(day.format(DAY_FORMAT).to_string())
            .or_default()
            .add(elapsed_ms);
    }

    pub fn get(&self, controller: &str, method: &str) -> Option<CallStatRecord> {
        self.records
            .get(&format!("{controller}@{method}"))
            .map(|r| r.value().clone())
    }

    /// Every record, ordered by key.
    pub fn snapshot(&self) -> Vec<CallStatRecord> {
        let mut records: Vec<CallStatRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(CallStatRecord::key);
        records
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Aggregate the records matching `filter` (`all` or `Controller@method`),
    /// keeping per-day buckets from `today - days` on.
    pub fn report(&self, filter: &str, days: i64, today: NaiveDate) -> StatsReport {
        let since = today
            .checked_sub_days(Days::new(days.max(0) as u64))
            .unwrap_or(NaiveDate::MIN)
            .format(DAY_FORMAT)
            .to_string();

        let mut global = StatsBucket::default();
        let mut per_day: BTreeMap<String, StatsBucket> = BTreeMap::new();

        for entry in self.records.iter() {
            if filter != "all" && filter != entry.key() {
                continue;
            }
            let record = entry.value();
            global.absorb(
                record.calls,
                record.total_duration_ms,
                record.min_duration_ms,
                record.max_duration_ms,
            );
            for (day, stats) in record.per_day.range(since.clone()..) {
                per_day.entry(day.clone()).or_default().absorb(
                    stats.calls,
                    stats.total_duration_ms,
                    stats.min_duration_ms,
                    stats.max_duration_ms,
                );
            }
        }

        global.finish();
        per_day.values_mut().for_each(StatsBucket::finish);

        StatsReport {
            uptime: self.uptime().as_millis() as u64,
            global,
            per_day,
        }
    }
}
