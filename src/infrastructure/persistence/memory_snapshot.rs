use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::application::config::{expand_path, BasicAuth, SnapshotConfig};
use crate::domain::entities::metric::{MetricPoint, MetricValue};
use crate::domain::entities::process::ProcessRef;
use crate::domain::ports::store::{SnapshotStore, StoreError};

#[derive(Debug, Clone, Serialize)]
struct HistoryPoint {
    t: DateTime<Utc>,
    #[serde(flatten)]
    point: MetricPoint,
}

#[derive(Debug, Clone, Serialize)]
struct Series {
    name: String,
    active: bool,
    #[serde(skip)]
    touched: bool,
    last: MetricPoint,
    history: VecDeque<HistoryPoint>,
}

/// One (process, metric) series as it appears in digests and dumps.
#[derive(Serialize)]
struct SeriesEntry<'a> {
    pm_id: u32,
    key: &'a str,
    #[serde(flatten)]
    series: &'a Series,
}

#[derive(Serialize)]
struct Digest<'a> {
    sent_at: DateTime<Utc>,
    series: Vec<SeriesEntry<'a>>,
}

struct State {
    series: BTreeMap<(u32, String), Series>,
    last_sent: Instant,
}

/// In-memory metric history with a periodic HTTP digest.
pub struct MemorySnapshotStore {
    state: Mutex<State>,
    history_size: usize,
    digest_period: Duration,
    url: Option<String>,
    auth: Option<BasicAuth>,
    dump_path: PathBuf,
    client: reqwest::Client,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            state: Mutex::new(State {
                series: BTreeMap::new(),
                last_sent: Instant::now(),
            }),
            history_size: config.history_size.max(1),
            digest_period: Duration::from_secs(config.digest_period_m.saturating_mul(60)),
            url: config.url.clone(),
            auth: config.auth.clone().filter(|a| !a.user.is_empty()),
            dump_path: expand_path(&config.dump_path),
            client: reqwest::Client::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of points buffered for a series.
    #[must_use]
    pub fn history_len(&self, pm_id: u32, key: &str) -> usize {
        self.state()
            .series
            .get(&(pm_id, key.to_string()))
            .map_or(0, |s| s.history.len())
    }

    #[must_use]
    pub fn is_active(&self, pm_id: u32, key: &str) -> bool {
        self.state()
            .series
            .get(&(pm_id, key.to_string()))
            .is_some_and(|s| s.active)
    }

    async fn post_digest(&self, url: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .timeout(Duration::from_secs(10))
            .body(body);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::DigestFailed(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::DigestFailed(format!("HTTP {}", response.status())))
        }
    }
}

fn entries(series: &BTreeMap<(u32, String), Series>, active_only: bool) -> Vec<SeriesEntry<'_>> {
    series
        .iter()
        .filter(|(_, s)| !active_only || s.active)
        .map(|((pm_id, key), series)| SeriesEntry {
            pm_id: *pm_id,
            key,
            series,
        })
        .collect()
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn last(&self, pm_id: u32, key: &str) -> Option<MetricValue> {
        self.state()
            .series
            .get(&(pm_id, key.to_string()))
            .map(|s| s.last.v.clone())
    }

    fn push(&self, process: &ProcessRef, key: &str, keep_history: bool, point: MetricPoint) {
        let mut state = self.state();
        let series = state
            .series
            .entry((process.pm_id, key.to_string()))
            .or_insert_with(|| Series {
                name: process.name.clone(),
                active: true,
                touched: true,
                last: point.clone(),
                history: VecDeque::new(),
            });
        series.name.clone_from(&process.name);
        series.active = true;
        series.touched = true;
        if keep_history {
            if series.history.len() >= self.history_size {
                series.history.pop_front();
            }
            series.history.push_back(HistoryPoint {
                t: Utc::now(),
                point: point.clone(),
            });
        }
        series.last = point;
    }

    fn inactivate(&self) {
        for series in self.state().series.values_mut() {
            if !series.touched && series.active {
                tracing::debug!("series of {} no longer observed", series.name);
                series.active = false;
                series.history.clear();
            }
            series.touched = false;
        }
    }

    async fn send(&self) -> Result<(), StoreError> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let (body, sent) = {
            let state = self.state();
            if state.last_sent.elapsed() < self.digest_period {
                return Ok(());
            }
            let series = entries(&state.series, true);
            let sent: Vec<((u32, String), usize)> = series
                .iter()
                .map(|e| ((e.pm_id, e.key.to_string()), e.series.history.len()))
                .collect();
            let digest = Digest {
                sent_at: Utc::now(),
                series,
            };
            let body = serde_json::to_vec(&digest)
                .map_err(|e| StoreError::DigestFailed(format!("serialization: {e}")))?;
            (body, sent)
        };

        self.post_digest(url, body).await?;

        let mut state = self.state();
        state.last_sent = Instant::now();
        for (id, count) in sent {
            if let Some(series) = state.series.get_mut(&id) {
                let count = count.min(series.history.len());
                series.history.drain(..count);
            }
        }
        tracing::debug!("snapshot digest sent to {url}");
        Ok(())
    }

    fn dump(&self) -> Result<PathBuf, StoreError> {
        let json = {
            let state = self.state();
            serde_json::to_vec_pretty(&entries(&state.series, false))
                .map_err(|e| StoreError::WriteFailed(format!("serialization: {e}")))?
        };
        if let Some(parent) = self.dump_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::WriteFailed(format!("cannot create dump directory: {e}"))
            })?;
        }
        std::fs::write(&self.dump_path, json)
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", self.dump_path.display())))?;
        Ok(self.dump_path.clone())
    }
}
