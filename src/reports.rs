use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::Serialize;

use crate::clock::now_millis;
use crate::error::IciError;

/// A user's note that something they expected to be remembered was not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LostMemoryReport {
    /// 1-based, sequential within the env.
    pub id: usize,
    pub report: String,
    pub timestamp: f64,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllReports {
    pub reports_by_env: BTreeMap<String, Vec<LostMemoryReport>>,
    pub total_reports: usize,
}

#[derive(Default)]
pub struct LostMemoryReports {
    by_env: RwLock<HashMap<String, Vec<LostMemoryReport>>>,
}

impl LostMemoryReports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &self,
        env_id: &str,
        report: &str,
        timestamp: Option<f64>,
        client_id: Option<&str>,
    ) -> Result<LostMemoryReport, IciError> {
        if env_id.trim().is_empty() {
            return Err(IciError::MissingField("env_id".to_string()));
        }
        if report.trim().is_empty() {
            return Err(IciError::MissingField("report".to_string()));
        }
        let mut by_env = self.by_env.write().unwrap_or_else(|e| e.into_inner());
        let reports = by_env.entry(env_id.to_string()).or_default();
        let entry = LostMemoryReport {
            id: reports.len() + 1,
            report: report.trim().to_string(),
            timestamp: timestamp.unwrap_or_else(now_millis),
            client_id: client_id
                .filter(|c| !c.is_empty())
                .unwrap_or("unknown")
                .to_string(),
        };
        reports.push(entry.clone());
        tracing::info!(
            "reports: #{} filed for env {}",
            entry.id,
            env_id.get(..12).unwrap_or(env_id)
        );
        Ok(entry)
    }

    /// Reports for one env in submission order.
    pub fn for_env(&self, env_id: &str) -> Vec<LostMemoryReport> {
        self.by_env
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(env_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Reports for one env, most recent first.
    pub fn list(&self, env_id: &str) -> Vec<LostMemoryReport> {
        let mut reports = self.for_env(env_id);
        reports.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
        reports
    }

    pub fn list_all(&self) -> AllReports {
        let by_env = self.by_env.read().unwrap_or_else(|e| e.into_inner());
        let reports_by_env: BTreeMap<String, Vec<LostMemoryReport>> =
            by_env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        AllReports {
            total_reports: reports_by_env.values().map(Vec::len).sum(),
            reports_by_env,
        }
    }

    pub fn clear(&self) {
        self.by_env.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
