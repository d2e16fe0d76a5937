use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::categorize::CategoryRules;
use crate::db::{models::ActivityRecord, Database};

/// Total focused seconds attributed to one category over a range.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub seconds: f64,
}

/// Read side of the record store: time-ranged queries plus the category
/// enrichment the HTTP surface serves.
#[derive(Clone)]
pub struct QueryService {
    db: Database,
    rules: Arc<CategoryRules>,
}

impl QueryService {
    pub fn new(db: Database, rules: Arc<CategoryRules>) -> Self {
        Self { db, rules }
    }

    /// Records with a start time inside `[start, end]` (inclusive bounds,
    /// either side may be unbounded), most recent first. Unknown streams
    /// yield an empty sequence.
    pub async fn query_range(
        &self,
        stream_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityRecord>> {
        self.db.range_query(stream_id, start, end).await
    }

    /// The fixed-stream query of the legacy API: the same records as an
    /// unbounded `query_range`, wrapped in one extra sequence layer. The
    /// wrapping exists purely for wire-shape compatibility.
    pub async fn canned_query(&self, stream_id: &str) -> Result<Vec<Vec<ActivityRecord>>> {
        let records = self.query_range(stream_id, None, None).await?;
        Ok(vec![records])
    }

    /// Category label for a record's payload.
    pub fn label(&self, record: &ActivityRecord) -> String {
        self.rules
            .categorize(&record.data.app, &record.data.title)
            .to_string()
    }

    /// Seconds of focus per category over a range, largest share first.
    pub async fn category_summary(
        &self,
        stream_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CategoryTotal>> {
        let records = self.query_range(stream_id, start, end).await?;

        let mut totals: HashMap<String, f64> = HashMap::new();
        for record in &records {
            *totals.entry(self.label(record)).or_default() += record.duration_secs;
        }

        let mut summary: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(category, seconds)| CategoryTotal { category, seconds })
            .collect();
        summary.sort_by(|a, b| {
            b.seconds
                .partial_cmp(&a.seconds)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });

        Ok(summary)
    }
}
