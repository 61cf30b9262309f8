use {
    crate::{
        types::{AggregationResult, BucketStats},
        window::TimeWindow,
    },
    serde::Serialize,
    tracing::info,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    /// metric -> bucket -> percentiles
    Buckets(AggregationResult),
    /// One distribution for the whole result set; `None` when it was empty.
    Flat(Option<BucketStats>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub query: String,
    pub window: TimeWindow,
    pub rows: usize,
    pub summary: Summary,
}

impl Report {
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn log_summary(&self) {
        info!("\n=== PERCENTILES {}..{} ===", self.window.start, self.window.end);
        info!("Rows: {}", self.rows);

        match &self.summary {
            Summary::Buckets(result) if result.is_empty() => info!("No metrics in window"),
            Summary::Buckets(result) => {
                for (metric, buckets) in result {
                    info!("{}:", metric);
                    if buckets.is_empty() {
                        info!("  (no retained samples)");
                    }
                    for (bucket, stats) in buckets {
                        info!("  bucket {}: {}", bucket, format_stats(stats));
                    }
                }
            }
            Summary::Flat(Some(stats)) => info!("All rows: {}", format_stats(stats)),
            Summary::Flat(None) => info!("No durations in result"),
        }
    }
}

pub fn format_stats(stats: &BucketStats) -> String {
    format!("p50={}ms, p80={}ms, p90={}ms", stats.p50, stats.p80, stats.p90)
}

/// Pretty JSON for a batch: one report per statement, in file order.
pub fn render_reports(reports: &[Report]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
