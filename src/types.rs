use {
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

/// Percentile ranks reported for every bucket.
pub const REPORTED_PERCENTILES: [u64; 3] = [50, 80, 90];

/// metric -> bucket -> stats
pub type AggregationResult = BTreeMap<String, BTreeMap<u32, BucketStats>>;

/// One latency sample after conversion from a query row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyRecord {
    pub metric: String,
    pub bucket: u32,
    pub value_msec: u64,
}

impl LatencyRecord {
    pub fn new(metric: impl Into<String>, bucket: u32, value_msec: u64) -> Self {
        Self {
            metric: metric.into(),
            bucket,
            value_msec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    #[serde(rename = "50th percentile")]
    pub p50: u64,
    #[serde(rename = "80th percentile")]
    pub p80: u64,
    #[serde(rename = "90th percentile")]
    pub p90: u64,
}

/// What happens to the value of a record that opens a new group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePolicy {
    /// Every record contributes its value.
    #[default]
    RetainAll,
    /// Records that close a group and open the next one contribute nothing,
    /// except the first record of the stream. This matches the sample loss
    /// of older reports only; groups still split on a metric change even
    /// when the bucket repeats, which older reports did not do.
    DropGroupOpener,
}

/// Query kinds understood by the batch runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Rows carry `metric`, `subtype` and `timeMsec`; grouped per metric and bucket.
    Debug,
    /// Rows carry a `duration` document; summarized as a single distribution.
    Player,
}

impl std::str::FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "player" => Ok(Self::Player),
            other => Err(format!("unknown query kind: {other}")),
        }
    }
}

/// A field that the query service may return either as text or as a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Raw row of the debug query.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRow {
    pub metric: Option<String>,
    pub subtype: Option<FieldValue>,
    #[serde(rename = "timeMsec")]
    pub time_msec: Option<FieldValue>,
}

/// Raw row of the player query. `duration` is usually a JSON document
/// encoded as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct DurationRow {
    pub duration: Option<serde_json::Value>,
}
