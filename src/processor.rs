use {
    crate::types::{
        AggregationResult, BucketStats, DurationRow, FieldValue, LatencyRecord, QueryRow,
        REPORTED_PERCENTILES, SamplePolicy,
    },
    serde_json::Value,
    tracing::{debug, trace},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Row {row}: missing field `{field}`")]
    MissingField { row: usize, field: &'static str },

    #[error(
        "Row {row}: field `{field}` of metric {metric:?} is not a non-negative integer: {value:?}"
    )]
    InvalidField {
        row: usize,
        field: &'static str,
        metric: String,
        value: String,
    },

    #[error("Row {row}: malformed duration document: {reason}")]
    InvalidDuration { row: usize, reason: String },
}

/// Nearest-rank percentile: the element at `floor(len * n / 100) - 1`,
/// clamped into the slice. `samples` is expected to be sorted already.
pub fn percentile(samples: &[u64], n: u64) -> Option<u64> {
    let len = samples.len();
    if len == 0 {
        return None;
    }
    let rank = (len as u64).saturating_mul(n) / 100;
    let index = usize::try_from(rank.saturating_sub(1)).unwrap_or(usize::MAX);
    samples.get(index.min(len - 1)).copied()
}

impl BucketStats {
    /// Sorts the samples and picks p50/p80/p90. `None` for an empty group.
    pub fn from_samples(mut samples: Vec<u64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();

        let [p50, p80, p90] = REPORTED_PERCENTILES.map(|n| percentile(&samples, n));
        Some(Self {
            p50: p50?,
            p80: p80?,
            p90: p90?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupKey {
    metric: String,
    bucket: u32,
}

/// Single-pass grouping scan over records sorted by (metric, bucket).
///
/// Only the samples of the currently open group are buffered. Closing a
/// group turns its buffer into [`BucketStats`] stored under the metric that
/// owned it; groups left without samples produce no entry.
#[derive(Debug)]
pub struct Aggregator {
    policy: SamplePolicy,
    open: Option<GroupKey>,
    samples: Vec<u64>,
    result: AggregationResult,
}

impl Aggregator {
    pub const fn new(policy: SamplePolicy) -> Self {
        Self {
            policy,
            open: None,
            samples: Vec::new(),
            result: AggregationResult::new(),
        }
    }

    pub fn push(&mut self, record: LatencyRecord) {
        let LatencyRecord {
            metric,
            bucket,
            value_msec,
        } = record;

        let first_record = self.open.is_none();
        let new_metric = self.open.as_ref().is_none_or(|key| key.metric != metric);
        let continues = self
            .open
            .as_ref()
            .is_some_and(|key| key.metric == metric && key.bucket == bucket);

        if new_metric {
            self.result.entry(metric.clone()).or_default();
        }

        if continues {
            self.samples.push(value_msec);
            return;
        }

        self.close_group();
        self.open = Some(GroupKey { metric, bucket });

        match self.policy {
            SamplePolicy::RetainAll => self.samples.push(value_msec),
            SamplePolicy::DropGroupOpener if first_record => self.samples.push(value_msec),
            SamplePolicy::DropGroupOpener => {
                trace!(bucket, value_msec, "Dropping group opener sample");
            }
        }
    }

    /// Closes the last group and returns the accumulated result.
    pub fn finish(mut self) -> AggregationResult {
        self.close_group();
        self.result
    }

    fn close_group(&mut self) {
        let Some(key) = self.open.take() else {
            return;
        };
        let samples = std::mem::take(&mut self.samples);
        let count = samples.len();

        match BucketStats::from_samples(samples) {
            Some(stats) => {
                debug!(
                    metric = %key.metric,
                    bucket = key.bucket,
                    samples = count,
                    "Closed bucket"
                );
                self.result
                    .entry(key.metric)
                    .or_default()
                    .insert(key.bucket, stats);
            }
            None => {
                debug!(
                    metric = %key.metric,
                    bucket = key.bucket,
                    "Skipping bucket with no retained samples"
                );
            }
        }
    }
}

pub struct Processor;

impl Processor {
    pub fn aggregate<I>(records: I, policy: SamplePolicy) -> AggregationResult
    where
        I: IntoIterator<Item = LatencyRecord>,
    {
        let mut aggregator = Aggregator::new(policy);
        for record in records {
            aggregator.push(record);
        }
        aggregator.finish()
    }

    /// Like [`Processor::aggregate`], stopping at the first failed record.
    pub fn try_aggregate<I, E>(records: I, policy: SamplePolicy) -> Result<AggregationResult, E>
    where
        I: IntoIterator<Item = Result<LatencyRecord, E>>,
    {
        let mut aggregator = Aggregator::new(policy);
        for record in records {
            aggregator.push(record?);
        }
        Ok(aggregator.finish())
    }

    pub fn aggregate_rows(
        rows: Vec<QueryRow>,
        policy: SamplePolicy,
    ) -> Result<AggregationResult, RecordError> {
        Self::try_aggregate(
            rows.into_iter()
                .enumerate()
                .map(|(row, raw)| Self::to_record(row, raw)),
            policy,
        )
    }

    /// Flat p50/p80/p90 over every `duration` in the result set.
    pub fn summarize_durations(rows: Vec<DurationRow>) -> Result<Option<BucketStats>, RecordError> {
        let values = rows
            .into_iter()
            .enumerate()
            .map(|(row, raw)| Self::to_duration(row, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BucketStats::from_samples(values))
    }

    pub fn to_record(row: usize, raw: QueryRow) -> Result<LatencyRecord, RecordError> {
        let metric = raw.metric.ok_or(RecordError::MissingField {
            row,
            field: "metric",
        })?;
        let subtype = raw.subtype.ok_or(RecordError::MissingField {
            row,
            field: "subtype",
        })?;
        let time_msec = raw.time_msec.ok_or(RecordError::MissingField {
            row,
            field: "timeMsec",
        })?;

        let invalid = |field: &'static str, value: &FieldValue| RecordError::InvalidField {
            row,
            field,
            metric: metric.clone(),
            value: value.to_string(),
        };

        let bucket = Self::parse_integer(&subtype)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid("subtype", &subtype))?;
        let value_msec =
            Self::parse_integer(&time_msec).ok_or_else(|| invalid("timeMsec", &time_msec))?;

        Ok(LatencyRecord {
            metric,
            bucket,
            value_msec,
        })
    }

    fn to_duration(row: usize, raw: DurationRow) -> Result<u64, RecordError> {
        let invalid = |reason: String| RecordError::InvalidDuration { row, reason };

        let document = match raw.duration {
            None => {
                return Err(RecordError::MissingField {
                    row,
                    field: "duration",
                });
            }
            Some(Value::String(text)) => {
                serde_json::from_str::<Value>(&text).map_err(|e| invalid(e.to_string()))?
            }
            Some(other) => other,
        };

        // Either the bare number or an object carrying it under `duration`
        let number = match &document {
            Value::Number(n) => n.as_f64(),
            Value::Object(map) => map.get("duration").and_then(Value::as_f64),
            _ => None,
        }
        .ok_or_else(|| invalid(format!("no numeric duration in {document}")))?;

        if !number.is_finite() || number < 0.0 {
            return Err(invalid(format!("duration out of range: {number}")));
        }

        Ok(number.round() as u64)
    }

    fn parse_integer(value: &FieldValue) -> Option<u64> {
        match value {
            FieldValue::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            FieldValue::Text(s) => s.trim().parse::<u64>().ok(),
        }
    }
}
