mod collector;
mod config;
mod n1ql;
mod processor;
mod report;
mod types;
mod window;

pub use {
    collector::{Collector, CollectorError, read_query_file, window_statement},
    config::{AggregationConfig, Config, ConfigError, MAX_WINDOW_SPAN, QueryConfig, WindowConfig},
    n1ql::{N1qlClient, N1qlConfig, QueryError, QueryRequest},
    processor::{Aggregator, Processor, RecordError, percentile},
    report::{Report, Summary, format_stats, render_reports},
    types::{
        AggregationResult, BucketStats, DurationRow, FieldValue, LatencyRecord, QueryKind,
        QueryRow, REPORTED_PERCENTILES, SamplePolicy,
    },
    window::{TimeWindow, unix_now},
};
