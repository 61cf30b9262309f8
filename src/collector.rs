use {
    crate::{
        Config,
        n1ql::{N1qlClient, N1qlConfig, QueryError, QueryRequest},
        processor::{Processor, RecordError},
        report::{Report, Summary},
        types::{DurationRow, QueryKind, QueryRow},
        window::TimeWindow,
    },
    std::{path::Path, time::Duration},
    tracing::{info, warn},
};

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Failed to aggregate rows: {0}")]
    Record(#[from] RecordError),

    #[error("Unable to read query file {path}: {source}")]
    QueryFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Query file {0} contains no statements")]
    EmptyQueryFile(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;

/// Builds the window statement over the configured metrics. Rows come back
/// sorted by metric, bucket and value, which the aggregation relies on.
pub fn window_statement(metrics: &[String]) -> String {
    let metric_list = metrics
        .iter()
        .map(|m| serde_json::Value::String(m.clone()).to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "select kingdom as metric, phylum as subtype, `count` as timeMsec from stats \
         where type=\"m_table_count_debug\" and kingdom in [{metric_list}] \
         and phylum > 0 and phylum < 10 and game_id=3 and `count` > 0 \
         and timestamp > $start and timestamp < $end \
         order by kingdom, phylum, `count`"
    )
}

/// Reads one statement per line; blank lines and `#` comments are skipped.
pub fn read_query_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| CollectorError::QueryFile {
        path: path.display().to_string(),
        source,
    })?;

    let statements: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();

    if statements.is_empty() {
        return Err(CollectorError::EmptyQueryFile(path.display().to_string()));
    }
    Ok(statements)
}

pub struct Collector {
    config: Config,
    client: N1qlClient,
}

impl Collector {
    pub fn new(config: Config) -> Result<Self> {
        let client = N1qlClient::new(Self::make_n1ql_config(&config))?;
        Ok(Self { config, client })
    }

    pub async fn check_connection(&self) -> Result<Duration> {
        Ok(self.client.ping().await?)
    }

    pub const fn trailing_window(&self, now: i64) -> TimeWindow {
        let w = &self.config.window;
        TimeWindow::trailing(now, w.lookback, w.lag)
    }

    pub const fn batch_window(&self, now: i64) -> TimeWindow {
        TimeWindow::since(now, self.config.window.batch_diff)
    }

    pub fn statement(&self) -> String {
        self.config
            .query
            .statement
            .clone()
            .unwrap_or_else(|| window_statement(&self.config.query.metrics))
    }

    /// Percentiles per metric and bucket for rows strictly between
    /// `window.start` and `window.end`.
    pub async fn run_window(&self, window: TimeWindow) -> Result<Report> {
        info!(
            "Querying window start={} end={} ({}s)",
            window.start,
            window.end,
            window.len_secs()
        );

        let request = QueryRequest::new(self.statement())
            .named("start", window.start)
            .named("end", window.end);

        self.run_debug(request, window).await
    }

    /// Runs every statement of a query file with `$1` bound to
    /// `window.start`. The first failure aborts the batch.
    pub async fn run_batch(
        &self,
        path: &Path,
        kind: QueryKind,
        window: TimeWindow,
    ) -> Result<Vec<Report>> {
        let statements = read_query_file(path)?;
        info!(
            "Running {} {:?} statements since {}",
            statements.len(),
            kind,
            window.start
        );

        let mut reports = Vec::with_capacity(statements.len());
        for statement in statements {
            let request = QueryRequest::new(statement).arg(window.start);
            let report = match kind {
                QueryKind::Debug => self.run_debug(request, window).await?,
                QueryKind::Player => self.run_player(request, window).await?,
            };
            reports.push(report);
        }

        Ok(reports)
    }

    async fn run_debug(&self, request: QueryRequest, window: TimeWindow) -> Result<Report> {
        let rows: Vec<QueryRow> = self.client.query_rows(&request).await?;
        let row_count = rows.len();
        if rows.is_empty() {
            warn!("No rows returned for window {}..{}", window.start, window.end);
        }

        let result = Processor::aggregate_rows(rows, self.config.aggregation.sample_policy)?;

        Ok(Report {
            query: request.statement,
            window,
            rows: row_count,
            summary: Summary::Buckets(result),
        })
    }

    async fn run_player(&self, request: QueryRequest, window: TimeWindow) -> Result<Report> {
        let rows: Vec<DurationRow> = self.client.query_rows(&request).await?;
        let row_count = rows.len();
        let stats = Processor::summarize_durations(rows)?;
        if stats.is_none() {
            warn!("No durations returned for: {}", request.statement);
        }

        Ok(Report {
            query: request.statement,
            window,
            rows: row_count,
            summary: Summary::Flat(stats),
        })
    }

    fn make_n1ql_config(config: &Config) -> N1qlConfig {
        let q = &config.query;
        N1qlConfig {
            server_url: q.server_url.clone(),
            timeout: q.timeout,
            request_timeout: q.request_timeout,
            username: q.username.clone(),
            password: q.password.clone(),
        }
    }
}
