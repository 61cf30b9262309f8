use {
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::{Map, Value},
    std::time::{Duration, Instant},
    tracing::{debug, info},
};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Query finished with status {status}: {message}")]
    QueryFailed { status: String, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Row {index} has an unexpected shape: {reason}")]
    MalformedRow { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Clone)]
pub struct N1qlConfig {
    pub server_url: String,
    pub timeout: Duration,
    pub request_timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// One statement plus its parameters. Named parameters are sent as
/// `$name`, positional ones through `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub statement: String,
    named: Vec<(String, Value)>,
    args: Vec<Value>,
}

impl QueryRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            named: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str, value: impl Into<Value>) -> Self {
        let name = name.trim_start_matches('$');
        self.named.push((format!("${name}"), value.into()));
        self
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn to_body(&self, timeout: Duration) -> Value {
        let mut body = Map::new();
        body.insert("statement".into(), Value::String(self.statement.clone()));
        body.insert(
            "timeout".into(),
            Value::String(format!("{}ms", timeout.as_millis())),
        );
        for (name, value) in &self.named {
            body.insert(name.clone(), value.clone());
        }
        if !self.args.is_empty() {
            body.insert("args".into(), Value::Array(self.args.clone()));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: Option<String>,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    errors: Vec<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<i64>,
    msg: Option<String>,
}

impl ServiceError {
    fn describe(errors: &[Self]) -> String {
        errors
            .iter()
            .map(|e| match (e.code, e.msg.as_deref()) {
                (Some(code), Some(msg)) => format!("[{code}] {msg}"),
                (None, Some(msg)) => msg.to_string(),
                (Some(code), None) => format!("[{code}]"),
                (None, None) => "unknown error".to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Client for the Couchbase query service REST endpoint.
#[derive(Clone)]
pub struct N1qlClient {
    config: N1qlConfig,
    http: reqwest::Client,
}

impl N1qlClient {
    pub fn new(config: N1qlConfig) -> Result<Self> {
        if config.server_url.is_empty() {
            return Err(QueryError::InvalidConfig("Empty server_url".into()));
        }
        if config.username.is_some() != config.password.is_some() {
            return Err(QueryError::InvalidConfig(
                "username and password must be set together".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QueryError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, http })
    }

    pub fn service_url(&self) -> String {
        format!(
            "{}/query/service",
            self.config.server_url.trim_end_matches('/')
        )
    }

    pub fn ping_url(&self) -> String {
        format!("{}/admin/ping", self.config.server_url.trim_end_matches('/'))
    }

    /// Checks that the query service answers before any statement is sent.
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        let response = self
            .authorized(self.http.get(self.ping_url()))
            .send()
            .await
            .map_err(|e| QueryError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::HttpError(
                status.as_u16(),
                format!("Ping returned {status}"),
            ));
        }

        let elapsed = start.elapsed();
        debug!("Query service ping took {:?}", elapsed);
        Ok(elapsed)
    }

    /// Runs a statement and returns its rows in server order.
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<Value>> {
        let start = Instant::now();
        info!("Running query: {}", request.statement);

        let response = self
            .authorized(self.http.post(self.service_url()))
            .json(&request.to_body(self.config.timeout))
            .send()
            .await
            .map_err(|e| QueryError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::RequestFailed(e.to_string()))?;

        let parsed = serde_json::from_str::<QueryResponse>(&body);

        if !status.is_success() {
            let message = match &parsed {
                Ok(resp) if !resp.errors.is_empty() => ServiceError::describe(&resp.errors),
                _ => format!("Server returned status: {status}"),
            };
            return Err(QueryError::HttpError(status.as_u16(), message));
        }

        let parsed = parsed.map_err(|e| QueryError::MalformedResponse(e.to_string()))?;
        let query_status = parsed.status.unwrap_or_else(|| "unknown".to_string());
        if query_status != "success" || !parsed.errors.is_empty() {
            return Err(QueryError::QueryFailed {
                message: ServiceError::describe(&parsed.errors),
                status: query_status,
            });
        }

        info!(
            "Query returned {} rows in {:.2}s",
            parsed.results.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(parsed.results)
    }

    /// Runs a statement and decodes every row as `T`.
    pub async fn query_rows<T: DeserializeOwned>(&self, request: &QueryRequest) -> Result<Vec<T>> {
        self.query(request)
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                serde_json::from_value(row).map_err(|e| QueryError::MalformedRow {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }
}
