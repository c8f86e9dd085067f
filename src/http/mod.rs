//! Request executor.
//!
//! One `reqwest::Client` behind a thin request description. Every failure a
//! request can produce is normalized into [`ApiError`] here, so the cache and
//! its callers never see transport-level detail.

use std::sync::Arc;

use metrics::counter;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::cache::Fetcher;
use crate::config::SyncConfig;
use crate::error::{ApiError, from_error_body};

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Multipart form kept as data so the request stays `Clone`; the form is
    /// rebuilt per execution.
    Multipart(Vec<MultipartField>),
}

#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

#[derive(Debug, Clone)]
pub enum MultipartValue {
    Text(String),
    File { filename: String, bytes: Vec<u8> },
}

/// Everything needed to execute one API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, pairs: &[(&str, String)]) -> Self {
        self.query
            .extend(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }
}

/// Executes [`ApiRequest`]s against one base URL.
///
/// The underlying client keeps a cookie store, so session credentials ride
/// along with every request.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: Url,
}

impl RequestExecutor {
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| ApiError::Decode(format!("invalid base url `{base}`: {err}")))?;
        Ok(Self { client, base_url })
    }

    /// Runs the request and normalizes the outcome.
    ///
    /// 2xx with a JSON body yields the body; `204 No Content` yields
    /// `Value::Null`. Non-2xx bodies are parsed as `{ detail }` error shapes;
    /// anything network-level becomes `Transport`.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|err| ApiError::Decode(format!("invalid path `{}`: {err}", request.path)))?;
        debug!(method = %request.method, url = %url, "Executing request");
        counter!("rivolo_http_requests_total").increment(1);

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)),
        };

        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text)
                .map_err(|err| ApiError::Decode(format!("invalid response body: {err}")))
        } else {
            counter!("rivolo_http_failures_total").increment(1);
            Err(from_error_body(status.as_u16(), &text))
        }
    }

    /// Adapts a request into a cache fetcher.
    pub fn fetcher(&self, request: ApiRequest) -> Fetcher {
        let executor = self.clone();
        Arc::new(move || {
            let executor = executor.clone();
            let request = request.clone();
            Box::pin(async move { executor.execute(&request).await })
        })
    }
}

fn build_form(fields: &[MultipartField]) -> Form {
    let mut form = Form::new();
    for field in fields {
        form = match &field.value {
            MultipartValue::Text(text) => form.text(field.name.clone(), text.clone()),
            MultipartValue::File { filename, bytes } => form.part(
                field.name.clone(),
                Part::bytes(bytes.clone()).file_name(filename.clone()),
            ),
        };
    }
    form
}
