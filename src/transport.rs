use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Connection(String),
    Other(String),
}

pub struct RemoteStream {
    pub total: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;

    fn open(&self, url: &str) -> Result<RemoteStream, PipelineError>;
}

pub fn user_agent() -> String {
    format!("proteomics-pipeline/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent())
                .map_err(|err| PipelineError::RequestFailed {
                    attempts: 0,
                    message: err.to_string(),
                })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        // Per-request timeouts cover API calls; downloads may run for a long time.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| PipelineError::RequestFailed {
                attempts: 0,
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify_reqwest_error)?;
        Ok(TransportResponse { status, body })
    }

    fn open(&self, url: &str) -> Result<RemoteStream, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PipelineError::RequestFailed {
                attempts: 1,
                message: err.to_string(),
            })?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(PipelineError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "download request failed".to_string());
            return Err(PipelineError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(RemoteStream {
            total: response.content_length(),
            reader: Box::new(response),
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
