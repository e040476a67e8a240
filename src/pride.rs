use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{Span, debug, info, info_span, warn};

use crate::cache::{self, CacheStore};
use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use crate::domain::{DatasetAccession, FileDescriptor};
use crate::error::PipelineError;
use crate::ftp;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper, run_with_retry};
use crate::stream::{copy_with_progress, write_with_cleanup};
use crate::transport::{HttpTransport, Transport};

const METADATA_ENDPOINT: &str = "projects";
const FILES_ENDPOINT: &str = "projects/files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Ftp,
}

impl Protocol {
    pub fn of(url: &str) -> Self {
        let is_ftp = url
            .get(..6)
            .map(|scheme| scheme.eq_ignore_ascii_case("ftp://"))
            .unwrap_or(false);
        if is_ftp {
            Protocol::Ftp
        } else {
            Protocol::Http
        }
    }
}

pub struct PrideClient<T: Transport = HttpTransport> {
    transport: T,
    base_url: String,
    cache: CacheStore,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    span: Span,
}

impl PrideClient<HttpTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, PipelineError> {
        let cache = if config.cache_enabled {
            CacheStore::new(config.cache_dir.clone(), config.cache_max_age())
        } else {
            CacheStore::disabled()
        };
        Ok(Self::new(HttpTransport::new()?, &config.base_url, cache)
            .with_retry_policy(config.retry_policy()))
    }
}

impl<T: Transport> PrideClient<T> {
    pub fn new(transport: T, base_url: &str, cache: CacheStore) -> Self {
        let base_url = match base_url.trim() {
            "" => DEFAULT_BASE_URL.to_string(),
            value => value.trim_end_matches('/').to_string(),
        };
        Self {
            transport,
            base_url,
            cache,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            span: Span::none(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The file listing lives on the v3 API while everything else is v2.
    pub fn files_base_url(&self) -> String {
        if let Some(index) = self.base_url.rfind("/v2") {
            let rest = &self.base_url[index + 3..];
            if rest.is_empty() || rest.starts_with('/') {
                return format!("{}/v3{rest}", &self.base_url[..index]);
            }
        }
        self.base_url.clone()
    }

    pub fn get_dataset_metadata(&self, accession: &DatasetAccession) -> Result<Value, PipelineError> {
        let _guard = info_span!(parent: &self.span, "dataset_metadata", accession = %accession)
            .entered();
        let key = CacheStore::key(
            METADATA_ENDPOINT,
            &cache::params([("accession", accession.as_str())]),
        );
        if let Some(cached) = self.cache.read(&key) {
            debug!("using cached metadata");
            return Ok(cached);
        }

        let url = format!("{}/projects/{}", self.base_url, accession.as_str());
        let value = self.request_json(&url, &[])?;
        self.cache.write(&key, &value);
        Ok(value)
    }

    pub fn search_datasets(&self, query: &str, page_size: usize) -> Result<Vec<Value>, PipelineError> {
        let _guard = info_span!(parent: &self.span, "search_datasets", query).entered();
        let url = format!("{}/search/projects", self.base_url);
        let params = vec![
            ("keyword".to_string(), query.to_string()),
            ("pageSize".to_string(), page_size.to_string()),
            ("page".to_string(), "0".to_string()),
            ("sortDirection".to_string(), "DESC".to_string()),
            ("sortFields".to_string(), "submissionDate".to_string()),
        ];
        let value = self.request_json(&url, &params)?;
        let results = normalize_search_results(value);
        debug!(count = results.len(), "search results");
        Ok(results)
    }

    pub fn get_dataset_files(
        &self,
        accession: &DatasetAccession,
    ) -> Result<Vec<FileDescriptor>, PipelineError> {
        let _guard =
            info_span!(parent: &self.span, "dataset_files", accession = %accession).entered();
        let key = CacheStore::key(
            FILES_ENDPOINT,
            &cache::params([("accession", accession.as_str())]),
        );
        if let Some(cached) = self.cache.read(&key) {
            match serde_json::from_value::<Vec<FileDescriptor>>(cached) {
                Ok(files) => {
                    debug!(count = files.len(), "using cached file listing");
                    return Ok(files);
                }
                Err(err) => warn!(error = %err, "cached file listing has unexpected shape"),
            }
        }

        let url = format!(
            "{}/projects/{}/files",
            self.files_base_url(),
            accession.as_str()
        );
        let value = self.request_json(&url, &[])?;
        let records = match value {
            Value::Array(records) => records,
            other => {
                return Err(PipelineError::ResponseShape(format!(
                    "expected a list of files, got {}",
                    json_kind(&other)
                )));
            }
        };
        let files: Vec<FileDescriptor> = records.iter().map(file_descriptor).collect();
        match serde_json::to_value(&files) {
            Ok(payload) => self.cache.write(&key, &payload),
            Err(err) => warn!(error = %err, "failed to encode file listing for cache"),
        }
        Ok(files)
    }

    pub fn download_file(
        &self,
        url: &str,
        destination: &Path,
        chunk_size: usize,
        sink: &dyn ProgressSink,
    ) -> Result<u64, PipelineError> {
        let protocol = Protocol::of(url);
        let _guard = info_span!(
            parent: &self.span,
            "download",
            url,
            protocol = ?protocol,
            destination = %destination.display()
        )
        .entered();
        let start = Instant::now();

        let result = write_with_cleanup(destination, |writer| match protocol {
            Protocol::Ftp => ftp::download(url, writer, chunk_size, sink),
            Protocol::Http => {
                let mut stream = self.transport.open(url)?;
                copy_with_progress(url, &mut stream.reader, writer, stream.total, chunk_size, sink)
            }
        });

        match &result {
            Ok(bytes_written) => {
                let elapsed = start.elapsed();
                info!(bytes = bytes_written, elapsed_ms = elapsed.as_millis() as u64, "download complete");
                sink.event(ProgressEvent::Finished {
                    bytes_written: *bytes_written,
                    elapsed,
                });
            }
            Err(err) => {
                warn!(error = %err, "download failed");
                sink.event(ProgressEvent::Failed {
                    message: err.to_string(),
                });
            }
        }
        result
    }

    pub fn request_with_retry(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String, PipelineError> {
        let timeout = self.policy.timeout;
        let response = run_with_retry(&self.policy, self.sleeper.as_ref(), url, |_| {
            self.transport.get(url, params, timeout)
        })?;
        Ok(response.body)
    }

    fn request_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, PipelineError> {
        let body = self.request_with_retry(url, params)?;
        serde_json::from_str(&body).map_err(|err| {
            PipelineError::ResponseShape(format!("invalid JSON from {url}: {err}"))
        })
    }
}

pub fn normalize_search_results(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("_embedded") {
            Some(Value::Object(mut embedded)) => match embedded.remove("projects") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub fn file_descriptor(raw: &Value) -> FileDescriptor {
    let name = raw
        .get("fileName")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let size = raw.get("fileSizeBytes").and_then(|v| v.as_u64());
    let category = raw
        .get("fileCategory")
        .and_then(|v| v.get("value").and_then(|v| v.as_str()).or_else(|| v.as_str()))
        .unwrap_or("")
        .to_string();
    let url = raw
        .get("publicFileLocations")
        .and_then(|v| v.as_array())
        .and_then(|locations| {
            locations.iter().find(|location| {
                location
                    .get("name")
                    .and_then(|v| v.as_str())
                    .map(|name| name.contains("FTP"))
                    .unwrap_or(false)
            })
        })
        .and_then(|location| location.get("value"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    FileDescriptor {
        name,
        size,
        category,
        url,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
