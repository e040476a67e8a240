use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{DatasetAccession, FileDescriptor};
use crate::error::PipelineError;
use crate::pride::PrideClient;
use crate::progress::ProgressSink;
use crate::transport::Transport;

#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    pub accession: String,
    pub directory: String,
    pub downloaded: Vec<DownloadedFile>,
    pub skipped: Vec<SkippedFile>,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedFile {
    pub name: String,
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

pub struct DatasetDownloader<'a, T: Transport> {
    client: &'a PrideClient<T>,
    output_dir: Utf8PathBuf,
    chunk_size: usize,
}

impl<'a, T: Transport> DatasetDownloader<'a, T> {
    pub fn new(client: &'a PrideClient<T>, output_dir: impl Into<Utf8PathBuf>, chunk_size: usize) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            chunk_size,
        }
    }

    pub fn dataset_dir(&self, accession: &DatasetAccession) -> Utf8PathBuf {
        self.output_dir.join(accession.as_str())
    }

    /// An empty `file_types` selects every file. The first failed download aborts the run.
    pub fn download_dataset(
        &self,
        accession: &DatasetAccession,
        file_types: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<DownloadSummary, PipelineError> {
        let directory = self.dataset_dir(accession);
        fs::create_dir_all(directory.as_std_path())
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;

        let files = self.client.get_dataset_files(accession)?;
        info!(accession = %accession, files = files.len(), "resolved dataset files");

        let mut downloaded = Vec::new();
        let mut skipped = Vec::new();
        for file in files {
            if !wanted(&file, file_types) {
                continue;
            }
            let Some(url) = file.url.as_deref() else {
                warn!(file = %file.name, "no FTP location published, skipping");
                skipped.push(SkippedFile {
                    name: file.name.clone(),
                    reason: "no download location".to_string(),
                });
                continue;
            };
            let destination = match safe_destination(&directory, &file.name) {
                Some(destination) => destination,
                None => {
                    warn!(file = %file.name, "unsafe file name, skipping");
                    skipped.push(SkippedFile {
                        name: file.name.clone(),
                        reason: "unsafe file name".to_string(),
                    });
                    continue;
                }
            };
            if already_complete(&destination, file.size) {
                skipped.push(SkippedFile {
                    name: file.name.clone(),
                    reason: "already downloaded".to_string(),
                });
                continue;
            }

            let bytes = self.client.download_file(
                url,
                destination.as_std_path(),
                self.chunk_size,
                sink,
            )?;
            if let Some(expected) = file.size {
                if expected != bytes {
                    warn!(file = %file.name, expected, bytes, "size differs from listing");
                }
            }
            downloaded.push(DownloadedFile {
                name: file.name,
                path: destination.to_string(),
                bytes,
            });
        }

        Ok(DownloadSummary {
            accession: accession.as_str().to_string(),
            directory: directory.to_string(),
            downloaded,
            skipped,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

fn wanted(file: &FileDescriptor, file_types: &[String]) -> bool {
    file_types.is_empty() || file_types.iter().any(|file_type| file.matches_type(file_type))
}

fn safe_destination(directory: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    let is_plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    is_plain.then(|| directory.join(name))
}

fn already_complete(path: &Utf8Path, size: Option<u64>) -> bool {
    match (fs::metadata(path.as_std_path()), size) {
        (Ok(metadata), Some(size)) => metadata.is_file() && metadata.len() == size,
        _ => false,
    }
}
