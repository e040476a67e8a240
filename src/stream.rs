use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::progress::{ProgressEvent, ProgressSink};

pub fn copy_with_progress<R: Read + ?Sized, W: Write + ?Sized>(
    url: &str,
    reader: &mut R,
    writer: &mut W,
    total: Option<u64>,
    chunk_size: usize,
    sink: &dyn ProgressSink,
) -> Result<u64, PipelineError> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut written = 0u64;
    sink.event(ProgressEvent::Started {
        url: url.to_string(),
        total,
    });
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(PipelineError::RequestFailed {
                    attempts: 1,
                    message: format!("reading {url}: {err}"),
                });
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        written += read as u64;
        sink.event(ProgressEvent::Advanced {
            bytes_written: written,
            total,
        });
    }
    writer
        .flush()
        .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
    Ok(written)
}

/// The destination is removed again if `write` fails.
pub fn write_with_cleanup<F>(destination: &Path, write: F) -> Result<u64, PipelineError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<u64, PipelineError>,
{
    let result = create_and_write(destination, write);
    if result.is_err() && destination.exists() {
        match fs::remove_file(destination) {
            Ok(()) => debug!(path = %destination.display(), "removed partial download"),
            Err(err) => warn!(
                path = %destination.display(),
                error = %err,
                "failed to remove partial download"
            ),
        }
    }
    result
}

fn create_and_write<F>(destination: &Path, write: F) -> Result<u64, PipelineError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<u64, PipelineError>,
{
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        }
    }
    let file = File::create(destination).map_err(|err| {
        PipelineError::Filesystem(format!("create {}: {err}", destination.display()))
    })?;
    let mut writer = BufWriter::new(file);
    let written = write(&mut writer)?;
    writer
        .into_inner()
        .map_err(|err| PipelineError::Filesystem(err.error().to_string()))?
        .sync_all()
        .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
    Ok(written)
}
