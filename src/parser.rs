use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PipelineError;

pub type MetadataMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    pub fn validate(&self, required_columns: &[&str], min_rows: usize) -> Result<(), PipelineError> {
        if self.rows.len() < min_rows {
            return Err(PipelineError::InvalidTable(format!(
                "expected at least {min_rows} rows, got {}",
                self.rows.len()
            )));
        }
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|name| self.column_index(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::InvalidTable(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn from_section(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, mut row)| {
                if row.len() > width {
                    warn!(
                        row = index,
                        expected = width,
                        found = row.len(),
                        dropped = ?&row[width..],
                        "row wider than header, dropping extra cells"
                    );
                } else if row.len() < width {
                    debug!(row = index, expected = width, found = row.len(), "padding short row");
                }
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableFormat {
    MzTab,
    Delimited(Option<u8>),
    Spreadsheet,
    Unsupported(String),
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Self {
        let stem_path = strip_gz(path);
        let ext = stem_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mztab" => TableFormat::MzTab,
            "csv" => TableFormat::Delimited(Some(b',')),
            "tsv" => TableFormat::Delimited(Some(b'\t')),
            // PRIDE publishes mzTab exports as `*-mztab.txt`.
            "txt" if is_mztab_export(&stem_path) => TableFormat::MzTab,
            "txt" => TableFormat::Delimited(Some(b'\t')),
            "xlsx" | "xls" => TableFormat::Spreadsheet,
            "" => TableFormat::Unsupported("(no extension)".to_string()),
            other => TableFormat::Unsupported(format!(".{other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Protein,
    Peptide,
    Psm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineTag {
    Metadata,
    Header(Section),
    Row(Section),
    Other,
}

impl LineTag {
    fn parse(tag: &str) -> Self {
        match tag {
            "MTD" => LineTag::Metadata,
            "PRH" => LineTag::Header(Section::Protein),
            "PRT" => LineTag::Row(Section::Protein),
            "PEH" => LineTag::Header(Section::Peptide),
            "PEP" => LineTag::Row(Section::Peptide),
            "PSH" => LineTag::Header(Section::Psm),
            "PSM" => LineTag::Row(Section::Psm),
            _ => LineTag::Other,
        }
    }
}

#[derive(Debug, Default)]
struct SectionData {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

pub fn parse(path: &Path) -> Result<ParsedTable, PipelineError> {
    ensure_exists(path)?;
    match TableFormat::from_path(path) {
        TableFormat::MzTab => parse_mztab(path),
        TableFormat::Delimited(delimiter) => parse_delimited(path, delimiter),
        TableFormat::Spreadsheet => Err(PipelineError::NotImplemented(format!(
            "spreadsheet parsing ({})",
            path.display()
        ))),
        TableFormat::Unsupported(ext) => Err(PipelineError::UnsupportedFormat(ext)),
    }
}

pub fn parse_mztab(path: &Path) -> Result<ParsedTable, PipelineError> {
    ensure_exists(path)?;
    let reader = open_lines(path)?;
    let mut protein = SectionData::default();
    let mut peptide = SectionData::default();
    let mut psm = SectionData::default();

    for line in reader.lines() {
        let line = line.map_err(|err| parse_error(path, err))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let tag = LineTag::parse(fields.next().unwrap_or(""));
        let (section, is_header) = match tag {
            LineTag::Header(section) => (section, true),
            LineTag::Row(section) => (section, false),
            LineTag::Metadata | LineTag::Other => continue,
        };
        let data = match section {
            Section::Protein => &mut protein,
            Section::Peptide => &mut peptide,
            Section::Psm => &mut psm,
        };
        let values: Vec<String> = fields.map(str::to_string).collect();
        if is_header {
            data.header = Some(values);
        } else {
            data.rows.push(values);
        }
    }

    debug!(
        path = %path.display(),
        proteins = protein.rows.len(),
        peptides = peptide.rows.len(),
        psms = psm.rows.len(),
        "parsed mzTab sections"
    );

    match protein.header {
        Some(columns) if !protein.rows.is_empty() => {
            Ok(ParsedTable::from_section(columns, protein.rows))
        }
        _ => Ok(ParsedTable::default()),
    }
}

pub fn mztab_metadata(path: &Path) -> Result<MetadataMap, PipelineError> {
    ensure_exists(path)?;
    let reader = open_lines(path)?;
    let mut metadata = MetadataMap::new();
    for line in reader.lines() {
        let line = line.map_err(|err| parse_error(path, err))?;
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.first() != Some(&"MTD") || fields.len() < 3 {
            continue;
        }
        metadata.insert(fields[1].to_string(), fields[2..].join("\t"));
    }
    Ok(metadata)
}

pub fn parse_delimited(path: &Path, delimiter: Option<u8>) -> Result<ParsedTable, PipelineError> {
    ensure_exists(path)?;
    let delimiter = match delimiter {
        Some(delimiter) => delimiter,
        None => infer_delimiter(path)?,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(open_reader(path)?);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| parse_error(path, err))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| parse_error(path, err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(ParsedTable::from_section(columns, rows))
}

fn infer_delimiter(path: &Path) -> Result<u8, PipelineError> {
    if let TableFormat::Delimited(Some(delimiter)) = TableFormat::from_path(path) {
        return Ok(delimiter);
    }
    let mut first_line = String::new();
    open_lines(path)?
        .read_line(&mut first_line)
        .map_err(|err| parse_error(path, err))?;
    Ok(if first_line.contains('\t') { b'\t' } else { b',' })
}

fn ensure_exists(path: &Path) -> Result<(), PipelineError> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.display().to_string()));
    }
    Ok(())
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>, PipelineError> {
    let file = File::open(path).map_err(|err| parse_error(path, err))?;
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn open_lines(path: &Path) -> Result<BufReader<Box<dyn Read>>, PipelineError> {
    Ok(BufReader::new(open_reader(path)?))
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn strip_gz(path: &Path) -> PathBuf {
    if is_gzip(path) {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

fn is_mztab_export(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_lowercase().ends_with("-mztab"))
        .unwrap_or(false)
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
