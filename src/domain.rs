use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetAccession(String);

impl DatasetAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetAccession {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{3}[0-9]{6}$").unwrap());
        let normalized = value.trim().to_uppercase();
        if !pattern.is_match(&normalized) {
            return Err(PipelineError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: Option<u64>,
    pub category: String,
    pub url: Option<String>,
}

impl FileDescriptor {
    /// Case-insensitive suffix match; `"mztab"` and `".mzTab"` are equivalent.
    pub fn matches_type(&self, file_type: &str) -> bool {
        let wanted = file_type.trim().trim_start_matches('.').to_lowercase();
        if wanted.is_empty() {
            return false;
        }
        let name = self.name.to_lowercase();
        name.ends_with(&format!(".{wanted}"))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_accession_normalizes_case() {
        let acc: DatasetAccession = " pxd005011 ".parse().unwrap();
        assert_eq!(acc.as_str(), "PXD005011");
    }

    #[test]
    fn parse_accession_invalid() {
        let err = "PXD12".parse::<DatasetAccession>().unwrap_err();
        assert_matches!(err, PipelineError::InvalidAccession(_));
    }

    #[test]
    fn parse_accession_rejects_non_ascii_digits() {
        let err = "PXD\u{0660}\u{0660}\u{0660}\u{0660}\u{0660}\u{0661}"
            .parse::<DatasetAccession>()
            .unwrap_err();
        assert_matches!(err, PipelineError::InvalidAccession(_));
        assert!("PRD000123".parse::<DatasetAccession>().is_ok());
    }

    #[test]
    fn file_type_matching() {
        let file = FileDescriptor {
            name: "F001.mzTab".to_string(),
            size: None,
            category: "RESULT".to_string(),
            url: None,
        };
        assert!(file.matches_type("mztab"));
        assert!(file.matches_type(".MZTAB"));
        assert!(!file.matches_type("raw"));
        assert!(!file.matches_type(""));
    }
}
