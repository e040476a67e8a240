use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use proteomics_pipeline::error::PipelineError;
use proteomics_pipeline::parser::{self, ParsedTable};

const SAMPLE_MZTAB: &str = "MTD\tmzTab-version\t1.0.0
MTD\tmzTab-mode\tSummary
MTD\tdescription\tTest mzTab file
PRH\taccession\tdescription\tprotein_coverage\tprotein_abundance_study_variable[1]\tprotein_abundance_study_variable[2]
PRT\tP12345\tTest protein 1\t0.45\t1234.56\t2345.67
PRT\tP67890\tTest protein 2\t0.78\t3456.78\t4567.89
PRT\tQ11111\tTest protein 3\t0.23\t5678.90\t6789.01
";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn sample_protein_section() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(temp.path(), "test.mztab", SAMPLE_MZTAB);

    let table = parser::parse(&path).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.column("accession").unwrap(),
        vec!["P12345", "P67890", "Q11111"]
    );
    assert_eq!(table.get(1, "description"), Some("Test protein 2"));
    assert_eq!(table.get(0, "protein_coverage"), Some("0.45"));
    assert_eq!(table.columns.len(), 5);
}

#[test]
fn parsing_twice_is_structurally_equal() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(temp.path(), "test.mztab", SAMPLE_MZTAB);
    assert_eq!(parser::parse_mztab(&path).unwrap(), parser::parse_mztab(&path).unwrap());
}

#[test]
fn metadata_only_file_gives_empty_table() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(
        temp.path(),
        "empty.mztab",
        "MTD\tmzTab-version\t1.0.0\nMTD\ttitle\tEmpty dataset\n",
    );
    let table = parser::parse_mztab(&path).unwrap();
    assert!(table.is_empty());
    assert_eq!(table, ParsedTable::default());
}

#[test]
fn header_without_rows_gives_empty_table() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(temp.path(), "header.mztab", "PRH\taccession\tdescription\n");
    assert!(parser::parse_mztab(&path).unwrap().is_empty());
}

#[test]
fn peptide_and_psm_sections_are_not_exposed() {
    let temp = tempfile::tempdir().unwrap();
    let content = "PRH\taccession\nPRT\tP12345\n\nPEH\tsequence\taccession\nPEP\tPEPTIDEK\tP12345\nPSH\tsequence\tPSM_ID\nPSM\tPEPTIDEK\t1\n";
    let path = write(temp.path(), "mixed.mztab", content);

    let table = parser::parse_mztab(&path).unwrap();
    assert_eq!(table.columns, vec!["accession".to_string()]);
    assert_eq!(table.rows, vec![vec!["P12345".to_string()]]);
}

#[test]
fn later_protein_header_redefines_columns() {
    let temp = tempfile::tempdir().unwrap();
    let content = "PRH\ta\nPRT\t1\nPRH\tx\ty\nPRT\t2\t3\n";
    let path = write(temp.path(), "redefined.mztab", content);

    let table = parser::parse_mztab(&path).unwrap();
    assert_eq!(table.columns, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(table.len(), 2);
}

#[test]
fn metadata_extraction() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(
        temp.path(),
        "meta.mztab",
        "MTD\tmzTab-version\t1.0.0\nMTD\ttitle\tProteomics Study\nPRH\taccession\nPRT\tP12345\n",
    );
    let metadata = parser::mztab_metadata(&path).unwrap();
    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata["mzTab-version"], "1.0.0");
    assert_eq!(metadata["title"], "Proteomics Study");
}

#[test]
fn metadata_values_keep_tabs_and_last_key_wins() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(
        temp.path(),
        "meta.mztab",
        "MTD\tdescription\tfirst\nMTD\tdescription\tpart one\tpart two\n",
    );
    let metadata = parser::mztab_metadata(&path).unwrap();
    assert_eq!(metadata["description"], "part one\tpart two");
}

#[test]
fn csv_and_tsv() {
    let temp = tempfile::tempdir().unwrap();
    let csv = write(
        temp.path(),
        "test.csv",
        "Protein,Intensity_Sample1,Intensity_Sample2\nP12345,1234.56,2345.67\nP67890,3456.78,4567.89\nQ11111,5678.90,6789.01\n",
    );
    let tsv = write(
        temp.path(),
        "test.tsv",
        "Protein\tIntensity_Sample1\tIntensity_Sample2\nP12345\t1234.56\t2345.67\nP67890\t3456.78\t4567.89\nQ11111\t5678.90\t6789.01\n",
    );

    for path in [csv, tsv] {
        let table = parser::parse(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0, "Protein"), Some("P12345"));
        assert_eq!(table.get(2, "Intensity_Sample2"), Some("6789.01"));
    }
}

#[test]
fn quoted_csv_fields() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(temp.path(), "q.csv", "name,desc\nP1,\"kinase, putative\"\n");
    let table = parser::parse(&path).unwrap();
    assert_eq!(table.get(0, "desc"), Some("kinase, putative"));
}

#[test]
fn delimiter_sniffing_for_unknown_extension() {
    let temp = tempfile::tempdir().unwrap();
    let tabbed = write(temp.path(), "data.dat", "A\tB\n1\t2\n");
    let commas = write(temp.path(), "data.out", "A,B\n1,2\n");

    assert_eq!(
        parser::parse_delimited(&tabbed, None).unwrap().get(0, "B"),
        Some("2")
    );
    assert_eq!(
        parser::parse_delimited(&commas, None).unwrap().get(0, "B"),
        Some("2")
    );
}

#[test]
fn explicit_delimiter_wins() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(temp.path(), "semi.csv", "A;B\n1;2\n");
    let table = parser::parse_delimited(&path, Some(b';')).unwrap();
    assert_eq!(table.columns, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn gzipped_mztab() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("test.mztab.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(SAMPLE_MZTAB.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let table = parser::parse(&path).unwrap();
    assert_eq!(table.len(), 3);
}

#[test]
fn pride_mztab_export_name_is_detected() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(temp.path(), "F063721.dat-mztab.txt", SAMPLE_MZTAB);
    assert_eq!(parser::parse(&path).unwrap().len(), 3);
}

#[test]
fn underscore_mztab_name_is_plain_tsv() {
    let temp = tempfile::tempdir().unwrap();
    let path = write(
        temp.path(),
        "results_mztab.txt",
        "accession\tscore\nP12345\t0.9\n",
    );
    let table = parser::parse(&path).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "score"), Some("0.9"));
}

#[test]
fn error_cases() {
    let temp = tempfile::tempdir().unwrap();

    assert_matches!(
        parser::parse(Path::new("/nonexistent/file.mztab")),
        Err(PipelineError::NotFound(_))
    );
    assert_matches!(
        parser::parse_delimited(Path::new("/nonexistent/file.csv"), None),
        Err(PipelineError::NotFound(_))
    );

    let raw = write(temp.path(), "spectra.raw", "binary");
    assert_matches!(parser::parse(&raw), Err(PipelineError::UnsupportedFormat(_)));

    let xlsx = write(temp.path(), "sheet.xlsx", "");
    assert_matches!(parser::parse(&xlsx), Err(PipelineError::NotImplemented(_)));
}
