//! CLI E2E tests for the plate-ingest binary.
//!
//! Validates:
//! - `check-config` prints defaults and decoded settings as JSON
//! - Invalid configuration exits 10
//! - `ingest` writes outputs and a report, exit 0 on a clean run
//! - Skipped directories turn the exit code to 1

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

// ============================================================================
// Helpers
// ============================================================================

fn plate_ingest() -> Command {
    let mut cmd = cargo_bin_cmd!("plate-ingest");
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("PLATE_INGEST_CONFIG");
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn write_well(root: &Path, well: &str, image_number: u32) {
    let dir = root.join(well);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("Image.csv"),
        format!("ImageNumber,Metadata_Well\n{image_number},{well}\n"),
    )
    .unwrap();
    fs::write(
        dir.join("Nuclei.csv"),
        format!("ImageNumber,ObjectNumber,Intensity\n{image_number},1,0.5\n{image_number},2,0.75\n"),
    )
    .unwrap();
}

// ============================================================================
// check-config
// ============================================================================

#[test]
fn test_check_config_defaults() {
    let output = plate_ingest()
        .arg("check-config")
        .assert()
        .success()
        .code(0)
        .get_output()
        .stdout
        .clone();

    let json: Value = serde_json::from_slice(&output).expect("parse JSON");
    assert_eq!(json["image_filename"], "Image.csv");
    assert_eq!(json["backend"], "parquet");
    assert_eq!(json["type_conversion"], "int_to_float");
    assert_eq!(json["reference"]["mode"], "sample");
    assert_eq!(json["skip_image_prefix"], true);
}

#[test]
fn test_check_config_reads_file() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("ingest.toml");
    fs::write(
        &config,
        "[ingestion]\nengine = \"duckdb\"\n\n[schema]\nreference_option = \"A01\"\nseed = 9\n",
    )
    .unwrap();

    plate_ingest()
        .args(["check-config", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"duckdb\""))
        .stdout(predicate::str::contains("\"A01\""));
}

#[test]
fn test_invalid_fraction_exits_config_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("ingest.toml");
    fs::write(&config, "[schema]\nref_fraction = 1.5\n").unwrap();

    plate_ingest()
        .args(["check-config", "--config"])
        .arg(&config)
        .assert()
        .code(10)
        .stderr(predicate::str::contains("1.5"));
}

#[test]
fn test_missing_config_file_exits_config_error() {
    let dir = tempdir().unwrap();
    plate_ingest()
        .args(["check-config", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(10);
}

// ============================================================================
// ingest
// ============================================================================

#[test]
fn test_ingest_parquet_writes_tables_and_report() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("plate");
    write_well(&source, "A01", 1);
    write_well(&source, "A02", 2);
    let output = dir.path().join("out");
    let report = dir.path().join("report.json");

    plate_ingest()
        .arg("ingest")
        .arg(&source)
        .arg(&output)
        .args(["--seed", "3", "--report"])
        .arg(&report)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("ingested 2 directories"));

    assert!(output.join("Image.parquet").exists());
    assert!(output.join("Nuclei.parquet").exists());

    let json: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["backend"], "parquet");
    assert_eq!(json["directories_ingested"].as_array().unwrap().len(), 2);
    assert_eq!(json["tables"]["Nuclei"]["rows"], 4);
    assert_eq!(json["tables"]["Nuclei"]["columns"], 4);
    assert!(json["fatal_error"].is_null());
}

#[test]
fn test_ingest_duckdb_engine_override() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("plate");
    write_well(&source, "A01", 1);
    let db = dir.path().join("plate.duckdb");

    plate_ingest()
        .arg("ingest")
        .arg(&source)
        .arg(&db)
        .args(["--engine", "duckdb", "--log-format", "json"])
        .assert()
        .code(0);

    assert!(db.exists());
}

#[test]
fn test_ingest_with_invalid_directory_exits_one() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("plate");
    write_well(&source, "A01", 1);
    fs::create_dir_all(source.join("A02")).unwrap();
    fs::write(source.join("A02/Nuclei.csv"), "ImageNumber\n2\n").unwrap();
    let report = dir.path().join("report.json");

    plate_ingest()
        .arg("ingest")
        .arg(&source)
        .arg(dir.path().join("out"))
        .arg("--report")
        .arg(&report)
        .assert()
        .code(1);

    let json: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    let skipped = json["skipped_directories"].as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["reason"], "directory_invalid");
}

#[test]
fn test_ingest_missing_source_exits_io_error() {
    let dir = tempdir().unwrap();
    plate_ingest()
        .arg("ingest")
        .arg(dir.path().join("no-such-plate"))
        .arg(dir.path().join("out"))
        .assert()
        .code(13);
}
