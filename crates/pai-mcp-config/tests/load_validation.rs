//! Settings loading tests for pai-mcp-config.
// crates/pai-mcp-config/tests/load_validation.rs
// =============================================================================
// Module: Settings Load Tests
// Description: Path resolution, size and encoding guards, legacy rejection.
// Purpose: Ensure startup fails closed on unusable settings files.
// =============================================================================

#![allow(
    clippy::use_debug,
    clippy::panic_in_result_fn,
    reason = "Test-only diagnostics in failure messages."
)]

use std::path::Path;
use std::path::PathBuf;

use pai_mcp_config::LoadError;
use pai_mcp_config::MAX_SETTINGS_FILE_SIZE;
use pai_mcp_config::load_settings_from;
use pai_mcp_config::parse_settings;
use pai_mcp_config::resolve_settings_path_with;
use serde_json::json;

mod common;

type TestResult = Result<(), String>;

fn assert_load_error<T>(result: Result<T, LoadError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected load failure".to_string()),
    }
}

#[test]
fn explicit_path_wins_over_environment() -> TestResult {
    let resolved = resolve_settings_path_with(
        Some(Path::new("/tmp/explicit.json")),
        Some("/tmp/env.json"),
        Some(Path::new("/home/alice")),
    )
    .map_err(|err| err.to_string())?;
    if resolved != PathBuf::from("/tmp/explicit.json") {
        return Err(format!("unexpected path {}", resolved.display()));
    }
    Ok(())
}

#[test]
fn environment_then_home_default() -> TestResult {
    let from_env =
        resolve_settings_path_with(None, Some("/tmp/env.json"), Some(Path::new("/home/alice")))
            .map_err(|err| err.to_string())?;
    if from_env != PathBuf::from("/tmp/env.json") {
        return Err(format!("unexpected path {}", from_env.display()));
    }
    let blank_env = resolve_settings_path_with(None, Some("  "), Some(Path::new("/home/alice")))
        .map_err(|err| err.to_string())?;
    if blank_env != PathBuf::from("/home/alice/.config/aliyun-pai/settings.json") {
        return Err(format!("unexpected path {}", blank_env.display()));
    }
    assert_load_error(resolve_settings_path_with(None, None, None), "HOME")
}

#[test]
fn oversized_environment_path_is_rejected() -> TestResult {
    let long = "a".repeat(5000);
    assert_load_error(resolve_settings_path_with(None, Some(&long), None), "max length")
}

#[test]
fn missing_file_points_to_init() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    assert_load_error(load_settings_from(&dir.path().join("absent.json")), "init")
}

#[test]
fn oversized_and_non_utf8_files_are_rejected() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let big = dir.path().join("big.json");
    std::fs::write(&big, vec![b' '; MAX_SETTINGS_FILE_SIZE + 1]).map_err(|err| err.to_string())?;
    assert_load_error(load_settings_from(&big), "size limit")?;
    let binary = dir.path().join("binary.json");
    std::fs::write(&binary, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_load_error(load_settings_from(&binary), "utf-8")
}

#[test]
fn sparse_oversized_file_is_rejected_before_reading() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let sparse = dir.path().join("sparse.json");
    let file = std::fs::File::create(&sparse).map_err(|err| err.to_string())?;
    file.set_len(64 * 1024 * 1024).map_err(|err| err.to_string())?;
    drop(file);
    assert_load_error(load_settings_from(&sparse), "size limit")
}

#[test]
fn unrecognized_version_is_a_hard_error() -> TestResult {
    let mut older = common::sample_settings_value();
    older["version"] = json!("0.4.0");
    assert_load_error(parse_settings(&older.to_string()), "unsupported settings version")?;
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, older.to_string()).map_err(|err| err.to_string())?;
    assert_load_error(load_settings_from(&path), "unsupported settings version")
}

#[test]
fn legacy_layout_is_a_hard_error() -> TestResult {
    let mut legacy = common::sample_settings_value();
    legacy["jobSpecs"] = json!([]);
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, legacy.to_string()).map_err(|err| err.to_string())?;
    match load_settings_from(&path) {
        Err(LoadError::Legacy(location)) if location.contains("settings.json") => Ok(()),
        other => Err(format!("expected legacy error, got {other:?}")),
    }
}

#[test]
fn invalid_documents_are_rejected() -> TestResult {
    assert_load_error(parse_settings("{not json"), "parse error")?;
    let mut missing_default = common::sample_settings_value();
    let big = missing_default["profiles"]["big"].clone();
    missing_default["profiles"] = json!({ "big": big });
    assert_load_error(parse_settings(&missing_default.to_string()), "default")?;
    let mut unknown = common::sample_settings_value();
    unknown["extra"] = json!(true);
    assert_load_error(parse_settings(&unknown.to_string()), "extra")
}

#[test]
fn sample_document_round_trips_through_disk() -> TestResult {
    let (_dir, path, store) = common::sample_store()?;
    let loaded = load_settings_from(&path).map_err(|err| err.to_string())?;
    if loaded != store.get() {
        return Err("loaded settings differ from store snapshot".to_string());
    }
    Ok(())
}
