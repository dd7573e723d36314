//! End-to-end CLI tests for the newsbinder binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::{
    WATERMARK, console_reply, document_page, download_path, page_pdf, start_mock_server_or_skip,
    toc_page, toc_row,
};

/// Command isolated from any config file of the person running the tests.
fn newsbinder(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("newsbinder").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .env_remove("NEWSBINDER_USERNAME")
        .env_remove("NEWSBINDER_PASSWORD");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = tempfile::tempdir().unwrap();
    newsbinder(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Assemble one regional edition"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = tempfile::tempdir().unwrap();
    newsbinder(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("newsbinder"));
}

#[test]
fn test_binary_invalid_date_returns_error() {
    let home = tempfile::tempdir().unwrap();
    newsbinder(home.path())
        .arg("2024-01-02")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DD.MM.YYYY"));
}

#[test]
fn test_binary_missing_explicit_config_returns_error() {
    let home = tempfile::tempdir().unwrap();
    newsbinder(home.path())
        .args(["--config"])
        .arg(home.path().join("absent.toml"))
        .arg("02.01.2024")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_binary_invalid_config_file_returns_error() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join("newsbinder");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[editions]\ndesired = \"\"\n").unwrap();
    newsbinder(home.path())
        .arg("02.01.2024")
        .assert()
        .failure()
        .stderr(predicate::str::contains("editions.desired"));
}

#[test]
fn test_binary_from_dir_without_pages_fails() {
    let home = tempfile::tempdir().unwrap();
    let pages = tempfile::tempdir().unwrap();
    newsbinder(home.path())
        .arg("--from-dir")
        .arg(pages.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no page files found"));
}

#[test]
fn test_binary_from_dir_binds_page_files() {
    let home = tempfile::tempdir().unwrap();
    let pages = tempfile::tempdir().unwrap();
    for page in 1..=3 {
        std::fs::write(
            pages
                .path()
                .join(format!("seite_OTZ_JEN_20240102_V01_{page:03}_V1.pdf")),
            page_pdf(i64::from(page), &[WATERMARK]),
        )
        .unwrap();
    }

    newsbinder(home.path())
        .arg("-q")
        .arg("--from-dir")
        .arg(pages.path())
        .assert()
        .success();

    let output = pages.path().join("OTZ_JEN_20240102_V01_V1.pdf");
    let document = lopdf::Document::load(&output).unwrap();
    assert_eq!(document.get_pages().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_binds_issue_from_archive() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let home = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let id = "OTZ__20240102_A_p1";

    Mock::given(method("GET"))
        .and(path_regex(r"^/toc_list/OTZ/2024/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(toc_page(&[toc_row(id, "Politik", 1)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/document/{id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(document_page("Schleiz;Jena", "PDF_1")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stream/downloadConsole"))
        .respond_with(ResponseTemplate::new(200).set_body_string(console_reply(&download_path(id))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(download_path(id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(page_pdf(1, &[WATERMARK])))
        .mount(&server)
        .await;

    let config = home.path().join("binder.toml");
    std::fs::write(
        &config,
        format!(
            "[newspaper]\nbase_url = \"{}\"\n\n[output]\ninclude_weekday = true\n",
            server.uri()
        ),
    )
    .unwrap();

    let home_path = home.path().to_path_buf();
    let out_path = out.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        newsbinder(&home_path)
            .arg("--config")
            .arg(&config)
            .arg("-o")
            .arg(&out_path)
            .arg("02.01.2024")
            .assert()
            .success()
            .stdout(predicate::str::contains("page 1:"));
    })
    .await
    .unwrap();

    assert!(out.path().join("OTZ_2024-01-02_Tue_Jena.pdf").exists());
}
