//! Tests for the batch command

use std::fs;

use telegram_media_dl::commands::batch::{self, BatchOptions, ItemStatus};
use telegram_media_dl::Config;

fn config_for(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.session_name = dir.join("session").display().to_string();
    config.download.output_dir = dir.join("downloads");
    config
}

#[tokio::test]
async fn test_batch_dry_run_reports_plan() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("messages.md");
    fs::write(
        &input,
        "\
- https://t.me/c/1234567890/15 ; Intro video
- https://t.me/somechannel/99 ; Intro video
https://t.me/c/1234567890/16?comment=4 ; Q&A / answers
",
    )
    .unwrap();

    let options = BatchOptions {
        input,
        dry_run: true,
        ..BatchOptions::default()
    };
    let report = batch::run(&config_for(dir.path()), &options).await.unwrap();

    assert_eq!(report.planned, 3);
    assert!(!report.has_failures());

    let names: Vec<_> = report
        .items
        .iter()
        .map(|i| i.name.clone().unwrap())
        .collect();
    assert_eq!(names, ["Intro video", "Intro video_2", "Q_A _ answers"]);
    assert!(report.items.iter().all(|i| i.status == ItemStatus::Planned));
}

#[tokio::test]
async fn test_batch_dry_run_avoids_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    fs::create_dir_all(&config.download.output_dir).unwrap();
    fs::write(config.download.output_dir.join("lecture"), b"old").unwrap();

    let input = dir.path().join("messages.md");
    fs::write(&input, "https://t.me/c/42/7 ; lecture\n").unwrap();

    let options = BatchOptions {
        input,
        dry_run: true,
        ..BatchOptions::default()
    };
    let report = batch::run(&config, &options).await.unwrap();
    assert_eq!(report.items[0].name.as_deref(), Some("lecture_2"));
}

#[tokio::test]
async fn test_batch_without_valid_links_needs_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("messages.md");
    fs::write(&input, "https://example.com/c/1/2 ; wrong host\n").unwrap();

    let options = BatchOptions {
        input,
        ..BatchOptions::default()
    };
    let report = batch::run(&config_for(dir.path()), &options).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.items[0].status, ItemStatus::Failed);
    assert!(report.items[0]
        .error
        .as_deref()
        .unwrap()
        .contains("example.com"));
}

#[tokio::test]
async fn test_batch_requires_session_for_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("messages.md");
    fs::write(&input, "https://t.me/c/42/7 ; lecture\n").unwrap();

    let options = BatchOptions {
        input,
        ..BatchOptions::default()
    };
    let err = batch::run(&config_for(dir.path()), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, telegram_media_dl::Error::SessionNotFound(_)));
}
