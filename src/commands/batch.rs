//! Download the media of every message listed in a links file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chat::ChannelResolver;
use crate::config::Config;
use crate::download::{download_message, DownloadOptions};
use crate::error::Result;
use crate::input::{read_entries, ParsedLine};
use crate::links::MessageLink;
use crate::naming::{detailed_name, sanitize_filename, NameAllocator};
use crate::session::{get_client, SessionLock};

/// Options of a batch run on top of the configured download settings.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub input: PathBuf,
    pub detailed_name: bool,
    pub infer_extension: bool,
    pub dry_run: bool,
    /// Where to write the JSON report, if anywhere.
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Downloaded,
    Failed,
    Skipped,
    Planned,
}

/// Outcome for one line of the links file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub line: usize,
    pub link: String,
    pub name: Option<String>,
    pub status: ItemStatus,
    pub files: Vec<PathBuf>,
    pub bytes: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub planned: usize,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    fn push(&mut self, item: ItemReport) {
        match item.status {
            ItemStatus::Downloaded => self.downloaded += 1,
            ItemStatus::Failed => self.failed += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Planned => self.planned += 1,
        }
        self.items.push(item);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// A line that will be downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItem {
    pub line: usize,
    pub link_text: String,
    pub link: MessageLink,
    pub name: String,
}

impl PlannedItem {
    fn report(&self, status: ItemStatus) -> ItemReport {
        ItemReport {
            line: self.line,
            link: self.link_text.clone(),
            name: Some(self.name.clone()),
            status,
            files: Vec::new(),
            bytes: 0,
            error: None,
        }
    }
}

/// Turn parsed lines into download jobs with unique output names.
///
/// Skipped lines and unparsable links go straight into `report`. Names are
/// allocated in file order so reruns produce the same names.
pub fn plan(
    lines: Vec<ParsedLine>,
    detailed: bool,
    names: &mut NameAllocator,
    report: &mut BatchReport,
) -> Vec<PlannedItem> {
    let mut planned = Vec::new();

    for parsed in lines {
        let entry = match parsed {
            ParsedLine::Entry(entry) => entry,
            ParsedLine::Skipped { line, reason } => {
                warn!("line {}: skipped, {}", line, reason);
                report.push(ItemReport {
                    line,
                    link: String::new(),
                    name: None,
                    status: ItemStatus::Skipped,
                    files: Vec::new(),
                    bytes: 0,
                    error: Some(reason),
                });
                continue;
            }
        };

        let link = match MessageLink::parse(&entry.link) {
            Ok(link) => link,
            Err(err) => {
                warn!("line {}: {}", entry.line, err);
                report.push(ItemReport {
                    line: entry.line,
                    link: entry.link,
                    name: None,
                    status: ItemStatus::Failed,
                    files: Vec::new(),
                    bytes: 0,
                    error: Some(err.to_string()),
                });
                continue;
            }
        };

        let base = sanitize_filename(&entry.description);
        let base = if detailed {
            detailed_name(&base, &link)
        } else {
            base
        };

        planned.push(PlannedItem {
            line: entry.line,
            link_text: entry.link,
            link,
            name: names.allocate(&base),
        });
    }

    planned
}

/// Run a batch download.
pub async fn run(config: &Config, options: &BatchOptions) -> Result<BatchReport> {
    let lines = read_entries(&options.input)?;
    let mut names = NameAllocator::for_dir(&config.download.output_dir);
    let mut report = BatchReport::default();

    let planned = plan(lines, options.detailed_name, &mut names, &mut report);
    info!(
        "{}: {} message(s) to download",
        options.input.display(),
        planned.len()
    );

    if options.dry_run {
        for item in &planned {
            println!("line {}: {} -> {}", item.line, item.link_text, item.name);
            report.push(item.report(ItemStatus::Planned));
        }
    } else if !planned.is_empty() {
        let _lock = SessionLock::acquire(config.lock_file())?;
        let client = get_client(config).await?;
        let resolver = ChannelResolver::new();
        let download = DownloadOptions::from_settings(&config.download, options.infer_extension);
        let workers = config.download.workers.max(1);
        // Album items draw their names from the same pool as planned entries.
        let names = Mutex::new(names);

        let mut results: Vec<ItemReport> = stream::iter(planned)
            .map(|item| {
                let client = &client;
                let resolver = &resolver;
                let download = &download;
                let names = &names;
                async move {
                    info!("line {}: downloading {}", item.line, item.link);
                    match download_message(
                        client, resolver, names, &item.link, &item.name, download,
                    )
                    .await
                    {
                        Ok(files) => {
                            let mut done = item.report(ItemStatus::Downloaded);
                            done.bytes = files.iter().map(|f| f.bytes).sum();
                            done.files = files.into_iter().map(|f| f.path).collect();
                            done
                        }
                        Err(err) => {
                            error!(
                                "line {}: channel={}, message={}, output={}, infer_extension={}: {}",
                                item.line,
                                item.link.peer,
                                item.link.message_id,
                                item.name,
                                download.infer_extension,
                                err
                            );
                            let mut failed = item.report(ItemStatus::Failed);
                            failed.error = Some(err.to_string());
                            failed
                        }
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        results.sort_by_key(|item| item.line);
        for item in results {
            report.push(item);
        }
    }

    report.items.sort_by_key(|item| item.line);
    info!(
        "done: {} downloaded, {} failed, {} skipped, {} planned",
        report.downloaded, report.failed, report.skipped, report.planned
    );

    if let Some(path) = &options.report {
        report.write_json(path)?;
        info!("report written to {}", path.display());
    }

    Ok(report)
}
