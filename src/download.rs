//! Streaming a message's media to disk.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use grammers_client::client::files::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use grammers_client::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::chat::{fetch_channel_message, fetch_comment, ChannelResolver};
use crate::config::DownloadSettings;
use crate::error::{Error, Result};
use crate::links::MessageLink;
use crate::media::{extract_attachments, Attachment};
use crate::metrics;
use crate::naming::{NameAllocator, PARTIAL_SUFFIX};
use crate::progress::{ProgressLog, DEFAULT_INTERVAL};
use crate::sniff::{extension_for_mime, infer_extension, SNIFF_LEN};

/// How files are fetched and where they land.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub infer_extension: bool,
    /// Chunk size in bytes.
    pub part_size: i32,
    /// Maximum wait for a single chunk.
    pub chunk_timeout: Duration,
    pub progress_interval: Duration,
}

impl DownloadOptions {
    pub fn from_settings(settings: &DownloadSettings, infer_extension: bool) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            infer_extension,
            part_size: settings
                .part_size_bytes()
                .clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
            chunk_timeout: settings.timeout,
            progress_interval: DEFAULT_INTERVAL,
        }
    }
}

/// A completed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Download every attachment of the linked message.
///
/// A single attachment is saved as `name`, which must already be allocated
/// from `names`. Paid albums take `name_1`, `name_2`, ... from `names`.
pub async fn download_message(
    client: &Client,
    resolver: &ChannelResolver,
    names: &Mutex<NameAllocator>,
    link: &MessageLink,
    name: &str,
    options: &DownloadOptions,
) -> Result<Vec<SavedFile>> {
    let channel = resolver.resolve(client, &link.peer).await?;
    let mut message = fetch_channel_message(client, channel, link.message_id).await?;

    if let Some(comment_id) = link.comment_id {
        message = fetch_comment(client, channel, &message, comment_id).await?;
    }

    let attachments = extract_attachments(message.id, message.media)?;
    fs::create_dir_all(&options.output_dir).await?;

    let file_names = names
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .allocate_album(name, attachments.len());

    let mut saved = Vec::with_capacity(attachments.len());
    for (attachment, file_name) in attachments.iter().zip(&file_names) {
        saved.push(save_attachment(client, attachment, file_name, options).await?);
    }

    Ok(saved)
}

async fn save_attachment(
    client: &Client,
    attachment: &Attachment,
    name: &str,
    options: &DownloadOptions,
) -> Result<SavedFile> {
    let partial = options
        .output_dir
        .join(format!("{}.{}", name, PARTIAL_SUFFIX));

    let (bytes, head) = match stream_to_file(client, attachment, &partial, options).await {
        Ok(done) => done,
        Err(err) => {
            if let Err(rm_err) = fs::remove_file(&partial).await {
                debug!("could not remove {}: {}", partial.display(), rm_err);
            }
            metrics::record_download(false, 0);
            return Err(err);
        }
    };

    let path = target_path(
        &options.output_dir.join(name),
        &head,
        attachment.mime_type.as_deref(),
        options.infer_extension,
    );
    if fs::try_exists(&path).await.unwrap_or(false) {
        warn!("overwriting existing file {}", path.display());
    }
    fs::rename(&partial, &path).await?;

    metrics::record_download(true, bytes);
    info!("Saved: {} ({} bytes)", path.display(), bytes);
    Ok(SavedFile { path, bytes })
}

/// Write all chunks to `partial`, returning the byte count and the leading bytes.
async fn stream_to_file(
    client: &Client,
    attachment: &Attachment,
    partial: &Path,
    options: &DownloadOptions,
) -> Result<(u64, Vec<u8>)> {
    let mut file = fs::File::create(partial).await?;
    let mut download = client
        .iter_download(&attachment.media)
        .chunk_size(options.part_size);

    let mut progress = ProgressLog::new(attachment.size, options.progress_interval);
    progress.update(0, Instant::now());

    let mut head = Vec::with_capacity(SNIFF_LEN);
    let mut written = 0u64;

    loop {
        let chunk = tokio::time::timeout(options.chunk_timeout, download.next())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no data for {}s after {} bytes",
                    options.chunk_timeout.as_secs(),
                    written
                ))
            })??;
        let Some(chunk) = chunk else { break };

        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }

        file.write_all(&chunk).await?;
        written += chunk.len() as u64;

        if let Some(report) = progress.update(written, Instant::now()) {
            info!("{}", report);
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok((written, head))
}

/// Final path for a finished download.
///
/// The extension comes from the file's magic bytes, then from the declared
/// MIME type. Dots already present in `base` are kept.
pub fn target_path(base: &Path, head: &[u8], mime: Option<&str>, infer: bool) -> PathBuf {
    if !infer {
        return base.to_path_buf();
    }

    match infer_extension(head).or_else(|| mime.and_then(extension_for_mime)) {
        Some(ext) => {
            let mut name = OsString::from(base.as_os_str());
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        }
        None => base.to_path_buf(),
    }
}
