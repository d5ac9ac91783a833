//! Download the media of a single message.

use std::sync::Mutex;

use crate::chat::ChannelResolver;
use crate::config::Config;
use crate::download::{download_message, DownloadOptions, SavedFile};
use crate::error::{Error, Result};
use crate::links::MessageLink;
use crate::naming::{detailed_name, sanitize_filename, NameAllocator, FALLBACK_NAME};
use crate::session::{get_client, SessionLock};

/// Which message to fetch and how to name it.
#[derive(Debug, Clone)]
pub struct GetOptions {
    pub link: Option<String>,
    pub channel: Option<String>,
    pub message: Option<i32>,
    pub comment: Option<i32>,
    pub output: String,
    pub detailed_name: bool,
    pub infer_extension: bool,
    pub dry_run: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            link: None,
            channel: None,
            message: None,
            comment: None,
            output: FALLBACK_NAME.to_string(),
            detailed_name: false,
            infer_extension: false,
            dry_run: false,
        }
    }
}

impl GetOptions {
    /// The target message, from `--link` or from channel and message ids.
    pub fn message_link(&self) -> Result<MessageLink> {
        let link = match (&self.link, &self.channel, self.message) {
            (Some(link), None, None) => MessageLink::parse(link)?,
            (None, Some(channel), Some(message)) => MessageLink::from_ids(channel, message)?,
            (None, _, _) => {
                return Err(Error::InvalidArgument(
                    "either --link or both --channel and --message are required".to_string(),
                ))
            }
            (Some(_), _, _) => {
                return Err(Error::InvalidArgument(
                    "--link cannot be combined with --channel/--message".to_string(),
                ))
            }
        };
        Ok(link.with_comment(self.comment))
    }

    /// Output base name inside `names`' directory.
    pub fn output_name(&self, link: &MessageLink, names: &mut NameAllocator) -> String {
        let base = sanitize_filename(&self.output);
        let base = if self.detailed_name {
            detailed_name(&base, link)
        } else {
            base
        };
        names.allocate(&base)
    }
}

pub async fn run(config: &Config, options: &GetOptions) -> Result<Vec<SavedFile>> {
    let link = options.message_link()?;
    let mut names = NameAllocator::for_dir(&config.download.output_dir);
    let name = options.output_name(&link, &mut names);

    if options.dry_run {
        println!(
            "{} -> {}",
            link,
            config.download.output_dir.join(&name).display()
        );
        return Ok(Vec::new());
    }

    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = get_client(config).await?;
    let resolver = ChannelResolver::new();
    let download = DownloadOptions::from_settings(&config.download, options.infer_extension);

    let names = Mutex::new(names);
    download_message(&client, &resolver, &names, &link, &name, &download).await
}
