//! Telegram message links.
//!
//! Supported shapes:
//! - `https://t.me/c/<channel>/<message>`
//! - `https://t.me/c/<channel>/<topic>/<message>`
//! - `https://t.me/<username>/<message>` (optionally with a topic segment)
//!
//! A `?comment=<id>` query selects a comment in the channel's discussion group.

use std::fmt;

use crate::error::{Error, Result};

const HOSTS: [&str; 3] = ["t.me", "telegram.me", "telegram.dog"];

/// Paths on t.me that are not channel usernames.
const RESERVED_PATHS: [&str; 5] = ["c", "s", "joinchat", "addstickers", "share"];

/// Prefix of "marked" channel ids as used by the Bot API.
const MARKED_CHANNEL_PREFIX: &str = "-100";

/// Channel a link points into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkPeer {
    /// Private link with the bare channel id.
    Private(i64),
    /// Public link with the channel username.
    Public(String),
}

impl fmt::Display for LinkPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkPeer::Private(id) => write!(f, "{}", id),
            LinkPeer::Public(username) => write!(f, "{}", username),
        }
    }
}

/// A parsed message link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLink {
    pub peer: LinkPeer,
    pub message_id: i32,
    pub thread_id: Option<i32>,
    pub comment_id: Option<i32>,
}

impl MessageLink {
    /// Parse a `t.me` message link.
    pub fn parse(text: &str) -> Result<Self> {
        let link = text.trim();
        let rest = link
            .strip_prefix("https://")
            .or_else(|| link.strip_prefix("http://"))
            .unwrap_or(link);

        let rest = rest.split('#').next().unwrap_or(rest);
        let (rest, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let host = segments
            .next()
            .ok_or_else(|| Error::invalid_link(link, "empty link"))?;
        let host = host.strip_prefix("www.").unwrap_or(host);
        if !HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            return Err(Error::invalid_link(link, "unsupported host"));
        }
        let parts: Vec<&str> = segments.collect();

        let (peer, thread_id, message) = match parts.as_slice() {
            ["c", channel, middle @ .., message] => {
                let channel = parse_channel_id(channel)
                    .ok_or_else(|| Error::invalid_link(link, "invalid channel id"))?;
                (LinkPeer::Private(channel), single_thread(middle), *message)
            }
            [username, middle @ .., message] if !RESERVED_PATHS.contains(username) => {
                if !is_username(username) {
                    return Err(Error::invalid_link(link, "invalid channel username"));
                }
                if middle.len() > 1 {
                    return Err(Error::invalid_link(link, "too many path segments"));
                }
                (
                    LinkPeer::Public(username.to_string()),
                    single_thread(middle),
                    *message,
                )
            }
            _ => return Err(Error::invalid_link(link, "no message id in link")),
        };

        let message_id = parse_message_id(message)
            .ok_or_else(|| Error::invalid_link(link, "message id is not a number"))?;

        let mut parsed = MessageLink {
            peer,
            message_id,
            thread_id,
            comment_id: None,
        };

        for (key, value) in query.into_iter().flat_map(query_pairs) {
            match key {
                "comment" => {
                    parsed.comment_id = Some(
                        parse_message_id(value)
                            .ok_or_else(|| Error::invalid_link(link, "invalid comment id"))?,
                    )
                }
                "thread" if parsed.thread_id.is_none() => {
                    parsed.thread_id = parse_message_id(value)
                }
                _ => {}
            }
        }

        Ok(parsed)
    }

    /// Build a link from a channel (id or username) and a message id.
    pub fn from_ids(channel: &str, message_id: i32) -> Result<Self> {
        let channel = channel.trim();
        if message_id <= 0 {
            return Err(Error::InvalidArgument(format!(
                "message id must be positive, got {}",
                message_id
            )));
        }

        let peer = if is_numlike(channel) {
            LinkPeer::Private(parse_channel_id(channel).ok_or_else(|| {
                Error::InvalidArgument(format!("invalid channel id: {}", channel))
            })?)
        } else {
            let username = channel.trim_start_matches('@');
            if !is_username(username) {
                return Err(Error::InvalidArgument(format!(
                    "invalid channel username: {}",
                    channel
                )));
            }
            LinkPeer::Public(username.to_string())
        };

        Ok(MessageLink {
            peer,
            message_id,
            thread_id: None,
            comment_id: None,
        })
    }

    /// Attach a discussion comment id.
    pub fn with_comment(mut self, comment_id: Option<i32>) -> Self {
        if comment_id.is_some() {
            self.comment_id = comment_id;
        }
        self
    }
}

impl fmt::Display for MessageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.peer {
            LinkPeer::Private(id) => write!(f, "https://t.me/c/{}", id)?,
            LinkPeer::Public(username) => write!(f, "https://t.me/{}", username)?,
        }
        if let Some(thread) = self.thread_id {
            write!(f, "/{}", thread)?;
        }
        write!(f, "/{}", self.message_id)?;
        if let Some(comment) = self.comment_id {
            write!(f, "?comment={}", comment)?;
        }
        Ok(())
    }
}

fn single_thread(middle: &[&str]) -> Option<i32> {
    match middle {
        [topic] => parse_message_id(topic),
        _ => None,
    }
}

fn query_pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
}

/// Optional sign followed by ASCII digits.
fn is_numlike(s: &str) -> bool {
    let digits = s.trim_start_matches(['+', '-']);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Parse a channel id, accepting the `-100<id>` marked form.
fn parse_channel_id(s: &str) -> Option<i64> {
    if !is_numlike(s) {
        return None;
    }
    let bare = match s.strip_prefix(MARKED_CHANNEL_PREFIX) {
        Some(rest) => rest.parse::<i64>().ok()?,
        None if s.starts_with('-') => return None,
        None => s.trim_start_matches('+').parse::<i64>().ok()?,
    };
    (bare > 0).then_some(bare)
}

fn parse_message_id(s: &str) -> Option<i32> {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<i32>().ok().filter(|id| *id > 0)
}

fn is_username(s: &str) -> bool {
    (1..=32).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
