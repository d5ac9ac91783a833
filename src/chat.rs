//! Channel resolution and message lookup

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::links::LinkPeer;

/// A channel (broadcast or megagroup) with the access hash needed for API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: i64,
    pub access_hash: i64,
}

impl ChannelRef {
    /// Extract the channel behind a resolved peer.
    pub fn from_peer(peer: &Peer) -> Result<Self> {
        match peer {
            Peer::Channel(channel) => channel
                .raw
                .access_hash
                .map(|access_hash| ChannelRef {
                    id: channel.raw.id,
                    access_hash,
                })
                .ok_or_else(|| {
                    Error::NotAChannel(format!("no access hash for channel {}", channel.raw.id))
                }),
            Peer::Group(group) => Self::from_raw_chat(&group.raw).ok_or_else(|| {
                Error::NotAChannel(format!(
                    "'{}' is a basic group",
                    peer.name().unwrap_or("unknown")
                ))
            }),
            Peer::User(_) => Err(Error::NotAChannel(format!(
                "'{}' is a user",
                peer.name().unwrap_or("unknown")
            ))),
        }
    }

    /// Channel from a raw chat, if it is one and carries an access hash.
    pub fn from_raw_chat(chat: &tl::enums::Chat) -> Option<Self> {
        match chat {
            tl::enums::Chat::Channel(c) => c.access_hash.map(|access_hash| ChannelRef {
                id: c.id,
                access_hash,
            }),
            _ => None,
        }
    }

    pub fn input_channel(&self) -> tl::enums::InputChannel {
        tl::enums::InputChannel::Channel(tl::types::InputChannel {
            channel_id: self.id,
            access_hash: self.access_hash,
        })
    }

    pub fn input_peer(&self) -> tl::enums::InputPeer {
        tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: self.id,
            access_hash: self.access_hash,
        })
    }
}

/// Resolves link peers to channels, caching results for the lifetime of a run.
#[derive(Debug, Default)]
pub struct ChannelResolver {
    cache: Mutex<HashMap<LinkPeer, Arc<OnceCell<ChannelRef>>>>,
}

impl ChannelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a link peer.
    ///
    /// Private ids must belong to a dialog of the signed-in account; public
    /// usernames are resolved through the API. Concurrent callers asking for
    /// the same peer share one lookup; other peers are not blocked by it.
    pub async fn resolve(&self, client: &Client, peer: &LinkPeer) -> Result<ChannelRef> {
        let cell = self.entry(peer);
        let channel = cell
            .get_or_try_init(|| async {
                let channel = match peer {
                    LinkPeer::Private(id) => find_dialog_channel(client, *id).await?,
                    LinkPeer::Public(username) => {
                        let resolved = client
                            .resolve_username(username)
                            .await?
                            .ok_or_else(|| Error::ChatNotFound(format!("@{}", username)))?;
                        ChannelRef::from_peer(&resolved)?
                    }
                };
                debug!(%peer, channel_id = channel.id, "resolved channel");
                Ok::<_, Error>(channel)
            })
            .await?;
        Ok(*channel)
    }

    /// The cache slot for `peer`. A failed lookup leaves it empty for a retry.
    fn entry(&self, peer: &LinkPeer) -> Arc<OnceCell<ChannelRef>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(cache.entry(peer.clone()).or_default())
    }
}

/// Find a channel or megagroup among the account's dialogs by bare id.
async fn find_dialog_channel(client: &Client, target_id: i64) -> Result<ChannelRef> {
    let mut dialogs = client.iter_dialogs();

    while let Some(dialog) = dialogs.next().await? {
        if let Ok(channel) = ChannelRef::from_peer(&dialog.peer) {
            if channel.id == target_id {
                return Ok(channel);
            }
        }
    }

    Err(Error::ChatNotFound(format!(
        "Channel {} not found in dialogs",
        target_id
    )))
}

fn first_message(messages: Vec<tl::enums::Message>, id: i32) -> Result<tl::types::Message> {
    match messages.into_iter().next() {
        Some(tl::enums::Message::Message(message)) => Ok(message),
        Some(tl::enums::Message::Service(_)) => Err(Error::NoMedia(id)),
        Some(tl::enums::Message::Empty(_)) | None => Err(Error::MessageNotFound(id)),
    }
}

/// Fetch a single message from a channel.
pub async fn fetch_channel_message(
    client: &Client,
    channel: ChannelRef,
    id: i32,
) -> Result<tl::types::Message> {
    let request = tl::functions::channels::GetMessages {
        channel: channel.input_channel(),
        id: vec![tl::enums::InputMessage::Id(tl::types::InputMessageId { id })],
    };

    match client.invoke(&request).await? {
        tl::enums::messages::Messages::ChannelMessages(m) => first_message(m.messages, id),
        _ => Err(Error::UnexpectedResponse(format!(
            "expected channel messages for message {} in channel {}",
            id, channel.id
        ))),
    }
}

/// Fetch a comment on a channel post from the linked discussion group.
pub async fn fetch_comment(
    client: &Client,
    channel: ChannelRef,
    post: &tl::types::Message,
    comment_id: i32,
) -> Result<tl::types::Message> {
    let has_comments = matches!(
        &post.replies,
        Some(tl::enums::MessageReplies::Replies(replies)) if replies.comments
    );
    if !has_comments {
        return Err(Error::NoComments(post.id));
    }

    info!("finding message {} in the discussion group", comment_id);

    let request = tl::functions::messages::GetDiscussionMessage {
        peer: channel.input_peer(),
        msg_id: post.id,
    };
    let tl::enums::messages::DiscussionMessage::Message(discussion) =
        client.invoke(&request).await?;

    let group = discussion_channel(&discussion)?;
    fetch_channel_message(client, group, comment_id).await
}

/// The discussion group that holds the thread of a post.
fn discussion_channel(discussion: &tl::types::messages::DiscussionMessage) -> Result<ChannelRef> {
    let group_id = discussion
        .messages
        .iter()
        .find_map(|m| match m {
            tl::enums::Message::Message(m) => Some(&m.peer_id),
            tl::enums::Message::Service(m) => Some(&m.peer_id),
            tl::enums::Message::Empty(_) => None,
        })
        .and_then(|peer| match peer {
            tl::enums::Peer::Channel(p) => Some(p.channel_id),
            _ => None,
        })
        .ok_or_else(|| {
            Error::UnexpectedResponse("discussion thread has no channel message".to_string())
        })?;

    discussion
        .chats
        .iter()
        .filter_map(ChannelRef::from_raw_chat)
        .find(|c| c.id == group_id)
        .ok_or_else(|| {
            Error::NotAChannel(format!("no access hash for discussion group {}", group_id))
        })
}
