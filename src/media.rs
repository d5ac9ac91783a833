//! Downloadable attachments of a message.

use grammers_client::types::Media;
use grammers_tl_types as tl;

use crate::error::{Error, Result};

/// One downloadable file with the metadata known before the transfer starts.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub media: Media,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

/// Collect the attachments of a message.
///
/// Paid media yields one attachment per unlocked item. A single locked
/// preview fails the whole message.
pub fn extract_attachments(
    message_id: i32,
    media: Option<tl::enums::MessageMedia>,
) -> Result<Vec<Attachment>> {
    let media = media.ok_or(Error::NoMedia(message_id))?;

    let tl::enums::MessageMedia::PaidMedia(paid) = media else {
        return Ok(vec![attachment_from_raw(message_id, media)?]);
    };

    let mut attachments = Vec::with_capacity(paid.extended_media.len());
    for extended in paid.extended_media {
        match extended {
            tl::enums::MessageExtendedMedia::Media(m) => {
                attachments.push(attachment_from_raw(message_id, m.media)?)
            }
            tl::enums::MessageExtendedMedia::Preview(_) => {
                return Err(Error::PaidMediaLocked(message_id))
            }
        }
    }

    if attachments.is_empty() {
        return Err(Error::NoMedia(message_id));
    }
    Ok(attachments)
}

fn attachment_from_raw(message_id: i32, raw: tl::enums::MessageMedia) -> Result<Attachment> {
    let (size, mime_type) = match &raw {
        tl::enums::MessageMedia::Document(d) => match &d.document {
            Some(tl::enums::Document::Document(doc)) => (
                u64::try_from(doc.size).ok(),
                Some(doc.mime_type.clone()).filter(|m| !m.is_empty()),
            ),
            _ => return Err(Error::NoMedia(message_id)),
        },
        tl::enums::MessageMedia::Photo(p) => match &p.photo {
            Some(photo) => (largest_photo_size(photo), Some("image/jpeg".to_string())),
            None => return Err(Error::NoMedia(message_id)),
        },
        _ => return Err(Error::NoMedia(message_id)),
    };

    let media = Media::from_raw(raw).ok_or(Error::NoMedia(message_id))?;
    Ok(Attachment {
        media,
        size,
        mime_type,
    })
}

/// Byte size of the biggest rendition of a photo.
fn largest_photo_size(photo: &tl::enums::Photo) -> Option<u64> {
    let tl::enums::Photo::Photo(photo) = photo else {
        return None;
    };
    photo
        .sizes
        .iter()
        .filter_map(|size| match size {
            tl::enums::PhotoSize::Size(s) => Some(s.size),
            tl::enums::PhotoSize::Progressive(s) => s.sizes.iter().max().copied(),
            _ => None,
        })
        .max()
        .and_then(|size| u64::try_from(size).ok())
}
