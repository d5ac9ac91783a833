//! Tests for the get command

use telegram_media_dl::commands::get::{self, GetOptions};
use telegram_media_dl::naming::NameAllocator;
use telegram_media_dl::{Config, LinkPeer};

#[test]
fn test_get_accepts_public_username_ids() {
    let options = GetOptions {
        channel: Some("@durov".to_string()),
        message: Some(1),
        ..GetOptions::default()
    };
    let link = options.message_link().unwrap();
    assert_eq!(link.peer, LinkPeer::Public("durov".to_string()));
    assert_eq!(link.to_string(), "https://t.me/durov/1");
}

#[test]
fn test_get_comment_flag_overrides_link() {
    let options = GetOptions {
        link: Some("https://t.me/c/10/20".to_string()),
        comment: Some(30),
        ..GetOptions::default()
    };
    let link = options.message_link().unwrap();
    assert_eq!(link.comment_id, Some(30));
}

#[test]
fn test_get_default_output_name() {
    let options = GetOptions {
        link: Some("https://t.me/c/10/20".to_string()),
        ..GetOptions::default()
    };
    let link = options.message_link().unwrap();
    assert_eq!(options.output_name(&link, &mut NameAllocator::new()), "file");
}

#[tokio::test]
async fn test_get_invalid_link_fails_before_connecting() {
    let options = GetOptions {
        link: Some("https://t.me/joinchat/abc".to_string()),
        ..GetOptions::default()
    };
    let err = get::run(&Config::default(), &options).await.unwrap_err();
    assert!(matches!(err, telegram_media_dl::Error::InvalidLink { .. }));
}
