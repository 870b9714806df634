//! External media id encoding.
//!
//! The remote device sees one flat id space. Items from a browse service are
//! addressed as `<two digit source id><native id>`, items from the active
//! player's queue as `NowPlayingId<queue id>`.

use std::sync::LazyLock;

use regex::Regex;

use super::types::SourceId;

/// Prefix of media ids addressing the active player's queue.
pub const NOW_PLAYING_PREFIX: &str = "NowPlayingId";

const _: () = assert!(
    !NOW_PLAYING_PREFIX.as_bytes()[0].is_ascii_digit(),
    "now playing ids must never look like browse ids"
);

pub(crate) const NOW_PLAYING_PATTERN: &str = r"^NowPlayingId([0-9]+)$";
pub(crate) const BROWSE_PATTERN: &str = r"(?s)^([0-9]{2})(.*)$";

// Both patterns are literals compiled by the media id tests, so building
// them cannot fail at runtime.
#[allow(clippy::expect_used)]
static NOW_PLAYING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NOW_PLAYING_PATTERN).expect("now playing id pattern is valid"));

#[allow(clippy::expect_used)]
static BROWSE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BROWSE_PATTERN).expect("browse id pattern is valid"));

/// Errors decoding an external media id
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaIdError {
    /// The id does not start with a two digit source prefix
    #[error("{0:?} has no source prefix")]
    MissingSourcePrefix(String),

    /// The id is not a now-playing id
    #[error("{0:?} is not a now playing id")]
    NotNowPlaying(String),

    /// The queue id does not fit in 64 bits
    #[error("queue id in {0:?} is out of range")]
    QueueIdOutOfRange(String),
}

/// Builds the external id of a browse item.
pub fn browse_media_id(source: SourceId, native_id: &str) -> String {
    format!("{}{native_id}", source.prefix())
}

/// Builds the external id of a queue item.
pub fn now_playing_media_id(queue_id: u64) -> String {
    format!("{NOW_PLAYING_PREFIX}{queue_id}")
}

/// Whether an id addresses the now-playing queue.
pub fn is_now_playing(media_id: &str) -> bool {
    NOW_PLAYING_ID.is_match(media_id)
}

/// Splits a browse id into its source and native id.
///
/// # Errors
/// Returns [`MediaIdError::MissingSourcePrefix`] if the id does not start
/// with two digits.
pub fn parse_browse_media_id(media_id: &str) -> Result<(SourceId, String), MediaIdError> {
    let missing = || MediaIdError::MissingSourcePrefix(media_id.to_string());

    let captures = BROWSE_ID.captures(media_id).ok_or_else(missing)?;
    let source = captures[1]
        .parse::<u8>()
        .ok()
        .and_then(SourceId::new)
        .ok_or_else(missing)?;

    Ok((source, captures[2].to_string()))
}

/// Extracts the queue id from a now-playing id.
///
/// # Errors
/// Returns [`MediaIdError::NotNowPlaying`] if the id lacks the prefix or a
/// numeric suffix, and [`MediaIdError::QueueIdOutOfRange`] if the suffix
/// overflows.
pub fn parse_now_playing_media_id(media_id: &str) -> Result<u64, MediaIdError> {
    let captures = NOW_PLAYING_ID
        .captures(media_id)
        .ok_or_else(|| MediaIdError::NotNowPlaying(media_id.to_string()))?;

    captures[1]
        .parse::<u64>()
        .map_err(|_| MediaIdError::QueueIdOutOfRange(media_id.to_string()))
}
