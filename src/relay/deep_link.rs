use crate::relay::error::RelayError;
use crate::structs::MediaId;

pub const PERMISSION_LINK_PREFIX: &str = "photo-renamer://request-permission?media=";

/// Link the consent prompt opens in the foreground controller.
pub fn permission_link(media_id: MediaId) -> String {
    format!("{PERMISSION_LINK_PREFIX}{}", media_id.0)
}

pub fn parse_permission_link(link: &str) -> Result<MediaId, RelayError> {
    link.strip_prefix(PERMISSION_LINK_PREFIX)
        .and_then(|id| id.parse().ok())
        .map(MediaId)
        .ok_or_else(|| RelayError::InvalidDeepLink(link.to_string()))
}
