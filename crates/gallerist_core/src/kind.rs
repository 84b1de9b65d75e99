//! Media kind classification.

use serde::{Deserialize, Serialize};

/// Kind of uploaded media.
///
/// Stored as its lowercase name.
///
/// # Examples
///
/// ```
/// use gallerist_core::MediaKind;
///
/// let kind: MediaKind = "video".parse().unwrap();
/// assert_eq!(kind, MediaKind::Video);
/// assert!(kind.requires_dimensions());
/// assert_eq!(MediaKind::Photo.to_string(), "photo");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Photo,
    /// Moving image, with duration
    Video,
    /// Sound recording
    Audio,
    /// Any other document
    Document,
}

impl MediaKind {
    /// String form used in storage.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Photos and videos must carry positive width and height.
    pub fn requires_dimensions(&self) -> bool {
        matches!(self, MediaKind::Photo | MediaKind::Video)
    }

    /// Videos must carry a duration.
    pub fn requires_duration(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_round_trips_through_str() {
        for kind in MediaKind::iter() {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!("image".parse::<MediaKind>().is_err());
    }
}
