//! Media groups and their ordered membership.

use crate::{GroupId, MediaId, MediaRecord, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collection of media owned by one identity (a gallery, an
/// attachment set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaGroup {
    /// Group identifier
    pub id: GroupId,
    /// Owning identity
    pub owner_id: UserId,
    /// Free-text description
    pub description: String,
    /// When the group was created
    pub created_at: DateTime<Utc>,
}

/// Membership edge between a group and a media record.
///
/// `position` is 1-based and strictly increasing per group in insertion
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaGroupItem {
    /// Group side of the edge
    pub group_id: GroupId,
    /// Media side of the edge
    pub media_id: MediaId,
    /// Position within the group
    pub position: i32,
    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

/// One page of a bulk listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPage {
    /// Records in listing order
    pub items: Vec<MediaRecord>,
    /// Total number of matching records, independent of any limit
    pub total: i64,
}
