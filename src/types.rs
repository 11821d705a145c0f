//! Core types for hn-pull

use serde::{Deserialize, Serialize};

/// Unique identifier for a Hacker News item
///
/// IDs are allocated upstream as a monotonically increasing sequence, but the
/// sequence is not contiguous: tombstoned or never-allocated IDs resolve to
/// an absent item, which is not an error.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for u64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl PartialEq<u64> for ItemId {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<ItemId> for u64 {
    fn eq(&self, other: &ItemId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Kind of a Hacker News item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A submitted story (link or text post)
    Story,
    /// A comment on a story, poll, or another comment
    Comment,
    /// A job posting
    Job,
    /// A poll
    Poll,
    /// An option belonging to a poll
    PollOpt,
}

/// One node in the Hacker News content graph
///
/// Immutable once fetched. Every field beyond `id` and `kind` is optional:
/// the upstream API omits fields that do not apply to an item's type, so an
/// absent field is "not applicable", never an error. Absent fields are also
/// omitted on serialization, keeping `descendants: 0` (a story with no
/// discussion yet) distinguishable from no `descendants` at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The item's unique ID
    pub id: ItemId,
    /// The type of item
    #[serde(rename = "type")]
    pub kind: ItemType,
    /// Author handle (absent for deleted items)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    /// Creation time in Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Comment, story, or poll text (HTML)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// True if the item is dead (killed by moderation or flags)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead: Option<bool>,
    /// True if the item is deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    /// The comment's parent: another comment or the enclosing story/poll
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemId>,
    /// The poll a pollopt belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<ItemId>,
    /// IDs of the item's comments, in ranked display order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kids: Option<Vec<ItemId>>,
    /// The URL of a story
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The story or poll score, or the votes for a pollopt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// The title of a story, poll, or job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// IDs of a poll's options, in display order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<ItemId>>,
    /// Total comment count of a story or poll
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descendants: Option<u32>,
}

/// One Hacker News user profile, keyed by handle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's handle (case-sensitive)
    pub id: String,
    /// Account creation time in Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// The user's karma
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karma: Option<i64>,
    /// The user's self-description (HTML)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    /// IDs of the user's submissions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<Vec<ItemId>>,
}

/// How a pull run ended
///
/// All three states leave the sinks in a consistent, resumable state; none
/// requires a rollback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// ID space exhausted or the `max_items` budget was reached
    Completed,
    /// An item older than the cutoff was encountered
    StoppedByCutoff,
    /// External cancellation; the in-flight batch drained before exit
    Interrupted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::StoppedByCutoff => write!(f, "stopped_by_cutoff"),
            Termination::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Counters accumulated over one pull run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullStats {
    /// Item IDs examined (present, absent, or errored)
    pub items_seen: u64,
    /// Items persisted to the items stream
    pub items_saved: u64,
    /// IDs that resolved to no item (tombstoned or never allocated)
    pub items_absent: u64,
    /// Item fetches that failed after retry exhaustion
    pub item_errors: u64,
    /// Users persisted to the users stream
    pub users_saved: u64,
    /// Referenced handles with no upstream profile
    pub users_absent: u64,
    /// User fetches that failed after retry exhaustion
    pub user_errors: u64,
}

/// Outcome of a completed pull run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullReport {
    /// How the run ended
    pub termination: Termination,
    /// Counters accumulated during the run
    pub stats: PullStats,
    /// The last item ID the traversal examined, if any
    pub last_cursor: Option<ItemId>,
}

/// Progress events emitted during a pull run
///
/// Delivered over a broadcast channel; a subscriber that falls behind
/// misses the oldest events rather than backpressuring the run.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A run started
    Started {
        /// The item ID the descending walk starts from
        start_id: ItemId,
        /// Cutoff timestamp in Unix seconds, if a time window is configured
        #[serde(skip_serializing_if = "Option::is_none")]
        cutoff: Option<i64>,
    },

    /// A batch of items (and its referenced users) was persisted
    BatchCompleted {
        /// The highest item ID of the batch just processed
        cursor: ItemId,
        /// Items persisted so far this run
        items_saved: u64,
        /// Users persisted so far this run
        users_saved: u64,
    },

    /// The run ended
    Finished {
        /// How the run ended
        termination: Termination,
    },
}
