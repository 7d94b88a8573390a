/// Database row types. These map directly to SQLite rows and stay
/// independent of the seams-types API models.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub name_first: String,
    pub name_last: String,
    pub handle: String,
    pub profile_img_url: String,
    pub is_global_owner: bool,
    pub removed: bool,
}

#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct DmRow {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub creator_left: bool,
}

/// Where a message lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Channel(i64),
    Dm(i64),
}

impl Location {
    pub fn kind(&self) -> &'static str {
        match self {
            Location::Channel(_) => "channel",
            Location::Dm(_) => "dm",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Location::Channel(id) | Location::Dm(id) => *id,
        }
    }

    pub fn channel_id(&self) -> Option<i64> {
        match self {
            Location::Channel(id) => Some(*id),
            Location::Dm(_) => None,
        }
    }

    pub fn dm_id(&self) -> Option<i64> {
        match self {
            Location::Dm(id) => Some(*id),
            Location::Channel(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub location: Location,
    pub author_id: i64,
    pub body: String,
    pub time_sent: i64,
    pub is_pinned: bool,
}

pub struct ReactionRow {
    pub message_id: i64,
    pub react_id: i64,
    pub user_id: i64,
}

pub struct NotificationRow {
    pub channel_id: i64,
    pub dm_id: i64,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct StandupRow {
    pub channel_id: i64,
    pub starter_id: i64,
    pub time_finish: i64,
    pub buffer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Channels,
    Dms,
    Messages,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Channels => "channels",
            Metric::Dms => "dms",
            Metric::Messages => "messages",
        }
    }
}

pub struct StatPoint {
    pub value: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone)]
pub struct WordleRow {
    pub location: Location,
    pub host_id: i64,
    pub answer: String,
    pub guesses: i64,
    pub current: String,
    pub misplaced: String,
    pub incorrect: String,
    pub history: String,
    pub board_message_id: i64,
    pub prompt_message_id: i64,
}
