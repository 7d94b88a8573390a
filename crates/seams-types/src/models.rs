use serde::{Deserialize, Serialize};

/// Public profile of a user as shown in member lists and profile lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub u_id: i64,
    pub email: String,
    pub name_first: String,
    pub name_last: String,
    pub handle_str: String,
    pub profile_img_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmSummary {
    pub dm_id: i64,
    pub name: String,
}

/// One reaction type on a message with everyone who used it.
/// `is_this_user_reacted` is relative to whoever asked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct React {
    pub react_id: i64,
    pub u_ids: Vec<i64>,
    pub is_this_user_reacted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub u_id: i64,
    pub message: String,
    pub time_sent: i64,
    pub reacts: Vec<React>,
    pub is_pinned: bool,
}

/// `channel_id` or `dm_id` is -1 depending on where the event happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub channel_id: i64,
    pub dm_id: i64,
    pub notification_message: String,
}

// -- Statistics history points --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsJoinedPoint {
    pub num_channels_joined: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmsJoinedPoint {
    pub num_dms_joined: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesSentPoint {
    pub num_messages_sent: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsExistPoint {
    pub num_channels_exist: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmsExistPoint {
    pub num_dms_exist: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesExistPoint {
    pub num_messages_exist: i64,
    pub time_stamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub channels_joined: Vec<ChannelsJoinedPoint>,
    pub dms_joined: Vec<DmsJoinedPoint>,
    pub messages_sent: Vec<MessagesSentPoint>,
    pub involvement_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceStats {
    pub channels_exist: Vec<ChannelsExistPoint>,
    pub dms_exist: Vec<DmsExistPoint>,
    pub messages_exist: Vec<MessagesExistPoint>,
    pub utilization_rate: f64,
}
