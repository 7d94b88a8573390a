use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChannelSummary, DmSummary, Message, Notification, User, UserStats, WorkspaceStats};

// -- JWT Claims --

/// Claims carried by a session token. `sid` keeps two sessions opened in the
/// same second distinct. There is no expiry: the token is honoured exactly
/// while it is present in the session table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub sid: Uuid,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name_first: String,
    pub name_last: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub auth_user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetReset {
    pub reset_code: String,
    pub new_password: String,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelsCreateRequest {
    pub name: String,
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelsCreateResponse {
    pub channel_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelsListResponse {
    pub channels: Vec<ChannelSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelDetailsResponse {
    pub name: String,
    pub is_public: bool,
    pub owner_members: Vec<User>,
    pub all_members: Vec<User>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelIdRequest {
    pub channel_id: i64,
}

/// Shared by invite, addowner and removeowner.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelUserRequest {
    pub channel_id: i64,
    pub u_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelQuery {
    pub channel_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelMessagesQuery {
    pub channel_id: i64,
    pub start: i64,
}

/// A page of messages, newest first. `end` is -1 once the oldest message
/// has been returned.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesPage {
    pub messages: Vec<Message>,
    pub start: i64,
    pub end: i64,
}

// -- DMs --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmCreateRequest {
    pub u_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DmCreateResponse {
    pub dm_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DmListResponse {
    pub dms: Vec<DmSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DmDetailsResponse {
    pub name: String,
    pub members: Vec<User>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmIdRequest {
    pub dm_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmQuery {
    pub dm_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmMessagesQuery {
    pub dm_id: i64,
    pub start: i64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSendRequest {
    pub channel_id: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSendDmRequest {
    pub dm_id: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSendLaterRequest {
    pub channel_id: i64,
    pub message: String,
    pub time_sent: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSendLaterDmRequest {
    pub dm_id: i64,
    pub message: String,
    pub time_sent: i64,
}

/// Wordle commands are consumed without storing a message, so there is no
/// id to hand back for them.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageSendResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageEditRequest {
    pub message_id: i64,
    pub message: String,
}

/// Shared by remove, pin and unpin.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageIdRequest {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageReactRequest {
    pub message_id: i64,
    pub react_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageShareRequest {
    pub og_message_id: i64,
    #[serde(default)]
    pub message: String,
    pub channel_id: i64,
    pub dm_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageShareResponse {
    pub shared_message_id: i64,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersAllResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserQuery {
    pub u_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetNameRequest {
    pub name_first: String,
    pub name_last: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetHandleRequest {
    pub handle_str: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadPhotoRequest {
    pub img_url: String,
    pub x_start: i64,
    pub y_start: i64,
    pub x_end: i64,
    pub y_end: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserStatsResponse {
    pub user_stats: UserStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersStatsResponse {
    pub workspace_stats: WorkspaceStats,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminUserRemoveRequest {
    pub u_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminPermissionChangeRequest {
    pub u_id: i64,
    pub permission_id: i64,
}

// -- Search --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchQuery {
    pub query_str: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub messages: Vec<Message>,
}

// -- Standups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandupStartRequest {
    pub channel_id: i64,
    pub length: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StandupStartResponse {
    pub time_finish: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StandupActiveResponse {
    pub is_active: bool,
    pub time_finish: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandupSendRequest {
    pub channel_id: i64,
    pub message: String,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}
