use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;

use crate::{
    error::Error,
    mongo_ext::Collection,
    realtime::{NotificationHub, ServerEvent},
    util::{now, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::auth::UserAccess;

#[derive(Clone)]
pub struct NotificationCollection(pub Collection<NotificationModel>);

impl std::ops::Deref for NotificationCollection {
    type Target = Collection<NotificationModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewRequest,
    TaskAssigned,
    StatusUpdate,
    TaskNote,
}

impl NotificationKind {
    /// Assignments and new work are announced as `new_notification`, progress
    /// updates as plain `notification`.
    pub fn event(self, payload: NotificationResponse) -> ServerEvent {
        match self {
            Self::NewRequest | Self::TaskAssigned => ServerEvent::NewNotification(payload),
            Self::StatusUpdate | Self::TaskNote => ServerEvent::Notification(payload),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub recipient_id: ObjectId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub request_id: Option<ObjectId>,
    #[serde(default)]
    pub task_id: Option<ObjectId>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: ObjectIdString,
    pub recipient_id: ObjectIdString,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub request_id: Option<ObjectIdString>,
    pub task_id: Option<ObjectIdString>,
    pub is_read: bool,
    pub created_at: FormattedDateTime,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(value: NotificationModel) -> Self {
        Self {
            id: value.id.into(),
            recipient_id: value.recipient_id.into(),
            kind: value.kind,
            title: value.title,
            message: value.message,
            request_id: value.request_id.map(Into::into),
            task_id: value.task_id.map(Into::into),
            is_read: value.is_read,
            created_at: value.created_at.into(),
        }
    }
}

/// What a notification points at.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subject {
    pub request_id: Option<ObjectId>,
    pub task_id: Option<ObjectId>,
}

impl Subject {
    pub fn request(id: ObjectId) -> Self {
        Self {
            request_id: Some(id),
            task_id: None,
        }
    }

    pub fn task(id: ObjectId) -> Self {
        Self {
            request_id: None,
            task_id: Some(id),
        }
    }
}

pub fn build_notification(
    recipient_id: ObjectId,
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    subject: Subject,
) -> NotificationModel {
    NotificationModel {
        id: ObjectId::new(),
        recipient_id,
        kind,
        title: title.into(),
        message: message.into(),
        request_id: subject.request_id,
        task_id: subject.task_id,
        is_read: false,
        created_at: now(),
    }
}

/// Persists the notification, then pushes it to the recipient's room if the
/// recipient is connected. The push is fire-and-forget.
pub async fn notify(
    notifications: &NotificationCollection,
    hub: &NotificationHub,
    notification: NotificationModel,
) -> Result<NotificationModel, Error> {
    notifications.insert_one(&notification, None).await?;

    let delivered = if hub.is_connected(notification.recipient_id) {
        hub.publish(
            notification.recipient_id,
            notification.kind.event(notification.clone().into()),
        )
    } else {
        0
    };

    tracing::debug!(
        recipient = %notification.recipient_id,
        kind = ?notification.kind,
        delivered,
        "notification fanned out"
    );

    Ok(notification)
}

/// [`notify`] for callers whose own write already succeeded. A failure is
/// logged and does not fail the request.
pub async fn notify_after_write(
    notifications: &NotificationCollection,
    hub: &NotificationHub,
    notification: NotificationModel,
) -> Option<NotificationModel> {
    let recipient = notification.recipient_id;
    let kind = notification.kind;

    notify(notifications, hub, notification)
        .await
        .tap_err(|err| {
            tracing::error!(%recipient, ?kind, "failed to store notification: {err}")
        })
        .ok()
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IndexQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub notifications: Vec<NotificationResponse>,
}

pub async fn index(
    user: UserAccess,
    State(notifications): State<NotificationCollection>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<IndexResponse>, Error> {
    let mut filter = bson::doc! { "recipientId": user.id };
    if query.unread {
        filter.insert("isRead", false);
    }

    let notifications = notifications
        .find_all_newest(filter)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(IndexResponse { notifications }))
}

pub async fn mark_read(
    user: UserAccess,
    State(notifications): State<NotificationCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<NotificationResponse>, Error> {
    let notification = notifications
        .get_one_by_id(id)
        .await?
        .ok_or(Error::NoResource)?;

    if notification.recipient_id != user.id {
        return Err(Error::Forbidden);
    }

    let notification = notifications
        .find_one_and_update_after(
            bson::doc! { "_id": id },
            bson::doc! { "$set": { "isRead": true } },
        )
        .await?
        .ok_or(Error::NoResource)?;

    Ok(Json(notification.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReadAllResponse {
    pub modified_count: u64,
}

pub async fn mark_all_read(
    user: UserAccess,
    State(notifications): State<NotificationCollection>,
) -> Result<Json<ReadAllResponse>, Error> {
    let result = notifications
        .update_many(
            bson::doc! { "recipientId": user.id, "isRead": false },
            bson::doc! { "$set": { "isRead": true } },
            None,
        )
        .await?;

    Ok(Json(ReadAllResponse {
        modified_count: result.modified_count,
    }))
}
