//! Service requests: a customer's ask routed to a workshop admin, optionally
//! handed to a worker.

use axum::{extract::State, Json};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;

use crate::{
    error::Error,
    mongo_ext::Collection,
    realtime::NotificationHub,
    util::{now, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::{
    auth::{UserAccess, UserCollection, UserModel, UserRole},
    notification::{
        build_notification, notify_after_write, NotificationCollection, NotificationKind, Subject,
    },
};

#[derive(Clone)]
pub struct RequestCollection(pub Collection<RequestModel>);

impl std::ops::Deref for RequestCollection {
    type Target = Collection<RequestModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Lifecycle of a service request. Documents written by the older schema
/// stored `assigned`, which is read back as [`RequestStatus::WorkerAssigned`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    AdminReviewing,
    #[serde(alias = "assigned")]
    WorkerAssigned,
    InProgress,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AdminReviewing => "admin-reviewing",
            Self::WorkerAssigned => "worker-assigned",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub admin_id: ObjectId,
    pub shop_id: ObjectId,
    #[serde(default)]
    pub worker_id: Option<ObjectId>,

    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,

    pub status: RequestStatus,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl RequestModel {
    pub fn is_participant(&self, user: &UserAccess) -> bool {
        match user.role {
            UserRole::Admin => true,
            UserRole::User => self.user_id == user.id,
            UserRole::Worker => self.worker_id == Some(user.id),
        }
    }

    fn summary(&self) -> &str {
        self.service_name
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("service request")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: ObjectIdString,
    pub user_id: ObjectIdString,
    pub admin_id: ObjectIdString,
    pub shop_id: ObjectIdString,
    pub worker_id: Option<ObjectIdString>,
    pub service_name: Option<String>,
    pub message: Option<String>,
    pub location: Option<String>,
    pub vehicle: Option<String>,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<RequestModel> for RequestResponse {
    fn from(value: RequestModel) -> Self {
        Self {
            id: value.id.into(),
            user_id: value.user_id.into(),
            admin_id: value.admin_id.into(),
            shop_id: value.shop_id.into(),
            worker_id: value.worker_id.map(Into::into),
            service_name: value.service_name,
            message: value.message,
            location: value.location,
            vehicle: value.vehicle,
            urgency: value.urgency,
            status: value.status,
            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub requests: Vec<RequestResponse>,
}

/// Body of both request creation routes. Every field is optional on the wire
/// so that absent ones can be reported together.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub user_id: Option<ObjectIdString>,
    pub admin_id: Option<ObjectIdString>,
    #[serde(alias = "workshopId")]
    pub shop_id: Option<ObjectIdString>,
    pub service_name: Option<String>,
    pub message: Option<String>,
    pub location: Option<String>,
    pub vehicle: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).is_some_and(|it| !it.is_empty())
}

impl CreateRequest {
    /// Both creation routes need the ids plus a service name or a free text
    /// message. Without either, `serviceName` is reported.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = vec![];

        if self.user_id.is_none() {
            missing.push("userId");
        }
        if self.admin_id.is_none() {
            missing.push("adminId");
        }
        if self.shop_id.is_none() {
            missing.push("shopId");
        }
        if !non_empty(&self.service_name) && !non_empty(&self.message) {
            missing.push("serviceName");
        }

        missing
    }

    /// Checks the body and turns it into a new `pending` request.
    pub fn into_model(self, caller: &UserAccess) -> Result<RequestModel, Error> {
        let missing = self.missing_fields();
        let (Some(user_id), Some(admin_id), Some(shop_id)) =
            (self.user_id, self.admin_id, self.shop_id)
        else {
            return Err(Error::MissingFields(missing));
        };
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }

        match caller.role {
            UserRole::Admin => {}
            UserRole::User if user_id == caller.id => {}
            UserRole::User | UserRole::Worker => return Err(Error::Forbidden),
        }

        let created_at = now();

        Ok(RequestModel {
            id: ObjectId::new(),
            user_id: user_id.into(),
            admin_id: admin_id.into(),
            shop_id: shop_id.into(),
            worker_id: None,
            service_name: self.service_name.filter(|it| !it.trim().is_empty()),
            message: self.message.filter(|it| !it.trim().is_empty()),
            location: self.location,
            vehicle: self.vehicle,
            urgency: self.urgency,
            status: RequestStatus::Pending,
            created_at,
            updated_at: created_at,
        })
    }
}

async fn create(
    requests: RequestCollection,
    notifications: NotificationCollection,
    hub: NotificationHub,
    user: UserAccess,
    request: CreateRequest,
) -> Result<Json<RequestResponse>, Error> {
    let model = request
        .into_model(&user)
        .tap_err(|err| tracing::debug!("rejected request creation: {err}"))?;

    requests.insert_one(&model, None).await?;

    tracing::info!(request = %model.id, admin = %model.admin_id, "service request created");

    notify_after_write(
        &notifications,
        &hub,
        build_notification(
            model.admin_id,
            NotificationKind::NewRequest,
            "New service request",
            format!("A customer asked for: {}", model.summary()),
            Subject::request(model.id),
        ),
    )
    .await;

    Ok(Json(model.into()))
}

/// `POST /requests/send`
pub async fn send(
    State(requests): State<RequestCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    user: UserAccess,
    Json(request): Json<CreateRequest>,
) -> Result<Json<RequestResponse>, Error> {
    create(requests, notifications, hub, user, request).await
}

/// `POST /requests/service-requests`
pub async fn create_service_request(
    State(requests): State<RequestCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    user: UserAccess,
    Json(request): Json<CreateRequest>,
) -> Result<Json<RequestResponse>, Error> {
    create(requests, notifications, hub, user, request).await
}

pub async fn show(
    user: UserAccess,
    State(requests): State<RequestCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<RequestResponse>, Error> {
    let request = requests
        .get_one_by_id(id)
        .await?
        .ok_or(Error::NoResource)?;

    if !request.is_participant(&user) {
        return Err(Error::Forbidden);
    }

    Ok(Json(request.into()))
}

pub async fn index_admin(
    user: UserModel,
    State(requests): State<RequestCollection>,
    PathObjectId(admin_id): PathObjectId,
) -> Result<Json<IndexResponse>, Error> {
    user.role.require(&[UserRole::Admin])?;

    let requests = requests
        .find_all_newest(bson::doc! { "adminId": admin_id })
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(IndexResponse { requests }))
}

pub async fn index_user(
    user: UserAccess,
    State(requests): State<RequestCollection>,
    PathObjectId(user_id): PathObjectId,
) -> Result<Json<IndexResponse>, Error> {
    if user.role != UserRole::Admin && user.id != user_id {
        return Err(Error::Forbidden);
    }

    let requests = requests
        .find_all_newest(bson::doc! { "userId": user_id })
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(IndexResponse { requests }))
}

pub async fn index_worker(
    user: UserAccess,
    State(requests): State<RequestCollection>,
    PathObjectId(worker_id): PathObjectId,
) -> Result<Json<IndexResponse>, Error> {
    match user.role {
        UserRole::Admin => {}
        UserRole::Worker if user.id == worker_id => {}
        UserRole::Worker | UserRole::User => return Err(Error::Forbidden),
    }

    let requests = requests
        .find_all_newest(bson::doc! { "workerId": worker_id })
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(IndexResponse { requests }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub worker_id: ObjectIdString,
}

#[tracing::instrument(skip_all, fields(admin = %user.id, request = %id))]
pub async fn assign(
    user: UserModel,
    State(requests): State<RequestCollection>,
    State(users): State<UserCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<AssignRequest>,
) -> Result<Json<RequestResponse>, Error> {
    match user.role {
        UserRole::User | UserRole::Worker => {
            return Err(Error::Forbidden)
                .tap_err(|_| tracing::debug!("tried assigning a worker without being admin"))
        }
        UserRole::Admin => {}
    }

    let worker = users
        .get_one_by_id(request.worker_id.into())
        .await?
        .filter(|it| it.role == UserRole::Worker && it.is_active)
        .ok_or(Error::InvalidInput("workerId must reference an active worker"))?;

    let updated = requests
        .find_one_and_update_after(
            bson::doc! { "_id": id },
            bson::doc! {
                "$set": {
                    "workerId": worker.id,
                    "status": RequestStatus::WorkerAssigned.as_str(),
                    "updatedAt": now(),
                }
            },
        )
        .await?
        .ok_or(Error::NoResource)?;

    tracing::info!(worker = %worker.id, "worker assigned");

    notify_after_write(
        &notifications,
        &hub,
        build_notification(
            worker.id,
            NotificationKind::TaskAssigned,
            "New assignment",
            format!("You have been assigned: {}", updated.summary()),
            Subject::request(updated.id),
        ),
    )
    .await;

    Ok(Json(updated.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateStatusRequest {
    pub status: RequestStatus,
}

/// Sets the status to any value of the vocabulary. Jumps are not checked,
/// only who may move the request.
#[tracing::instrument(skip_all, fields(user = %user.id, request = %id))]
pub async fn update_status(
    user: UserAccess,
    State(requests): State<RequestCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<RequestResponse>, Error> {
    let current = requests
        .get_one_by_id(id)
        .await?
        .ok_or(Error::NoResource)?;

    match user.role {
        UserRole::Admin => {}
        UserRole::Worker if current.worker_id == Some(user.id) => {}
        UserRole::Worker | UserRole::User => {
            return Err(Error::Forbidden)
                .tap_err(|_| tracing::debug!("tried changing status of someone else's request"))
        }
    }

    let updated = requests
        .find_one_and_update_after(
            bson::doc! { "_id": id },
            bson::doc! {
                "$set": {
                    "status": request.status.as_str(),
                    "updatedAt": now(),
                }
            },
        )
        .await?
        .ok_or(Error::NoResource)?;

    tracing::info!(from = %current.status, to = %updated.status, "request status changed");

    notify_after_write(
        &notifications,
        &hub,
        build_notification(
            updated.user_id,
            NotificationKind::StatusUpdate,
            "Request updated",
            format!("Your request is now {}", updated.status),
            Subject::request(updated.id),
        ),
    )
    .await;

    Ok(Json(updated.into()))
}

/// Only a `pending` request may be deleted. The status check and the removal
/// are the same conditional write.
#[tracing::instrument(skip_all, fields(user = %user.id, request = %id))]
pub async fn delete(
    user: UserAccess,
    State(requests): State<RequestCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<(), Error> {
    let current = requests
        .get_one_by_id(id)
        .await?
        .ok_or(Error::NoResource)?;

    match user.role {
        UserRole::Admin => {}
        UserRole::User if current.user_id == user.id => {}
        UserRole::User | UserRole::Worker => return Err(Error::Forbidden),
    }

    let result = requests
        .delete_one(
            bson::doc! {
                "_id": id,
                "status": RequestStatus::Pending.as_str(),
            },
            None,
        )
        .await?;

    if result.deleted_count == 0 {
        return Err(Error::Conflict("request can only be deleted while pending"))
            .tap_err(|_| tracing::debug!(status = %current.status, "refused to delete request"));
    }

    tracing::info!("service request deleted");

    Ok(())
}
