//! Worker facing tasks: quotation, notes, live location and the step by step
//! service workflow ending in an invoice.

use axum::{extract::State, Json};
use bson::{oid::ObjectId, Document};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    realtime::NotificationHub,
    util::{now, DecimalString, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::{
    auth::{UserAccess, UserCollection, UserModel, UserRole},
    notification::{
        build_notification, notify_after_write, NotificationCollection, NotificationKind, Subject,
    },
};

#[derive(Clone)]
pub struct TaskCollection(pub Collection<TaskModel>);

impl std::ops::Deref for TaskCollection {
    type Target = Collection<TaskModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Assigned,
    StartService,
    Reached,
    InProgress,
    Completed,
    Done,
}

impl TaskStatus {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Assigned => Some(Self::StartService),
            Self::StartService => Some(Self::Reached),
            Self::Reached => Some(Self::InProgress),
            Self::InProgress => Some(Self::Completed),
            Self::Completed => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::StartService => "start_service",
            Self::Reached => "reached",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostItem {
    pub description: String,
    pub amount: DecimalString,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub base_cost: DecimalString,
    #[serde(default)]
    pub additional_costs: Vec<CostItem>,
    pub total: DecimalString,
    pub updated_at: bson::DateTime,
}

impl Quotation {
    /// Builds a quotation whose total is the base plus every additional cost.
    pub fn new(base_cost: Decimal, additional_costs: Vec<CostItem>) -> Result<Self, Error> {
        if base_cost < Decimal::ZERO || additional_costs.iter().any(|it| it.amount.0 < Decimal::ZERO)
        {
            return Err(Error::InvalidInput("amounts must not be negative"));
        }

        let total = additional_costs
            .iter()
            .try_fold(base_cost, |acc, it| acc.checked_add(it.amount.0))
            .ok_or(Error::InvalidInput("quotation total is out of range"))?;

        Ok(Self {
            base_cost: base_cost.into(),
            additional_costs,
            total: total.into(),
            updated_at: now(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskNote {
    pub sender_id: ObjectId,
    pub sender_role: UserRole,
    pub message: String,
    pub created_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    #[serde(default)]
    pub amount: Option<DecimalString>,
    pub generated_at: bson::DateTime,
}

impl Invoice {
    pub fn issue(quotation: Option<&Quotation>) -> Self {
        Self {
            invoice_number: format!("INV-{}", ObjectId::new().to_hex().to_uppercase()),
            amount: quotation.map(|it| it.total),
            generated_at: now(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub request_id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub admin_id: ObjectId,
    pub worker_id: ObjectId,

    pub service_name: String,
    #[serde(default)]
    pub description: String,

    pub status: TaskStatus,

    #[serde(default)]
    pub quotation: Option<Quotation>,
    #[serde(default)]
    pub notes: Vec<TaskNote>,
    #[serde(default)]
    pub live_location: Option<LiveLocation>,
    #[serde(default)]
    pub invoice: Option<Invoice>,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl TaskModel {
    pub fn is_participant(&self, user: &UserAccess) -> bool {
        match user.role {
            UserRole::Admin => true,
            UserRole::Worker => self.worker_id == user.id,
            UserRole::User => self.user_id == user.id,
        }
    }

    /// The quotation is frozen once an invoice has been issued from it.
    pub fn check_quotation_open(&self) -> Result<(), Error> {
        match self.invoice {
            Some(_) => Err(Error::Conflict("quotation cannot change after invoicing")),
            None => Ok(()),
        }
    }
}

/// Checks that `requested` is the step right after `current`.
pub fn check_transition(current: TaskStatus, requested: TaskStatus) -> Result<(), Error> {
    if current.next() == Some(requested) {
        Ok(())
    } else {
        Err(Error::InvalidInput("task status can only move to its next step"))
    }
}

/// `$set` document moving `task` to `requested`. Reaching `completed` writes
/// the invoice in the same update.
pub fn advance_update(task: &TaskModel, requested: TaskStatus) -> Result<Document, Error> {
    check_transition(task.status, requested)?;

    let mut set = bson::doc! {
        "status": requested.as_str(),
        "updatedAt": now(),
    };

    if requested == TaskStatus::Completed {
        let invoice = Invoice::issue(task.quotation.as_ref());
        set.insert("invoice", bson::to_bson(&invoice)?);
    }

    Ok(bson::doc! { "$set": set })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotationResponse {
    pub base_cost: DecimalString,
    pub additional_costs: Vec<CostItem>,
    pub total: DecimalString,
    pub updated_at: FormattedDateTime,
}

impl From<Quotation> for QuotationResponse {
    fn from(value: Quotation) -> Self {
        Self {
            base_cost: value.base_cost,
            additional_costs: value.additional_costs,
            total: value.total,
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskNoteResponse {
    pub sender_id: ObjectIdString,
    pub sender_role: UserRole,
    pub message: String,
    pub created_at: FormattedDateTime,
}

impl From<TaskNote> for TaskNoteResponse {
    fn from(value: TaskNote) -> Self {
        Self {
            sender_id: value.sender_id.into(),
            sender_role: value.sender_role,
            message: value.message,
            created_at: value.created_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveLocationResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: FormattedDateTime,
}

impl From<LiveLocation> for LiveLocationResponse {
    fn from(value: LiveLocation) -> Self {
        Self {
            latitude: value.latitude,
            longitude: value.longitude,
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub invoice_number: String,
    pub amount: Option<DecimalString>,
    pub generated_at: FormattedDateTime,
}

impl From<Invoice> for InvoiceResponse {
    fn from(value: Invoice) -> Self {
        Self {
            invoice_number: value.invoice_number,
            amount: value.amount,
            generated_at: value.generated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: ObjectIdString,
    pub request_id: Option<ObjectIdString>,
    pub user_id: ObjectIdString,
    pub admin_id: ObjectIdString,
    pub worker_id: ObjectIdString,
    pub service_name: String,
    pub description: String,
    pub status: TaskStatus,
    pub quotation: Option<QuotationResponse>,
    pub notes: Vec<TaskNoteResponse>,
    pub live_location: Option<LiveLocationResponse>,
    pub invoice: Option<InvoiceResponse>,
    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<TaskModel> for TaskResponse {
    fn from(value: TaskModel) -> Self {
        Self {
            id: value.id.into(),
            request_id: value.request_id.map(Into::into),
            user_id: value.user_id.into(),
            admin_id: value.admin_id.into(),
            worker_id: value.worker_id.into(),
            service_name: value.service_name,
            description: value.description,
            status: value.status,
            quotation: value.quotation.map(Into::into),
            notes: value.notes.into_iter().map(Into::into).collect(),
            live_location: value.live_location.map(Into::into),
            invoice: value.invoice.map(Into::into),
            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub tasks: Vec<TaskResponse>,
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub request_id: Option<ObjectIdString>,
    pub user_id: ObjectIdString,
    pub worker_id: ObjectIdString,
    #[validate(length(min = 1, max = 256))]
    pub service_name: String,
    #[serde(default)]
    #[validate(length(max = 4096))]
    pub description: String,
}

async fn load_task(tasks: &TaskCollection, id: ObjectId) -> Result<TaskModel, Error> {
    tasks.get_one_by_id(id).await?.ok_or(Error::NoResource)
}

#[tracing::instrument(skip_all, fields(admin = %user.id))]
pub async fn create(
    user: UserModel,
    State(tasks): State<TaskCollection>,
    State(users): State<UserCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<TaskResponse>, Error> {
    user.role.require(&[UserRole::Admin])?;
    request.validate()?;

    let worker = users
        .get_one_by_id(request.worker_id.into())
        .await?
        .filter(|it| it.role == UserRole::Worker && it.is_active)
        .ok_or(Error::InvalidInput("workerId must reference an active worker"))?;

    let created_at = now();
    let task = TaskModel {
        id: ObjectId::new(),
        request_id: request.request_id.map(Into::into),
        user_id: request.user_id.into(),
        admin_id: user.id,
        worker_id: worker.id,
        service_name: request.service_name,
        description: request.description,
        status: TaskStatus::Assigned,
        quotation: None,
        notes: vec![],
        live_location: None,
        invoice: None,
        created_at,
        updated_at: created_at,
    };

    tasks.insert_one(&task, None).await?;

    tracing::info!(task = %task.id, worker = %worker.id, "task created");

    notify_after_write(
        &notifications,
        &hub,
        build_notification(
            worker.id,
            NotificationKind::TaskAssigned,
            "New task",
            format!("You have a new task: {}", task.service_name),
            Subject::task(task.id),
        ),
    )
    .await;

    Ok(Json(task.into()))
}

pub async fn index(
    user: UserAccess,
    State(tasks): State<TaskCollection>,
) -> Result<Json<IndexResponse>, Error> {
    let filter = match user.role {
        UserRole::Admin => bson::doc! { "adminId": user.id },
        UserRole::Worker => bson::doc! { "workerId": user.id },
        UserRole::User => bson::doc! { "userId": user.id },
    };

    let tasks = tasks
        .find_all_newest(filter)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(IndexResponse { tasks }))
}

pub async fn show(
    user: UserAccess,
    State(tasks): State<TaskCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<TaskResponse>, Error> {
    let task = load_task(&tasks, id).await?;

    if !task.is_participant(&user) {
        return Err(Error::Forbidden);
    }

    Ok(Json(task.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdvanceStatusRequest {
    pub status: TaskStatus,
}

#[tracing::instrument(skip_all, fields(worker = %user.id, task = %id))]
pub async fn advance_status(
    user: UserAccess,
    State(tasks): State<TaskCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<AdvanceStatusRequest>,
) -> Result<Json<TaskResponse>, Error> {
    let task = load_task(&tasks, id).await?;

    if user.role != UserRole::Worker || task.worker_id != user.id {
        return Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("only the assigned worker may advance a task"));
    }

    let update = advance_update(&task, request.status).tap_err(|_| {
        tracing::debug!(from = %task.status, to = %request.status, "rejected task transition")
    })?;

    let updated = tasks
        .find_one_and_update_after(
            bson::doc! { "_id": id, "status": task.status.as_str() },
            update,
        )
        .await?
        .ok_or(Error::Conflict("task status was changed by someone else"))?;

    tracing::info!(from = %task.status, to = %updated.status, "task advanced");

    notify_after_write(
        &notifications,
        &hub,
        build_notification(
            updated.user_id,
            NotificationKind::StatusUpdate,
            "Task updated",
            format!("{} is now {}", updated.service_name, updated.status),
            Subject::task(updated.id),
        ),
    )
    .await;

    Ok(Json(updated.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetQuotationRequest {
    pub base_cost: DecimalString,
    #[serde(default)]
    pub additional_costs: Vec<CostItem>,
}

pub async fn set_quotation(
    user: UserAccess,
    State(tasks): State<TaskCollection>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<SetQuotationRequest>,
) -> Result<Json<TaskResponse>, Error> {
    let task = load_task(&tasks, id).await?;

    match user.role {
        UserRole::Admin => {}
        UserRole::Worker if task.worker_id == user.id => {}
        UserRole::Worker | UserRole::User => return Err(Error::Forbidden),
    }
    task.check_quotation_open()?;

    let quotation = Quotation::new(request.base_cost.into(), request.additional_costs)?;

    // `null` also matches a missing field.
    let updated = tasks
        .find_one_and_update_after(
            bson::doc! { "_id": id, "invoice": null },
            bson::doc! {
                "$set": {
                    "quotation": bson::to_bson(&quotation)?,
                    "updatedAt": now(),
                }
            },
        )
        .await?
        .ok_or(Error::Conflict("quotation cannot change after invoicing"))?;

    tracing::info!(task = %id, total = %quotation.total.0, "quotation set");

    Ok(Json(updated.into()))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct AddNoteRequest {
    #[validate(length(min = 1, max = 2048))]
    pub message: String,
}

pub async fn add_note(
    user: UserAccess,
    State(tasks): State<TaskCollection>,
    State(notifications): State<NotificationCollection>,
    State(hub): State<NotificationHub>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<AddNoteRequest>,
) -> Result<Json<TaskResponse>, Error> {
    request.validate()?;

    let task = load_task(&tasks, id).await?;

    if !task.is_participant(&user) {
        return Err(Error::Forbidden);
    }

    let note = TaskNote {
        sender_id: user.id,
        sender_role: user.role,
        message: request.message,
        created_at: now(),
    };

    let updated = tasks
        .find_one_and_update_after(
            bson::doc! { "_id": id },
            bson::doc! {
                "$push": { "notes": bson::to_bson(&note)? },
                "$set": { "updatedAt": now() },
            },
        )
        .await?
        .ok_or(Error::NoResource)?;

    for recipient in [updated.user_id, updated.worker_id] {
        if recipient == user.id {
            continue;
        }

        notify_after_write(
            &notifications,
            &hub,
            build_notification(
                recipient,
                NotificationKind::TaskNote,
                "New note",
                note.message.clone(),
                Subject::task(updated.id),
            ),
        )
        .await;
    }

    Ok(Json(updated.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

impl UpdateLocationRequest {
    pub fn check(&self) -> Result<(), Error> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidInput("latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidInput("longitude must be between -180 and 180"));
        }

        Ok(())
    }
}

pub async fn update_location(
    user: UserAccess,
    State(tasks): State<TaskCollection>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<TaskResponse>, Error> {
    request.check()?;

    let task = load_task(&tasks, id).await?;

    if task.worker_id != user.id {
        return Err(Error::Forbidden);
    }

    let location = LiveLocation {
        latitude: request.latitude,
        longitude: request.longitude,
        updated_at: now(),
    };

    let updated = tasks
        .find_one_and_update_after(
            bson::doc! { "_id": id },
            bson::doc! {
                "$set": {
                    "liveLocation": bson::to_bson(&location)?,
                    "updatedAt": now(),
                }
            },
        )
        .await?
        .ok_or(Error::NoResource)?;

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::Json;

    use crate::{
        api::v1::{auth::UserRole, tests::bootstrap},
        error::Error,
        util::PathObjectId,
    };

    use super::*;

    fn task_model(status: TaskStatus) -> TaskModel {
        TaskModel {
            id: ObjectId::new(),
            request_id: None,
            user_id: ObjectId::new(),
            admin_id: ObjectId::new(),
            worker_id: ObjectId::new(),
            service_name: "Tow".to_string(),
            description: String::new(),
            status,
            quotation: None,
            notes: vec![],
            live_location: None,
            invoice: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn cost(description: &str, amount: Decimal) -> CostItem {
        CostItem {
            description: description.to_string(),
            amount: amount.into(),
        }
    }

    #[test]
    fn test_status_graph_is_linear() {
        let mut status = TaskStatus::Assigned;
        let mut walked = vec![status];
        while let Some(next) = status.next() {
            walked.push(next);
            status = next;
        }

        assert_eq!(
            walked,
            vec![
                TaskStatus::Assigned,
                TaskStatus::StartService,
                TaskStatus::Reached,
                TaskStatus::InProgress,
                TaskStatus::Completed,
                TaskStatus::Done,
            ]
        );

        assert_eq!(
            serde_json::to_string(&TaskStatus::StartService).unwrap(),
            "\"start_service\""
        );
    }

    #[test]
    fn test_check_transition() {
        assert!(check_transition(TaskStatus::Reached, TaskStatus::InProgress).is_ok());
        assert_matches!(
            check_transition(TaskStatus::Assigned, TaskStatus::Completed),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            check_transition(TaskStatus::InProgress, TaskStatus::Reached),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            check_transition(TaskStatus::Done, TaskStatus::Done),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn test_quotation_total() {
        let quotation = Quotation::new(
            Decimal::new(15000, 2),
            vec![cost("tyre", Decimal::new(4550, 2)), cost("fuel", Decimal::from(20))],
        )
        .unwrap();
        assert_eq!(quotation.total.0, Decimal::new(21550, 2));

        let quotation = Quotation::new(Decimal::from(99), vec![]).unwrap();
        assert_eq!(quotation.total.0, Decimal::from(99));

        assert_matches!(
            Quotation::new(Decimal::from(10), vec![cost("refund", Decimal::from(-1))]),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            Quotation::new(Decimal::from(-10), vec![]),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn test_completing_writes_invoice() {
        let mut task = task_model(TaskStatus::InProgress);
        task.quotation = Some(Quotation::new(Decimal::from(80), vec![]).unwrap());

        let update = advance_update(&task, TaskStatus::Completed).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "completed");

        let invoice: Invoice = bson::from_bson(set.get("invoice").unwrap().clone()).unwrap();
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert!(invoice.invoice_number.len() > "INV-".len());
        assert_eq!(invoice.amount, Some(Decimal::from(80).into()));

        let task = task_model(TaskStatus::Reached);
        let update = advance_update(&task, TaskStatus::InProgress).unwrap();
        assert!(!update.get_document("$set").unwrap().contains_key("invoice"));

        assert_matches!(
            advance_update(&task, TaskStatus::Completed),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn test_invoice_without_quotation() {
        let first = Invoice::issue(None);
        let second = Invoice::issue(None);
        assert_eq!(first.amount, None);
        assert_ne!(first.invoice_number, second.invoice_number);
    }

    #[test]
    fn test_quotation_locked_after_invoice() {
        let mut task = task_model(TaskStatus::InProgress);
        assert!(task.check_quotation_open().is_ok());

        task.invoice = Some(Invoice::issue(None));
        assert_matches!(task.check_quotation_open(), Err(Error::Conflict(_)));
    }

    #[test]
    fn test_location_range() {
        assert!(UpdateLocationRequest {
            latitude: -6.2,
            longitude: 106.8,
        }
        .check()
        .is_ok());
        assert_matches!(
            UpdateLocationRequest {
                latitude: 91.0,
                longitude: 0.0,
            }
            .check(),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            UpdateLocationRequest {
                latitude: 0.0,
                longitude: -180.5,
            }
            .check(),
            Err(Error::InvalidInput(_))
        );
        assert!(UpdateLocationRequest {
            latitude: f64::NAN,
            longitude: 0.0,
        }
        .check()
        .is_err());
    }

    #[test]
    fn test_participants() {
        let task = task_model(TaskStatus::Assigned);
        let worker = UserAccess {
            id: task.worker_id,
            role: UserRole::Worker,
        };
        let stranger = UserAccess {
            id: ObjectId::new(),
            role: UserRole::Worker,
        };

        assert!(task.is_participant(&worker));
        assert!(!task.is_participant(&stranger));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_task_workflow() {
        let admin = bootstrap().await;
        let customer = admin.derive("customer@test.com", UserRole::User).await;
        let worker = admin.derive("worker@test.com", UserRole::Worker).await;

        let Json(task) = create(
            admin.current_user(),
            admin.task_collection(),
            admin.user_collection(),
            admin.notification_collection(),
            admin.hub(),
            Json(CreateTaskRequest {
                request_id: None,
                user_id: customer.user_id().into(),
                worker_id: worker.user_id().into(),
                service_name: "Tow to workshop".to_string(),
                description: String::new(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);

        let _ = set_quotation(
            worker.user_access(),
            worker.task_collection(),
            PathObjectId(*task.id),
            Json(SetQuotationRequest {
                base_cost: Decimal::from(100).into(),
                additional_costs: vec![cost("distance", Decimal::new(2500, 2))],
            }),
        )
        .await
        .unwrap();

        let err = advance_status(
            customer.user_access(),
            customer.task_collection(),
            customer.notification_collection(),
            customer.hub(),
            PathObjectId(*task.id),
            Json(AdvanceStatusRequest {
                status: TaskStatus::StartService,
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Forbidden);

        let mut last = None;
        for status in [
            TaskStatus::StartService,
            TaskStatus::Reached,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            let Json(advanced) = advance_status(
                worker.user_access(),
                worker.task_collection(),
                worker.notification_collection(),
                worker.hub(),
                PathObjectId(*task.id),
                Json(AdvanceStatusRequest { status }),
            )
            .await
            .unwrap();
            last = Some(advanced);
        }

        let completed = last.unwrap();
        let invoice = completed.invoice.expect("completed task carries an invoice");
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_eq!(invoice.amount, Some(Decimal::new(12500, 2).into()));

        let Json(done) = advance_status(
            worker.user_access(),
            worker.task_collection(),
            worker.notification_collection(),
            worker.hub(),
            PathObjectId(*task.id),
            Json(AdvanceStatusRequest {
                status: TaskStatus::Done,
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            done.invoice.unwrap().invoice_number,
            invoice.invoice_number
        );

        let err = set_quotation(
            worker.user_access(),
            worker.task_collection(),
            PathObjectId(*task.id),
            Json(SetQuotationRequest {
                base_cost: Decimal::from(900).into(),
                additional_costs: vec![],
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Conflict(_));

        let Json(unchanged) = show(
            worker.user_access(),
            worker.task_collection(),
            PathObjectId(*task.id),
        )
        .await
        .unwrap();
        assert_eq!(
            unchanged.quotation.unwrap().total,
            Decimal::new(12500, 2).into()
        );

        let Json(listed) = index(customer.user_access(), customer.task_collection())
            .await
            .unwrap();
        assert_eq!(listed.tasks.len(), 1);
    }
}
