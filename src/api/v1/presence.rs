//! Which workers are logged in and available.
//!
//! Entries live in a TTL collection keyed by the worker id, so a worker that
//! stops reporting activity drops out on its own.

use std::collections::HashMap;

use axum::{extract::State, Json};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    config::Settings,
    error::Error,
    mongo_ext::Collection,
    util::{now, FormattedDateTime, ObjectIdString},
};

use super::auth::{UserAccess, UserCollection, UserModel, UserResponse, UserRole};

#[derive(Clone)]
pub struct PresenceCollection(pub Collection<PresenceModel>);

impl std::ops::Deref for PresenceCollection {
    type Target = Collection<PresenceModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceModel {
    /// The worker id.
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub login_time: bson::DateTime,
    pub last_activity: bson::DateTime,
}

impl PresenceModel {
    pub fn is_live(&self, ttl: Duration, at: OffsetDateTime) -> bool {
        OffsetDateTime::from(self.last_activity) > at - ttl
    }
}

fn require_worker(user: &UserAccess) -> Result<(), Error> {
    user.role.require(&[UserRole::Worker])
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub worker_id: ObjectIdString,
    pub login_time: FormattedDateTime,
    pub last_activity: FormattedDateTime,
}

impl From<PresenceModel> for PresenceResponse {
    fn from(value: PresenceModel) -> Self {
        Self {
            worker_id: value.id.into(),
            login_time: value.login_time.into(),
            last_activity: value.last_activity.into(),
        }
    }
}

async fn touch(
    presence: &PresenceCollection,
    worker_id: ObjectId,
    reset_login: bool,
) -> Result<PresenceModel, Error> {
    let at = now();
    let update = if reset_login {
        bson::doc! { "$set": { "loginTime": at, "lastActivity": at } }
    } else {
        bson::doc! {
            "$set": { "lastActivity": at },
            "$setOnInsert": { "loginTime": at },
        }
    };

    let options = mongodb::options::FindOneAndUpdateOptions::builder()
        .upsert(true)
        .return_document(mongodb::options::ReturnDocument::After)
        .build();

    presence
        .find_one_and_update(bson::doc! { "_id": worker_id }, update, options)
        .await?
        .ok_or(Error::NoResource)
}

/// `POST /workers/login`
pub async fn login(
    user: UserAccess,
    State(presence): State<PresenceCollection>,
) -> Result<Json<PresenceResponse>, Error> {
    require_worker(&user)?;

    let entry = touch(&presence, user.id, true).await?;
    tracing::info!(worker = %user.id, "worker logged in");

    Ok(Json(entry.into()))
}

/// `POST /workers/activity`, which also re-creates an expired entry.
pub async fn activity(
    user: UserAccess,
    State(presence): State<PresenceCollection>,
) -> Result<Json<PresenceResponse>, Error> {
    require_worker(&user)?;

    touch(&presence, user.id, false)
        .await
        .map(Into::into)
        .map(Json)
}

/// `POST /workers/logout`
pub async fn logout(
    user: UserAccess,
    State(presence): State<PresenceCollection>,
) -> Result<(), Error> {
    require_worker(&user)?;

    presence
        .delete_one(bson::doc! { "_id": user.id }, None)
        .await?;
    tracing::info!(worker = %user.id, "worker logged out");

    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInWorker {
    pub worker: UserResponse,
    pub login_time: FormattedDateTime,
    pub last_activity: FormattedDateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggedInResponse {
    pub workers: Vec<LoggedInWorker>,
}

/// `GET /workers/logged-in`
pub async fn logged_in(
    user: UserModel,
    State(presence): State<PresenceCollection>,
    State(users): State<UserCollection>,
    State(settings): State<Settings>,
) -> Result<Json<LoggedInResponse>, Error> {
    user.role.require(&[UserRole::Admin])?;

    let at = OffsetDateTime::now_utc();
    let threshold = bson::DateTime::from(at - settings.presence_ttl);

    let entries = presence
        .find_all(
            bson::doc! { "lastActivity": { "$gt": threshold } },
            bson::doc! { "lastActivity": -1 },
        )
        .await?;

    let ids: Vec<ObjectId> = entries.iter().map(|it| it.id).collect();
    let mut profiles: HashMap<ObjectId, UserModel> = users
        .find_all(
            bson::doc! {
                "_id": { "$in": ids },
                "role": "worker",
                "isActive": true,
            },
            bson::doc! { "name": 1 },
        )
        .await?
        .into_iter()
        .map(|it| (it.id, it))
        .collect();

    let workers = entries
        .into_iter()
        .filter(|it| it.is_live(settings.presence_ttl, at))
        .filter_map(|entry| {
            profiles.remove(&entry.id).map(|worker| LoggedInWorker {
                worker: worker.into(),
                login_time: entry.login_time.into(),
                last_activity: entry.last_activity.into(),
            })
        })
        .collect();

    Ok(Json(LoggedInResponse { workers }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::Json;

    use crate::{
        api::v1::{auth::UserRole, tests::bootstrap},
        error::Error,
    };

    use super::*;

    #[test]
    fn test_is_live() {
        let at = OffsetDateTime::now_utc();
        let ttl = Duration::minutes(5);

        let entry = PresenceModel {
            id: ObjectId::new(),
            login_time: (at - Duration::hours(1)).into(),
            last_activity: (at - Duration::minutes(1)).into(),
        };
        assert!(entry.is_live(ttl, at));

        let entry = PresenceModel {
            last_activity: (at - Duration::minutes(6)).into(),
            ..entry
        };
        assert!(!entry.is_live(ttl, at));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_presence_lifecycle() {
        let admin = bootstrap().await;
        let worker = admin.derive("worker@test.com", UserRole::Worker).await;
        let customer = admin.derive("customer@test.com", UserRole::User).await;

        let err = login(customer.user_access(), customer.presence_collection())
            .await
            .unwrap_err();
        assert_matches!(err, Error::Forbidden);

        let Json(entry) = login(worker.user_access(), worker.presence_collection())
            .await
            .unwrap();
        assert_eq!(entry.worker_id, worker.user_id());

        let Json(refreshed) = activity(worker.user_access(), worker.presence_collection())
            .await
            .unwrap();
        assert_eq!(refreshed.login_time, entry.login_time);

        let Json(listed) = logged_in(
            admin.current_user(),
            admin.presence_collection(),
            admin.user_collection(),
            admin.settings(),
        )
        .await
        .unwrap();
        assert_eq!(listed.workers.len(), 1);
        assert_eq!(listed.workers[0].worker.id, worker.user_id());

        let err = logged_in(
            worker.current_user(),
            worker.presence_collection(),
            worker.user_collection(),
            worker.settings(),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Forbidden);

        logout(worker.user_access(), worker.presence_collection())
            .await
            .unwrap();

        let Json(listed) = logged_in(
            admin.current_user(),
            admin.presence_collection(),
            admin.user_collection(),
            admin.settings(),
        )
        .await
        .unwrap();
        assert!(listed.workers.is_empty());
    }
}
