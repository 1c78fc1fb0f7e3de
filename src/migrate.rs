//! Versioned schema setup. Each version runs once and is recorded in the
//! `migrations` collection.

use std::collections::HashSet;

use bson::oid::ObjectId;
use mongodb::{options::IndexOptions, IndexModel};
use serde::{Deserialize, Serialize};

use crate::{app::AppState, mongo_ext::Collection};

#[derive(Serialize, Deserialize)]
pub struct MigrateModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub version: i64,
}

#[derive(Clone)]
pub struct MigrationCollection(pub Collection<MigrateModel>);

impl std::ops::Deref for MigrationCollection {
    type Target = Collection<MigrateModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MigrationCollection {
    pub async fn insert_version(&self, version: i64) -> Result<(), mongodb::error::Error> {
        self.insert_one(
            MigrateModel {
                id: ObjectId::new(),
                version,
            },
            None,
        )
        .await
        .map(|_| ())
    }
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn unique_index(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn ttl_index(key: &str, expire_after: std::time::Duration) -> IndexModel {
    let mut keys = bson::Document::new();
    keys.insert(key, 1);

    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().expire_after(expire_after).build())
        .build()
}

impl AppState {
    async fn v1_migrate(&self) -> Result<(), mongodb::error::Error> {
        self.migrate_collection
            .create_index(unique_index(bson::doc! { "version": 1 }), None)
            .await?;

        self.user_collection
            .create_index(unique_index(bson::doc! { "email": 1 }), None)
            .await?;

        self.reset_token_collection
            .create_index(unique_index(bson::doc! { "userId": 1 }), None)
            .await?;
        self.reset_token_collection
            .create_index(ttl_index("expiresAt", std::time::Duration::ZERO), None)
            .await?;

        let presence_ttl = self
            .settings
            .presence_ttl
            .try_into()
            .unwrap_or(std::time::Duration::ZERO);
        self.presence_collection
            .create_index(ttl_index("lastActivity", presence_ttl), None)
            .await?;

        self.request_collection
            .create_indexes(
                [
                    index(bson::doc! { "adminId": 1, "createdAt": -1 }),
                    index(bson::doc! { "userId": 1, "createdAt": -1 }),
                    index(bson::doc! { "workerId": 1, "createdAt": -1 }),
                ],
                None,
            )
            .await?;

        self.task_collection
            .create_indexes(
                [
                    index(bson::doc! { "workerId": 1, "createdAt": -1 }),
                    index(bson::doc! { "userId": 1, "createdAt": -1 }),
                    index(bson::doc! { "adminId": 1, "createdAt": -1 }),
                ],
                None,
            )
            .await?;

        self.notification_collection
            .create_index(
                index(bson::doc! { "recipientId": 1, "createdAt": -1 }),
                None,
            )
            .await?;

        self.shop_collection
            .create_index(index(bson::doc! { "services": 1 }), None)
            .await?;

        Ok(())
    }

    /// Rewrites the status written by the older schema.
    async fn v2_migrate(&self) -> Result<(), mongodb::error::Error> {
        let result = self
            .request_collection
            .update_many(
                bson::doc! { "status": "assigned" },
                bson::doc! { "$set": { "status": "worker-assigned" } },
                None,
            )
            .await?;

        tracing::info!(
            modified = result.modified_count,
            "rewrote legacy request status"
        );

        Ok(())
    }

    async fn get_all_migration(&self) -> Result<Vec<MigrateModel>, mongodb::error::Error> {
        let mut cursor = self.migrate_collection.find(None, None).await?;

        let mut vec = vec![];

        while cursor.advance().await? {
            vec.push(cursor.deserialize_current()?);
        }

        Ok(vec)
    }

    pub async fn run_migration(&self) -> Result<(), mongodb::error::Error> {
        let migration: HashSet<i64> = self
            .get_all_migration()
            .await?
            .into_iter()
            .map(|it| it.version)
            .collect();

        macro_rules! migrate {
            ($version:expr, $fun:ident) => {
                if !migration.contains(&$version) {
                    tracing::info!("running migration version {}", $version);
                    self.$fun().await?;
                    self.migrate_collection.insert_version($version).await?;
                }
            };
        }

        migrate!(1, v1_migrate);
        migrate!(2, v2_migrate);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::v1::tests::bootstrap;

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_migration_runs_once() {
        let bootstrap = bootstrap().await;
        let app = &bootstrap.app_state;

        app.request_collection
            .clone_with_type::<bson::Document>()
            .insert_one(
                bson::doc! {
                    "_id": bson::oid::ObjectId::new(),
                    "status": "assigned",
                },
                None,
            )
            .await
            .unwrap();

        app.migrate_collection
            .delete_many(bson::doc! { "version": 2 }, None)
            .await
            .unwrap();

        app.run_migration().await.unwrap();
        app.run_migration().await.unwrap();

        let versions = app
            .migrate_collection
            .count_documents(bson::doc! {}, None)
            .await
            .unwrap();
        assert_eq!(versions, 2);

        let legacy = app
            .request_collection
            .count_documents(bson::doc! { "status": "assigned" }, None)
            .await
            .unwrap();
        assert_eq!(legacy, 0);
    }
}
