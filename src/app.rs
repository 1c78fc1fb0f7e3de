use axum::extract::FromRef;

use crate::{
    api::v1::{
        auth::UserCollection, notification::NotificationCollection,
        password_reset::ResetTokenCollection, presence::PresenceCollection,
        request::RequestCollection, task::TaskCollection, token::JwtState,
        workshop::ShopCollection,
    },
    config::{Config, Settings},
    migrate::MigrationCollection,
    realtime::NotificationHub,
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub argon: argon2::Argon2<'static>,
    pub jwt_state: JwtState,
    pub settings: Settings,
    pub hub: NotificationHub,

    pub mongo_client: mongodb::Client,
    pub migrate_collection: MigrationCollection,
    pub user_collection: UserCollection,
    pub request_collection: RequestCollection,
    pub task_collection: TaskCollection,
    pub notification_collection: NotificationCollection,
    pub shop_collection: ShopCollection,
    pub reset_token_collection: ResetTokenCollection,
    pub presence_collection: PresenceCollection,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let argon = argon2::Argon2::default();
        let jwt_state = JwtState::new(&config.jwt_keys)?;

        let mongo_client_opt = mongodb::options::ClientOptions::parse(&config.mongodb_uri).await?;
        let mongo_client = mongodb::Client::with_options(mongo_client_opt)?;

        let db = mongo_client.database(&config.database_name);
        Ok(Self {
            argon,
            jwt_state,
            settings: config.settings.clone(),
            hub: NotificationHub::new(),

            migrate_collection: MigrationCollection(db.collection("migrations").into()),
            user_collection: UserCollection(db.collection("users").into()),
            request_collection: RequestCollection(db.collection("service_requests").into()),
            task_collection: TaskCollection(db.collection("tasks").into()),
            notification_collection: NotificationCollection(db.collection("notifications").into()),
            shop_collection: ShopCollection(db.collection("shops").into()),
            reset_token_collection: ResetTokenCollection(
                db.collection("password_reset_tokens").into(),
            ),
            presence_collection: PresenceCollection(db.collection("worker_presence").into()),
            mongo_client,
        })
    }
}
