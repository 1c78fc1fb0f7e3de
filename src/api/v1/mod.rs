pub mod auth;
pub mod notification;
pub mod password_reset;
pub mod presence;
pub mod request;
pub mod socket;
pub mod task;
pub mod token;
pub mod workshop;

#[cfg(test)]
pub(crate) mod tests {
    use argon2::Argon2;
    use axum::extract::State;
    use bson::oid::ObjectId;

    use crate::{app::AppState, config::Config, config::Settings, realtime::NotificationHub};

    use super::{
        auth::{CreateUserRequest, UserAccess, UserCollection, UserModel, UserRole},
        notification::NotificationCollection,
        password_reset::ResetTokenCollection,
        presence::PresenceCollection,
        request::RequestCollection,
        task::TaskCollection,
        token::JwtState,
        workshop::ShopCollection,
    };

    const PASSWORD: &str = "password";

    /// A signed-in user on a throwaway database.
    pub struct Bootstrap {
        user_model: UserModel,
        pub app_state: AppState,
    }

    impl Bootstrap {
        pub fn user_access(&self) -> UserAccess {
            self.user_model.access()
        }

        pub fn user_token(&self) -> String {
            super::token::generate_access_token(
                &self.app_state.jwt_state,
                &self.user_model,
                self.app_state.settings.access_token_ttl,
            )
            .unwrap()
            .token
        }

        pub fn user_id(&self) -> ObjectId {
            self.user_model.id
        }

        pub fn user_email(&self) -> String {
            self.user_model.email.clone()
        }

        pub fn current_user(&self) -> UserModel {
            self.user_model.clone()
        }

        pub async fn derive(&self, email: &str, user_role: UserRole) -> Bootstrap {
            Bootstrap {
                user_model: create_user(&self.app_state, email, user_role).await,
                app_state: self.app_state.clone(),
            }
        }

        pub fn argon(&self) -> State<Argon2<'static>> {
            State(self.app_state.argon.clone())
        }

        pub fn jwt_state(&self) -> State<JwtState> {
            State(self.app_state.jwt_state.clone())
        }

        pub fn settings(&self) -> State<Settings> {
            State(self.app_state.settings.clone())
        }

        pub fn hub(&self) -> State<NotificationHub> {
            State(self.app_state.hub.clone())
        }

        pub fn user_collection(&self) -> State<UserCollection> {
            State(self.app_state.user_collection.clone())
        }

        pub fn request_collection(&self) -> State<RequestCollection> {
            State(self.app_state.request_collection.clone())
        }

        pub fn task_collection(&self) -> State<TaskCollection> {
            State(self.app_state.task_collection.clone())
        }

        pub fn notification_collection(&self) -> State<NotificationCollection> {
            State(self.app_state.notification_collection.clone())
        }

        pub fn shop_collection(&self) -> State<ShopCollection> {
            State(self.app_state.shop_collection.clone())
        }

        pub fn presence_collection(&self) -> State<PresenceCollection> {
            State(self.app_state.presence_collection.clone())
        }

        pub fn reset_token_collection(&self) -> State<ResetTokenCollection> {
            State(self.app_state.reset_token_collection.clone())
        }
    }

    pub async fn create_user(app: &AppState, email: &str, role: UserRole) -> UserModel {
        super::auth::create_user(
            app.user_collection.clone(),
            app.argon.clone(),
            CreateUserRequest {
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                password: PASSWORD.to_string(),
                confirm_password: PASSWORD.to_string(),
                phone: None,
                role,
            },
        )
        .await
        .unwrap()
    }

    /// Connects to `MONGODB_URI` with a fresh database and an admin user.
    pub async fn bootstrap() -> Bootstrap {
        let _ = dotenvy::dotenv();
        let mongodb_uri = std::env::var("MONGODB_URI")
            .expect("MONGODB_URI must be set to run database tests");

        let database_name = format!("roadside-test-{}", ObjectId::new());
        let config = Config::from_lookup(|key| match key {
            "MONGODB_URI" => Some(mongodb_uri.clone()),
            "DATABASE_NAME" => Some(database_name.clone()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        })
        .unwrap();

        let app_state = AppState::new(&config).await.unwrap();
        app_state.run_migration().await.unwrap();

        let user_model = create_user(&app_state, "admin@test.com", UserRole::Admin).await;

        Bootstrap {
            user_model,
            app_state,
        }
    }
}
