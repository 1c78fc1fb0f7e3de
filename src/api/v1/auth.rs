use argon2::Argon2;
use axum::{
    extract::{FromRef, FromRequestParts, Query, State},
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    Json, RequestPartsExt, TypedHeader,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    config::Settings,
    error::{Error, UnauthorizedType},
    mongo_ext::Collection,
    util::{hash_password, verify_password, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::token::{decode_access_token, generate_access_token, JwtState};

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,

    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

fn default_active() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Worker,
    Admin,
}

impl UserRole {
    pub fn require(self, allowed: &[UserRole]) -> Result<(), Error> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

/// The caller's id and role. As an extractor the role is read from the
/// database, not from the token claims.
#[derive(Debug, Clone, Copy)]
pub struct UserAccess {
    pub id: ObjectId,
    pub role: UserRole,
}

impl UserAccess {
    /// Claims only. Use [`UserModel::from_token`] to authorize a caller.
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_access_token(jwt_state, token)
            .map_err(|_| Error::Unauthorized(UnauthorizedType::InvalidAccessToken))?;

        if token.claims.is_expired() {
            return Err(Error::Unauthorized(UnauthorizedType::InvalidAccessToken));
        }

        Ok(Self {
            id: token.claims.sub.0,
            role: token.claims.user_role,
        })
    }
}

async fn bearer_token(parts: &mut Parts) -> Result<String, Error> {
    let TypedHeader(Authorization(token)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| Error::Unauthorized(UnauthorizedType::InvalidAccessToken))?;

    Ok(token.token().to_string())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserAccess
where
    JwtState: FromRef<S>,
    UserCollection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extract_with_state::<UserModel, _>(state).await?;
        Ok(user.access())
    }
}

impl UserModel {
    /// Verifies the token and loads its subject, rejecting deleted and
    /// disabled accounts.
    pub async fn from_token(
        jwt_state: &JwtState,
        users: &UserCollection,
        token: &str,
    ) -> Result<Self, Error> {
        let claims = UserAccess::from_token(jwt_state, token)?;
        Self::from_id(claims.id, users).await
    }

    pub async fn from_id(
        id: ObjectId,
        UserCollection(users): &UserCollection,
    ) -> Result<Self, Error> {
        let user = users
            .get_one_by_id(id)
            .await?
            .ok_or(Error::Unauthorized(UnauthorizedType::InvalidAccessToken))?;

        if !user.is_active {
            return Err(Error::Unauthorized(UnauthorizedType::AccountDisabled));
        }

        Ok(user)
    }

    pub fn access(&self) -> UserAccess {
        UserAccess {
            id: self.id,
            role: self.role,
        }
    }
}

/// The caller re-resolved from the database, so role changes and disabled
/// accounts take effect before the token expires.
#[axum::async_trait]
impl<S> FromRequestParts<S> for UserModel
where
    JwtState: FromRef<S>,
    UserCollection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).await?;
        let jwt = JwtState::from_ref(state);
        let users = UserCollection::from_ref(state);
        Self::from_token(&jwt, &users, &token).await
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: ObjectIdString,

    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,

    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<UserModel> for UserResponse {
    fn from(value: UserModel) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            email: value.email,
            role: value.role,
            phone: value.phone,
            address: value.address,
            is_active: value.is_active,

            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 64))]
    pub password: String,

    #[validate(must_match = "password")]
    pub confirm_password: String,

    #[validate(length(min = 1, max = 32))]
    pub phone: Option<String>,
}

#[derive(Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 64))]
    pub password: String,

    #[validate(must_match = "password")]
    pub confirm_password: String,

    pub phone: Option<String>,

    pub role: UserRole,
}

pub async fn create_user(
    users: UserCollection,
    argon: Argon2<'_>,
    request: CreateUserRequest,
) -> Result<UserModel, Error> {
    request.validate()?;
    let count = users
        .count_documents(
            bson::doc! {
                "email": &request.email
            },
            None,
        )
        .await?;

    if count > 0 {
        return Err(Error::MustUniqueError("email".to_string()));
    }

    let model = UserModel {
        id: ObjectId::new(),
        name: request.name,
        email: request.email,
        password: hash_password(&argon, &request.password)?,
        role: request.role,
        phone: request.phone,
        address: None,
        is_active: true,
        created_at: OffsetDateTime::now_utc().into(),
        updated_at: OffsetDateTime::now_utc().into(),
    };
    users.insert_one(&model, None).await?;

    tracing::info!(user = %model.id, role = ?model.role, "registered user");

    Ok(model)
}

pub async fn register(
    State(users): State<UserCollection>,
    State(argon): State<Argon2<'static>>,
    State(settings): State<Settings>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, Error> {
    request.validate()?;

    let role = match &settings.bootstrap_admin_email {
        Some(email) if email.eq_ignore_ascii_case(&request.email) => UserRole::Admin,
        _ => UserRole::User,
    };

    create_user(
        users,
        argon,
        CreateUserRequest {
            name: request.name,
            email: request.email,
            password: request.password,
            confirm_password: request.confirm_password,
            phone: request.phone,
            role,
        },
    )
    .await
    .map(|it| Json(it.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: FormattedDateTime,
    pub user: UserResponse,
}

pub async fn authenticate(
    users: &UserCollection,
    jwt_state: &JwtState,
    argon: &Argon2<'_>,
    settings: &Settings,
    request: LoginRequest,
    expected_role: Option<UserRole>,
) -> Result<LoginResponse, Error> {
    let user = users
        .find_one(
            bson::doc! {
                "email": &request.email
            },
            None,
        )
        .await?;

    let user = match user {
        Some(user) if verify_password(argon, &request.password, &user.password) => user,
        _ => {
            return Err(Error::Unauthorized(
                UnauthorizedType::WrongUsernameOrPassword,
            ))
        }
    };

    if !user.is_active {
        return Err(Error::Unauthorized(UnauthorizedType::AccountDisabled))
            .tap_err(|_| tracing::debug!(user = %user.id, "disabled account tried to log in"));
    }

    if let Some(role) = expected_role {
        if user.role != role {
            return Err(Error::Forbidden).tap_err(|_| {
                tracing::debug!(user = %user.id, role = ?user.role, "login through wrong portal")
            });
        }
    }

    let access_token = generate_access_token(jwt_state, &user, settings.access_token_ttl)?;

    Ok(LoginResponse {
        token: access_token.token,
        expires_at: access_token.expired_at.into(),
        user: user.into(),
    })
}

pub async fn login(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    State(argon): State<Argon2<'static>>,
    State(settings): State<Settings>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    authenticate(&users, &jwt_state, &argon, &settings, request, None)
        .await
        .map(Json)
}

pub async fn worker_login(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    State(argon): State<Argon2<'static>>,
    State(settings): State<Settings>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    authenticate(
        &users,
        &jwt_state,
        &argon,
        &settings,
        request,
        Some(UserRole::Worker),
    )
    .await
    .map(Json)
}

pub async fn user_login(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    State(argon): State<Argon2<'static>>,
    State(settings): State<Settings>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    authenticate(
        &users,
        &jwt_state,
        &argon,
        &settings,
        request,
        Some(UserRole::User),
    )
    .await
    .map(Json)
}

pub async fn me(user: UserModel) -> Json<UserResponse> {
    Json(user.into())
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 32))]
    pub phone: Option<String>,

    #[validate(length(max = 256))]
    pub address: Option<String>,

    pub current_password: Option<String>,

    #[validate(length(min = 8, max = 64))]
    pub password: Option<String>,

    #[validate(must_match = "password")]
    pub confirm_password: Option<String>,
}

#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn update_profile(
    user: UserModel,
    State(users): State<UserCollection>,
    State(argon): State<Argon2<'static>>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, Error> {
    request.validate()?;

    if let Some(email) = &request.email {
        if email != &user.email {
            let count = users
                .count_documents(bson::doc! { "email": email }, None)
                .await?;

            if count > 0 {
                return Err(Error::MustUniqueError("email".to_string()));
            }
        }
    }

    let password = match &request.password {
        Some(password) => {
            let current = request.current_password.as_deref().unwrap_or_default();
            if !verify_password(&argon, current, &user.password) {
                return Err(Error::Unauthorized(UnauthorizedType::WrongPassword))
                    .tap_err(|_| tracing::debug!("password change with wrong current password"));
            }
            hash_password(&argon, password)?
        }
        None => user.password.clone(),
    };

    let user = UserModel {
        name: request.name.unwrap_or(user.name),
        email: request.email.unwrap_or(user.email),
        phone: request.phone.or(user.phone),
        address: request.address.or(user.address),
        password,
        updated_at: OffsetDateTime::now_utc().into(),
        ..user
    };

    users
        .update_one_by_id(
            user.id,
            bson::doc! {
                "$set": {
                    "name": &user.name,
                    "email": &user.email,
                    "phone": user.phone.clone(),
                    "address": user.address.clone(),
                    "password": &user.password,
                    "updatedAt": user.updated_at,
                }
            },
        )
        .await?;

    Ok(Json(user.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
}

pub async fn list_users(
    user: UserModel,
    State(users): State<UserCollection>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, Error> {
    user.role.require(&[UserRole::Admin])?;

    let filter = match query.role {
        Some(role) => bson::doc! { "role": bson::to_bson(&role)? },
        None => bson::doc! {},
    };

    let users = users
        .find_all_newest(filter)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(ListUsersResponse { users }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

#[tracing::instrument(skip_all, fields(admin = %user.id, target = %target))]
pub async fn update_role(
    user: UserModel,
    State(users): State<UserCollection>,
    PathObjectId(target): PathObjectId,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, Error> {
    match user.role {
        UserRole::User | UserRole::Worker => {
            return Err(Error::Forbidden)
                .tap_err(|_| tracing::debug!("tried changing a role without being admin"))
        }
        UserRole::Admin => {}
    }

    let updated = users
        .find_one_and_update_after(
            bson::doc! { "_id": target },
            bson::doc! {
                "$set": {
                    "role": bson::to_bson(&request.role)?,
                    "updatedAt": bson::DateTime::from(OffsetDateTime::now_utc()),
                }
            },
        )
        .await?
        .ok_or(Error::NoResource)?;

    tracing::info!(role = ?updated.role, "role changed");

    Ok(Json(updated.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActiveRequest {
    pub is_active: bool,
}

#[tracing::instrument(skip_all, fields(admin = %user.id, target = %target))]
pub async fn set_active(
    user: UserModel,
    State(users): State<UserCollection>,
    PathObjectId(target): PathObjectId,
    Json(request): Json<UpdateActiveRequest>,
) -> Result<Json<UserResponse>, Error> {
    user.role.require(&[UserRole::Admin])?;

    if target == user.id && !request.is_active {
        return Err(Error::InvalidInput("admins cannot disable their own account"));
    }

    let updated = users
        .find_one_and_update_after(
            bson::doc! { "_id": target },
            bson::doc! {
                "$set": {
                    "isActive": request.is_active,
                    "updatedAt": bson::DateTime::from(OffsetDateTime::now_utc()),
                }
            },
        )
        .await?
        .ok_or(Error::NoResource)?;

    tracing::info!(is_active = updated.is_active, "account state changed");

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use axum::{
        extract::{FromRequestParts, Query},
        Json,
    };

    use crate::{
        api::v1::tests::bootstrap,
        error::{Error, UnauthorizedType},
        util::PathObjectId,
    };

    use super::{UserRole, UpdateRoleRequest};

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&UserRole::Worker).unwrap(), "\"worker\"");
        assert_eq!(
            serde_json::from_str::<UserRole>("\"admin\"").unwrap(),
            UserRole::Admin
        );
        assert!(serde_json::from_str::<UserRole>("\"Admin\"").is_err());
    }

    #[test]
    fn test_role_require() {
        assert!(UserRole::Admin.require(&[UserRole::Admin]).is_ok());
        assert!(UserRole::Worker
            .require(&[UserRole::Admin, UserRole::Worker])
            .is_ok());
        assert_matches!(
            UserRole::User.require(&[UserRole::Admin]),
            Err(Error::Forbidden)
        );
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_register_and_login() {
        let bootstrap = bootstrap().await;

        let Json(user) = super::register(
            bootstrap.user_collection(),
            bootstrap.argon(),
            bootstrap.settings(),
            Json(super::RegisterRequest {
                name: "name".to_string(),
                email: "email@test.com".to_string(),
                password: "password".to_string(),
                confirm_password: "password".to_string(),
                phone: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(user.role, UserRole::User);

        let Json(session) = super::login(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            bootstrap.settings(),
            Json(super::LoginRequest {
                email: "email@test.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(session.user.id, user.id);

        let access =
            super::UserAccess::from_token(&bootstrap.app_state.jwt_state, &session.token).unwrap();
        assert_eq!(access.id, *user.id);

        let err = super::login(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            bootstrap.settings(),
            Json(super::LoginRequest {
                email: "email@test.com".to_string(),
                password: "wrongpassword".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(
            err,
            Error::Unauthorized(UnauthorizedType::WrongUsernameOrPassword)
        );

        let err = super::worker_login(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            bootstrap.settings(),
            Json(super::LoginRequest {
                email: "email@test.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Forbidden);

        let _ = super::user_login(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            bootstrap.settings(),
            Json(super::LoginRequest {
                email: "email@test.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_unique_email() {
        let bootstrap = bootstrap().await;

        let err = super::register(
            bootstrap.user_collection(),
            bootstrap.argon(),
            bootstrap.settings(),
            Json(super::RegisterRequest {
                name: "name".to_string(),
                email: bootstrap.user_email(),
                password: "password".to_string(),
                confirm_password: "password".to_string(),
                phone: None,
            }),
        )
        .await
        .expect_err("registered a duplicate email");
        assert_matches!(err, Error::MustUniqueError(field) if field == "email");
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_non_admin_cannot_change_role() {
        let admin = bootstrap().await;

        for (i, role) in [UserRole::User, UserRole::Worker].into_iter().enumerate() {
            let caller = admin.derive(&format!("caller{i}@test.com"), role).await;
            let target = admin
                .derive(&format!("target{i}@test.com"), UserRole::User)
                .await;

            let err = super::update_role(
                caller.current_user(),
                caller.user_collection(),
                PathObjectId(target.user_id()),
                Json(UpdateRoleRequest {
                    role: UserRole::Admin,
                }),
            )
            .await
            .expect_err("non admin changed a role");
            assert_matches!(err, Error::Forbidden);

            let unchanged = admin
                .app_state
                .user_collection
                .get_one_by_id(target.user_id())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(unchanged.role, UserRole::User);

            let err = super::list_users(
                caller.current_user(),
                caller.user_collection(),
                Query(Default::default()),
            )
            .await
            .expect_err("non admin listed users");
            assert_matches!(err, Error::Forbidden);
        }

        let target = admin.derive("promoted@test.com", UserRole::User).await;
        let Json(updated) = super::update_role(
            admin.current_user(),
            admin.user_collection(),
            PathObjectId(target.user_id()),
            Json(UpdateRoleRequest {
                role: UserRole::Worker,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.role, UserRole::Worker);
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_disabled_account_is_rejected() {
        let admin = bootstrap().await;
        let user = admin.derive("disabled@test.com", UserRole::User).await;

        let _ = super::set_active(
            admin.current_user(),
            admin.user_collection(),
            PathObjectId(user.user_id()),
            Json(super::UpdateActiveRequest { is_active: false }),
        )
        .await
        .unwrap();

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", format!("Bearer {}", user.user_token()))
            .body(())
            .unwrap()
            .into_parts();

        let err = super::UserModel::from_request_parts(&mut parts, &admin.app_state)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Unauthorized(UnauthorizedType::AccountDisabled));

        let err = super::UserAccess::from_request_parts(&mut parts, &admin.app_state)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Unauthorized(UnauthorizedType::AccountDisabled));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_demoted_admin_token_uses_current_role() {
        let admin = bootstrap().await;
        let demoted = admin.derive("demoted@test.com", UserRole::Admin).await;
        let token = demoted.user_token();

        let _ = super::update_role(
            admin.current_user(),
            admin.user_collection(),
            PathObjectId(demoted.user_id()),
            Json(UpdateRoleRequest {
                role: UserRole::User,
            }),
        )
        .await
        .unwrap();

        let claims = super::UserAccess::from_token(&admin.app_state.jwt_state, &token).unwrap();
        assert_eq!(claims.role, UserRole::Admin);

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();

        let access = super::UserAccess::from_request_parts(&mut parts, &admin.app_state)
            .await
            .unwrap();
        assert_eq!(access.id, demoted.user_id());
        assert_eq!(access.role, UserRole::User);
        assert_matches!(access.role.require(&[UserRole::Admin]), Err(Error::Forbidden));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB instance at MONGODB_URI"]
    async fn test_user_access_from_header() {
        let bootstrap = bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header(
                "Authorization",
                format!("Bearer {}", bootstrap.user_token()),
            )
            .body(())
            .unwrap()
            .into_parts();

        let user = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap();
        assert_eq!(user.id, bootstrap.user_id());

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let err = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            Error::Unauthorized(UnauthorizedType::InvalidAccessToken)
        );
    }
}
