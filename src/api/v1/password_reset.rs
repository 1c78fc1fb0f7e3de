//! Forgot/reset password flow.
//!
//! Only the SHA-256 digest of a token is stored. A user has at most one live
//! token, and consuming it deletes it in the same operation.

use argon2::Argon2;
use axum::{extract::State, Json};
use base64::{engine::general_purpose, Engine as _};
use bson::oid::ObjectId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tap::TapFallible;
use time::{Duration, OffsetDateTime};
use validator::Validate;

use crate::{
    config::Settings,
    error::Error,
    mongo_ext::Collection,
    util::{hash_password, now},
};

use super::auth::UserCollection;

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(15);
const RESET_TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct ResetTokenCollection(pub Collection<ResetTokenModel>);

impl std::ops::Deref for ResetTokenCollection {
    type Target = Collection<ResetTokenModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub token_hash: String,
    pub expires_at: bson::DateTime,
    pub created_at: bson::DateTime,
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn live_token_filter(token: &str) -> bson::Document {
    bson::doc! {
        "tokenHash": digest_token(token),
        "expiresAt": { "$gt": now() },
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "if the email is registered, a reset token has been issued";

#[tracing::instrument(skip_all)]
pub async fn forgot_password(
    State(users): State<UserCollection>,
    State(tokens): State<ResetTokenCollection>,
    State(settings): State<Settings>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, Error> {
    request.validate()?;

    let generic = ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
        token: None,
    };

    let Some(user) = users
        .find_one(bson::doc! { "email": &request.email }, None)
        .await?
        .filter(|it| it.is_active)
    else {
        tracing::debug!("password reset requested for unknown or disabled email");
        return Ok(Json(generic));
    };

    let token = generate_token();
    let issued_at = OffsetDateTime::now_utc();

    tokens
        .update_one(
            bson::doc! { "userId": user.id },
            bson::doc! {
                "$set": {
                    "tokenHash": digest_token(&token),
                    "expiresAt": bson::DateTime::from(issued_at + RESET_TOKEN_TTL),
                    "createdAt": bson::DateTime::from(issued_at),
                },
                "$setOnInsert": { "_id": ObjectId::new() },
            },
            mongodb::options::UpdateOptions::builder()
                .upsert(true)
                .build(),
        )
        .await?;

    if settings.expose_reset_token {
        return Ok(Json(ForgotPasswordResponse {
            token: Some(token),
            ..generic
        }));
    }

    tracing::info!(user = %user.id, "password reset token issued");
    deliver_reset_token(user.id, &token);

    Ok(Json(generic))
}

/// Mail delivery stand-in. The raw token only reaches the `roadside::mailer`
/// target at debug level.
fn deliver_reset_token(user_id: ObjectId, token: &str) {
    tracing::debug!(
        target: "roadside::mailer",
        user = %user_id,
        token,
        "reset token ready for delivery"
    );
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyResetTokenRequest {
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyResetTokenResponse {
    pub valid: bool,
}

pub async fn verify_reset_token(
    State(tokens): State<ResetTokenCollection>,
    Json(request): Json<VerifyResetTokenRequest>,
) -> Result<Json<VerifyResetTokenResponse>, Error> {
    tokens
        .find_one(live_token_filter(&request.token), None)
        .await?
        .ok_or(Error::InvalidResetToken)?;

    Ok(Json(VerifyResetTokenResponse { valid: true }))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,

    #[validate(length(min = 8, max = 64))]
    pub password: String,

    #[validate(must_match = "password")]
    pub confirm_password: String,
}

#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(users): State<UserCollection>,
    State(tokens): State<ResetTokenCollection>,
    State(argon): State<Argon2<'static>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<(), Error> {
    request.validate()?;
    let password = hash_password(&argon, &request.password)?;

    let consumed = tokens
        .find_one_and_delete(live_token_filter(&request.token), None)
        .await?
        .ok_or(Error::InvalidResetToken)
        .tap_err(|_| tracing::debug!("reset attempted with an unknown, used or expired token"))?;

    users
        .update_one_by_id(
            consumed.user_id,
            bson::doc! {
                "$set": {
                    "password": password,
                    "updatedAt": now(),
                }
            },
        )
        .await?;

    tracing::info!(user = %consumed.user_id, "password reset");

    Ok(())
}
