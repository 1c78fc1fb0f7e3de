use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, TokenData};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{config::JwtKeys, error::Error, util::ObjectIdString};

use super::auth::{UserModel, UserRole};

#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtState {
    pub fn new(keys: &JwtKeys) -> Result<Self, Error> {
        match keys {
            JwtKeys::Secret(secret) => Ok(Self::from_secret(secret.as_bytes())),
            JwtKeys::Rsa {
                private_pem_base64,
                public_pem_base64,
            } => {
                let decode = |it: &str| {
                    general_purpose::STANDARD
                        .decode(it)
                        .map_err(|_| {
                            jsonwebtoken::errors::Error::from(
                                jsonwebtoken::errors::ErrorKind::InvalidKeyFormat,
                            )
                        })
                };

                let encoding_key = EncodingKey::from_rsa_pem(&decode(private_pem_base64)?)?;
                let decoding_key = DecodingKey::from_rsa_pem(&decode(public_pem_base64)?)?;

                Ok(Self::with_keys(Algorithm::RS256, encoding_key, decoding_key))
            }
        }
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self::with_keys(
            Algorithm::HS256,
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
        )
    }

    fn with_keys(algorithm: Algorithm, encoding_key: EncodingKey, decoding_key: DecodingKey) -> Self {
        let header = jsonwebtoken::Header::new(algorithm);
        let mut validation = jsonwebtoken::Validation::new(algorithm);
        // expiry is checked by the claims so an expired token maps to our own error
        validation.validate_exp = false;

        Self {
            header,
            validation,

            encoding_key,
            decoding_key,
        }
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessTokenClaims {
    pub sub: ObjectIdString,
    pub user_role: UserRole,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub struct GenerateAccessTokenResponse {
    pub expired_at: OffsetDateTime,
    pub token: String,
}

pub fn generate_access_token(
    jwt_state: &JwtState,
    user: &UserModel,
    ttl: Duration,
) -> Result<GenerateAccessTokenResponse, Error> {
    let expired_at = current_timestamp() + ttl;
    let token = generate_access_token_with_exp(jwt_state, user, expired_at.unix_timestamp())?;

    Ok(GenerateAccessTokenResponse { expired_at, token })
}

pub fn generate_access_token_with_exp(
    jwt_state: &JwtState,
    user: &UserModel,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &AccessTokenClaims {
            sub: user.id.into(),
            user_role: user.role,
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_access_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<AccessTokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation).map_err(Into::into)
}
