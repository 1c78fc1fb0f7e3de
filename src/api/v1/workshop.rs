use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{now, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::auth::{UserModel, UserRole};

#[derive(Clone)]
pub struct ShopCollection(pub Collection<ShopModel>);

impl std::ops::Deref for ShopCollection {
    type Target = Collection<ShopModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShopModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub owner_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub services: Vec<String>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShopResponse {
    pub id: ObjectIdString,
    pub owner_id: ObjectIdString,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub services: Vec<String>,
    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<ShopModel> for ShopResponse {
    fn from(value: ShopModel) -> Self {
        Self {
            id: value.id.into(),
            owner_id: value.owner_id.into(),
            name: value.name,
            phone: value.phone,
            email: value.email,
            address: value.address,
            location: value.location,
            services: value.services,
            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IndexQuery {
    pub service: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub workshops: Vec<ShopResponse>,
}

pub async fn index(
    State(shops): State<ShopCollection>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<IndexResponse>, Error> {
    let filter = match query.service.as_deref().map(str::trim) {
        Some(service) if !service.is_empty() => bson::doc! { "services": service },
        _ => bson::doc! {},
    };

    let workshops = shops
        .find_all(filter, bson::doc! { "name": 1 })
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(IndexResponse { workshops }))
}

pub async fn show(
    State(shops): State<ShopCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<ShopResponse>, Error> {
    shops
        .get_one_by_id(id)
        .await?
        .map(Into::into)
        .map(Json)
        .ok_or(Error::NoResource)
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateShopRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub services: Vec<String>,
}

pub async fn create(
    user: UserModel,
    State(shops): State<ShopCollection>,
    Json(request): Json<CreateShopRequest>,
) -> Result<Json<ShopResponse>, Error> {
    user.role.require(&[UserRole::Admin])?;
    request.validate()?;

    let created_at = now();
    let shop = ShopModel {
        id: ObjectId::new(),
        owner_id: user.id,
        name: request.name,
        phone: request.phone,
        email: request.email,
        address: request.address,
        location: request.location,
        services: request.services,
        created_at,
        updated_at: created_at,
    };

    shops.insert_one(&shop, None).await?;

    tracing::info!(shop = %shop.id, owner = %user.id, "workshop created");

    Ok(Json(shop.into()))
}
