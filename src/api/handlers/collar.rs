use crate::api::{error::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public collar details plus the relay code the finder reads to the call center.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CollarResponse {
    pub tag_id: String,
    pub pet_name: String,
    pub pet_image: Option<String>,
    pub pet_dob: Option<String>,
    pub neutered: bool,
    pub vaccinated: bool,
    pub extension: String,
}

#[utoipa::path(
    get,
    path= "/collar/{tag_id}",
    params(
        ("tag_id" = String, Path, description = "Identifier printed on the collar tag")
    ),
    responses (
        (status = 200, description = "Registered collar", body = CollarResponse),
        (status = 404, description = "Collar not found or not registered"),
        (status = 503, description = "No relay code available right now")
    ),
    tag= "collar"
)]
// axum handler for collar
pub async fn collar(
    State(state): State<AppState>,
    Path(tag_id): Path<String>,
) -> Result<Json<CollarResponse>, ApiError> {
    let (info, extension) = state.lookup.produce(&tag_id).await?;

    Ok(Json(CollarResponse {
        tag_id: info.tag_id,
        pet_name: info.pet_name,
        pet_image: info.pet_image,
        pet_dob: info.pet_dob,
        neutered: info.neutered,
        vaccinated: info.vaccinated,
        extension,
    }))
}
