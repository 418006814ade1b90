//! Therapy catalog endpoints.

use axum::{
    extract::{Path, Query},
    Json,
};

use crate::catalog::{self, CatalogFilter, Therapy};

use super::error::ApiError;

/// List therapies, optionally filtered by category, search text and price band
///
/// GET /api/therapies
pub async fn list_therapies(Query(filter): Query<CatalogFilter>) -> Json<Vec<&'static Therapy>> {
    Json(catalog::list(&filter))
}

/// GET /api/therapies/categories
pub async fn list_categories() -> Json<Vec<&'static str>> {
    Json(catalog::categories())
}

/// GET /api/therapies/:id
pub async fn get_therapy(Path(id): Path<String>) -> Result<Json<&'static Therapy>, ApiError> {
    catalog::get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Therapy '{}' not found", id)))
}
