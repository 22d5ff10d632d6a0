use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::catalog::{CreateProductCommand, UpdateProductCommand};

use super::error::ApiError;
use super::models::*;
use super::state::ApiState;

pub async fn list_products(
    State(state): State<ApiState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let params = list_params(query);
    let cancel = state.request_token();

    let page = state.catalog.query(&params, &cancel).await?;

    Ok(Json(page_response(page)))
}

pub async fn create_product(
    State(state): State<ApiState>,
    payload: Result<Json<ProductCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let command = CreateProductCommand {
        name: payload.name,
        price: payload.price,
    };
    let cancel = state.request_token();

    let product = state.catalog.create(command, &cancel).await?;

    Ok((StatusCode::CREATED, Json(product_response(product))))
}

pub async fn get_product(
    State(state): State<ApiState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let cancel = state.request_token();

    let product = state
        .catalog
        .get_by_id(id, &cancel)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(product_response(product)))
}

pub async fn update_product(
    State(state): State<ApiState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ProductUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let command = UpdateProductCommand {
        name: payload.name,
        price: payload.price,
    };
    let cancel = state.request_token();

    let product = state.catalog.update(id, command, &cancel).await?;

    Ok(Json(product_response(product)))
}

pub async fn delete_product(
    State(state): State<ApiState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let cancel = state.request_token();

    state.catalog.delete(id, &cancel).await?;

    Ok(StatusCode::NO_CONTENT)
}
