//! Extractors whose rejections render as the service's JSON error body

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::error::FollowGraphError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(FollowGraphError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(FollowGraphError))]
pub struct QueryParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(FollowGraphError))]
pub struct PathParam<T>(pub T);

impl From<JsonRejection> for FollowGraphError {
    fn from(rejection: JsonRejection) -> Self {
        FollowGraphError::Validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for FollowGraphError {
    fn from(rejection: QueryRejection) -> Self {
        FollowGraphError::Validation(format!("invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for FollowGraphError {
    fn from(rejection: PathRejection) -> Self {
        FollowGraphError::Validation(format!("invalid path: {}", rejection.body_text()))
    }
}
