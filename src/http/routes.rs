use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::follow::FollowOutcome;
use crate::http::auth::Caller;
use crate::http::extract::{JsonBody, PathParam, QueryParams};
use crate::http::AppState;
use crate::model::{Page, UserId};
use crate::query::{FollowCountsView, RelatedUser, RelationshipFlags, RelationshipView};
use crate::reconcile::{self, ReconcileReport};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageParams {
    cursor: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupRequest {
    target_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VisibilityResponse {
    viewer_id: UserId,
    owner_id: UserId,
    can_view: bool,
}

fn user_param(raw: &str) -> Result<UserId> {
    UserId::parse(raw)
}

pub(crate) async fn follow(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(target): PathParam<String>,
) -> Result<Json<FollowOutcome>> {
    let target = user_param(&target)?;
    Ok(Json(state.follow.follow_user(&caller, &target).await?))
}

pub(crate) async fn unfollow(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(target): PathParam<String>,
) -> Result<Json<FollowOutcome>> {
    let target = user_param(&target)?;
    Ok(Json(state.follow.unfollow_user(&caller, &target).await?))
}

pub(crate) async fn cancel_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(target): PathParam<String>,
) -> Result<Json<FollowOutcome>> {
    let target = user_param(&target)?;
    Ok(Json(state.follow.cancel_follow_request(&caller, &target).await?))
}

pub(crate) async fn accept_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(requester): PathParam<String>,
) -> Result<Json<FollowOutcome>> {
    let requester = user_param(&requester)?;
    Ok(Json(state.follow.accept_follow_request(&caller, &requester).await?))
}

pub(crate) async fn decline_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(requester): PathParam<String>,
) -> Result<Json<FollowOutcome>> {
    let requester = user_param(&requester)?;
    Ok(Json(state.follow.decline_follow_request(&caller, &requester).await?))
}

pub(crate) async fn remove_follower(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(follower): PathParam<String>,
) -> Result<Json<FollowOutcome>> {
    let follower = user_param(&follower)?;
    Ok(Json(state.follow.remove_follower(&caller, &follower).await?))
}

pub(crate) async fn incoming_requests(
    State(state): State<AppState>,
    Caller(caller): Caller,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<RelatedUser>>> {
    let page = state
        .query
        .incoming_requests(&caller, params.cursor.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn outgoing_requests(
    State(state): State<AppState>,
    Caller(caller): Caller,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<RelatedUser>>> {
    let page = state
        .query
        .outgoing_requests(&caller, params.cursor.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn followers(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(user): PathParam<String>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<RelatedUser>>> {
    let user = user_param(&user)?;
    let page = state
        .query
        .get_followers(&caller, &user, params.cursor.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn following(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(user): PathParam<String>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<RelatedUser>>> {
    let user = user_param(&user)?;
    let page = state
        .query
        .get_following(&caller, &user, params.cursor.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn mutuals(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(user): PathParam<String>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<UserId>>> {
    let user = user_param(&user)?;
    let page = state
        .query
        .mutuals_with(&caller, &user, params.cursor.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn follow_counts(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(user): PathParam<String>,
) -> Result<Json<FollowCountsView>> {
    let user = user_param(&user)?;
    Ok(Json(state.query.get_follow_counts(&caller, &user).await?))
}

pub(crate) async fn reconcile_own_counts(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<ReconcileReport>> {
    Ok(Json(reconcile::reconcile_counters(&state.db, &caller).await?))
}

pub(crate) async fn lookup_relationships(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(body): JsonBody<LookupRequest>,
) -> Result<Json<BTreeMap<UserId, RelationshipFlags>>> {
    Ok(Json(state.query.lookup_relationships(&caller, &body.target_ids).await?))
}

pub(crate) async fn visibility(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(owner): PathParam<String>,
) -> Result<Json<VisibilityResponse>> {
    let owner = user_param(&owner)?;
    let can_view = state.query.can_view(&caller, &owner).await?;
    Ok(Json(VisibilityResponse {
        viewer_id: caller,
        owner_id: owner,
        can_view,
    }))
}

pub(crate) async fn relationship(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(target): PathParam<String>,
) -> Result<Json<RelationshipView>> {
    let target = user_param(&target)?;
    Ok(Json(state.query.get_relationship(&caller, &target).await?))
}
