use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::db::{Item, User};
use crate::engine::{can_mutate, EngineError, SearchFilter};
use crate::AppState;

use super::forms::read_item_form;
use super::templates::{
    display_name, error_lines, EditTemplate, FormValues, IndexTemplate, ItemView,
    NewItemTemplate, ShowTemplate,
};
use super::{engine_error, render_template, render_with_status};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    q: Option<String>,
    status: Option<String>,
}

fn item_path(id: i64) -> String {
    format!("/items/{}", id)
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let filter = SearchFilter::new(query.q.as_deref(), query.status.as_deref());
    let items = state
        .engine
        .list(&filter)
        .await
        .map_err(|e| engine_error(&state, e))?;

    let template = IndexTemplate {
        count: items.len(),
        items: items.iter().map(ItemView::from).collect(),
        query: filter.query().unwrap_or_default().to_string(),
        status: filter.status().map(|s| s.to_string()).unwrap_or_default(),
        username: display_name(user.as_ref()),
    };
    Ok(render_template(template))
}

pub async fn new_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Response {
    if user.is_none() && state.engine.policy().require_login_to_post {
        return Redirect::to(crate::api::error::LOGIN_PATH).into_response();
    }

    render_template(NewItemTemplate {
        form: FormValues::default(),
        errors: Vec::new(),
        username: display_name(user.as_ref()),
    })
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_item_form(multipart).await?;
    let values = FormValues::from(&form);

    match state.engine.create(form, user.as_ref()).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(EngineError::Validation(errors)) => Ok(render_with_status(
            StatusCode::BAD_REQUEST,
            NewItemTemplate {
                form: values,
                errors: error_lines(&errors),
                username: display_name(user.as_ref()),
            },
        )),
        Err(e) => Err(engine_error(&state, e)),
    }
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let item = state.engine.get(id).await.map_err(|e| engine_error(&state, e))?;
    Ok(render_template(show_page(&state, &item, user.as_ref(), None)))
}

fn show_page(
    state: &AppState,
    item: &Item,
    user: Option<&User>,
    notice: Option<String>,
) -> ShowTemplate {
    let can_edit = if state.engine.policy().enforce_ownership {
        user.is_some_and(|u| can_mutate(u, item))
    } else {
        true
    };

    ShowTemplate {
        item: ItemView::from(item),
        can_edit,
        notice,
        username: display_name(user),
    }
}

pub async fn edit_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let item = state
        .engine
        .authorize_edit(id, user.as_ref())
        .await
        .map_err(|e| engine_error(&state, e))?;
    let view = ItemView::from(&item);

    Ok(render_template(EditTemplate {
        id,
        form: FormValues::from(&item),
        image_url: view.image_url,
        is_found: view.is_found,
        errors: Vec::new(),
        username: display_name(user.as_ref()),
    }))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_item_form(multipart).await?;
    let values = FormValues::from(&form);

    match state.engine.edit(id, form, user.as_ref()).await {
        Ok(item) => Ok(Redirect::to(&item_path(item.id)).into_response()),
        Err(EngineError::Validation(errors)) => {
            // Re-read for the current image; the submission changed nothing
            let item = state.engine.get(id).await.map_err(|e| engine_error(&state, e))?;
            let view = ItemView::from(&item);
            Ok(render_with_status(
                StatusCode::BAD_REQUEST,
                EditTemplate {
                    id,
                    form: values,
                    image_url: view.image_url,
                    is_found: view.is_found,
                    errors: error_lines(&errors),
                    username: display_name(user.as_ref()),
                },
            ))
        }
        Err(e) => Err(engine_error(&state, e)),
    }
}

pub async fn mark_found(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    match state.engine.mark_found(id, user.as_ref()).await {
        Ok(_) => Ok(Redirect::to(&item_path(id)).into_response()),
        Err(EngineError::InvalidTransition { status, .. }) => {
            let item = state.engine.get(id).await.map_err(|e| engine_error(&state, e))?;
            let notice = format!("This item is already marked as {}.", status);
            Ok(render_with_status(
                StatusCode::CONFLICT,
                show_page(&state, &item, user.as_ref(), Some(notice)),
            ))
        }
        Err(e) => Err(engine_error(&state, e)),
    }
}
