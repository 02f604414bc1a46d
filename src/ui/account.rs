use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::auth::{
    bounded, end_session, extract_token, hash_password, removal_cookie, session_cookie,
    start_session, verify_password, CurrentUser,
};
use crate::api::error::ApiError;
use crate::api::validation::validate_registration;
use crate::db::{format_timestamp, LoginRequest, NewUser, RegisterRequest};
use crate::store::StoreError;
use crate::AppState;

use super::templates::{display_name, error_lines, LoginTemplate, RegisterTemplate};
use super::{render_template, render_with_status};

pub async fn register_page(CurrentUser(user): CurrentUser) -> Response {
    render_template(RegisterTemplate {
        errors: Vec::new(),
        form_username: String::new(),
        form_email: String::new(),
        username: display_name(user.as_ref()),
    })
}

pub async fn register_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterRequest>,
) -> Result<Response, ApiError> {
    let rejected = |status: StatusCode, errors: Vec<String>, form: &RegisterRequest| {
        render_with_status(
            status,
            RegisterTemplate {
                errors,
                form_username: form.username.clone(),
                form_email: form.email.clone(),
                username: String::new(),
            },
        )
    };

    if let Err(errors) = validate_registration(&form) {
        return Ok(rejected(StatusCode::BAD_REQUEST, error_lines(&errors), &form));
    }

    let password_hash = hash_password(&form.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let new_user = NewUser {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password_hash,
        created_at: format_timestamp(&Utc::now()),
    };

    let user_id = match bounded(&state, state.users.create_user(&new_user)).await? {
        Ok(id) => id,
        Err(StoreError::Conflict(_)) => {
            return Ok(rejected(
                StatusCode::CONFLICT,
                vec!["Username or email is already taken".to_string()],
                &form,
            ));
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id, username = %new_user.username, "User registered");

    let token = start_session(&state, user_id).await?;
    let jar = jar.add(session_cookie(token, state.config.auth.secure_cookies));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn login_page(CurrentUser(user): CurrentUser) -> Response {
    render_template(LoginTemplate {
        error: None,
        login: String::new(),
        username: display_name(user.as_ref()),
    })
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = bounded(&state, state.users.find_user_by_login(form.login.trim())).await??;

    let user = match user {
        Some(user) if verify_password(&form.password, &user.password_hash) => user,
        _ => {
            warn!(login = %form.login.trim(), "Failed login attempt");
            return Ok(render_with_status(
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    error: Some("Invalid credentials".to_string()),
                    login: form.login,
                    username: String::new(),
                },
            ));
        }
    };

    let token = start_session(&state, user.id).await?;
    let jar = jar.add(session_cookie(token, state.config.auth.secure_cookies));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_token(&headers) {
        end_session(&state, &token).await?;
    }
    let jar = jar.remove(removal_cookie());
    Ok((jar, Redirect::to("/")).into_response())
}
