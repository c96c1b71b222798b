use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::{ImageUpload, LoginRequest, ProfileForm, RegisterRequest, RegisterResponse, UserEnvelope},
        repo_types::User,
        services,
    },
};

/// Upper bound for a profile form submission, image included.
pub const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/user/:code", get(get_user).put(update_user))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(e) => {
            warn!(error = %e, "rejected json body");
            Err(AppError::InvalidJson)
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, AppError> {
    let req = json_body(payload)?;
    Ok(Json(services::register(&state, &req.email).await?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let req = json_body(payload)?;
    let user = services::login(&state, &req.code).await?;
    Ok(Json(UserEnvelope {
        message: "Login successful".into(),
        user,
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(services::get_profile(&state, &code).await?))
}

/// PUT /user/:code (multipart: name, last_name, image?)
#[instrument(skip(state, mp))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(code): Path<String>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let mp = mp.map_err(|e| AppError::BadForm(e.body_text()))?;
    let (form, image) = read_profile_form(mp).await?;
    let user = services::update_profile(&state, &code, form, image).await?;
    Ok(Json(UserEnvelope {
        message: "User updated successfully".into(),
        user,
    }))
}

async fn read_profile_form(
    mut mp: Multipart,
) -> Result<(ProfileForm, Option<ImageUpload>), AppError> {
    let mut form = ProfileForm::default();
    let mut image = None;
    while let Some(field) = mp.next_field().await.map_err(bad_form)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("name") => form.name = text(field).await?,
            Some("last_name") => form.last_name = text(field).await?,
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let body = field.bytes().await.map_err(bad_form)?;
                // browsers send an empty, nameless part when no file was picked
                let picked = !body.is_empty() || file_name.as_deref().is_some_and(|n| !n.is_empty());
                if picked {
                    image = Some(ImageUpload {
                        file_name,
                        content_type,
                        body,
                    });
                }
            }
            _ => {}
        }
    }
    Ok((form, image))
}

async fn text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(bad_form)
}

fn bad_form(e: axum::extract::multipart::MultipartError) -> AppError {
    warn!(error = %e, "rejected multipart form");
    AppError::BadForm(e.body_text())
}
