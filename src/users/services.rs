use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    error::AppError,
    images::services::{remove_stale, store_avatar},
    state::AppState,
    users::{
        codes,
        dto::{ImageUpload, ProfileForm, RegisterResponse},
        repo_types::{InsertError, NewUser, ProfileUpdate, User},
    },
};

/// Attempts at issuing a fresh code when the store reports a code collision.
const MAX_ISSUE_ATTEMPTS: usize = 3;

const REGISTERED_MESSAGE: &str =
    "User registered successfully. Check your email for your access code.";
const DEV_NOTE: &str = "RESEND_API_KEY not configured - code shown for development only";

/// Registers `email` exactly as submitted; only a blank value is refused.
pub async fn register(st: &AppState, email: &str) -> Result<RegisterResponse, AppError> {
    if email.trim().is_empty() {
        return Err(AppError::EmailRequired);
    }

    if st
        .users
        .find_by_email(email)
        .await
        .map_err(AppError::Storage)?
        .is_some()
    {
        warn!(email = %email, "email already registered");
        return Err(AppError::EmailTaken);
    }

    let user = insert_with_fresh_code(st, email).await?;
    info!(user_id = %user.id, code = %user.code, "user registered");

    // The record is committed; delivery problems only get logged.
    match st.mailer.send_code(&user.email, &user.code).await {
        Ok(()) => info!(email = %user.email, "access code sent"),
        Err(e) => error!(error = ?e, kind = "upstream_error", email = %user.email, "sending access code failed"),
    }

    let dev = !st.config.mail.is_configured();
    Ok(RegisterResponse {
        message: REGISTERED_MESSAGE.into(),
        dev_code: dev.then(|| user.code.clone()),
        dev_note: dev.then(|| DEV_NOTE.into()),
    })
}

async fn insert_with_fresh_code(st: &AppState, email: &str) -> Result<User, AppError> {
    for attempt in 1..=MAX_ISSUE_ATTEMPTS {
        let code = codes::issue(st.users.as_ref())
            .await
            .map_err(AppError::Storage)?;
        let new_user = NewUser {
            email: email.to_string(),
            code,
            now: OffsetDateTime::now_utc(),
        };
        match st.users.insert(new_user).await {
            Ok(user) => return Ok(user),
            Err(InsertError::DuplicateEmail) => {
                warn!(email = %email, "email registered concurrently");
                return Err(AppError::EmailTaken);
            }
            Err(InsertError::DuplicateCode) => {
                warn!(attempt, "issued code already in use, retrying");
            }
            Err(InsertError::Other(e)) => return Err(AppError::Storage(e)),
        }
    }
    Err(AppError::Storage(anyhow::anyhow!(
        "no free access code after {} attempts",
        MAX_ISSUE_ATTEMPTS
    )))
}

/// Codes are matched verbatim; they are credentials.
pub async fn login(st: &AppState, code: &str) -> Result<User, AppError> {
    if code.is_empty() {
        return Err(AppError::CodeRequired);
    }
    match st.users.find_by_code(code).await.map_err(AppError::Storage)? {
        Some(user) => {
            info!(user_id = %user.id, "user logged in");
            Ok(user)
        }
        None => {
            warn!("login with unknown code");
            Err(AppError::InvalidCode)
        }
    }
}

pub async fn get_profile(st: &AppState, code: &str) -> Result<User, AppError> {
    if code.is_empty() {
        return Err(AppError::NotFound);
    }
    st.users
        .find_by_code(code)
        .await
        .map_err(AppError::Storage)?
        .ok_or(AppError::NotFound)
}

/// Overwrites name and last name, stores the image when one is given and
/// returns the record as persisted.
pub async fn update_profile(
    st: &AppState,
    code: &str,
    form: ProfileForm,
    image: Option<ImageUpload>,
) -> Result<User, AppError> {
    // Nothing is written for an unknown code, not even the image file.
    let current = get_profile(st, code).await?;

    let stored = match image {
        Some(img) => Some(store_avatar(st, code, img).await.map_err(AppError::Io)?),
        None => None,
    };

    let fields = ProfileUpdate {
        name: form.name,
        last_name: form.last_name,
        image_url: stored.as_ref().map(|(url, _)| url.clone()),
        updated_at: OffsetDateTime::now_utc(),
    };
    let matched = st
        .users
        .update_fields(code, fields)
        .await
        .map_err(AppError::Storage)?;
    if matched == 0 {
        return Err(AppError::NotFound);
    }

    let user = st
        .users
        .find_by_code(code)
        .await
        .map_err(AppError::Storage)?
        .ok_or_else(|| AppError::Storage(anyhow::anyhow!("user {} missing after update", code)))?;

    // Checked against the persisted record, which a concurrent update may
    // have pointed back at the previous file.
    if stored.is_some() {
        remove_stale(st, &current.image_url, &user.image_url).await;
    }
    info!(user_id = %user.id, image = stored.is_some(), "profile updated");
    Ok(user)
}
