use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    avatar::{self, MAX_AVATAR_BYTES},
    dto::{
        parse_usertype, AvatarResponse, CheckEmailRequest, CheckEmailResponse, CurrentSession,
        ForgotPasswordRequest, LoginRequest, MessageResponse, ProfileResponse, ProviderInfo,
        RedirectQuery, RedirectResponse, RegisterRequest, RegisterResponse, SessionResponse,
        UpdateProfileRequest, VerifyPasswordRequest,
    },
    extractors::AuthUser,
    jwt::{new_session_token, SessionKeys},
    services,
};
use crate::{
    adapter::{Adapter, AdapterSession, AdapterUserPatch},
    categories::services::fetch_user_categories_or_empty,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(current_session))
        .route("/auth/session/refresh", post(refresh_session))
        .route("/auth/providers", get(providers))
        .route("/auth/redirect", get(redirect))
        .route("/auth/checkEmail", post(check_email))
        .route("/auth/forgotPassword", post(forgot_password))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/verifyPassword", post(verify_password))
        .route("/auth/updateProfile", post(update_profile))
        .route("/auth/getUserProfile", post(get_user_profile))
        .route(
            "/auth/updateAvatar",
            post(update_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let registration = payload.validate()?;
    let (user, categories) = services::register(state.store.as_ref(), registration).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            categories,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let mut missing = Vec::new();
    if email.trim().is_empty() {
        missing.push("email");
    }
    if password.is_empty() {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(AppError::Validation { fields: missing });
    }
    let usertype = parse_usertype(payload.usertype.as_deref())?;

    let user = services::authorize(state.store.as_ref(), &email, &password, usertype)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    let keys = SessionKeys::from_ref(&state);
    let session = state
        .adapter()
        .create_session(AdapterSession {
            session_token: new_session_token(),
            user_id: user.id,
            expires: keys.expiry_from_now(),
        })
        .await?;
    let token = keys.sign(user.id, user.usertype, &session.session_token, session.expires)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(SessionResponse {
        token,
        expires: session.expires,
        user,
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    state
        .adapter()
        .delete_session(&auth.session.session_token)
        .await?;
    info!("user logged out");
    Ok(Json(MessageResponse::ok("Signed out")))
}

#[instrument(skip(auth), fields(user_id = %auth.user.id))]
pub async fn current_session(auth: AuthUser) -> Json<CurrentSession> {
    Json(CurrentSession {
        expires: auth.session.expires,
        user: auth.user,
    })
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn refresh_session(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<SessionResponse>> {
    let keys = SessionKeys::from_ref(&state);
    let session = state
        .adapter()
        .update_session(AdapterSession {
            expires: keys.expiry_from_now(),
            ..auth.session
        })
        .await?;
    let token = keys.sign(
        auth.user.id,
        auth.user.usertype,
        &session.session_token,
        session.expires,
    )?;
    Ok(Json(SessionResponse {
        token,
        expires: session.expires,
        user: auth.user,
    }))
}

pub async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    let mut out = vec![ProviderInfo {
        id: "credentials".into(),
        kind: "credentials",
    }];
    out.extend(state.config.providers.iter().map(|p| ProviderInfo {
        id: p.id.clone(),
        kind: "oauth",
    }));
    Json(out)
}

pub async fn redirect(
    State(state): State<AppState>,
    Query(q): Query<RedirectQuery>,
) -> Json<RedirectResponse> {
    Json(RedirectResponse {
        url: services::resolve_redirect(&state.config.base_url, q.url.as_deref()),
    })
}

#[instrument(skip(state, payload))]
pub async fn check_email(
    State(state): State<AppState>,
    Json(payload): Json<CheckEmailRequest>,
) -> AppResult<Json<CheckEmailResponse>> {
    let usertype = parse_usertype(payload.usertype.as_deref())?;
    let email = payload.email.unwrap_or_default();
    let exists = services::check_email(state.store.as_ref(), &email, usertype).await?;
    Ok(Json(CheckEmailResponse { exists }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or(AppError::Validation {
            fields: vec!["email"],
        })?;
    let usertype = parse_usertype(payload.usertype.as_deref())?;
    services::forgot_password(state.store.as_ref(), &email, usertype).await?;
    Ok(Json(MessageResponse::ok("Password has been reset")))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn verify_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<VerifyPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or(AppError::Validation {
            fields: vec!["password"],
        })?;
    services::verify_password(state.store.as_ref(), auth.user.id, &password).await?;
    Ok(Json(MessageResponse::ok("Password verified")))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let store = state.store.as_ref();
    let (user, categories) = services::update_profile(store, auth.user.id, payload).await?;
    let categories = match categories {
        Some(c) => c,
        None => fetch_user_categories_or_empty(store, user.id).await,
    };
    Ok(Json(ProfileResponse {
        user: user.into(),
        categories,
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn get_user_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    let (user, categories) =
        services::get_user_profile(state.store.as_ref(), auth.user.id).await?;
    Ok(Json(ProfileResponse {
        user: user.into(),
        categories,
    }))
}

/// Multipart upload; reads the `avatar` field.
#[instrument(skip(state, auth, mp), fields(user_id = %auth.user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    mut mp: Multipart,
) -> AppResult<Json<AvatarResponse>> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Invalid(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Invalid(format!("Invalid multipart body: {e}")))?;
        upload = Some((content_type, data));
        break;
    }

    let Some((content_type, data)) = upload.filter(|(_, d)| !d.is_empty()) else {
        return Err(AppError::Validation {
            fields: vec!["avatar"],
        });
    };
    let ext = avatar::extension_for(&content_type).ok_or_else(|| {
        warn!(%content_type, "rejected avatar type");
        AppError::Invalid("Avatar must be a png, jpeg, webp or gif image".into())
    })?;
    if data.len() > MAX_AVATAR_BYTES {
        return Err(AppError::Invalid("Avatar exceeds 5 MB".into()));
    }

    let upload_dir = &state.config.upload_dir;
    let image = avatar::store_avatar(upload_dir, auth.user.id, ext, &data).await?;
    let user = match state
        .adapter()
        .update_user(AdapterUserPatch {
            id: auth.user.id,
            image: Some(image.clone()),
            ..Default::default()
        })
        .await
    {
        Ok(user) => user,
        Err(e) => {
            avatar::remove_avatar(upload_dir, &image).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = auth.user.image.as_deref().filter(|p| *p != image) {
        avatar::remove_avatar(upload_dir, previous).await;
    }

    info!("avatar updated");
    Ok(Json(AvatarResponse { image, user }))
}
