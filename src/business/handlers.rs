use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{BusinessResponse, SaveBusinessRequest, SaveBusinessResponse},
    services,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn business_routes() -> Router<AppState> {
    Router::new()
        .route("/business/getBusinessDetails", get(get_business_details))
        .route("/business/saveOrUpdateBusiness", post(save_or_update_business))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn get_business_details(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<BusinessResponse>> {
    let business = services::get_business(state.store.as_ref(), auth.user.id).await?;
    Ok(Json(BusinessResponse { business }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn save_or_update_business(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SaveBusinessRequest>,
) -> AppResult<Json<SaveBusinessResponse>> {
    let message = if payload.id.is_some() {
        "Business updated"
    } else {
        "Business created"
    };
    let business = services::save_business(state.store.as_ref(), auth.user.id, payload).await?;
    Ok(Json(SaveBusinessResponse { message, business }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::app::build_app;

    const DETAILS: &str = "/api/business/getBusinessDetails";

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = if method == "GET" {
            Body::empty()
        } else {
            Body::from(body.to_string())
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn signed_in(app: &Router) -> String {
        let (status, _) = call(
            app,
            "POST",
            "/api/auth/register",
            json!({
                "email": "owner@example.com",
                "password": "pw-owner",
                "username": "owner",
                "firstname": "Olive",
                "lastname": "Owner",
                "usertype": "business",
            }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, body) = call(
            app,
            "POST",
            "/api/auth/login",
            json!({"email": "owner@example.com", "password": "pw-owner"}),
            None,
        )
        .await;
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn responses_wrap_business() {
        let app = build_app(AppState::fake());
        let token = signed_in(&app).await;

        let (status, body) = call(&app, "GET", DETAILS, Value::Null, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["business"]["name"], "");

        let (status, body) = call(
            &app,
            "POST",
            "/api/business/saveOrUpdateBusiness",
            json!({"name": "Acme", "job_position": "CEO"}),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Business created");
        let id = body["business"]["id"].as_str().unwrap().to_string();

        let (_, body) = call(
            &app,
            "POST",
            "/api/business/saveOrUpdateBusiness",
            json!({"id": id, "name": "Acme Labs", "jobPosition": "CEO"}),
            Some(&token),
        )
        .await;
        assert_eq!(body["message"], "Business updated");
        assert_eq!(body["business"]["name"], "Acme Labs");

        let (_, body) = call(&app, "GET", DETAILS, Value::Null, Some(&token)).await;
        assert_eq!(body["business"]["id"], id.as_str());
    }
}
