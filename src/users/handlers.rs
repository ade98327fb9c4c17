use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::{
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest},
        repo_types::User,
        services::{self, ServiceError},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    let users = services::list_users(state.users.as_ref())
        .await
        .map_err(|e| to_http(e, "failed to list users"))?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, (StatusCode, String)> {
    let user = services::get_user(state.users.as_ref(), &id)
        .await
        .map_err(|e| to_http(e, "failed to load user"))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_fields(&payload.name, &payload.email)?;

    let user = services::create_user(state.users.as_ref(), &state.config.actor, payload)
        .await
        .map_err(|e| to_http(e, "failed to create user"))?;

    let location = format!("/api/v1/users/{}", user.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, (StatusCode, String)> {
    require_fields(&payload.name, &payload.email)?;

    let user = services::update_user(state.users.as_ref(), &id, payload)
        .await
        .map_err(|e| to_http(e, "failed to update user"))?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::delete_user(state.users.as_ref(), &id)
        .await
        .map_err(|e| to_http(e, "failed to delete user"))?;
    Ok(StatusCode::NO_CONTENT)
}

fn require_fields(name: &str, email: &str) -> Result<(), (StatusCode, String)> {
    if name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".into()));
    }
    if email.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "email is required".into()));
    }
    Ok(())
}

fn to_http(err: ServiceError, failure: &str) -> (StatusCode, String) {
    match err {
        ServiceError::InvalidEmail | ServiceError::InvalidName => {
            warn!(error = %err, "rejected user input");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "user not found".into()),
        ServiceError::Storage(e) => {
            error!(error = %e, "{failure}");
            (StatusCode::INTERNAL_SERVER_ERROR, failure.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .nest("/api/v1", user_routes())
            .with_state(AppState::fake())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn crud_flow() {
        let app = app();

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/users",
                json!({"name": "Ann", "email": "ann@x.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
        let created = body_json(res).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(location, format!("/api/v1/users/{id}"));
        assert_eq!(created["metadata"]["createdBy"], "webapp");

        let res = app.clone().oneshot(empty_request("GET", "/api/v1/users")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

        let res = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &location,
                json!({"name": "Bea", "email": "bea@x.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["name"], "Bea");

        let res = app.clone().oneshot(empty_request("DELETE", &location)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app.oneshot(empty_request("GET", &location)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_fields_are_bad_requests() {
        let res = app()
            .oneshot(json_request("POST", "/api/v1/users", json!({"email": "ann@x.com"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app()
            .oneshot(json_request("PUT", "/api/v1/users/u1", json!({"name": "Ann"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_is_bad_request() {
        let res = app()
            .oneshot(json_request(
                "POST",
                "/api/v1/users",
                json!({"name": "Ann", "email": "not-an-email"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"invalid email address");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let res = app()
            .oneshot(json_request(
                "PUT",
                "/api/v1/users/ghost",
                json!({"name": "Ann", "email": "ann@x.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app()
            .oneshot(empty_request("DELETE", "/api/v1/users/ghost"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_failures_map_to_500() {
        let err = ServiceError::Storage(crate::storage::StoreError::Io(std::io::Error::other("x")));
        let (status, msg) = to_http(err, "failed to list users");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "failed to list users");
    }
}
