//! Wrappers around axum's body, path, query and multipart extractors whose
//! rejections render as `{"signal": ...}` like every other error.

use async_trait::async_trait;
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Multipart, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::AppError;

pub struct AppJson<T>(pub T);

pub struct AppPath<T>(pub T);

pub struct AppQuery<T>(pub T);

pub struct AppMultipart(pub Multipart);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {rejection}");
        AppError::detailed(rejection.status(), "invalid_request_body", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameters: {rejection}");
        AppError::detailed(rejection.status(), "invalid_path_parameter", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {rejection}");
        AppError::detailed(rejection.status(), "invalid_query_parameter", rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        debug!("Rejected multipart body: {rejection}");
        AppError::detailed(rejection.status(), "file_upload_failed", rejection.body_text())
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, AppError> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(AppPath(value))
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, AppError> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(AppQuery(value))
    }
}

#[async_trait]
impl<S> FromRequest<S> for AppMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        Ok(AppMultipart(Multipart::from_request(req, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[allow(dead_code)]
        name: String,
    }

    #[tokio::test]
    async fn test_json_rejection_has_a_signal() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        let Err(err) = AppJson::<Body>::from_request(req, &()).await else {
            panic!("a body without `name` must be rejected");
        };
        assert_eq!(err.signal(), "invalid_request_body");
        let AppError::Detailed { status, message, .. } = err else {
            panic!("expected a detailed error");
        };
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(message.contains("name"));
    }

    #[tokio::test]
    async fn test_query_rejection_has_a_signal() {
        #[derive(Debug, Deserialize)]
        struct Paging {
            #[allow(dead_code)]
            page: Option<i64>,
        }

        let (mut parts, _) = Request::builder()
            .uri("/?page=two")
            .body(())
            .unwrap()
            .into_parts();
        let Err(err) = AppQuery::<Paging>::from_request_parts(&mut parts, &()).await else {
            panic!("a non numeric page must be rejected");
        };
        assert_eq!(err.signal(), "invalid_query_parameter");
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_rejected() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "text/plain")
            .body(axum::body::Body::from("hello"))
            .unwrap();
        let Err(err) = AppMultipart::from_request(req, &()).await else {
            panic!("a non multipart body must be rejected");
        };
        assert_eq!(err.signal(), "file_upload_failed");
    }
}
