use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::response::AppError;

/// JSON 请求体。解析失败统一返回 `INVALID_REQUEST_BODY`，
/// 字段级错误（如未知的练习模式、非法选项字母）会带上具体原因。
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|axum::Json(value)| JsonBody(value))
            .map_err(rejection_to_app_error)
    }
}

fn rejection_to_app_error(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %rejection, "Request body exceeds limit");
        return AppError::payload_too_large("请求体过大");
    }

    match rejection {
        JsonRejection::JsonDataError(e) => {
            let detail = e.body_text();
            tracing::warn!(error = %detail, "JSON body does not match the expected shape");
            AppError::bad_request("INVALID_REQUEST_BODY", &format!("请求体格式无效: {detail}"))
        }
        JsonRejection::MissingJsonContentType(e) => {
            tracing::warn!(error = %e, "Missing JSON Content-Type");
            AppError::bad_request("INVALID_REQUEST_BODY", "Content-Type 必须为 application/json")
        }
        other => {
            tracing::warn!(error = %other, "Rejected JSON body");
            AppError::bad_request("INVALID_REQUEST_BODY", "请求体格式无效")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Answer {
        #[allow(dead_code)]
        answer: char,
    }

    async fn extract(content_type: Option<&str>, body: &str) -> Result<JsonBody<Answer>, AppError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        JsonBody::<Answer>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        assert!(extract(Some("application/json"), r#"{"answer":"A"}"#).await.is_ok());
    }

    #[tokio::test]
    async fn shape_errors_carry_detail() {
        let err = extract(Some("application/json"), r#"{"choice":"A"}"#)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_REQUEST_BODY");
        assert!(err.message.contains("answer"));
    }

    #[tokio::test]
    async fn missing_content_type_is_rejected() {
        let err = extract(None, r#"{"answer":"A"}"#).await.err().unwrap();
        assert_eq!(err.code, "INVALID_REQUEST_BODY");
    }
}
