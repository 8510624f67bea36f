use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// 输入不合法（缺字段、未知促销、类型不符），在任何写入之前拒绝
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 业务冲突：一次性促销已使用、核销重复、余额或积分池不足、人数已满
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 角色权限不足或账户未验证
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// 实体所处生命周期阶段不允许该操作（例如促销已开始）
    #[error("State error: {0}")]
    StateError(String),

    /// 存储层故障，与业务规则错误区分
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] DbErr),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// 插入时的唯一约束冲突转换为业务冲突，其余存储错误保持 Unavailable
    pub fn on_unique_violation(err: DbErr, message: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(message.to_string()),
            _ => AppError::Unavailable(err),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PermissionDenied(_) => "FORBIDDEN",
            AppError::StateError(_) => "INVALID_STATE",
            AppError::Unavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::ConfigError(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::StateError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::StateError(msg) => {
                log::warn!("{self}");
                msg.clone()
            }
            AppError::PermissionDenied(msg) => {
                log::warn!("Permission denied: {msg}");
                msg.clone()
            }
            AppError::Unavailable(err) => {
                log::error!("Database error: {err}");
                "Storage unavailable".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::ValidationError("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::PermissionDenied("role".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::StateError("started".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_storage_failure_is_distinct_from_business_errors() {
        let err = AppError::from(DbErr::Custom("connection reset".into()));
        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn test_non_unique_db_error_stays_unavailable() {
        let err = AppError::on_unique_violation(DbErr::Custom("boom".into()), "duplicate");
        assert!(matches!(err, AppError::Unavailable(_)));
    }

    #[test]
    fn test_error_response_body_carries_code() {
        let resp = AppError::NotFound("Event not found".into()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
