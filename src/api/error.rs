// ==========================================
// 仓库布局与库存对账系统 - API 层错误类型
// ==========================================
// 职责: 把仓储/引擎层错误转换为结构化的用户可读错误
// 红线: 放置拒绝必须带出原因与碰撞对象, 从不吞掉细节
// ==========================================

use thiserror::Error;

use crate::engine::placement::LayoutError;
use crate::repository::error::RepositoryError;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 输入与资源 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ===== 布局结构化拒绝 =====
    #[error("几何不合法: {0}")]
    InvalidGeometry(String),

    #[error("越界: 组件 {location} 占位超出网格 {grid_width}x{grid_height}")]
    OutOfBounds {
        location: String,
        grid_width: i64,
        grid_height: i64,
    },

    #[error("重叠: 组件 {location} 与 {} 冲突", colliding.join(", "))]
    Overlap {
        location: String,
        /// 碰撞对象的库位编码清单
        colliding: Vec<String>,
    },

    #[error("无可用空位: 需要 {width}x{height}")]
    NoSpaceAvailable { width: i64, height: i64 },

    // ===== 业务规则 =====
    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ===== 数据访问 =====
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ===== 通用 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 LayoutError 转换(保留结构化拒绝细节)
// ==========================================
impl From<LayoutError> for ApiError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::InvalidGeometry(msg) => ApiError::InvalidGeometry(msg),
            LayoutError::OutOfBounds { location, grid_width, grid_height } => {
                ApiError::OutOfBounds { location, grid_width, grid_height }
            }
            LayoutError::Overlap { location, colliding } => {
                ApiError::Overlap { location, colliding }
            }
            LayoutError::NoSpaceAvailable { width, height } => {
                ApiError::NoSpaceAvailable { width, height }
            }
            LayoutError::ZoneNotFound(zone) => {
                ApiError::NotFound(format!("区域 {} 不存在", zone))
            }
            LayoutError::ComponentNotFound(id) => {
                ApiError::NotFound(format!("组件(id={})不存在", id))
            }
            LayoutError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_keeps_collision_details() {
        let err: ApiError = LayoutError::Overlap {
            location: "A1".to_string(),
            colliding: vec!["B2".to_string(), "C3".to_string()],
        }
        .into();
        match &err {
            ApiError::Overlap { location, colliding } => {
                assert_eq!(location, "A1");
                assert_eq!(colliding.len(), 2);
            }
            other => panic!("应为 Overlap: {:?}", other),
        }
        let msg = err.to_string();
        assert!(msg.contains("B2") && msg.contains("C3"), "错误消息带出碰撞对象");
    }

    #[test]
    fn test_repository_error_conversion() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "Component".to_string(),
            id: "c1".to_string(),
        }
        .into();
        match err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Component"));
                assert!(msg.contains("c1"));
            }
            _ => panic!("应为 NotFound"),
        }
    }
}
