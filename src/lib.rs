// ==========================================
// 仓库布局与库存对账系统 - 核心库
// ==========================================
// 系统定位: 仓库布局编辑 + 双源库存对账的派生事实看板
// 真相分层: 布局/快照为真相, 六类事实可随时整体重算
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 布局与匹配业务规则
pub mod engine;

// 对账层 - 派生事实重算/新鲜度/队列
pub mod recon;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施(连接初始化/PRAGMA 统一/建表)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CapacityStatus, DiscrepancySeverity, ExpiryUrgency, FactKind, FactState, Rotation,
    SourceFeed, ZoneType,
};

// 领域实体
pub use domain::{
    CategoryCapacity, Component, ComponentKind, ExpiringItem, Grid, LocationSummary,
    MaterialFilter, RawInventoryRecord, Rect, StockDiscrepancy, UnassignedLocation,
    ZoneCapacitySummary,
};

// 引擎
pub use engine::{LayoutError, LocationMatcher, MatchOutcome, MoveRequest, PlacementEngine};

// 对账层
pub use recon::{
    FactReadRepository, FactReadResult, ReconRefreshQueue, ReconRefreshService, RefreshScope,
    RefreshSummary, RefreshTrigger,
};

// API
pub use api::{ApiError, ApiResult, LayoutApi, ReconApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓库布局与库存对账系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
