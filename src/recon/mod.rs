// ==========================================
// 仓库布局与库存对账系统 - 对账层
// ==========================================
// 职责: 派生事实的重算-替换、新鲜度状态机、刷新队列与读模型
// 红线: 事实表随时可整体重算重建, 不承载任何真相
// ==========================================

pub mod repository;
pub mod services;
pub mod status;

pub use repository::{FactReadRepository, FactReadResult};
pub use services::refresh_queue::{QueueStats, ReconRefreshQueue, RefreshTask, TaskStatus};
pub use services::refresh_service::{
    ReconRefreshService, RefreshScope, RefreshSummary, RefreshTrigger,
};
pub use status::{FactStatus, FactStatusRepository, SCOPE_ALL};
