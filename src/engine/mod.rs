// ==========================================
// 仓库布局与库存对账系统 - 引擎层
// ==========================================
// 职责: 实现布局与匹配的业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL; 校验失败不留任何状态变化
// ==========================================

pub mod events;
pub mod matcher;
pub mod placement;

// 重导出核心引擎
pub use events::{
    LayoutEvent, LayoutEventPublisher, LayoutEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use matcher::{LocationMatcher, MatchOutcome};
pub use placement::{LayoutError, LayoutResult, MoveRequest, PlacementEngine};
