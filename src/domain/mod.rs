// ==========================================
// 仓库布局与库存对账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯几何/业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod component;
pub mod facts;
pub mod grid;
pub mod inventory;
pub mod types;

// 重导出核心类型
pub use component::{
    CellFilter, Component, ComponentKind, MaterialFilter, Numbering, NumberingAxis,
    NumberingOrder,
};
pub use facts::{
    CategoryCapacity, ExpiringItem, LocationSummary, LotQty, MaterialSummaryEntry,
    StockDiscrepancy, UnassignedLocation, ZoneCapacitySummary,
};
pub use grid::{Grid, Rect};
pub use inventory::{normalize_identifier, RawInventoryRecord, NO_LOT_KEY};
pub use types::{
    CapacityStatus, DiscrepancySeverity, ExpiryUrgency, FactKind, FactState, Rotation,
    SourceFeed, ZoneType,
};
