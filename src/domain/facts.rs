// ==========================================
// 仓库布局与库存对账系统 - 派生事实读模型
// ==========================================
// 职责: 六类派生事实的行结构定义
// 红线: 派生事实可随时整体重算, 不承载真相
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{CapacityStatus, DiscrepancySeverity, ExpiryUrgency};

// ==========================================
// F1 库位汇总 (Location Summary)
// ==========================================

/// 批次分布条目(JSON 列)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotQty {
    pub lot_key: String,
    pub qty: f64,
}

/// 物料汇总条目(JSON 列), 按数量降序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSummaryEntry {
    pub item_code: String,
    pub total_qty: f64,
    pub lots: Vec<String>,
}

/// 每个物理组件一行: 当前库存(匹配行数)、容量、利用率、状态档位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub zone_code: String,
    pub component_id: String,
    pub location: String,
    /// 匹配到该组件的快照行数, 不是数量合计
    pub current_stock: i64,
    pub max_capacity: i64,
    pub utilization_pct: f64,
    pub status: CapacityStatus,
    pub lot_distribution: Vec<LotQty>,
    pub materials_summary: Vec<MaterialSummaryEntry>,
    pub computed_at: DateTime<Utc>,
}

// ==========================================
// F2 区域容量 (Zone Capacity)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCapacitySummary {
    pub zone_code: String,
    pub total_capacity: i64,
    /// Σ 各组件 current_stock(匹配行数)
    pub total_stock: i64,
    pub utilization_pct: f64,
    pub status: CapacityStatus,
    /// 参与统计的物理组件数
    pub location_count: i64,
    /// 区域内去重 SKU 数
    pub unique_items: i64,
    pub computed_at: DateTime<Utc>,
}

// ==========================================
// F3 跨源差异 (Stock Discrepancy)
// ==========================================
// delta = 企业口径 − 作业口径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDiscrepancy {
    pub zone_code: String,
    pub location_group: String,
    pub item_code: String,
    pub lot_key: String,
    pub operational_qty: f64,
    pub enterprise_qty: f64,
    pub delta: f64,
    pub severity: DiscrepancySeverity,
    pub computed_at: DateTime<Utc>,
}

// ==========================================
// F4 效期桶 (Expiring Item)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringItem {
    pub zone_code: String,
    pub item_code: String,
    pub lot_key: String,
    pub available_qty: f64,
    pub location: String,
    pub valid_date: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
    pub urgency: ExpiryUrgency,
    pub computed_at: DateTime<Utc>,
}

// ==========================================
// F5 分类容量 (Category Capacity)
// ==========================================
// 受限单元格里不符合限制的库存计入 mismatched_stock; 两者均为行数口径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCapacity {
    pub zone_code: String,
    pub category: String,
    pub capacity: i64,
    pub current_stock: i64,
    pub mismatched_stock: i64,
    pub utilization_pct: f64,
    pub status: CapacityStatus,
    pub computed_at: DateTime<Utc>,
}

// ==========================================
// F6 未匹配库位 (Unassigned Location)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedLocation {
    pub zone_code: String,
    pub identifier: String,
    pub record_count: i64,
    pub total_qty: f64,
    pub computed_at: DateTime<Utc>,
}
