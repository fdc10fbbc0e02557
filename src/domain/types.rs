// ==========================================
// 仓库布局与库存对账系统 - 领域类型定义
// ==========================================
// 红线: 等级/状态是"档位制",不是评分制
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 旋转角度 (Rotation)
// ==========================================
// 组件仅允许四个直角; 90/270 交换宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// 从角度值解析(仅接受 0/90/180/270)
    pub fn from_degrees(deg: i32) -> Option<Self> {
        match deg {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// 旋转是否交换宽高(90°/270°)
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

// ==========================================
// 区域标注类型 (Zone Type)
// ==========================================
// block/flex 为视觉标注层: 不参与容量统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    Standard,
    Block,
    Flex,
}

impl ZoneType {
    /// 是否纳入容量统计
    pub fn capacity_tracked(&self) -> bool {
        matches!(self, ZoneType::Standard)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ZoneType::Standard => "STANDARD",
            ZoneType::Block => "BLOCK",
            ZoneType::Flex => "FLEX",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "BLOCK" => ZoneType::Block,
            "FLEX" => ZoneType::Flex,
            _ => ZoneType::Standard,
        }
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 数据来源 (Source Feed)
// ==========================================
// 两套独立维护的库存口径: 作业系统与企业资源系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFeed {
    Operational,
    Enterprise,
}

impl SourceFeed {
    pub fn as_str(&self) -> &str {
        match self {
            SourceFeed::Operational => "OPERATIONAL",
            SourceFeed::Enterprise => "ENTERPRISE",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ENTERPRISE" => SourceFeed::Enterprise,
            _ => SourceFeed::Operational,
        }
    }
}

impl fmt::Display for SourceFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 容量状态档位 (Capacity Status)
// ==========================================
// 档位: critical ≥90%, high ≥70%, medium ≥50%, 其余 low
// max_capacity = 0 时无论库存多少均为 no_capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityStatus {
    NoCapacity,
    Critical,
    High,
    Medium,
    Low,
}

impl CapacityStatus {
    /// 按名义容量与利用率判定档位
    ///
    /// # 参数
    /// - max_capacity: 名义容量(0 表示无容量)
    /// - utilization_pct: 利用率百分比
    pub fn from_utilization(max_capacity: i64, utilization_pct: f64) -> Self {
        if max_capacity <= 0 {
            return CapacityStatus::NoCapacity;
        }
        if utilization_pct >= 90.0 {
            CapacityStatus::Critical
        } else if utilization_pct >= 70.0 {
            CapacityStatus::High
        } else if utilization_pct >= 50.0 {
            CapacityStatus::Medium
        } else {
            CapacityStatus::Low
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CapacityStatus::NoCapacity => "NO_CAPACITY",
            CapacityStatus::Critical => "CRITICAL",
            CapacityStatus::High => "HIGH",
            CapacityStatus::Medium => "MEDIUM",
            CapacityStatus::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "NO_CAPACITY" => CapacityStatus::NoCapacity,
            "CRITICAL" => CapacityStatus::Critical,
            "HIGH" => CapacityStatus::High,
            "MEDIUM" => CapacityStatus::Medium,
            _ => CapacityStatus::Low,
        }
    }
}

impl fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 差异严重度 (Discrepancy Severity)
// ==========================================
// 按 |Δ| 判定: match(0), minor(<10), moderate(<100), high(<1000), critical(≥1000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancySeverity {
    Match,
    Minor,
    Moderate,
    High,
    Critical,
}

impl DiscrepancySeverity {
    pub fn from_delta(delta: f64) -> Self {
        let abs = delta.abs();
        if abs == 0.0 {
            DiscrepancySeverity::Match
        } else if abs < 10.0 {
            DiscrepancySeverity::Minor
        } else if abs < 100.0 {
            DiscrepancySeverity::Moderate
        } else if abs < 1000.0 {
            DiscrepancySeverity::High
        } else {
            DiscrepancySeverity::Critical
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DiscrepancySeverity::Match => "MATCH",
            DiscrepancySeverity::Minor => "MINOR",
            DiscrepancySeverity::Moderate => "MODERATE",
            DiscrepancySeverity::High => "HIGH",
            DiscrepancySeverity::Critical => "CRITICAL",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "MATCH" => DiscrepancySeverity::Match,
            "MINOR" => DiscrepancySeverity::Minor,
            "MODERATE" => DiscrepancySeverity::Moderate,
            "HIGH" => DiscrepancySeverity::High,
            _ => DiscrepancySeverity::Critical,
        }
    }
}

impl fmt::Display for DiscrepancySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 效期紧急度 (Expiry Urgency)
// ==========================================
// 按剩余天数判定: expired(<0), critical(≤7), high(≤14), medium(≤30), low(>30)
// valid_date 缺失 → no_expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryUrgency {
    Expired,
    Critical,
    High,
    Medium,
    Low,
    NoExpiry,
}

impl ExpiryUrgency {
    pub fn from_days_remaining(days: Option<i64>) -> Self {
        match days {
            None => ExpiryUrgency::NoExpiry,
            Some(d) if d < 0 => ExpiryUrgency::Expired,
            Some(d) if d <= 7 => ExpiryUrgency::Critical,
            Some(d) if d <= 14 => ExpiryUrgency::High,
            Some(d) if d <= 30 => ExpiryUrgency::Medium,
            Some(_) => ExpiryUrgency::Low,
        }
    }

    /// 展示排序档位: 行动优先级在前, 过期居中, 远期与无效期垫底
    pub fn display_rank(&self) -> i32 {
        match self {
            ExpiryUrgency::Critical => 0,
            ExpiryUrgency::High => 1,
            ExpiryUrgency::Medium => 2,
            ExpiryUrgency::Expired => 3,
            ExpiryUrgency::Low => 4,
            ExpiryUrgency::NoExpiry => 5,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExpiryUrgency::Expired => "EXPIRED",
            ExpiryUrgency::Critical => "CRITICAL",
            ExpiryUrgency::High => "HIGH",
            ExpiryUrgency::Medium => "MEDIUM",
            ExpiryUrgency::Low => "LOW",
            ExpiryUrgency::NoExpiry => "NO_EXPIRY",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "EXPIRED" => ExpiryUrgency::Expired,
            "CRITICAL" => ExpiryUrgency::Critical,
            "HIGH" => ExpiryUrgency::High,
            "MEDIUM" => ExpiryUrgency::Medium,
            "LOW" => ExpiryUrgency::Low,
            _ => ExpiryUrgency::NoExpiry,
        }
    }
}

impl fmt::Display for ExpiryUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 派生事实种类 (Fact Kind)
// ==========================================
// 每个派生事实独立重算、独立重试、独立新鲜度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactKind {
    LocationSummary,
    ZoneCapacity,
    Discrepancy,
    Expiry,
    CategoryCapacity,
    Unassigned,
}

impl FactKind {
    pub const ALL: [FactKind; 6] = [
        FactKind::LocationSummary,
        FactKind::ZoneCapacity,
        FactKind::Discrepancy,
        FactKind::Expiry,
        FactKind::CategoryCapacity,
        FactKind::Unassigned,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            FactKind::LocationSummary => "LOCATION_SUMMARY",
            FactKind::ZoneCapacity => "ZONE_CAPACITY",
            FactKind::Discrepancy => "DISCREPANCY",
            FactKind::Expiry => "EXPIRY",
            FactKind::CategoryCapacity => "CATEGORY_CAPACITY",
            FactKind::Unassigned => "UNASSIGNED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOCATION_SUMMARY" => Some(FactKind::LocationSummary),
            "ZONE_CAPACITY" => Some(FactKind::ZoneCapacity),
            "DISCREPANCY" => Some(FactKind::Discrepancy),
            "EXPIRY" => Some(FactKind::Expiry),
            "CATEGORY_CAPACITY" => Some(FactKind::CategoryCapacity),
            "UNASSIGNED" => Some(FactKind::Unassigned),
            _ => None,
        }
    }

    /// 输出表名(重算-替换的目标表)
    pub fn table_name(&self) -> &str {
        match self {
            FactKind::LocationSummary => "location_summary",
            FactKind::ZoneCapacity => "zone_capacity",
            FactKind::Discrepancy => "stock_discrepancy",
            FactKind::Expiry => "expiring_item",
            FactKind::CategoryCapacity => "category_capacity",
            FactKind::Unassigned => "unassigned_location",
        }
    }

    /// 是否依赖布局(布局变更时需标脏)
    ///
    /// 差异/效期事实只依赖原始批次数据, 布局变更不影响
    pub fn depends_on_layout(&self) -> bool {
        matches!(
            self,
            FactKind::LocationSummary
                | FactKind::ZoneCapacity
                | FactKind::CategoryCapacity
                | FactKind::Unassigned
        )
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 事实新鲜度状态 (Fact State)
// ==========================================
// 状态机: Stale → Refreshing → Fresh | Failed
// 超时回退 Stale(区分"没跑完"与"跑了但出错")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactState {
    Stale,
    Refreshing,
    Fresh,
    Failed,
}

impl FactState {
    pub fn as_str(&self) -> &str {
        match self {
            FactState::Stale => "STALE",
            FactState::Refreshing => "REFRESHING",
            FactState::Fresh => "FRESH",
            FactState::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "REFRESHING" => FactState::Refreshing,
            "FRESH" => FactState::Fresh,
            "FAILED" => FactState::Failed,
            _ => FactState::Stale,
        }
    }
}

impl fmt::Display for FactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::R0));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::R90));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::R270));
        assert_eq!(Rotation::from_degrees(45), None, "非直角应拒绝");
        assert_eq!(Rotation::from_degrees(360), None, "360 不是合法档位");
    }

    #[test]
    fn test_rotation_axis_swap() {
        assert!(!Rotation::R0.swaps_axes());
        assert!(Rotation::R90.swaps_axes());
        assert!(!Rotation::R180.swaps_axes());
        assert!(Rotation::R270.swaps_axes());
    }

    #[test]
    fn test_capacity_status_thresholds() {
        assert_eq!(CapacityStatus::from_utilization(0, 50.0), CapacityStatus::NoCapacity);
        assert_eq!(CapacityStatus::from_utilization(0, 0.0), CapacityStatus::NoCapacity);
        assert_eq!(CapacityStatus::from_utilization(10, 95.0), CapacityStatus::Critical);
        assert_eq!(CapacityStatus::from_utilization(10, 90.0), CapacityStatus::Critical);
        assert_eq!(CapacityStatus::from_utilization(10, 89.99), CapacityStatus::High);
        assert_eq!(CapacityStatus::from_utilization(10, 70.0), CapacityStatus::High);
        assert_eq!(CapacityStatus::from_utilization(10, 50.0), CapacityStatus::Medium);
        assert_eq!(CapacityStatus::from_utilization(10, 41.67), CapacityStatus::Low);
    }

    #[test]
    fn test_discrepancy_severity_boundaries() {
        assert_eq!(DiscrepancySeverity::from_delta(0.0), DiscrepancySeverity::Match);
        assert_eq!(DiscrepancySeverity::from_delta(-9.0), DiscrepancySeverity::Minor);
        assert_eq!(DiscrepancySeverity::from_delta(9.99), DiscrepancySeverity::Minor);
        assert_eq!(DiscrepancySeverity::from_delta(10.0), DiscrepancySeverity::Moderate);
        assert_eq!(DiscrepancySeverity::from_delta(-999.0), DiscrepancySeverity::High);
        assert_eq!(DiscrepancySeverity::from_delta(1000.0), DiscrepancySeverity::Critical);
    }

    #[test]
    fn test_expiry_urgency_boundaries() {
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(-1)), ExpiryUrgency::Expired);
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(0)), ExpiryUrgency::Critical);
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(7)), ExpiryUrgency::Critical);
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(8)), ExpiryUrgency::High);
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(15)), ExpiryUrgency::Medium);
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(30)), ExpiryUrgency::Medium);
        assert_eq!(ExpiryUrgency::from_days_remaining(Some(31)), ExpiryUrgency::Low);
        assert_eq!(ExpiryUrgency::from_days_remaining(None), ExpiryUrgency::NoExpiry);
    }

    #[test]
    fn test_expiry_display_rank_order() {
        // 展示顺序: critical → high → medium → expired → low → no_expiry
        let order = [
            ExpiryUrgency::Critical,
            ExpiryUrgency::High,
            ExpiryUrgency::Medium,
            ExpiryUrgency::Expired,
            ExpiryUrgency::Low,
            ExpiryUrgency::NoExpiry,
        ];
        for w in order.windows(2) {
            assert!(w[0].display_rank() < w[1].display_rank());
        }
    }

    #[test]
    fn test_fact_kind_layout_dependency() {
        assert!(FactKind::LocationSummary.depends_on_layout());
        assert!(FactKind::ZoneCapacity.depends_on_layout());
        assert!(FactKind::CategoryCapacity.depends_on_layout());
        assert!(FactKind::Unassigned.depends_on_layout());
        assert!(!FactKind::Discrepancy.depends_on_layout());
        assert!(!FactKind::Expiry.depends_on_layout());
    }

    #[test]
    fn test_fact_state_roundtrip() {
        for s in [FactState::Stale, FactState::Refreshing, FactState::Fresh, FactState::Failed] {
            assert_eq!(FactState::from_str(s.as_str()), s);
        }
    }
}
