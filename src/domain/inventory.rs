// ==========================================
// 仓库布局与库存对账系统 - 原始库存快照行
// ==========================================
// 职责: 两套来源系统的只追加快照行定义
// 红线: 快照行不可变, 重新拉取以新批次整体取代
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::SourceFeed;

/// 缺失批号时的占位键(差异分组用)
pub const NO_LOT_KEY: &str = "NO_LOT";

/// 原始库存快照行
///
/// cell_identifier 为来源系统的自由文本库位标识,
/// 入库后由匹配器解析, 本结构不做任何解释
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInventoryRecord {
    pub id: i64,
    pub source: SourceFeed,
    pub zone_code: String,
    pub cell_identifier: String,
    pub item_code: String,
    pub lot_key: Option<String>,
    pub available_qty: f64,
    pub total_qty: f64,
    pub inb_date: Option<NaiveDate>,
    pub valid_date: Option<NaiveDate>,
    /// 拉取批次号(同一 feed+zone 以最新批次为准)
    pub batch_id: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawInventoryRecord {
    /// 差异分组用批次键(缺失 → NO_LOT)
    pub fn lot_group_key(&self) -> &str {
        self.lot_key.as_deref().unwrap_or(NO_LOT_KEY)
    }

    /// 归一化库位标识: 去首尾空白 + 大写
    pub fn normalized_identifier(&self) -> String {
        normalize_identifier(&self.cell_identifier)
    }
}

/// 库位标识归一化(匹配器与分组共用同一口径)
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("  a1-1-2 "), "A1-1-2");
        assert_eq!(normalize_identifier("Z1-f01"), "Z1-F01");
        assert_eq!(normalize_identifier(""), "");
    }

    #[test]
    fn test_lot_group_key() {
        let mut r = RawInventoryRecord {
            id: 1,
            source: SourceFeed::Operational,
            zone_code: "Z1".to_string(),
            cell_identifier: "A1".to_string(),
            item_code: "SKU-1".to_string(),
            lot_key: Some("L001".to_string()),
            available_qty: 5.0,
            total_qty: 5.0,
            inb_date: None,
            valid_date: None,
            batch_id: "b1".to_string(),
            fetched_at: Utc::now(),
        };
        assert_eq!(r.lot_group_key(), "L001");
        r.lot_key = None;
        assert_eq!(r.lot_group_key(), NO_LOT_KEY);
    }
}
