// ==========================================
// 仓库布局与库存对账系统 - 事实读模型
// ==========================================
// 职责: 六张事实表的只读访问, 每次读取附带新鲜度标签
// 红线: 读模型永不回写事实表; 过期数据照常返回并如实标注
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::facts::{
    CategoryCapacity, ExpiringItem, LocationSummary, StockDiscrepancy, UnassignedLocation,
    ZoneCapacitySummary,
};
use crate::domain::types::{
    CapacityStatus, DiscrepancySeverity, ExpiryUrgency, FactKind, FactState,
};
use crate::recon::status::FactStatusRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 读取结果: 行集 + 新鲜度标签
#[derive(Debug, Clone, PartialEq)]
pub struct FactReadResult<T> {
    pub rows: T,
    pub state: FactState,
    pub last_computed_at: Option<DateTime<Utc>>,
}

impl<T> FactReadResult<T> {
    pub fn is_fresh(&self) -> bool {
        self.state == FactState::Fresh
    }
}

// ==========================================
// FactReadRepository
// ==========================================
pub struct FactReadRepository {
    conn: Arc<Mutex<Connection>>,
    status: FactStatusRepository,
}

impl FactReadRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let status = FactStatusRepository::new(Arc::clone(&conn));
        Self { conn, status }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    fn tag<T>(&self, fact: FactKind, zone_code: &str, rows: T) -> RepositoryResult<FactReadResult<T>> {
        let status = self.status.get(fact, zone_code)?;
        Ok(FactReadResult {
            rows,
            state: status.state,
            last_computed_at: status.last_computed_at,
        })
    }

    // ===== F1 库位汇总 =====

    pub fn location_summaries(
        &self,
        zone_code: &str,
    ) -> RepositoryResult<FactReadResult<Vec<LocationSummary>>> {
        let rows = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT zone_code, component_id, location, current_stock, max_capacity,
                        utilization_pct, status, lot_distribution_json, materials_summary_json,
                        computed_at
                 FROM location_summary WHERE zone_code = ?1 ORDER BY location",
            )?;
            let mapped = stmt.query_map(params![zone_code], Self::row_to_location_summary)?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        self.tag(FactKind::LocationSummary, zone_code, rows)
    }

    fn row_to_location_summary(row: &Row<'_>) -> rusqlite::Result<LocationSummary> {
        let status: String = row.get(6)?;
        let lot_json: String = row.get(7)?;
        let materials_json: String = row.get(8)?;
        let lot_distribution = serde_json::from_str(&lot_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let materials_summary = serde_json::from_str(&materials_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(LocationSummary {
            zone_code: row.get(0)?,
            component_id: row.get(1)?,
            location: row.get(2)?,
            current_stock: row.get(3)?,
            max_capacity: row.get(4)?,
            utilization_pct: row.get(5)?,
            status: CapacityStatus::from_str(&status),
            lot_distribution,
            materials_summary,
            computed_at: row.get(9)?,
        })
    }

    // ===== F2 区域容量 =====

    pub fn zone_capacity(
        &self,
        zone_code: &str,
    ) -> RepositoryResult<FactReadResult<Option<ZoneCapacitySummary>>> {
        let row = {
            let conn = self.get_conn()?;
            conn.query_row(
                "SELECT zone_code, total_capacity, total_stock, utilization_pct, status,
                        location_count, unique_items, computed_at
                 FROM zone_capacity WHERE zone_code = ?1",
                params![zone_code],
                |row| {
                    let status: String = row.get(4)?;
                    Ok(ZoneCapacitySummary {
                        zone_code: row.get(0)?,
                        total_capacity: row.get(1)?,
                        total_stock: row.get(2)?,
                        utilization_pct: row.get(3)?,
                        status: CapacityStatus::from_str(&status),
                        location_count: row.get(5)?,
                        unique_items: row.get(6)?,
                        computed_at: row.get(7)?,
                    })
                },
            )
            .optional()?
        };
        self.tag(FactKind::ZoneCapacity, zone_code, row)
    }

    // ===== F3 跨源差异 =====

    pub fn discrepancies(
        &self,
        zone_code: &str,
    ) -> RepositoryResult<FactReadResult<Vec<StockDiscrepancy>>> {
        let rows = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT zone_code, location_group, item_code, lot_key, operational_qty,
                        enterprise_qty, delta, severity, computed_at
                 FROM stock_discrepancy WHERE zone_code = ?1
                 ORDER BY ABS(delta) DESC, location_group, item_code",
            )?;
            let mapped = stmt.query_map(params![zone_code], |row| {
                let severity: String = row.get(7)?;
                Ok(StockDiscrepancy {
                    zone_code: row.get(0)?,
                    location_group: row.get(1)?,
                    item_code: row.get(2)?,
                    lot_key: row.get(3)?,
                    operational_qty: row.get(4)?,
                    enterprise_qty: row.get(5)?,
                    delta: row.get(6)?,
                    severity: DiscrepancySeverity::from_str(&severity),
                    computed_at: row.get(8)?,
                })
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        self.tag(FactKind::Discrepancy, zone_code, rows)
    }

    // ===== F4 效期桶 =====

    pub fn expiring_items(
        &self,
        zone_code: &str,
    ) -> RepositoryResult<FactReadResult<Vec<ExpiringItem>>> {
        let rows = {
            let conn = self.get_conn()?;
            // 重算时已按展示顺序写入
            let mut stmt = conn.prepare(
                "SELECT zone_code, item_code, lot_key, available_qty, location, valid_date,
                        days_remaining, urgency, computed_at
                 FROM expiring_item WHERE zone_code = ?1 ORDER BY rowid",
            )?;
            let mapped = stmt.query_map(params![zone_code], |row| {
                let urgency: String = row.get(7)?;
                Ok(ExpiringItem {
                    zone_code: row.get(0)?,
                    item_code: row.get(1)?,
                    lot_key: row.get(2)?,
                    available_qty: row.get(3)?,
                    location: row.get(4)?,
                    valid_date: row.get(5)?,
                    days_remaining: row.get(6)?,
                    urgency: ExpiryUrgency::from_str(&urgency),
                    computed_at: row.get(8)?,
                })
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        self.tag(FactKind::Expiry, zone_code, rows)
    }

    // ===== F5 分类容量 =====

    pub fn category_capacities(
        &self,
        zone_code: &str,
    ) -> RepositoryResult<FactReadResult<Vec<CategoryCapacity>>> {
        let rows = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT zone_code, category, capacity, current_stock, mismatched_stock,
                        utilization_pct, status, computed_at
                 FROM category_capacity WHERE zone_code = ?1 ORDER BY category",
            )?;
            let mapped = stmt.query_map(params![zone_code], |row| {
                let status: String = row.get(6)?;
                Ok(CategoryCapacity {
                    zone_code: row.get(0)?,
                    category: row.get(1)?,
                    capacity: row.get(2)?,
                    current_stock: row.get(3)?,
                    mismatched_stock: row.get(4)?,
                    utilization_pct: row.get(5)?,
                    status: CapacityStatus::from_str(&status),
                    computed_at: row.get(7)?,
                })
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        self.tag(FactKind::CategoryCapacity, zone_code, rows)
    }

    // ===== F6 未匹配库位 =====

    pub fn unassigned_locations(
        &self,
        zone_code: &str,
    ) -> RepositoryResult<FactReadResult<Vec<UnassignedLocation>>> {
        let rows = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT zone_code, identifier, record_count, total_qty, computed_at
                 FROM unassigned_location WHERE zone_code = ?1 ORDER BY total_qty DESC, identifier",
            )?;
            let mapped = stmt.query_map(params![zone_code], |row| {
                Ok(UnassignedLocation {
                    zone_code: row.get(0)?,
                    identifier: row.get(1)?,
                    record_count: row.get(2)?,
                    total_qty: row.get(3)?,
                    computed_at: row.get(4)?,
                })
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        self.tag(FactKind::Unassigned, zone_code, rows)
    }
}
