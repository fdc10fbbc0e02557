// ==========================================
// 对账刷新服务 - F2 区域容量
// ==========================================
// 名义容量 = Σ 物理组件; total_stock = 匹配成功的作业口径行数
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use std::collections::HashSet;

use super::core::{utilization_pct, ZoneSnapshot};
use super::*;
use crate::domain::types::CapacityStatus;
use crate::engine::matcher::{LocationMatcher, MatchOutcome};

impl ReconRefreshService {
    pub(super) fn refresh_zone_capacity(
        &self,
        tx: &Transaction,
        snapshot: &ZoneSnapshot,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let matcher = LocationMatcher::new(&snapshot.components);

        let mut total_capacity = 0i64;
        let mut location_count = 0i64;
        for component in snapshot.components.iter().filter(|c| c.is_physical()) {
            total_capacity += component.nominal_capacity().unwrap_or(0);
            location_count += 1;
        }

        let mut total_stock = 0i64;
        let mut items: HashSet<&str> = HashSet::new();
        for record in &snapshot.operational {
            match matcher.match_identifier(&record.cell_identifier) {
                MatchOutcome::Component { .. } | MatchOutcome::RackCell { .. } => {
                    total_stock += 1;
                    items.insert(record.item_code.as_str());
                }
                _ => {}
            }
        }

        let pct = utilization_pct(total_stock, total_capacity);
        let status = CapacityStatus::from_utilization(total_capacity, pct);

        tx.execute(
            "DELETE FROM zone_capacity WHERE zone_code = ?1",
            params![snapshot.zone_code],
        )?;
        tx.execute(
            "INSERT INTO zone_capacity
                 (zone_code, total_capacity, total_stock, utilization_pct, status,
                  location_count, unique_items, computed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snapshot.zone_code,
                total_capacity,
                total_stock,
                pct,
                status.as_str(),
                location_count,
                items.len() as i64,
                computed_at
            ],
        )?;
        Ok(1)
    }
}
