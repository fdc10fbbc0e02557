// ==========================================
// 对账刷新服务 - F6 未匹配库位
// ==========================================
// 作业口径中匹配不到任何组件的标识, 按归一化原文去重;
// 多义标识已在 F1 计数呈现, 不混入未匹配清单
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use std::collections::HashMap;

use super::core::ZoneSnapshot;
use super::*;
use crate::engine::matcher::{LocationMatcher, MatchOutcome};

impl ReconRefreshService {
    pub(super) fn refresh_unassigned(
        &self,
        tx: &Transaction,
        snapshot: &ZoneSnapshot,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let matcher = LocationMatcher::new(&snapshot.components);
        // 标识 → (行数, 数量)
        let mut groups: HashMap<String, (i64, f64)> = HashMap::new();

        for record in &snapshot.operational {
            if matcher.match_identifier(&record.cell_identifier) == MatchOutcome::Unassigned {
                let entry = groups.entry(record.normalized_identifier()).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += record.available_qty;
            }
        }

        tx.execute(
            "DELETE FROM unassigned_location WHERE zone_code = ?1",
            params![snapshot.zone_code],
        )?;
        let mut identifiers: Vec<String> = groups.keys().cloned().collect();
        identifiers.sort();
        let mut rows = 0usize;
        for identifier in identifiers {
            let (record_count, total_qty) = groups[&identifier];
            tx.execute(
                "INSERT INTO unassigned_location
                     (zone_code, identifier, record_count, total_qty, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![snapshot.zone_code, identifier, record_count, total_qty, computed_at],
            )?;
            rows += 1;
        }
        Ok(rows)
    }
}
