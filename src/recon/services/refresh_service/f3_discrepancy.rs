// ==========================================
// 对账刷新服务 - F3 跨源差异
// ==========================================
// 分组键: (库位组, 物料, 批次); delta = 企业 − 作业
// 作业口径标识经匹配器汇到组件基础编码; 企业口径按归一化原文分组
// |Δ| < 1 不保留; 按 |Δ| 降序截取 top N
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use std::collections::HashMap;

use super::core::{RefreshSettings, ZoneSnapshot};
use super::*;
use crate::domain::types::DiscrepancySeverity;
use crate::engine::matcher::{LocationMatcher, MatchOutcome};

/// (库位组, 物料, 批次) → (作业数量, 企业数量)
type GroupMap = HashMap<(String, String, String), (f64, f64)>;

impl ReconRefreshService {
    pub(super) fn refresh_discrepancy(
        &self,
        tx: &Transaction,
        snapshot: &ZoneSnapshot,
        settings: &RefreshSettings,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let matcher = LocationMatcher::new(&snapshot.components);
        let mut groups: GroupMap = HashMap::new();

        for record in &snapshot.operational {
            // 格位级标识汇到组件基础编码, 两套口径才能对上
            let group = match matcher.match_identifier(&record.cell_identifier) {
                MatchOutcome::Component { location, .. }
                | MatchOutcome::RackCell { location, .. } => location,
                _ => record.normalized_identifier(),
            };
            let key = (group, record.item_code.clone(), record.lot_group_key().to_string());
            groups.entry(key).or_insert((0.0, 0.0)).0 += record.available_qty;
        }
        for record in &snapshot.enterprise {
            let key = (
                record.normalized_identifier(),
                record.item_code.clone(),
                record.lot_group_key().to_string(),
            );
            groups.entry(key).or_insert((0.0, 0.0)).1 += record.available_qty;
        }

        let mut discrepancies: Vec<((String, String, String), f64, f64, f64)> = groups
            .into_iter()
            .filter_map(|(key, (op, ent))| {
                let delta = ent - op;
                // 计量噪声不呈现
                if delta.abs() < 1.0 {
                    return None;
                }
                Some((key, op, ent, delta))
            })
            .collect();
        discrepancies.sort_by(|a, b| {
            b.3.abs()
                .partial_cmp(&a.3.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        discrepancies.truncate(settings.discrepancy_top_n);

        tx.execute(
            "DELETE FROM stock_discrepancy WHERE zone_code = ?1",
            params![snapshot.zone_code],
        )?;
        let mut rows = 0usize;
        for ((group, item, lot), op, ent, delta) in discrepancies {
            tx.execute(
                "INSERT INTO stock_discrepancy
                     (zone_code, location_group, item_code, lot_key, operational_qty,
                      enterprise_qty, delta, severity, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    snapshot.zone_code,
                    group,
                    item,
                    lot,
                    op,
                    ent,
                    delta,
                    DiscrepancySeverity::from_delta(delta).as_str(),
                    computed_at
                ],
            )?;
            rows += 1;
        }
        Ok(rows)
    }
}
