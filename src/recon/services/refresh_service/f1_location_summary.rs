// ==========================================
// 对账刷新服务 - F1 库位汇总
// ==========================================
// 每个物理组件一行(含零库存); 多义行不归属、计数后跳过
// current_stock = 匹配行数; 批次/物料分布保留数量合计
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use std::collections::HashMap;

use super::core::{utilization_pct, ZoneSnapshot};
use super::*;
use crate::domain::facts::{LotQty, MaterialSummaryEntry};
use crate::domain::types::CapacityStatus;
use crate::engine::matcher::{LocationMatcher, MatchOutcome};

#[derive(Default)]
struct ComponentBucket {
    /// 匹配到该组件的行数
    record_count: i64,
    /// lot_key → 数量
    lots: HashMap<String, f64>,
    /// item_code → (数量, 批次集合)
    materials: HashMap<String, (f64, Vec<String>)>,
}

impl ReconRefreshService {
    /// # 返回
    /// - (写入行数, 多义匹配条数)
    pub(super) fn refresh_location_summary(
        &self,
        tx: &Transaction,
        snapshot: &ZoneSnapshot,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<(usize, usize)> {
        let matcher = LocationMatcher::new(&snapshot.components);
        let mut buckets: HashMap<String, ComponentBucket> = HashMap::new();
        let mut ambiguous = 0usize;

        for record in &snapshot.operational {
            match matcher.match_identifier(&record.cell_identifier) {
                MatchOutcome::Component { component_id, .. }
                | MatchOutcome::RackCell { component_id, .. } => {
                    let bucket = buckets.entry(component_id).or_default();
                    bucket.record_count += 1;
                    let lot = record.lot_group_key().to_string();
                    *bucket.lots.entry(lot.clone()).or_insert(0.0) += record.available_qty;
                    let entry = bucket
                        .materials
                        .entry(record.item_code.clone())
                        .or_insert((0.0, Vec::new()));
                    entry.0 += record.available_qty;
                    if !entry.1.contains(&lot) {
                        entry.1.push(lot);
                    }
                }
                MatchOutcome::Ambiguous { candidates } => {
                    ambiguous += 1;
                    tracing::warn!(
                        zone = snapshot.zone_code,
                        identifier = record.cell_identifier,
                        candidates = ?candidates,
                        "库位标识多义, 不归属任何组件"
                    );
                }
                MatchOutcome::Unassigned => {}
            }
        }

        tx.execute(
            "DELETE FROM location_summary WHERE zone_code = ?1",
            params![snapshot.zone_code],
        )?;

        let mut rows = 0usize;
        for component in snapshot.components.iter().filter(|c| c.is_physical()) {
            let bucket = buckets.remove(component.id.as_str()).unwrap_or_default();
            let capacity = component.nominal_capacity().unwrap_or(0);
            let pct = utilization_pct(bucket.record_count, capacity);
            let status = CapacityStatus::from_utilization(capacity, pct);

            let mut lot_distribution: Vec<LotQty> = bucket
                .lots
                .into_iter()
                .map(|(lot_key, qty)| LotQty { lot_key, qty })
                .collect();
            lot_distribution.sort_by(|a, b| {
                b.qty.partial_cmp(&a.qty).unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.lot_key.cmp(&b.lot_key))
            });

            let mut materials_summary: Vec<MaterialSummaryEntry> = bucket
                .materials
                .into_iter()
                .map(|(item_code, (total_qty, mut lots))| {
                    lots.sort();
                    MaterialSummaryEntry { item_code, total_qty, lots }
                })
                .collect();
            materials_summary.sort_by(|a, b| {
                b.total_qty.partial_cmp(&a.total_qty).unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.item_code.cmp(&b.item_code))
            });

            let lot_json = serde_json::to_string(&lot_distribution)
                .map_err(|e| RepositoryError::InternalError(format!("批次分布序列化失败: {}", e)))?;
            let materials_json = serde_json::to_string(&materials_summary)
                .map_err(|e| RepositoryError::InternalError(format!("物料汇总序列化失败: {}", e)))?;

            tx.execute(
                "INSERT INTO location_summary
                     (zone_code, component_id, location, current_stock, max_capacity,
                      utilization_pct, status, lot_distribution_json, materials_summary_json,
                      computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    snapshot.zone_code,
                    component.id,
                    component.location,
                    bucket.record_count,
                    capacity,
                    pct,
                    status.as_str(),
                    lot_json,
                    materials_json,
                    computed_at
                ],
            )?;
            rows += 1;
        }

        Ok((rows, ambiguous))
    }
}
