// ==========================================
// 对账刷新服务 - F5 分类容量
// ==========================================
// 受限单元格按生效限制的大类归集容量;
// 落在受限格但不符合限制的行计入 mismatched_stock; 两者均为行数口径
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use std::collections::HashMap;

use super::core::{utilization_pct, ZoneSnapshot};
use super::*;
use crate::domain::component::{Component, ComponentKind, MaterialFilter};
use crate::domain::types::CapacityStatus;
use crate::engine::matcher::{LocationMatcher, MatchOutcome};
use crate::repository::inventory_repo::ItemCategory;

#[derive(Default)]
struct CategoryBucket {
    capacity: i64,
    current_stock: i64,
    mismatched_stock: i64,
}

impl ReconRefreshService {
    pub(super) fn refresh_category_capacity(
        &self,
        tx: &Transaction,
        snapshot: &ZoneSnapshot,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let categories = load_category_map(tx)?;
        let matcher = LocationMatcher::new(&snapshot.components);
        let mut buckets: HashMap<String, CategoryBucket> = HashMap::new();

        // 容量归集: 按生效限制的大类逐格累加
        for component in snapshot.components.iter().filter(|c| c.is_physical()) {
            accumulate_capacity(component, &mut buckets);
        }

        // 库存归集: 落在受限格的行按"符合/不符合限制"分列
        for record in &snapshot.operational {
            let placement = match matcher.match_identifier(&record.cell_identifier) {
                MatchOutcome::RackCell { component_id, floor, cell, .. } => {
                    Some((component_id, Some((floor, cell))))
                }
                MatchOutcome::Component { component_id, .. } => Some((component_id, None)),
                _ => None,
            };
            let Some((component_id, cell)) = placement else { continue };
            let Some(component) = snapshot.components.iter().find(|c| c.id == component_id) else {
                continue;
            };
            let filter = match cell {
                Some((floor, cell)) => component.effective_filter(floor, cell),
                None => component.filter.as_ref(),
            };
            let Some(filter) = filter else { continue };
            let Some(major) = filter.major_category.as_deref() else { continue };

            let category = categories.get(&record.item_code).cloned().unwrap_or_default();
            let bucket = buckets.entry(major.to_string()).or_default();
            if filter.permits(
                category.major_category.as_deref(),
                category.minor_category.as_deref(),
                &record.item_code,
            ) {
                bucket.current_stock += 1;
            } else {
                bucket.mismatched_stock += 1;
            }
        }

        tx.execute(
            "DELETE FROM category_capacity WHERE zone_code = ?1",
            params![snapshot.zone_code],
        )?;
        let mut names: Vec<&String> = buckets.keys().collect();
        names.sort();
        let names: Vec<String> = names.into_iter().cloned().collect();
        let mut rows = 0usize;
        for name in names {
            let bucket = &buckets[&name];
            let pct = utilization_pct(bucket.current_stock, bucket.capacity);
            let status = CapacityStatus::from_utilization(bucket.capacity, pct);
            tx.execute(
                "INSERT INTO category_capacity
                     (zone_code, category, capacity, current_stock, mismatched_stock,
                      utilization_pct, status, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    snapshot.zone_code,
                    name,
                    bucket.capacity,
                    bucket.current_stock,
                    bucket.mismatched_stock,
                    pct,
                    status.as_str(),
                    computed_at
                ],
            )?;
            rows += 1;
        }
        Ok(rows)
    }
}

/// 组件容量按大类逐格归集
fn accumulate_capacity(component: &Component, buckets: &mut HashMap<String, CategoryBucket>) {
    match &component.kind {
        ComponentKind::Rack { floors, rows, cell_available, cell_multiplier, .. } => {
            for floor in 1..=*floors {
                for cell in 1..=*rows {
                    let available = cell_available
                        .as_ref()
                        .and_then(|g| g.get(floor - 1))
                        .and_then(|row| row.get(cell - 1))
                        .copied()
                        .unwrap_or(true);
                    if !available {
                        continue;
                    }
                    let Some(major) = component
                        .effective_filter(floor, cell)
                        .and_then(|f| f.major_category.as_deref())
                    else {
                        continue;
                    };
                    let cap = cell_multiplier
                        .as_ref()
                        .and_then(|g| g.get(floor - 1))
                        .and_then(|row| row.get(cell - 1))
                        .copied()
                        .unwrap_or(1);
                    buckets.entry(major.to_string()).or_default().capacity += cap;
                }
            }
        }
        ComponentKind::Flat { .. } => {
            let restricted_major = component
                .filter
                .as_ref()
                .and_then(|f: &MaterialFilter| f.major_category.as_deref());
            if let Some(major) = restricted_major {
                buckets.entry(major.to_string()).or_default().capacity +=
                    component.nominal_capacity().unwrap_or(0);
            }
        }
    }
}

fn load_category_map(tx: &Transaction) -> RepositoryResult<HashMap<String, ItemCategory>> {
    let mut stmt =
        tx.prepare("SELECT item_code, major_category, minor_category FROM item_category")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            ItemCategory { major_category: row.get(1)?, minor_category: row.get(2)? },
        ))
    })?;
    let mut map = HashMap::new();
    for row in rows {
        let (item, category) = row?;
        map.insert(item, category);
    }
    Ok(map)
}
