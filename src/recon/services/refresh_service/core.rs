// ==========================================
// 对账刷新服务 - 主流程
// ==========================================
// 刷新流程: 日志起笔 → 逐事实"取权-重算-替换-落状态" → 日志收笔
// 每个事实一个独立事务; 单个失败记 FAILED 后继续其余事实
// ==========================================

use chrono::Utc;
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use super::*;
use crate::domain::component::Component;
use crate::domain::inventory::RawInventoryRecord;
use crate::domain::types::{FactKind, Rotation, SourceFeed, ZoneType};

/// 一次刷新运行的结果汇总
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSummary {
    pub refresh_id: String,
    pub facts_refreshed: usize,
    pub facts_failed: usize,
    pub ambiguous_matches: usize,
    pub duration_ms: i64,
}

/// 重算参数快照(事务外读一次, 避免重算中途变化)
pub(super) struct RefreshSettings {
    pub expiry_past_window_days: i64,
    pub expiry_future_window_days: i64,
    pub expiry_top_n: usize,
    pub discrepancy_top_n: usize,
}

/// 单区域重算的输入快照: 布局组件 + 两套来源的最新批次
pub(super) struct ZoneSnapshot {
    pub zone_code: String,
    pub components: Vec<Component>,
    pub operational: Vec<RawInventoryRecord>,
    pub enterprise: Vec<RawInventoryRecord>,
}

impl ReconRefreshService {
    /// 执行一次刷新
    ///
    /// # 参数
    /// - scope: 区域作用域(None = 全部区域)
    /// - trigger: 触发类型, 决定参与重算的事实集合
    /// - trigger_source: 触发来源描述(入日志)
    pub fn refresh_all(
        &self,
        scope: &RefreshScope,
        trigger: RefreshTrigger,
        trigger_source: Option<&str>,
    ) -> RepositoryResult<RefreshSummary> {
        let refresh_id = Uuid::new_v4().to_string();
        let started = std::time::Instant::now();
        let started_at = Utc::now();

        tracing::info!(
            refresh_id = %refresh_id,
            scope = scope.scope_key(),
            trigger = trigger.as_str(),
            source = trigger_source.unwrap_or("-"),
            "刷新开始"
        );
        self.log_refresh_start(&refresh_id, scope, trigger, started_at)?;

        let settings = self.load_settings()?;
        let timeout_ms = self
            .config
            .get_refresh_timeout_ms()
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let zones = self.resolve_zones(scope)?;

        let mut refreshed = 0usize;
        let mut failed = 0usize;
        let mut ambiguous_total = 0usize;
        let mut last_error: Option<String> = None;

        for fact in FactKind::ALL {
            if !Self::should_refresh(fact, trigger) {
                continue;
            }
            for zone in &zones {
                // 合并: 同一 (fact, scope) 已有在途重算则观察其结果
                if !self.status.try_begin_refresh(fact, zone, Utc::now(), timeout_ms)? {
                    tracing::debug!(fact = fact.as_str(), zone, "已有在途重算, 跳过");
                    continue;
                }
                match self.refresh_fact(fact, zone, &settings) {
                    Ok((rows, ambiguous)) => {
                        ambiguous_total += ambiguous;
                        self.status.complete_refresh(fact, zone, Utc::now())?;
                        refreshed += 1;
                        tracing::info!(fact = fact.as_str(), zone, rows, "事实重算完成");
                    }
                    Err(e) => {
                        let msg = e.to_string();
                        self.status.fail_refresh(fact, zone, &msg)?;
                        failed += 1;
                        tracing::warn!(fact = fact.as_str(), zone, error = %msg, "事实重算失败, 继续其余事实");
                        last_error = Some(msg);
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as i64;
        let run_status = if failed == 0 {
            "SUCCESS"
        } else if refreshed > 0 {
            "PARTIAL"
        } else {
            "FAILED"
        };
        self.log_refresh_complete(
            &refresh_id,
            run_status,
            refreshed,
            failed,
            ambiguous_total,
            duration_ms,
            last_error.as_deref(),
        )?;

        tracing::info!(
            refresh_id = %refresh_id,
            status = run_status,
            facts_refreshed = refreshed,
            facts_failed = failed,
            ambiguous_matches = ambiguous_total,
            duration_ms,
            "刷新结束"
        );

        Ok(RefreshSummary {
            refresh_id,
            facts_refreshed: refreshed,
            facts_failed: failed,
            ambiguous_matches: ambiguous_total,
            duration_ms,
        })
    }

    /// 触发类型 → 参与重算的事实
    ///
    /// 布局突变只影响布局依赖的事实; 摄取与手动触发重算全部
    fn should_refresh(fact: FactKind, trigger: RefreshTrigger) -> bool {
        match trigger {
            RefreshTrigger::LayoutChanged => fact.depends_on_layout(),
            RefreshTrigger::InventoryIngested | RefreshTrigger::ManualRefresh => true,
        }
    }

    fn load_settings(&self) -> RepositoryResult<RefreshSettings> {
        let map_err = |e: Box<dyn std::error::Error>| RepositoryError::InternalError(e.to_string());
        Ok(RefreshSettings {
            expiry_past_window_days: self.config.get_expiry_past_window_days().map_err(map_err)?,
            expiry_future_window_days: self
                .config
                .get_expiry_future_window_days()
                .map_err(map_err)?,
            expiry_top_n: self.config.get_expiry_top_n().map_err(map_err)?,
            discrepancy_top_n: self.config.get_discrepancy_top_n().map_err(map_err)?,
        })
    }

    /// 作用域 → 区域清单
    ///
    /// 全量作用域取"布局登记区域 ∪ 出现过快照行的区域",
    /// 保证无布局登记的区域也能产出未匹配事实
    fn resolve_zones(&self, scope: &RefreshScope) -> RepositoryResult<Vec<String>> {
        if let Some(zone) = &scope.zone_code {
            return Ok(vec![zone.clone()]);
        }
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT zone_code FROM zone
             UNION
             SELECT DISTINCT zone_code FROM inventory_raw_row
             ORDER BY zone_code",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut zones = Vec::new();
        for row in rows {
            zones.push(row?);
        }
        Ok(zones)
    }

    /// 单事实重算: 一个事务内"读快照 → 删旧行 → 写新行"
    ///
    /// # 返回
    /// - (写入行数, 多义匹配条数)
    fn refresh_fact(
        &self,
        fact: FactKind,
        zone_code: &str,
        settings: &RefreshSettings,
    ) -> RepositoryResult<(usize, usize)> {
        let computed_at = Utc::now();
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let snapshot = Self::load_zone_snapshot(&tx, zone_code)?;
        let result = match fact {
            FactKind::LocationSummary => self.refresh_location_summary(&tx, &snapshot, computed_at)?,
            FactKind::ZoneCapacity => (self.refresh_zone_capacity(&tx, &snapshot, computed_at)?, 0),
            FactKind::Discrepancy => {
                (self.refresh_discrepancy(&tx, &snapshot, settings, computed_at)?, 0)
            }
            FactKind::Expiry => (self.refresh_expiry(&tx, &snapshot, settings, computed_at)?, 0),
            FactKind::CategoryCapacity => {
                (self.refresh_category_capacity(&tx, &snapshot, computed_at)?, 0)
            }
            FactKind::Unassigned => (self.refresh_unassigned(&tx, &snapshot, computed_at)?, 0),
        };

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(result)
    }

    // ===== 快照读(事务内, 保证一致视图) =====

    fn load_zone_snapshot(tx: &Transaction, zone_code: &str) -> RepositoryResult<ZoneSnapshot> {
        Ok(ZoneSnapshot {
            zone_code: zone_code.to_string(),
            components: Self::load_components(tx, zone_code)?,
            operational: Self::load_latest_feed(tx, zone_code, SourceFeed::Operational)?,
            enterprise: Self::load_latest_feed(tx, zone_code, SourceFeed::Enterprise)?,
        })
    }

    fn load_components(tx: &Transaction, zone_code: &str) -> RepositoryResult<Vec<Component>> {
        let mut stmt = tx.prepare(
            "SELECT id, zone_code, location, x, y, width, height, rotation, zone_type,
                    kind_json, filter_json
             FROM layout_component WHERE zone_code = ?1 ORDER BY location",
        )?;
        let rows = stmt.query_map(params![zone_code], Self::row_to_component)?;
        let mut components = Vec::new();
        for row in rows {
            components.push(row?);
        }
        Ok(components)
    }

    fn row_to_component(row: &Row<'_>) -> rusqlite::Result<Component> {
        let rotation_deg: i32 = row.get(7)?;
        let zone_type: String = row.get(8)?;
        let kind_json: String = row.get(9)?;
        let filter_json: Option<String> = row.get(10)?;
        let kind = serde_json::from_str(&kind_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let filter = match filter_json {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    10,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };
        Ok(Component {
            id: row.get(0)?,
            zone_code: row.get(1)?,
            location: row.get(2)?,
            x: row.get(3)?,
            y: row.get(4)?,
            width: row.get(5)?,
            height: row.get(6)?,
            rotation: Rotation::from_degrees(rotation_deg).unwrap_or(Rotation::R0),
            zone_type: ZoneType::from_str(&zone_type),
            filter,
            kind,
        })
    }

    /// 某来源在该区域的最新批次全部行
    fn load_latest_feed(
        tx: &Transaction,
        zone_code: &str,
        source: SourceFeed,
    ) -> RepositoryResult<Vec<RawInventoryRecord>> {
        let mut stmt = tx.prepare(
            "SELECT id, source, zone_code, cell_identifier, item_code, lot_key,
                    available_qty, total_qty, inb_date, valid_date, batch_id, fetched_at
             FROM inventory_raw_row
             WHERE source = ?1 AND zone_code = ?2
               AND batch_id = (SELECT batch_id FROM inventory_raw_row
                               WHERE source = ?1 AND zone_code = ?2
                               ORDER BY fetched_at DESC, id DESC LIMIT 1)
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![source.as_str(), zone_code], |row| {
            let feed: String = row.get(1)?;
            Ok(RawInventoryRecord {
                id: row.get(0)?,
                source: SourceFeed::from_str(&feed),
                zone_code: row.get(2)?,
                cell_identifier: row.get(3)?,
                item_code: row.get(4)?,
                lot_key: row.get(5)?,
                available_qty: row.get(6)?,
                total_qty: row.get(7)?,
                inb_date: row.get(8)?,
                valid_date: row.get(9)?,
                batch_id: row.get(10)?,
                fetched_at: row.get(11)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

/// 利用率百分比(行数口径), 保留两位小数; 容量为零不计算
pub(super) fn utilization_pct(stock: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        return 0.0;
    }
    (stock as f64 / capacity as f64 * 100.0 * 100.0).round() / 100.0
}
