// ==========================================
// 仓库布局与库存对账系统 - 对账 API
// ==========================================
// 职责: 事实读模型查询(附新鲜度) + 手动刷新触发与轮询
// 红线: 读接口永不触发内联重算; 过期数据如实标注后照常返回
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::facts::{
    CategoryCapacity, ExpiringItem, LocationSummary, StockDiscrepancy, UnassignedLocation,
    ZoneCapacitySummary,
};
use crate::recon::repository::{FactReadRepository, FactReadResult};
use crate::recon::services::refresh_queue::{QueueStats, ReconRefreshQueue, RefreshTask};
use crate::recon::services::refresh_service::{RefreshScope, RefreshTrigger};
use crate::recon::status::FactStatus;

// ==========================================
// ReconApi
// ==========================================
pub struct ReconApi {
    reader: Arc<FactReadRepository>,
    queue: Arc<ReconRefreshQueue>,
}

impl ReconApi {
    pub fn new(reader: Arc<FactReadRepository>, queue: Arc<ReconRefreshQueue>) -> Self {
        Self { reader, queue }
    }

    fn check_zone(zone_code: &str) -> ApiResult<()> {
        if zone_code.trim().is_empty() {
            return Err(ApiError::InvalidInput("区域编码不能为空".to_string()));
        }
        Ok(())
    }

    // ==========================================
    // 事实查询(附新鲜度标签)
    // ==========================================

    pub fn get_location_summaries(
        &self,
        zone_code: &str,
    ) -> ApiResult<FactReadResult<Vec<LocationSummary>>> {
        Self::check_zone(zone_code)?;
        Ok(self.reader.location_summaries(zone_code)?)
    }

    pub fn get_zone_capacity(
        &self,
        zone_code: &str,
    ) -> ApiResult<FactReadResult<Option<ZoneCapacitySummary>>> {
        Self::check_zone(zone_code)?;
        Ok(self.reader.zone_capacity(zone_code)?)
    }

    pub fn get_discrepancies(
        &self,
        zone_code: &str,
    ) -> ApiResult<FactReadResult<Vec<StockDiscrepancy>>> {
        Self::check_zone(zone_code)?;
        Ok(self.reader.discrepancies(zone_code)?)
    }

    pub fn get_expiring_items(
        &self,
        zone_code: &str,
    ) -> ApiResult<FactReadResult<Vec<ExpiringItem>>> {
        Self::check_zone(zone_code)?;
        Ok(self.reader.expiring_items(zone_code)?)
    }

    pub fn get_category_capacities(
        &self,
        zone_code: &str,
    ) -> ApiResult<FactReadResult<Vec<CategoryCapacity>>> {
        Self::check_zone(zone_code)?;
        Ok(self.reader.category_capacities(zone_code)?)
    }

    pub fn get_unassigned_locations(
        &self,
        zone_code: &str,
    ) -> ApiResult<FactReadResult<Vec<UnassignedLocation>>> {
        Self::check_zone(zone_code)?;
        Ok(self.reader.unassigned_locations(zone_code)?)
    }

    // ==========================================
    // 刷新触发与轮询
    // ==========================================

    /// 手动触发刷新(标脏 + 入队)
    ///
    /// # 参数
    /// - zone_code: None = 全部区域
    ///
    /// # 返回
    /// - 任务 ID, 供轮询
    pub fn trigger_refresh(&self, zone_code: Option<&str>) -> ApiResult<String> {
        let scope = match zone_code {
            Some(zone) => {
                Self::check_zone(zone)?;
                RefreshScope::zone(zone)
            }
            None => RefreshScope::full(),
        };
        Ok(self.queue.enqueue(&scope, RefreshTrigger::ManualRefresh)?)
    }

    pub fn get_refresh_task(&self, task_id: &str) -> ApiResult<RefreshTask> {
        self.queue
            .get_task_status(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("刷新任务(id={})不存在", task_id)))
    }

    pub fn cancel_refresh_task(&self, task_id: &str) -> ApiResult<bool> {
        Ok(self.queue.cancel_task(task_id)?)
    }

    /// 全部事实的新鲜度状态(状态栏轮询)
    pub fn get_fact_states(&self) -> ApiResult<Vec<FactStatus>> {
        Ok(self.queue.refresh_service().status_repository().list_all()?)
    }

    pub fn get_queue_stats(&self) -> ApiResult<QueueStats> {
        Ok(self.queue.get_queue_stats()?)
    }

    /// 排空刷新队列(消费侧驱动)
    ///
    /// # 返回
    /// - 处理的任务次数
    pub fn process_pending_refreshes(&self) -> ApiResult<usize> {
        Ok(self.queue.process_all()?)
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FactState;
    use crate::recon::services::refresh_queue::TaskStatus;
    use crate::recon::services::refresh_service::ReconRefreshService;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup() -> ReconApi {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let service = Arc::new(ReconRefreshService::new(Arc::clone(&conn)));
        let queue = Arc::new(ReconRefreshQueue::new(Arc::clone(&conn), service));
        let reader = Arc::new(FactReadRepository::new(conn));
        ReconApi::new(reader, queue)
    }

    #[test]
    fn test_trigger_then_poll_and_process() {
        let api = setup();
        let task_id = api.trigger_refresh(Some("Z1")).unwrap();

        let task = api.get_refresh_task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        assert_eq!(api.process_pending_refreshes().unwrap(), 1);
        let task = api.get_refresh_task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_reads_carry_staleness() {
        let api = setup();
        api.trigger_refresh(Some("Z1")).unwrap();
        // 标脏后尚未消费队列: 读取照常, 标签为 STALE
        let result = api.get_location_summaries("Z1").unwrap();
        assert_eq!(result.state, FactState::Stale);

        api.process_pending_refreshes().unwrap();
        let result = api.get_location_summaries("Z1").unwrap();
        assert_eq!(result.state, FactState::Fresh);
    }

    #[test]
    fn test_empty_zone_rejected() {
        let api = setup();
        assert!(matches!(
            api.get_zone_capacity("  ").unwrap_err(),
            ApiError::InvalidInput(_)
        ));
        assert!(matches!(
            api.trigger_refresh(Some("")).unwrap_err(),
            ApiError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_unknown_task_not_found() {
        let api = setup();
        assert!(matches!(
            api.get_refresh_task("nope").unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
