// ==========================================
// 仓库布局与库存对账系统 - 刷新任务队列
// ==========================================
// 职责: 刷新请求持久化排队 + 重试 + 超时回收
// 红线: 布局/摄取事件只标脏入队, 重算由队列消费侧执行
// ==========================================

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::engine::events::{LayoutEvent, LayoutEventPublisher, LayoutEventType};
use crate::recon::services::refresh_service::{ReconRefreshService, RefreshScope, RefreshTrigger};
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// 任务状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "RUNNING" => TaskStatus::Running,
            "COMPLETED" => TaskStatus::Completed,
            "FAILED" => TaskStatus::Failed,
            "CANCELLED" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

// ==========================================
// 刷新任务
// ==========================================
#[derive(Debug, Clone)]
pub struct RefreshTask {
    pub task_id: String,
    pub scope: RefreshScope,
    pub trigger: RefreshTrigger,
    pub status: TaskStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
}

impl RefreshTask {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// 队列状态统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

// ==========================================
// ReconRefreshQueue
// ==========================================
pub struct ReconRefreshQueue {
    conn: Arc<Mutex<Connection>>,
    refresh_service: Arc<ReconRefreshService>,
}

impl ReconRefreshQueue {
    pub fn new(conn: Arc<Mutex<Connection>>, refresh_service: Arc<ReconRefreshService>) -> Self {
        Self { conn, refresh_service }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    pub fn refresh_service(&self) -> &ReconRefreshService {
        &self.refresh_service
    }

    /// 入队一个刷新请求, 同时按触发类型标脏对应事实
    ///
    /// # 返回
    /// - 任务 ID
    pub fn enqueue(&self, scope: &RefreshScope, trigger: RefreshTrigger) -> RepositoryResult<String> {
        let status = self.refresh_service.status_repository();
        match trigger {
            RefreshTrigger::LayoutChanged => status.mark_stale_for_layout_change(scope.scope_key())?,
            RefreshTrigger::InventoryIngested | RefreshTrigger::ManualRefresh => {
                status.mark_all_stale(scope.scope_key())?
            }
        }

        let task_id = Uuid::new_v4().to_string();
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO recon_refresh_queue
                 (task_id, scope, trigger_type, status, created_at)
             VALUES (?1, ?2, ?3, 'PENDING', ?4)",
            params![task_id, scope.scope_key(), trigger.as_str(), Utc::now()],
        )?;
        tracing::info!(
            task_id = %task_id,
            scope = scope.scope_key(),
            trigger = trigger.as_str(),
            "刷新任务入队"
        );
        Ok(task_id)
    }

    /// 取出最早的 PENDING 任务并置为 RUNNING
    pub fn dequeue(&self) -> RepositoryResult<Option<RefreshTask>> {
        let conn = self.get_conn()?;
        let task = conn
            .query_row(
                "SELECT task_id, scope, trigger_type, status, retry_count, max_retries, error_message
                 FROM recon_refresh_queue
                 WHERE status = 'PENDING'
                 ORDER BY created_at, task_id LIMIT 1",
                [],
                Self::row_to_task,
            )
            .optional()?;
        let Some(mut task) = task else { return Ok(None) };
        conn.execute(
            "UPDATE recon_refresh_queue
             SET status = 'RUNNING', started_at = ?2 WHERE task_id = ?1",
            params![task.task_id, Utc::now()],
        )?;
        task.status = TaskStatus::Running;
        Ok(Some(task))
    }

    fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefreshTask> {
        let scope_key: String = row.get(1)?;
        let trigger: String = row.get(2)?;
        let status: String = row.get(3)?;
        Ok(RefreshTask {
            task_id: row.get(0)?,
            scope: RefreshScope::from_scope_key(&scope_key),
            trigger: RefreshTrigger::from_str(&trigger),
            status: TaskStatus::from_str(&status),
            retry_count: row.get(4)?,
            max_retries: row.get(5)?,
            error_message: row.get(6)?,
        })
    }

    /// 执行一个任务
    ///
    /// 刷新出错或有事实重算失败视为任务失败:
    /// 还有重试额度 → 回 PENDING, 否则终态 FAILED
    pub fn execute_task(&self, task: &RefreshTask) -> RepositoryResult<()> {
        let outcome = self
            .refresh_service
            .refresh_all(&task.scope, task.trigger, Some("刷新队列"));

        let error = match outcome {
            Ok(summary) if summary.facts_failed == 0 => None,
            Ok(summary) => Some(format!("{} 个事实重算失败", summary.facts_failed)),
            Err(e) => Some(e.to_string()),
        };

        let conn = self.get_conn()?;
        match error {
            None => {
                conn.execute(
                    "UPDATE recon_refresh_queue
                     SET status = 'COMPLETED', completed_at = ?2, error_message = NULL
                     WHERE task_id = ?1",
                    params![task.task_id, Utc::now()],
                )?;
                tracing::info!(task_id = %task.task_id, "刷新任务完成");
            }
            Some(msg) => {
                let retry_count = task.retry_count + 1;
                let next_status = if retry_count < task.max_retries { "PENDING" } else { "FAILED" };
                conn.execute(
                    "UPDATE recon_refresh_queue
                     SET status = ?2, retry_count = ?3, error_message = ?4,
                         completed_at = CASE WHEN ?2 = 'FAILED' THEN ?5 ELSE NULL END
                     WHERE task_id = ?1",
                    params![task.task_id, next_status, retry_count, msg, Utc::now()],
                )?;
                tracing::warn!(
                    task_id = %task.task_id,
                    retry_count,
                    next_status,
                    error = %msg,
                    "刷新任务失败"
                );
            }
        }
        Ok(())
    }

    /// 取出并执行一个任务
    ///
    /// # 返回
    /// - Some(task_id): 处理了一个任务
    /// - None: 队列为空
    pub fn process_next(&self) -> RepositoryResult<Option<String>> {
        let Some(task) = self.dequeue()? else { return Ok(None) };
        self.execute_task(&task)?;
        Ok(Some(task.task_id))
    }

    /// 排空队列(含失败重试回队的任务)
    ///
    /// # 返回
    /// - 处理的任务次数
    pub fn process_all(&self) -> RepositoryResult<usize> {
        let mut processed = 0usize;
        while self.process_next()?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }

    pub fn get_task_status(&self, task_id: &str) -> RepositoryResult<Option<RefreshTask>> {
        let conn = self.get_conn()?;
        let task = conn
            .query_row(
                "SELECT task_id, scope, trigger_type, status, retry_count, max_retries, error_message
                 FROM recon_refresh_queue WHERE task_id = ?1",
                params![task_id],
                Self::row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// 取消 PENDING 任务(RUNNING/终态不可取消)
    pub fn cancel_task(&self, task_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE recon_refresh_queue
             SET status = 'CANCELLED', completed_at = ?2
             WHERE task_id = ?1 AND status = 'PENDING'",
            params![task_id, Utc::now()],
        )?;
        Ok(affected > 0)
    }

    pub fn get_queue_stats(&self) -> RepositoryResult<QueueStats> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM recon_refresh_queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut stats = QueueStats::default();
        for row in rows {
            let (status, count) = row?;
            match TaskStatus::from_str(&status) {
                TaskStatus::Pending => stats.pending = count,
                TaskStatus::Running => stats.running = count,
                TaskStatus::Completed => stats.completed = count,
                TaskStatus::Failed => stats.failed = count,
                TaskStatus::Cancelled => stats.cancelled = count,
            }
        }
        Ok(stats)
    }

    /// 超时回收: 卡死的 RUNNING 任务回 PENDING, 在途事实回 STALE
    ///
    /// # 返回
    /// - 回收的任务数
    pub fn recover_timed_out(&self, timeout_ms: u64) -> RepositoryResult<usize> {
        let now = Utc::now();
        self.refresh_service
            .status_repository()
            .revert_timed_out(now, timeout_ms)?;

        let cutoff = now - chrono::Duration::milliseconds(timeout_ms as i64);
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE recon_refresh_queue
             SET status = 'PENDING', started_at = NULL
             WHERE status = 'RUNNING' AND started_at <= ?1",
            params![cutoff],
        )?;
        if affected > 0 {
            tracing::warn!(count = affected, "超时任务回收重排");
        }
        Ok(affected)
    }
}

// ==========================================
// 引擎事件适配: 布局/摄取事件 → 标脏 + 入队
// ==========================================
impl LayoutEventPublisher for ReconRefreshQueue {
    fn publish(&self, event: LayoutEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        let trigger = match event.event_type {
            LayoutEventType::InventoryIngested => RefreshTrigger::InventoryIngested,
            LayoutEventType::ManualTrigger => RefreshTrigger::ManualRefresh,
            _ => RefreshTrigger::LayoutChanged,
        };
        let scope = match event.zone_code {
            Some(zone) => RefreshScope::zone(zone),
            None => RefreshScope::full(),
        };
        self.enqueue(&scope, trigger)
            .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
    }
}
