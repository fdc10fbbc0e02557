// ==========================================
// 仓库布局与库存对账系统 - 事实新鲜度状态机
// ==========================================
// 职责: fact_refresh_state 表的状态流转
// 状态机: STALE → REFRESHING → FRESH | FAILED
// 合并: 同一 (fact, scope) 最多一个在途重算; 超时回退 STALE
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::types::{FactKind, FactState};
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 全量作用域键(scope 列不可为 NULL, 用固定记号)
pub const SCOPE_ALL: &str = "*";

/// 事实新鲜度行
#[derive(Debug, Clone, PartialEq)]
pub struct FactStatus {
    pub fact_kind: FactKind,
    pub scope: String,
    pub state: FactState,
    pub last_computed_at: Option<DateTime<Utc>>,
    pub refreshing_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl FactStatus {
    /// 缺行时的默认状态: 从未算过即 STALE
    fn stale(fact_kind: FactKind, scope: &str) -> Self {
        Self {
            fact_kind,
            scope: scope.to_string(),
            state: FactState::Stale,
            last_computed_at: None,
            refreshing_since: None,
            last_error: None,
        }
    }
}

// ==========================================
// FactStatusRepository
// ==========================================
pub struct FactStatusRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FactStatusRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    /// 读取 (fact, scope) 的状态; 无行视为 STALE
    pub fn get(&self, fact: FactKind, scope: &str) -> RepositoryResult<FactStatus> {
        let conn = self.get_conn()?;
        let status = conn
            .query_row(
                "SELECT state, last_computed_at, refreshing_since, last_error
                 FROM fact_refresh_state WHERE fact_kind = ?1 AND scope = ?2",
                params![fact.as_str(), scope],
                |row| {
                    let state: String = row.get(0)?;
                    Ok(FactStatus {
                        fact_kind: fact,
                        scope: scope.to_string(),
                        state: FactState::from_str(&state),
                        last_computed_at: row.get(1)?,
                        refreshing_since: row.get(2)?,
                        last_error: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(status.unwrap_or_else(|| FactStatus::stale(fact, scope)))
    }

    fn upsert_state(
        &self,
        fact: FactKind,
        scope: &str,
        state: FactState,
        last_computed_at: Option<DateTime<Utc>>,
        refreshing_since: Option<DateTime<Utc>>,
        last_error: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO fact_refresh_state
                 (fact_kind, scope, state, last_computed_at, refreshing_since, last_error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
             ON CONFLICT(fact_kind, scope) DO UPDATE SET
                 state = ?3,
                 last_computed_at = COALESCE(?4, last_computed_at),
                 refreshing_since = ?5,
                 last_error = ?6,
                 updated_at = datetime('now')",
            params![
                fact.as_str(),
                scope,
                state.as_str(),
                last_computed_at,
                refreshing_since,
                last_error
            ],
        )?;
        Ok(())
    }

    /// 标脏单个 (fact, scope)
    ///
    /// 在途重算不打断: REFRESHING 保持不变, 完成后由触发方再次入队兜底
    pub fn mark_stale(&self, fact: FactKind, scope: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO fact_refresh_state (fact_kind, scope, state, updated_at)
             VALUES (?1, ?2, 'STALE', datetime('now'))
             ON CONFLICT(fact_kind, scope) DO UPDATE SET
                 state = CASE WHEN state = 'REFRESHING' THEN state ELSE 'STALE' END,
                 updated_at = datetime('now')",
            params![fact.as_str(), scope],
        )?;
        Ok(())
    }

    /// 布局突变标脏: 仅布局依赖的事实
    pub fn mark_stale_for_layout_change(&self, scope: &str) -> RepositoryResult<()> {
        for fact in FactKind::ALL {
            if fact.depends_on_layout() {
                self.mark_stale(fact, scope)?;
            }
        }
        Ok(())
    }

    /// 摄取标脏: 全部事实
    pub fn mark_all_stale(&self, scope: &str) -> RepositoryResult<()> {
        for fact in FactKind::ALL {
            self.mark_stale(fact, scope)?;
        }
        Ok(())
    }

    /// 尝试进入 REFRESHING
    ///
    /// # 返回
    /// - true: 本次调用取得重算权
    /// - false: 已有在途重算(且未超时), 调用方观察该次结果即可
    pub fn try_begin_refresh(
        &self,
        fact: FactKind,
        scope: &str,
        now: DateTime<Utc>,
        timeout_ms: u64,
    ) -> RepositoryResult<bool> {
        let current = self.get(fact, scope)?;
        if current.state == FactState::Refreshing {
            if let Some(since) = current.refreshing_since {
                let elapsed_ms = (now - since).num_milliseconds();
                if elapsed_ms >= 0 && (elapsed_ms as u64) < timeout_ms {
                    return Ok(false);
                }
            }
            // 超时的在途重算视为"没跑完", 先回退 STALE 再接管
            tracing::warn!(
                fact = fact.as_str(),
                scope,
                "在途重算超时, 回退 STALE 后接管"
            );
        }
        self.upsert_state(fact, scope, FactState::Refreshing, None, Some(now), None)?;
        Ok(true)
    }

    /// 重算成功 → FRESH
    pub fn complete_refresh(
        &self,
        fact: FactKind,
        scope: &str,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.upsert_state(fact, scope, FactState::Fresh, Some(computed_at), None, None)
    }

    /// 重算出错 → FAILED(与超时的 STALE 区分)
    pub fn fail_refresh(&self, fact: FactKind, scope: &str, error: &str) -> RepositoryResult<()> {
        self.upsert_state(fact, scope, FactState::Failed, None, None, Some(error))
    }

    /// 超时回收: 在途超过 timeout 的 (fact, scope) 回退 STALE
    ///
    /// # 返回
    /// - 回退的行数
    pub fn revert_timed_out(&self, now: DateTime<Utc>, timeout_ms: u64) -> RepositoryResult<usize> {
        let cutoff = now - chrono::Duration::milliseconds(timeout_ms as i64);
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE fact_refresh_state
             SET state = 'STALE', refreshing_since = NULL, updated_at = datetime('now')
             WHERE state = 'REFRESHING' AND refreshing_since <= ?1",
            params![cutoff],
        )?;
        if affected > 0 {
            tracing::warn!(count = affected, "重算超时回退 STALE");
        }
        Ok(affected)
    }

    /// 列出全部状态行(刷新 API 轮询用)
    pub fn list_all(&self) -> RepositoryResult<Vec<FactStatus>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT fact_kind, scope, state, last_computed_at, refreshing_since, last_error
             FROM fact_refresh_state ORDER BY fact_kind, scope",
        )?;
        let rows = stmt.query_map([], |row| {
            let fact: String = row.get(0)?;
            let state: String = row.get(2)?;
            Ok((
                fact,
                row.get::<_, String>(1)?,
                state,
                row.get::<_, Option<DateTime<Utc>>>(3)?,
                row.get::<_, Option<DateTime<Utc>>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;
        let mut statuses = Vec::new();
        for row in rows {
            let (fact, scope, state, last_computed_at, refreshing_since, last_error) = row?;
            if let Some(fact_kind) = FactKind::from_str(&fact) {
                statuses.push(FactStatus {
                    fact_kind,
                    scope,
                    state: FactState::from_str(&state),
                    last_computed_at,
                    refreshing_since,
                    last_error,
                });
            }
        }
        Ok(statuses)
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn test_repo() -> FactStatusRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        FactStatusRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_missing_row_is_stale() {
        let repo = test_repo();
        let status = repo.get(FactKind::ZoneCapacity, "Z1").unwrap();
        assert_eq!(status.state, FactState::Stale);
        assert!(status.last_computed_at.is_none());
    }

    #[test]
    fn test_state_machine_happy_path() {
        let repo = test_repo();
        let now = Utc::now();

        assert!(repo.try_begin_refresh(FactKind::Discrepancy, "Z1", now, 30_000).unwrap());
        assert_eq!(
            repo.get(FactKind::Discrepancy, "Z1").unwrap().state,
            FactState::Refreshing
        );

        repo.complete_refresh(FactKind::Discrepancy, "Z1", now).unwrap();
        let status = repo.get(FactKind::Discrepancy, "Z1").unwrap();
        assert_eq!(status.state, FactState::Fresh);
        assert!(status.last_computed_at.is_some());
    }

    #[test]
    fn test_coalescing_one_inflight() {
        let repo = test_repo();
        let now = Utc::now();

        assert!(repo.try_begin_refresh(FactKind::Expiry, "Z1", now, 30_000).unwrap());
        // 第二个请求观察在途, 不取得重算权
        assert!(!repo
            .try_begin_refresh(FactKind::Expiry, "Z1", now + chrono::Duration::seconds(1), 30_000)
            .unwrap());
        // 不同 scope 不受影响
        assert!(repo.try_begin_refresh(FactKind::Expiry, "Z2", now, 30_000).unwrap());
    }

    #[test]
    fn test_timed_out_inflight_is_taken_over() {
        let repo = test_repo();
        let now = Utc::now();

        assert!(repo.try_begin_refresh(FactKind::Expiry, "Z1", now, 1_000).unwrap());
        // 超时后新请求接管
        let later = now + chrono::Duration::seconds(5);
        assert!(repo.try_begin_refresh(FactKind::Expiry, "Z1", later, 1_000).unwrap());
    }

    #[test]
    fn test_fail_is_failed_not_stale() {
        let repo = test_repo();
        let now = Utc::now();
        repo.try_begin_refresh(FactKind::Unassigned, "Z1", now, 30_000).unwrap();
        repo.fail_refresh(FactKind::Unassigned, "Z1", "boom").unwrap();
        let status = repo.get(FactKind::Unassigned, "Z1").unwrap();
        assert_eq!(status.state, FactState::Failed);
        assert_eq!(status.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_revert_timed_out_goes_stale() {
        let repo = test_repo();
        let start = Utc::now() - chrono::Duration::seconds(60);
        repo.try_begin_refresh(FactKind::LocationSummary, "Z1", start, 30_000).unwrap();

        let reverted = repo.revert_timed_out(Utc::now(), 30_000).unwrap();
        assert_eq!(reverted, 1);
        let status = repo.get(FactKind::LocationSummary, "Z1").unwrap();
        assert_eq!(status.state, FactState::Stale, "超时回退 STALE 而非 FAILED");
    }

    #[test]
    fn test_layout_change_stales_layout_facts_only() {
        let repo = test_repo();
        let now = Utc::now();
        for fact in FactKind::ALL {
            repo.try_begin_refresh(fact, "Z1", now, 30_000).unwrap();
            repo.complete_refresh(fact, "Z1", now).unwrap();
        }

        repo.mark_stale_for_layout_change("Z1").unwrap();
        assert_eq!(repo.get(FactKind::LocationSummary, "Z1").unwrap().state, FactState::Stale);
        assert_eq!(repo.get(FactKind::ZoneCapacity, "Z1").unwrap().state, FactState::Stale);
        assert_eq!(repo.get(FactKind::CategoryCapacity, "Z1").unwrap().state, FactState::Stale);
        assert_eq!(repo.get(FactKind::Unassigned, "Z1").unwrap().state, FactState::Stale);
        // 差异/效期只依赖原始数据, 不受布局影响
        assert_eq!(repo.get(FactKind::Discrepancy, "Z1").unwrap().state, FactState::Fresh);
        assert_eq!(repo.get(FactKind::Expiry, "Z1").unwrap().state, FactState::Fresh);
    }

    #[test]
    fn test_ingest_stales_all() {
        let repo = test_repo();
        let now = Utc::now();
        for fact in FactKind::ALL {
            repo.try_begin_refresh(fact, "Z1", now, 30_000).unwrap();
            repo.complete_refresh(fact, "Z1", now).unwrap();
        }
        repo.mark_all_stale("Z1").unwrap();
        for fact in FactKind::ALL {
            assert_eq!(repo.get(fact, "Z1").unwrap().state, FactState::Stale);
        }
    }
}
