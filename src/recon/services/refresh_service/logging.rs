// ==========================================
// 对账刷新服务 - 运行日志
// ==========================================
// recon_refresh_log: 每次刷新一行, 起笔 RUNNING, 收笔落结果
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::*;

impl ReconRefreshService {
    pub(super) fn log_refresh_start(
        &self,
        refresh_id: &str,
        scope: &RefreshScope,
        trigger: RefreshTrigger,
        started_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO recon_refresh_log
                 (refresh_id, scope, trigger_type, status, started_at)
             VALUES (?1, ?2, ?3, 'RUNNING', ?4)",
            params![refresh_id, scope.scope_key(), trigger.as_str(), started_at],
        )?;
        Ok(())
    }

    pub(super) fn log_refresh_complete(
        &self,
        refresh_id: &str,
        status: &str,
        facts_refreshed: usize,
        facts_failed: usize,
        ambiguous_matches: usize,
        duration_ms: i64,
        error_message: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE recon_refresh_log
             SET status = ?2, facts_refreshed = ?3, facts_failed = ?4,
                 ambiguous_matches = ?5, duration_ms = ?6, error_message = ?7,
                 completed_at = ?8
             WHERE refresh_id = ?1",
            params![
                refresh_id,
                status,
                facts_refreshed as i64,
                facts_failed as i64,
                ambiguous_matches as i64,
                duration_ms,
                error_message,
                Utc::now()
            ],
        )?;
        Ok(())
    }
}
