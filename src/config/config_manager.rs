// ==========================================
// 仓库布局与库存对账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：传入连接须已应用统一 PRAGMA（开连接入口统一负责）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 参数
    /// - key: 配置键
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    ///
    /// # 参数
    /// - key: 配置键
    /// - default: 默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 刷新运行日志里记录当次生效的配置口径
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 效期配置 =====

    /// 效期回看窗口天数（默认 30：valid_date ≥ today − 30d 才入桶）
    pub fn get_expiry_past_window_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::EXPIRY_PAST_WINDOW_DAYS, "30")?;
        Ok(value.parse::<i64>().unwrap_or(30))
    }

    /// 效期前瞻窗口天数（默认 90：valid_date ≤ today + 90d 才入桶）
    pub fn get_expiry_future_window_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::EXPIRY_FUTURE_WINDOW_DAYS, "90")?;
        Ok(value.parse::<i64>().unwrap_or(90))
    }

    /// 效期桶条数上限（默认 500）
    pub fn get_expiry_top_n(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::EXPIRY_TOP_N, "500")?;
        Ok(value.parse::<usize>().unwrap_or(500))
    }

    // ===== 差异配置 =====

    /// 差异条数上限（默认 1000, 按 |Δ| 降序截断）
    pub fn get_discrepancy_top_n(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DISCREPANCY_TOP_N, "1000")?;
        Ok(value.parse::<usize>().unwrap_or(1000))
    }

    // ===== 刷新配置 =====

    /// 刷新任务最大重试次数（默认 3）
    pub fn get_refresh_max_retries(&self) -> Result<i32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::REFRESH_MAX_RETRIES, "3")?;
        Ok(value.parse::<i32>().unwrap_or(3))
    }

    /// 单次刷新超时毫秒数（默认 30000; 超时回退 STALE 而非 FAILED）
    pub fn get_refresh_timeout_ms(&self) -> Result<u64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::REFRESH_TIMEOUT_MS, "30000")?;
        Ok(value.parse::<u64>().unwrap_or(30_000))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 效期窗口
    pub const EXPIRY_PAST_WINDOW_DAYS: &str = "expiry_past_window_days";
    pub const EXPIRY_FUTURE_WINDOW_DAYS: &str = "expiry_future_window_days";
    pub const EXPIRY_TOP_N: &str = "expiry_top_n";

    // 差异
    pub const DISCREPANCY_TOP_N: &str = "discrepancy_top_n";

    // 刷新
    pub const REFRESH_MAX_RETRIES: &str = "refresh_max_retries";
    pub const REFRESH_TIMEOUT_MS: &str = "refresh_timeout_ms";
}
