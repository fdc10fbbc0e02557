// ==========================================
// 仓库布局与库存对账系统 - 对账刷新服务
// ==========================================
// 职责: 六类派生事实的"重算-替换"刷新
// 红线: 每个事实独立事务重算, 单个失败不阻塞其余事实
// 红线: 重算只读最新批次快照, 不改写任何原始数据
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::ConfigManager;
use crate::recon::status::{FactStatusRepository, SCOPE_ALL};
use crate::repository::error::{RepositoryError, RepositoryResult};

mod core;
mod f1_location_summary;
mod f2_zone_capacity;
mod f3_discrepancy;
mod f4_expiry;
mod f5_category_capacity;
mod f6_unassigned;
mod logging;

pub use self::core::RefreshSummary;

// ==========================================
// 刷新触发类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// 布局突变(放置/移动/改尺寸/移除)
    LayoutChanged,
    /// 快照批次摄取完成
    InventoryIngested,
    /// 手动全量刷新
    ManualRefresh,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            RefreshTrigger::LayoutChanged => "LAYOUT_CHANGED",
            RefreshTrigger::InventoryIngested => "INVENTORY_INGESTED",
            RefreshTrigger::ManualRefresh => "MANUAL_REFRESH",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "LAYOUT_CHANGED" => RefreshTrigger::LayoutChanged,
            "INVENTORY_INGESTED" => RefreshTrigger::InventoryIngested,
            _ => RefreshTrigger::ManualRefresh,
        }
    }
}

// ==========================================
// 刷新作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshScope {
    /// None = 全部区域
    pub zone_code: Option<String>,
}

impl RefreshScope {
    pub fn zone(zone_code: impl Into<String>) -> Self {
        Self { zone_code: Some(zone_code.into()) }
    }

    pub fn full() -> Self {
        Self { zone_code: None }
    }

    pub fn is_full_refresh(&self) -> bool {
        self.zone_code.is_none()
    }

    /// 作用域键(日志/队列/状态表用)
    pub fn scope_key(&self) -> &str {
        self.zone_code.as_deref().unwrap_or(SCOPE_ALL)
    }

    pub fn from_scope_key(key: &str) -> Self {
        if key == SCOPE_ALL {
            Self::full()
        } else {
            Self::zone(key)
        }
    }
}

// ==========================================
// ReconRefreshService
// ==========================================
pub struct ReconRefreshService {
    conn: Arc<Mutex<Connection>>,
    status: FactStatusRepository,
    config: ConfigManager,
}

impl ReconRefreshService {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let status = FactStatusRepository::new(Arc::clone(&conn));
        let config = ConfigManager::from_connection(Arc::clone(&conn));
        Self { conn, status, config }
    }

    /// 新鲜度状态仓储(轮询 API 共用)
    pub fn status_repository(&self) -> &FactStatusRepository {
        &self.status
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }
}
