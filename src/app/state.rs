// ==========================================
// 仓库布局与库存对账系统 - 应用状态
// ==========================================
// 职责: 单库连接上的全量装配(仓储 → 引擎 → 对账 → API)
// 说明: 布局引擎通过事件发布者挂接刷新队列, 形成标脏闭环
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{LayoutApi, ReconApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{configure_sqlite_connection, ensure_schema};
use crate::engine::events::{LayoutEventPublisher, OptionalEventPublisher};
use crate::engine::placement::PlacementEngine;
use crate::recon::repository::FactReadRepository;
use crate::recon::services::refresh_queue::ReconRefreshQueue;
use crate::recon::services::refresh_service::ReconRefreshService;
use crate::repository::component_repo::ComponentRepository;
use crate::repository::inventory_repo::InventoryRepository;

/// 应用状态
///
/// 所有仓储/引擎/API 共享同一个数据库连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 布局编辑 API
    pub layout_api: Arc<LayoutApi>,

    /// 对账查询与刷新 API
    pub recon_api: Arc<ReconApi>,

    /// 库存快照仓储(摄取侧使用)
    pub inventory_repo: Arc<InventoryRepository>,

    /// 刷新队列(消费侧驱动 + 事件适配)
    pub refresh_queue: Arc<ReconRefreshQueue>,

    /// 配置管理
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 依次完成: 打开连接并统一 PRAGMA → 建表 → 装配各层
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化 AppState, 数据库路径: {}", db_path);

        let conn = Connection::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        configure_sqlite_connection(&conn).map_err(|e| format!("无法配置数据库连接: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("无法建立业务表: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // 仓储层
        let component_repo = Arc::new(ComponentRepository::from_connection(Arc::clone(&conn)));
        let inventory_repo = Arc::new(InventoryRepository::from_connection(Arc::clone(&conn)));
        let config_manager = Arc::new(ConfigManager::from_connection(Arc::clone(&conn)));

        // 对账层
        let refresh_service = Arc::new(ReconRefreshService::new(Arc::clone(&conn)));
        let refresh_queue = Arc::new(ReconRefreshQueue::new(
            Arc::clone(&conn),
            Arc::clone(&refresh_service),
        ));
        let fact_reader = Arc::new(FactReadRepository::new(Arc::clone(&conn)));

        // 引擎层: 布局变更事件 → 标脏 + 入队
        let publisher: Arc<dyn LayoutEventPublisher> = Arc::clone(&refresh_queue) as _;
        let placement_engine = Arc::new(PlacementEngine::with_events(
            Arc::clone(&component_repo),
            OptionalEventPublisher::with_publisher(publisher),
        ));

        // API 层
        let layout_api = Arc::new(LayoutApi::new(placement_engine, Arc::clone(&component_repo)));
        let recon_api = Arc::new(ReconApi::new(fact_reader, Arc::clone(&refresh_queue)));

        tracing::info!("AppState 装配完成");
        Ok(Self {
            db_path,
            layout_api,
            recon_api,
            inventory_repo,
            refresh_queue,
            config_manager,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 WAREHOUSE_RECON_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("WAREHOUSE_RECON_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./warehouse_recon.db");
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境用独立目录, 避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("warehouse-recon-dev");
        }
        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("warehouse-recon");
        }
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!("无法创建数据目录 {:?}: {}, 回退当前目录", path, e);
            path = PathBuf::from(".");
        }
        path = path.join("warehouse_recon.db");
    }
    path.to_string_lossy().to_string()
}
