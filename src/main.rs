// ==========================================
// 仓库布局与库存对账系统 - 主入口
// ==========================================
// 启动即做一次全量刷新并排空队列, 之后由调用方驱动
// ==========================================

use warehouse_recon::app::{get_default_db_path, AppState};

fn main() {
    warehouse_recon::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", warehouse_recon::APP_NAME);
    tracing::info!("系统版本: {}", warehouse_recon::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState 初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    // 启动全量刷新: 标脏 + 入队 + 排空
    match state.recon_api.trigger_refresh(None) {
        Ok(task_id) => tracing::info!(task_id = %task_id, "启动全量刷新已入队"),
        Err(e) => {
            tracing::error!("启动全量刷新入队失败: {}", e);
            std::process::exit(1);
        }
    }
    match state.recon_api.process_pending_refreshes() {
        Ok(processed) => tracing::info!(processed, "刷新队列已排空"),
        Err(e) => {
            tracing::error!("刷新队列处理失败: {}", e);
            std::process::exit(1);
        }
    }

    match state.recon_api.get_queue_stats() {
        Ok(stats) => tracing::info!(
            completed = stats.completed,
            failed = stats.failed,
            "队列状态"
        ),
        Err(e) => tracing::warn!("队列状态查询失败: {}", e),
    }
}
