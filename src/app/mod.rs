// ==========================================
// 仓库布局与库存对账系统 - 应用层
// ==========================================
// 职责: 应用装配与入口共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
