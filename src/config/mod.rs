// ==========================================
// 仓库布局与库存对账系统 - 配置层
// ==========================================
// 职责: 系统配置管理(效期窗口、截断上限、刷新重试/超时)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
