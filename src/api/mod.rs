// ==========================================
// 仓库布局与库存对账系统 - API 层
// ==========================================
// 职责: 对外业务接口, 封装引擎/对账层供调用方使用
// ==========================================

pub mod error;
pub mod layout_api;
pub mod recon_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use layout_api::LayoutApi;
pub use recon_api::ReconApi;
