// ==========================================
// 对账层服务
// ==========================================

pub mod refresh_queue;
pub mod refresh_service;
