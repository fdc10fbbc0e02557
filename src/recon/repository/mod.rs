// ==========================================
// 对账层读模型仓储
// ==========================================

pub mod fact_reader;

pub use fact_reader::{FactReadRepository, FactReadResult};
