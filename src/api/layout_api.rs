// ==========================================
// 仓库布局与库存对账系统 - 布局 API
// ==========================================
// 职责: 封装 PlacementEngine 与组件仓储, 提供布局编辑接口
// 红线: 任何拒绝都带结构化原因; 布局变更由引擎发事件, API 不直接重算
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::component::Component;
use crate::domain::grid::Rect;
use crate::engine::placement::{MoveRequest, PlacementEngine};
use crate::repository::component_repo::{ComponentRepository, ZoneRecord};

// ==========================================
// LayoutApi
// ==========================================
pub struct LayoutApi {
    engine: Arc<PlacementEngine>,
    repo: Arc<ComponentRepository>,
}

impl LayoutApi {
    pub fn new(engine: Arc<PlacementEngine>, repo: Arc<ComponentRepository>) -> Self {
        Self { engine, repo }
    }

    // ==========================================
    // 区域
    // ==========================================

    pub fn upsert_zone(&self, zone: &ZoneRecord) -> ApiResult<()> {
        if zone.zone_code.trim().is_empty() {
            return Err(ApiError::InvalidInput("区域编码不能为空".to_string()));
        }
        if zone.grid_width <= 0 || zone.grid_height <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "网格尺寸必须为正: {}x{}",
                zone.grid_width, zone.grid_height
            )));
        }
        self.repo.upsert_zone(zone)?;
        Ok(())
    }

    pub fn get_zone(&self, zone_code: &str) -> ApiResult<ZoneRecord> {
        self.repo
            .get_zone(zone_code)?
            .ok_or_else(|| ApiError::NotFound(format!("区域 {} 不存在", zone_code)))
    }

    pub fn list_zones(&self) -> ApiResult<Vec<String>> {
        Ok(self.repo.list_zone_codes()?)
    }

    // ==========================================
    // 组件编辑
    // ==========================================

    /// 放置组件: 结构校验 → 越界/重叠检查 → 落库 → 发布局事件
    pub fn place_component(&self, component: Component) -> ApiResult<Component> {
        Ok(self.engine.place(component)?)
    }

    /// 移动组件(dx/dy 为网格偏移)
    pub fn move_component(&self, component_id: &str, dx: i64, dy: i64) -> ApiResult<()> {
        if component_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("组件 ID 不能为空".to_string()));
        }
        Ok(self.engine.move_component(component_id, dx, dy)?)
    }

    pub fn resize_component(&self, component_id: &str, width: i64, height: i64) -> ApiResult<()> {
        if component_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("组件 ID 不能为空".to_string()));
        }
        Ok(self.engine.resize(component_id, width, height)?)
    }

    pub fn remove_component(&self, component_id: &str) -> ApiResult<()> {
        if component_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("组件 ID 不能为空".to_string()));
        }
        Ok(self.engine.remove(component_id)?)
    }

    /// 批量移动: 全有或全无, 按批次终态校验(允许换位)
    pub fn batch_move(&self, zone_code: &str, moves: &[MoveRequest]) -> ApiResult<()> {
        if zone_code.trim().is_empty() {
            return Err(ApiError::InvalidInput("区域编码不能为空".to_string()));
        }
        Ok(self.engine.batch_move(zone_code, moves)?)
    }

    /// 找空位: 先扫偏好区域, 再全网格行优先扫描
    pub fn find_free_space(
        &self,
        zone_code: &str,
        width: i64,
        height: i64,
        preferred: Option<Rect>,
    ) -> ApiResult<Rect> {
        Ok(self.engine.find_free_space(zone_code, width, height, preferred)?)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_component(&self, component_id: &str) -> ApiResult<Component> {
        self.repo
            .get(component_id)?
            .ok_or_else(|| ApiError::NotFound(format!("组件(id={})不存在", component_id)))
    }

    pub fn list_components(&self, zone_code: &str) -> ApiResult<Vec<Component>> {
        Ok(self.repo.list_by_zone(zone_code)?)
    }
}
