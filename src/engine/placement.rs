// ==========================================
// 仓库布局与库存对账系统 - 放置引擎
// ==========================================
// 职责: 组件放置/移动/改尺寸/移除/找空位的几何校验与提交
// 模式: 读取-校验-提交; 校验失败不留任何状态变化
// 并发: 同一区域串行(区域锁), 跨区域并行
// 红线: Engine 不拼 SQL; 布局突变只发事件标脏, 不内联重算
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::component::Component;
use crate::domain::grid::{Grid, Rect};
use crate::engine::events::{LayoutEvent, LayoutEventType, OptionalEventPublisher};
use crate::repository::component_repo::ComponentRepository;
use crate::repository::error::RepositoryError;

// ==========================================
// 布局错误分类
// ==========================================
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("几何不合法: {0}")]
    InvalidGeometry(String),

    #[error("越界: 组件 {location} 占位超出网格 {grid_width}x{grid_height}")]
    OutOfBounds {
        location: String,
        grid_width: i64,
        grid_height: i64,
    },

    #[error("重叠: 组件 {location} 与已有组件冲突 ({})", colliding.join(","))]
    Overlap {
        location: String,
        /// 冲突组件的库位编码列表
        colliding: Vec<String>,
    },

    #[error("无可用空间: 需要 {width}x{height}")]
    NoSpaceAvailable { width: i64, height: i64 },

    #[error("区域不存在: {0}")]
    ZoneNotFound(String),

    #[error("组件不存在: {0}")]
    ComponentNotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type LayoutResult<T> = Result<T, LayoutError>;

/// 批量移动请求: 组件 id + 位移增量
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub component_id: String,
    pub dx: i64,
    pub dy: i64,
}

// ==========================================
// PlacementEngine
// ==========================================
pub struct PlacementEngine {
    repo: Arc<ComponentRepository>,
    /// 区域写锁表: 同区域放置操作串行化
    zone_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    events: OptionalEventPublisher,
}

impl PlacementEngine {
    pub fn new(repo: Arc<ComponentRepository>) -> Self {
        Self {
            repo,
            zone_locks: Mutex::new(HashMap::new()),
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_events(repo: Arc<ComponentRepository>, events: OptionalEventPublisher) -> Self {
        Self {
            repo,
            zone_locks: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// 取区域写锁(惰性创建)
    fn zone_lock(&self, zone_code: &str) -> LayoutResult<Arc<Mutex<()>>> {
        let mut locks = self.zone_locks.lock().map_err(|e| {
            LayoutError::Repository(RepositoryError::LockError(format!("区域锁表获取失败: {}", e)))
        })?;
        Ok(locks
            .entry(zone_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn load_zone_grid(&self, zone_code: &str) -> LayoutResult<Grid> {
        let zone = self
            .repo
            .get_zone(zone_code)?
            .ok_or_else(|| LayoutError::ZoneNotFound(zone_code.to_string()))?;
        Ok(zone.grid())
    }

    /// 对假想占位做越界/重叠校验
    ///
    /// # 参数
    /// - others: 参与碰撞的(库位编码, 占位)集合, 调用方已排除 block/flex 与自身
    fn check_footprint(
        grid: &Grid,
        location: &str,
        rect: &Rect,
        others: &[(String, Rect)],
    ) -> LayoutResult<()> {
        if !grid.contains(rect) {
            return Err(LayoutError::OutOfBounds {
                location: location.to_string(),
                grid_width: grid.width,
                grid_height: grid.height,
            });
        }
        let colliding: Vec<String> = others
            .iter()
            .filter(|(_, other)| rect.overlaps(other))
            .map(|(loc, _)| loc.clone())
            .collect();
        if !colliding.is_empty() {
            return Err(LayoutError::Overlap {
                location: location.to_string(),
                colliding,
            });
        }
        Ok(())
    }

    /// 区域内参与碰撞的兄弟组件占位(排除 block/flex 与 exclude_id)
    fn physical_footprints(
        &self,
        zone_code: &str,
        exclude_id: Option<&str>,
    ) -> LayoutResult<Vec<(String, Rect)>> {
        let components = self.repo.list_by_zone(zone_code)?;
        Ok(components
            .iter()
            .filter(|c| c.is_physical() && Some(c.id.as_str()) != exclude_id)
            .map(|c| (c.location.clone(), c.footprint()))
            .collect())
    }

    fn publish(&self, zone_code: &str, event_type: LayoutEventType) {
        let event = LayoutEvent::zone_scoped(
            zone_code.to_string(),
            event_type,
            Some("PlacementEngine".to_string()),
        );
        if let Err(e) = self.events.publish(event) {
            // 事件发布失败不回滚已提交的布局变更, 由下游全量刷新兜底
            tracing::warn!("布局事件发布失败: {}", e);
        }
    }

    // ===== 操作 =====

    /// 放置新组件
    ///
    /// # 返回
    /// - Ok(component): 已提交的组件
    /// - Err: 校验失败, 数据库无任何变化
    pub fn place(&self, component: Component) -> LayoutResult<Component> {
        component
            .validate()
            .map_err(LayoutError::InvalidGeometry)?;

        let lock = self.zone_lock(&component.zone_code)?;
        let _guard = lock.lock().map_err(|e| {
            LayoutError::Repository(RepositoryError::LockError(format!("区域锁获取失败: {}", e)))
        })?;

        let grid = self.load_zone_grid(&component.zone_code)?;
        if component.is_physical() {
            let others = self.physical_footprints(&component.zone_code, None)?;
            Self::check_footprint(&grid, &component.location, &component.footprint(), &others)?;
        } else if !grid.contains(&component.footprint()) {
            // 标注层不参与重叠, 但仍须落在网格内
            return Err(LayoutError::OutOfBounds {
                location: component.location.clone(),
                grid_width: grid.width,
                grid_height: grid.height,
            });
        }

        self.repo.insert(&component)?;
        info!(
            zone = %component.zone_code,
            location = %component.location,
            "组件放置完成"
        );
        self.publish(&component.zone_code, LayoutEventType::ComponentPlaced);
        Ok(component)
    }

    /// 移动组件(位移增量)
    pub fn move_component(&self, component_id: &str, dx: i64, dy: i64) -> LayoutResult<()> {
        let component = self
            .repo
            .get(component_id)?
            .ok_or_else(|| LayoutError::ComponentNotFound(component_id.to_string()))?;

        let lock = self.zone_lock(&component.zone_code)?;
        let _guard = lock.lock().map_err(|e| {
            LayoutError::Repository(RepositoryError::LockError(format!("区域锁获取失败: {}", e)))
        })?;

        let grid = self.load_zone_grid(&component.zone_code)?;
        let mut next = component.clone();
        next.x += dx;
        next.y += dy;

        if next.is_physical() {
            let others = self.physical_footprints(&next.zone_code, Some(component_id))?;
            Self::check_footprint(&grid, &next.location, &next.footprint(), &others)?;
        } else if !grid.contains(&next.footprint()) {
            return Err(LayoutError::OutOfBounds {
                location: next.location.clone(),
                grid_width: grid.width,
                grid_height: grid.height,
            });
        }

        self.repo.update_position(component_id, next.x, next.y, next.rotation)?;
        debug!(component_id, dx, dy, "组件移动完成");
        self.publish(&next.zone_code, LayoutEventType::ComponentMoved);
        Ok(())
    }

    /// 调整组件尺寸
    pub fn resize(&self, component_id: &str, width: i64, height: i64) -> LayoutResult<()> {
        if width <= 0 || height <= 0 {
            return Err(LayoutError::InvalidGeometry(format!(
                "尺寸必须为正: {}x{}",
                width, height
            )));
        }
        let component = self
            .repo
            .get(component_id)?
            .ok_or_else(|| LayoutError::ComponentNotFound(component_id.to_string()))?;

        let lock = self.zone_lock(&component.zone_code)?;
        let _guard = lock.lock().map_err(|e| {
            LayoutError::Repository(RepositoryError::LockError(format!("区域锁获取失败: {}", e)))
        })?;

        let grid = self.load_zone_grid(&component.zone_code)?;
        let mut next = component.clone();
        next.width = width;
        next.height = height;

        if next.is_physical() {
            let others = self.physical_footprints(&next.zone_code, Some(component_id))?;
            Self::check_footprint(&grid, &next.location, &next.footprint(), &others)?;
        } else if !grid.contains(&next.footprint()) {
            return Err(LayoutError::OutOfBounds {
                location: next.location.clone(),
                grid_width: grid.width,
                grid_height: grid.height,
            });
        }

        self.repo.update_size(component_id, width, height)?;
        debug!(component_id, width, height, "组件尺寸调整完成");
        self.publish(&next.zone_code, LayoutEventType::ComponentResized);
        Ok(())
    }

    /// 移除组件
    pub fn remove(&self, component_id: &str) -> LayoutResult<()> {
        let component = self
            .repo
            .get(component_id)?
            .ok_or_else(|| LayoutError::ComponentNotFound(component_id.to_string()))?;

        let lock = self.zone_lock(&component.zone_code)?;
        let _guard = lock.lock().map_err(|e| {
            LayoutError::Repository(RepositoryError::LockError(format!("区域锁获取失败: {}", e)))
        })?;

        self.repo.delete(component_id)?;
        info!(component_id, zone = %component.zone_code, "组件移除完成");
        self.publish(&component.zone_code, LayoutEventType::ComponentRemoved);
        Ok(())
    }

    /// 寻找空位: 先按行扫描首选区域, 再扫描整个网格
    ///
    /// # 参数
    /// - preferred: 首选矩形区域(None 表示直接全网格)
    ///
    /// # 返回
    /// - Ok(rect): 第一个可容纳 width×height 的占位
    /// - Err(NoSpaceAvailable): 穷尽后仍无空位(非致命, 调用方自行回退)
    pub fn find_free_space(
        &self,
        zone_code: &str,
        width: i64,
        height: i64,
        preferred: Option<Rect>,
    ) -> LayoutResult<Rect> {
        if width <= 0 || height <= 0 {
            return Err(LayoutError::InvalidGeometry(format!(
                "尺寸必须为正: {}x{}",
                width, height
            )));
        }
        let grid = self.load_zone_grid(zone_code)?;
        let occupied = self.physical_footprints(zone_code, None)?;

        let fits = |x: i64, y: i64| -> Option<Rect> {
            let rect = Rect::new(x, y, width, height);
            if grid.contains(&rect) && !occupied.iter().any(|(_, o)| rect.overlaps(o)) {
                Some(rect)
            } else {
                None
            }
        };

        // 第一遍: 首选区域内按行扫描
        if let Some(pref) = preferred {
            let y_end = (pref.y + pref.height - height).min(grid.height - height);
            let x_end = (pref.x + pref.width - width).min(grid.width - width);
            let mut y = pref.y.max(0);
            while y <= y_end {
                let mut x = pref.x.max(0);
                while x <= x_end {
                    if let Some(rect) = fits(x, y) {
                        return Ok(rect);
                    }
                    x += 1;
                }
                y += 1;
            }
        }

        // 第二遍: 从原点全网格按行扫描
        for y in 0..=(grid.height - height).max(-1) {
            for x in 0..=(grid.width - width).max(-1) {
                if let Some(rect) = fits(x, y) {
                    return Ok(rect);
                }
            }
        }

        Err(LayoutError::NoSpaceAvailable { width, height })
    }

    /// 批量移动: 所有移动按"批次终态"整体校验, 任一失败则整批拒绝
    ///
    /// 终态校验允许组件互换位置(各自对终态集合无冲突即可)
    pub fn batch_move(&self, zone_code: &str, moves: &[MoveRequest]) -> LayoutResult<()> {
        if moves.is_empty() {
            return Ok(());
        }
        let lock = self.zone_lock(zone_code)?;
        let _guard = lock.lock().map_err(|e| {
            LayoutError::Repository(RepositoryError::LockError(format!("区域锁获取失败: {}", e)))
        })?;

        let grid = self.load_zone_grid(zone_code)?;
        let components = self.repo.list_by_zone(zone_code)?;
        let mut by_id: HashMap<&str, &Component> =
            components.iter().map(|c| (c.id.as_str(), c)).collect();

        // 构造终态位置表
        let mut end_state: HashMap<String, (i64, i64)> = HashMap::new();
        for m in moves {
            let c = by_id
                .remove(m.component_id.as_str())
                .ok_or_else(|| LayoutError::ComponentNotFound(m.component_id.clone()))?;
            end_state.insert(c.id.clone(), (c.x + m.dx, c.y + m.dy));
        }

        let end_rect = |c: &Component| -> Rect {
            let (x, y) = end_state.get(&c.id).copied().unwrap_or((c.x, c.y));
            Rect::with_rotation(x, y, c.width, c.height, c.rotation)
        };

        // 每个被移动组件对"终态集合"校验
        for m in moves {
            let c = components
                .iter()
                .find(|c| c.id == m.component_id)
                .ok_or_else(|| LayoutError::ComponentNotFound(m.component_id.clone()))?;
            let rect = end_rect(c);
            let others: Vec<(String, Rect)> = components
                .iter()
                .filter(|o| o.is_physical() && o.id != c.id)
                .map(|o| (o.location.clone(), end_rect(o)))
                .collect();
            if c.is_physical() {
                Self::check_footprint(&grid, &c.location, &rect, &others)?;
            } else if !grid.contains(&rect) {
                return Err(LayoutError::OutOfBounds {
                    location: c.location.clone(),
                    grid_width: grid.width,
                    grid_height: grid.height,
                });
            }
        }

        let commits: Vec<(String, i64, i64)> = end_state
            .into_iter()
            .map(|(id, (x, y))| (id, x, y))
            .collect();
        self.repo.commit_positions(&commits)?;
        info!(zone = zone_code, count = moves.len(), "批量移动提交完成");
        self.publish(zone_code, LayoutEventType::ComponentMoved);
        Ok(())
    }
}
