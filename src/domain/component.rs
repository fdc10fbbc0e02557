// ==========================================
// 仓库布局与库存对账系统 - 布局组件实体
// ==========================================
// 职责: 组件结构定义、结构校验、名义容量、限制解析
// 红线: 编号方案只生成展示编码, 不参与匹配与容量
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::grid::Rect;
use crate::domain::types::{Rotation, ZoneType};

// ==========================================
// 物料限制 (Material Filter)
// ==========================================
// 大类/小类/明确物料清单三种维度, 全部为空视为不限
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialFilter {
    pub major_category: Option<String>,
    pub minor_category: Option<String>,
    #[serde(default)]
    pub allowed_items: Vec<String>,
}

impl MaterialFilter {
    /// 限制是否放行给定物料
    ///
    /// # 参数
    /// - major/minor: 物料分类(来自 item_category 维表, 可能缺失)
    /// - item_code: 物料编码
    pub fn permits(&self, major: Option<&str>, minor: Option<&str>, item_code: &str) -> bool {
        if let Some(want) = &self.major_category {
            if major != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.minor_category {
            if minor != Some(want.as_str()) {
                return false;
            }
        }
        if !self.allowed_items.is_empty() && !self.allowed_items.iter().any(|i| i == item_code) {
            return false;
        }
        true
    }

    pub fn is_unrestricted(&self) -> bool {
        self.major_category.is_none()
            && self.minor_category.is_none()
            && self.allowed_items.is_empty()
    }
}

// ==========================================
// 编号方案 (Numbering)
// ==========================================
// 仅用于生成展示用子库位编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberingOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberingAxis {
    FloorFirst,
    CellFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Numbering {
    pub order: NumberingOrder,
    pub axis: NumberingAxis,
}

impl Default for Numbering {
    fn default() -> Self {
        Numbering { order: NumberingOrder::Ascending, axis: NumberingAxis::FloorFirst }
    }
}

// ==========================================
// 单元格限制覆盖
// ==========================================
// floor/cell 均为 1 起始
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFilter {
    pub floor: usize,
    pub cell: usize,
    pub filter: MaterialFilter,
}

// ==========================================
// 组件种类 (tagged union)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentKind {
    /// 货架: 多层 × 每层若干格
    Rack {
        floors: usize,
        /// 每层单元格数
        rows: usize,
        /// 每层容量覆盖(缺省按可用格数 × 倍率计算)
        floor_capacities: Option<Vec<i64>>,
        /// 单元格可用性网格 [floor][cell], 缺省全可用(false = 立柱等占位)
        cell_available: Option<Vec<Vec<bool>>>,
        /// 单元格容量倍率 [floor][cell], 缺省为 1
        cell_multiplier: Option<Vec<Vec<i64>>>,
        /// 每层限制覆盖(按层索引, None = 继承组件级)
        floor_filters: Option<Vec<Option<MaterialFilter>>>,
        /// 单元格限制覆盖
        #[serde(default)]
        cell_filters: Vec<CellFilter>,
        #[serde(default)]
        numbering: Numbering,
    },
    /// 平面库位: rows × cols 容量网格
    Flat {
        rows: usize,
        cols: usize,
        /// 容量覆盖(缺省 rows * cols)
        max_capacity: Option<i64>,
    },
}

// ==========================================
// 布局组件 (Component)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub zone_code: String,
    /// 库位编码, 区域内唯一, 统一大写
    pub location: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub rotation: Rotation,
    #[serde(default = "default_zone_type")]
    pub zone_type: ZoneType,
    /// 组件级物料限制
    pub filter: Option<MaterialFilter>,
    pub kind: ComponentKind,
}

fn default_zone_type() -> ZoneType {
    ZoneType::Standard
}

impl Component {
    /// 结构校验: 尺寸为正、容量数组维度与 floors × rows 一致
    ///
    /// # 返回
    /// - Err(原因) 表示几何/结构不合法
    pub fn validate(&self) -> Result<(), String> {
        if self.width <= 0 || self.height <= 0 {
            return Err(format!(
                "组件 {} 尺寸必须为正: {}x{}",
                self.location, self.width, self.height
            ));
        }
        if self.location.trim().is_empty() {
            return Err(format!("组件 {} 库位编码不能为空", self.id));
        }
        match &self.kind {
            ComponentKind::Rack {
                floors,
                rows,
                floor_capacities,
                cell_available,
                cell_multiplier,
                floor_filters,
                cell_filters,
                ..
            } => {
                if *floors == 0 || *rows == 0 {
                    return Err(format!("货架 {} 层数/格数必须为正", self.location));
                }
                if let Some(caps) = floor_capacities {
                    if caps.len() != *floors {
                        return Err(format!(
                            "货架 {} 层容量数组长度 {} 与层数 {} 不一致",
                            self.location,
                            caps.len(),
                            floors
                        ));
                    }
                }
                for (name, grid_len) in [
                    ("可用性", cell_available.as_ref().map(|g| g.len())),
                    ("倍率", cell_multiplier.as_ref().map(|g| g.len())),
                ] {
                    if let Some(len) = grid_len {
                        if len != *floors {
                            return Err(format!(
                                "货架 {} 单元格{}网格层数 {} 与层数 {} 不一致",
                                self.location, name, len, floors
                            ));
                        }
                    }
                }
                if let Some(grid) = cell_available {
                    if grid.iter().any(|row| row.len() != *rows) {
                        return Err(format!("货架 {} 可用性网格格数与 rows 不一致", self.location));
                    }
                }
                if let Some(grid) = cell_multiplier {
                    if grid.iter().any(|row| row.len() != *rows) {
                        return Err(format!("货架 {} 倍率网格格数与 rows 不一致", self.location));
                    }
                    if grid.iter().flatten().any(|m| *m < 0) {
                        return Err(format!("货架 {} 单元格倍率不能为负", self.location));
                    }
                }
                if let Some(ff) = floor_filters {
                    if ff.len() != *floors {
                        return Err(format!("货架 {} 层限制数组长度与层数不一致", self.location));
                    }
                }
                for cf in cell_filters {
                    if cf.floor == 0 || cf.floor > *floors || cf.cell == 0 || cf.cell > *rows {
                        return Err(format!(
                            "货架 {} 单元格限制坐标越界: {}-{}",
                            self.location, cf.floor, cf.cell
                        ));
                    }
                }
            }
            ComponentKind::Flat { rows, cols, max_capacity } => {
                if *rows == 0 || *cols == 0 {
                    return Err(format!("平面库位 {} 行列必须为正", self.location));
                }
                if let Some(cap) = max_capacity {
                    if *cap < 0 {
                        return Err(format!("平面库位 {} 容量覆盖不能为负", self.location));
                    }
                }
            }
        }
        Ok(())
    }

    /// 旋转后的实际占位矩形
    pub fn footprint(&self) -> Rect {
        Rect::with_rotation(self.x, self.y, self.width, self.height, self.rotation)
    }

    /// 是否参与重叠检查与容量统计(block/flex 为视觉标注层)
    pub fn is_physical(&self) -> bool {
        self.zone_type.capacity_tracked()
    }

    /// 名义容量
    ///
    /// - 货架: Σ 每层(层覆盖优先, 否则可用格数 × 倍率)
    /// - 平面: 覆盖值优先, 否则 rows × cols
    /// - block/flex: 不统计, 返回 None
    pub fn nominal_capacity(&self) -> Option<i64> {
        if !self.is_physical() {
            return None;
        }
        match &self.kind {
            ComponentKind::Rack {
                floors,
                rows,
                floor_capacities,
                cell_available,
                cell_multiplier,
                ..
            } => {
                let mut total = 0i64;
                for f in 0..*floors {
                    if let Some(cap) = floor_capacities.as_ref().and_then(|c| c.get(f)) {
                        total += *cap;
                        continue;
                    }
                    for c in 0..*rows {
                        let available = cell_available
                            .as_ref()
                            .and_then(|g| g.get(f))
                            .and_then(|row| row.get(c))
                            .copied()
                            .unwrap_or(true);
                        if !available {
                            continue;
                        }
                        total += cell_multiplier
                            .as_ref()
                            .and_then(|g| g.get(f))
                            .and_then(|row| row.get(c))
                            .copied()
                            .unwrap_or(1);
                    }
                }
                Some(total)
            }
            ComponentKind::Flat { rows, cols, max_capacity } => {
                Some(max_capacity.unwrap_or((*rows as i64) * (*cols as i64)))
            }
        }
    }

    /// 限制解析: 单元格级 > 层级 > 组件级
    ///
    /// # 参数
    /// - floor/cell: 1 起始; 平面库位忽略, 直接取组件级
    pub fn effective_filter(&self, floor: usize, cell: usize) -> Option<&MaterialFilter> {
        if let ComponentKind::Rack { floor_filters, cell_filters, .. } = &self.kind {
            if let Some(cf) = cell_filters.iter().find(|cf| cf.floor == floor && cf.cell == cell) {
                return Some(&cf.filter);
            }
            if let Some(Some(ff)) = floor_filters.as_ref().and_then(|ff| ff.get(floor - 1)) {
                return Some(ff);
            }
        }
        self.filter.as_ref()
    }

    /// 生成展示用子库位编码(仅货架有子编码)
    ///
    /// 编号方案只影响展示数字, 不影响匹配与容量
    pub fn cell_location_code(&self, floor: usize, cell: usize) -> Option<String> {
        match &self.kind {
            ComponentKind::Rack { floors, rows, numbering, .. } => {
                if floor == 0 || floor > *floors || cell == 0 || cell > *rows {
                    return None;
                }
                let cell_display = match numbering.order {
                    NumberingOrder::Ascending => cell,
                    NumberingOrder::Descending => *rows + 1 - cell,
                };
                Some(match numbering.axis {
                    NumberingAxis::FloorFirst => {
                        format!("{}-{}-{}", self.location, floor, cell_display)
                    }
                    NumberingAxis::CellFirst => {
                        format!("{}-{}-{}", self.location, cell_display, floor)
                    }
                })
            }
            ComponentKind::Flat { .. } => None,
        }
    }

    /// 货架层数/每层格数(平面返回 None)
    pub fn rack_dims(&self) -> Option<(usize, usize)> {
        match &self.kind {
            ComponentKind::Rack { floors, rows, .. } => Some((*floors, *rows)),
            ComponentKind::Flat { .. } => None,
        }
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn base_rack() -> Component {
        Component {
            id: "c1".to_string(),
            zone_code: "Z1".to_string(),
            location: "A1".to_string(),
            x: 0,
            y: 0,
            width: 3,
            height: 1,
            rotation: Rotation::R0,
            zone_type: ZoneType::Standard,
            filter: None,
            kind: ComponentKind::Rack {
                floors: 2,
                rows: 3,
                floor_capacities: None,
                cell_available: None,
                cell_multiplier: None,
                floor_filters: None,
                cell_filters: Vec::new(),
                numbering: Numbering::default(),
            },
        }
    }

    fn base_flat() -> Component {
        Component {
            id: "c2".to_string(),
            zone_code: "Z1".to_string(),
            location: "Z1-F01".to_string(),
            x: 4,
            y: 0,
            width: 2,
            height: 2,
            rotation: Rotation::R0,
            zone_type: ZoneType::Standard,
            filter: None,
            kind: ComponentKind::Flat { rows: 4, cols: 3, max_capacity: None },
        }
    }

    #[test]
    fn test_rack_nominal_capacity_default() {
        // 2 层 × 3 格, 无覆盖 → 6
        assert_eq!(base_rack().nominal_capacity(), Some(6));
    }

    #[test]
    fn test_rack_capacity_floor_override_wins() {
        let mut c = base_rack();
        if let ComponentKind::Rack { floor_capacities, .. } = &mut c.kind {
            *floor_capacities = Some(vec![10, 2]);
        }
        assert_eq!(c.nominal_capacity(), Some(12), "层覆盖优先于格数计算");
    }

    #[test]
    fn test_rack_capacity_unavailable_and_multiplier() {
        let mut c = base_rack();
        if let ComponentKind::Rack { cell_available, cell_multiplier, .. } = &mut c.kind {
            // 第 1 层第 2 格为立柱; 第 2 层第 1 格可放 3 件
            *cell_available = Some(vec![vec![true, false, true], vec![true, true, true]]);
            *cell_multiplier = Some(vec![vec![1, 1, 1], vec![3, 1, 1]]);
        }
        // 第 1 层: 2 格; 第 2 层: 3 + 1 + 1 = 5
        assert_eq!(c.nominal_capacity(), Some(7));
    }

    #[test]
    fn test_flat_capacity() {
        assert_eq!(base_flat().nominal_capacity(), Some(12));
        let mut c = base_flat();
        if let ComponentKind::Flat { max_capacity, .. } = &mut c.kind {
            *max_capacity = Some(20);
        }
        assert_eq!(c.nominal_capacity(), Some(20), "覆盖值优先");
    }

    #[test]
    fn test_block_flex_not_tracked() {
        let mut c = base_flat();
        c.zone_type = ZoneType::Block;
        assert_eq!(c.nominal_capacity(), None);
        c.zone_type = ZoneType::Flex;
        assert_eq!(c.nominal_capacity(), None);
    }

    #[test]
    fn test_validate_dimension_mismatch() {
        let mut c = base_rack();
        if let ComponentKind::Rack { floor_capacities, .. } = &mut c.kind {
            *floor_capacities = Some(vec![10]); // 2 层却只给 1 个
        }
        assert!(c.validate().is_err());

        let mut c = base_rack();
        c.width = 0;
        assert!(c.validate().is_err(), "零宽不合法");

        assert!(base_rack().validate().is_ok());
        assert!(base_flat().validate().is_ok());
    }

    #[test]
    fn test_effective_filter_precedence() {
        let mut c = base_rack();
        c.filter = Some(MaterialFilter {
            major_category: Some("钢材".to_string()),
            ..Default::default()
        });
        if let ComponentKind::Rack { floor_filters, cell_filters, .. } = &mut c.kind {
            *floor_filters = Some(vec![
                None,
                Some(MaterialFilter {
                    minor_category: Some("冷轧".to_string()),
                    ..Default::default()
                }),
            ]);
            cell_filters.push(CellFilter {
                floor: 2,
                cell: 1,
                filter: MaterialFilter {
                    allowed_items: vec!["SKU-9".to_string()],
                    ..Default::default()
                },
            });
        }
        // 单元格级覆盖优先
        assert_eq!(
            c.effective_filter(2, 1).unwrap().allowed_items,
            vec!["SKU-9".to_string()]
        );
        // 层级次之
        assert_eq!(
            c.effective_filter(2, 2).unwrap().minor_category.as_deref(),
            Some("冷轧")
        );
        // 无覆盖回落组件级
        assert_eq!(
            c.effective_filter(1, 1).unwrap().major_category.as_deref(),
            Some("钢材")
        );
    }

    #[test]
    fn test_material_filter_permits() {
        let f = MaterialFilter {
            major_category: Some("钢材".to_string()),
            minor_category: None,
            allowed_items: vec![],
        };
        assert!(f.permits(Some("钢材"), None, "SKU-1"));
        assert!(!f.permits(Some("铝材"), None, "SKU-1"));
        assert!(!f.permits(None, None, "SKU-1"), "分类缺失视为不满足");

        let f = MaterialFilter {
            major_category: None,
            minor_category: None,
            allowed_items: vec!["SKU-1".to_string()],
        };
        assert!(f.permits(None, None, "SKU-1"));
        assert!(!f.permits(None, None, "SKU-2"));
    }

    #[test]
    fn test_cell_location_code_numbering_display_only() {
        let c = base_rack();
        assert_eq!(c.cell_location_code(1, 2).as_deref(), Some("A1-1-2"));
        assert_eq!(c.cell_location_code(3, 1), None, "层越界无编码");
        assert_eq!(c.cell_location_code(1, 4), None, "格越界无编码");

        let mut c = base_rack();
        if let ComponentKind::Rack { numbering, .. } = &mut c.kind {
            numbering.order = NumberingOrder::Descending;
        }
        assert_eq!(c.cell_location_code(1, 1).as_deref(), Some("A1-1-3"));

        let mut c = base_rack();
        if let ComponentKind::Rack { numbering, .. } = &mut c.kind {
            numbering.axis = NumberingAxis::CellFirst;
        }
        assert_eq!(c.cell_location_code(1, 2).as_deref(), Some("A1-2-1"));

        // 平面库位无子编码
        assert_eq!(base_flat().cell_location_code(1, 1), None);
    }
}
