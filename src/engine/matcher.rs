// ==========================================
// 仓库布局与库存对账系统 - 库位匹配器
// ==========================================
// 职责: 自由文本库位标识 → 布局组件(整件或楼层/格位)
// 两段式: 先整编码精确匹配, 再货架前缀 + 楼层-格位后缀解析
// 红线: 不匹配/多义必须显式输出, 从不猜测; 编号方案不参与匹配
// ==========================================

use crate::domain::component::{Component, ComponentKind};
use crate::domain::inventory::normalize_identifier;

/// 匹配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// 整个组件(平面库位, 或货架整架编码)
    Component { component_id: String, location: String },
    /// 货架内定位: 楼层与格位均为 1 起始
    RackCell {
        component_id: String,
        location: String,
        floor: usize,
        cell: usize,
    },
    /// 无法归属
    Unassigned,
    /// 前缀命中多个货架, 拒绝猜测
    Ambiguous { candidates: Vec<String> },
}

impl MatchOutcome {
    /// 匹配到的组件 id(Unassigned/Ambiguous 为 None)
    pub fn component_id(&self) -> Option<&str> {
        match self {
            MatchOutcome::Component { component_id, .. }
            | MatchOutcome::RackCell { component_id, .. } => Some(component_id),
            _ => None,
        }
    }

    /// 匹配到的组件基础库位编码
    pub fn base_location(&self) -> Option<&str> {
        match self {
            MatchOutcome::Component { location, .. }
            | MatchOutcome::RackCell { location, .. } => Some(location),
            _ => None,
        }
    }
}

// ==========================================
// LocationMatcher
// ==========================================
// 对一个区域的组件集合做重复匹配时构建一次
pub struct LocationMatcher {
    /// 参与匹配的物理组件(block/flex 标注不承接库存)
    components: Vec<Component>,
}

impl LocationMatcher {
    pub fn new(components: &[Component]) -> Self {
        Self {
            components: components.iter().filter(|c| c.is_physical()).cloned().collect(),
        }
    }

    /// 匹配一条库位标识
    ///
    /// # 参数
    /// - raw: 来源系统原始标识(内部先做 trim + 大写归一化)
    pub fn match_identifier(&self, raw: &str) -> MatchOutcome {
        let ident = normalize_identifier(raw);
        if ident.is_empty() {
            return MatchOutcome::Unassigned;
        }

        // 第一段: 整编码精确匹配(平面与货架一视同仁)
        if let Some(c) = self.components.iter().find(|c| c.location == ident) {
            return MatchOutcome::Component {
                component_id: c.id.clone(),
                location: c.location.clone(),
            };
        }

        // 第二段: 货架前缀 + "<floor>-<cell>" 后缀
        let prefix_hits: Vec<&Component> = self
            .components
            .iter()
            .filter(|c| {
                matches!(c.kind, ComponentKind::Rack { .. })
                    && ident.starts_with(&format!("{}-", c.location))
            })
            .collect();

        if prefix_hits.len() > 1 {
            return MatchOutcome::Ambiguous {
                candidates: prefix_hits.iter().map(|c| c.location.clone()).collect(),
            };
        }

        if let Some(rack) = prefix_hits.first() {
            let suffix = &ident[rack.location.len() + 1..];
            if let Some((floor, cell)) = parse_floor_cell(suffix) {
                if let Some((floors, rows)) = rack.rack_dims() {
                    if floor <= floors && cell <= rows {
                        return MatchOutcome::RackCell {
                            component_id: rack.id.clone(),
                            location: rack.location.clone(),
                            floor,
                            cell,
                        };
                    }
                }
            }
        }

        MatchOutcome::Unassigned
    }
}

/// 解析 "<floor>-<cell>" 后缀: 两段 1 起始正整数
fn parse_floor_cell(suffix: &str) -> Option<(usize, usize)> {
    let mut parts = suffix.split('-');
    let floor = parts.next()?.parse::<usize>().ok()?;
    let cell = parts.next()?.parse::<usize>().ok()?;
    if parts.next().is_some() || floor == 0 || cell == 0 {
        return None;
    }
    Some((floor, cell))
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::{Numbering, NumberingOrder};
    use crate::domain::types::{Rotation, ZoneType};

    fn rack(id: &str, location: &str, floors: usize, rows: usize) -> Component {
        Component {
            id: id.to_string(),
            zone_code: "Z1".to_string(),
            location: location.to_string(),
            x: 0,
            y: 0,
            width: rows as i64,
            height: 1,
            rotation: Rotation::R0,
            zone_type: ZoneType::Standard,
            filter: None,
            kind: ComponentKind::Rack {
                floors,
                rows,
                floor_capacities: None,
                cell_available: None,
                cell_multiplier: None,
                floor_filters: None,
                cell_filters: Vec::new(),
                numbering: Numbering::default(),
            },
        }
    }

    fn flat(id: &str, location: &str) -> Component {
        Component {
            id: id.to_string(),
            zone_code: "Z1".to_string(),
            location: location.to_string(),
            x: 5,
            y: 5,
            width: 2,
            height: 2,
            rotation: Rotation::R0,
            zone_type: ZoneType::Standard,
            filter: None,
            kind: ComponentKind::Flat { rows: 4, cols: 3, max_capacity: None },
        }
    }

    #[test]
    fn test_exact_match_flat_and_rack() {
        let matcher = LocationMatcher::new(&[rack("r1", "A1", 2, 3), flat("f1", "Z1-F01")]);

        assert_eq!(
            matcher.match_identifier("Z1-F01"),
            MatchOutcome::Component {
                component_id: "f1".to_string(),
                location: "Z1-F01".to_string()
            }
        );
        // 货架整架编码(无后缀)
        assert_eq!(
            matcher.match_identifier("A1"),
            MatchOutcome::Component {
                component_id: "r1".to_string(),
                location: "A1".to_string()
            }
        );
        // 归一化: 小写 + 空白
        assert_eq!(
            matcher.match_identifier("  z1-f01 "),
            MatchOutcome::Component {
                component_id: "f1".to_string(),
                location: "Z1-F01".to_string()
            }
        );
    }

    #[test]
    fn test_rack_cell_suffix() {
        let matcher = LocationMatcher::new(&[rack("r1", "A1", 2, 3)]);

        assert_eq!(
            matcher.match_identifier("A1-1-2"),
            MatchOutcome::RackCell {
                component_id: "r1".to_string(),
                location: "A1".to_string(),
                floor: 1,
                cell: 2,
            }
        );
        assert_eq!(
            matcher.match_identifier("A1-2-3"),
            MatchOutcome::RackCell {
                component_id: "r1".to_string(),
                location: "A1".to_string(),
                floor: 2,
                cell: 3,
            }
        );
    }

    #[test]
    fn test_out_of_range_suffix_unassigned() {
        let matcher = LocationMatcher::new(&[rack("r1", "A1", 2, 3)]);

        // 2 层货架不存在第 3 层
        assert_eq!(matcher.match_identifier("A1-3-1"), MatchOutcome::Unassigned);
        // 每层 3 格不存在第 4 格
        assert_eq!(matcher.match_identifier("A1-1-4"), MatchOutcome::Unassigned);
        // 0 起始/非数字/段数不对
        assert_eq!(matcher.match_identifier("A1-0-1"), MatchOutcome::Unassigned);
        assert_eq!(matcher.match_identifier("A1-X-1"), MatchOutcome::Unassigned);
        assert_eq!(matcher.match_identifier("A1-1-2-3"), MatchOutcome::Unassigned);
        assert_eq!(matcher.match_identifier("A1-1"), MatchOutcome::Unassigned);
    }

    #[test]
    fn test_unknown_identifier_unassigned() {
        let matcher = LocationMatcher::new(&[rack("r1", "A1", 2, 3)]);
        assert_eq!(matcher.match_identifier("B9-1-1"), MatchOutcome::Unassigned);
        assert_eq!(matcher.match_identifier(""), MatchOutcome::Unassigned);
    }

    #[test]
    fn test_ambiguous_prefix() {
        // "A1-1-2" 同时是 "A1" 与 "A1-1" 两个货架的前缀
        let matcher = LocationMatcher::new(&[rack("r1", "A1", 2, 3), rack("r2", "A1-1", 2, 3)]);
        match matcher.match_identifier("A1-1-2") {
            MatchOutcome::Ambiguous { candidates } => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.contains(&"A1".to_string()));
                assert!(candidates.contains(&"A1-1".to_string()));
            }
            other => panic!("应为 Ambiguous: {:?}", other),
        }
    }

    #[test]
    fn test_flat_never_takes_suffix() {
        let matcher = LocationMatcher::new(&[flat("f1", "Z1-F01")]);
        // 平面库位没有子格位后缀语义
        assert_eq!(matcher.match_identifier("Z1-F01-1-1"), MatchOutcome::Unassigned);
    }

    #[test]
    fn test_block_flex_not_matchable() {
        let mut annotation = flat("b1", "通道A");
        annotation.zone_type = ZoneType::Block;
        let matcher = LocationMatcher::new(&[annotation]);
        assert_eq!(matcher.match_identifier("通道A"), MatchOutcome::Unassigned);
    }

    #[test]
    fn test_numbering_scheme_does_not_affect_matching() {
        // 倒序编号 + 每层格数不等的货架: 匹配结果只看结构维度
        let mut r = rack("r1", "A1", 3, 4);
        if let ComponentKind::Rack { numbering, floor_capacities, .. } = &mut r.kind {
            numbering.order = NumberingOrder::Descending;
            *floor_capacities = Some(vec![4, 2, 1]);
        }
        let matcher = LocationMatcher::new(&[r]);
        assert_eq!(
            matcher.match_identifier("A1-2-4"),
            MatchOutcome::RackCell {
                component_id: "r1".to_string(),
                location: "A1".to_string(),
                floor: 2,
                cell: 4,
            },
            "编号方案与层容量覆盖不影响匹配"
        );
    }
}
