// ==========================================
// 仓库布局与库存对账系统 - 网格几何
// ==========================================
// 职责: 有界网格上的纯几何运算(越界/重叠判定)
// 红线: 不含数据访问逻辑,不含业务规则
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::Rotation;

/// 区域网格: 宽 × 高 的有界离散单元格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i64,
    pub height: i64,
}

impl Grid {
    pub fn new(width: i64, height: i64) -> Self {
        Grid { width, height }
    }

    /// 矩形是否完整落在网格内
    pub fn contains(&self, rect: &Rect) -> bool {
        rect.x >= 0
            && rect.y >= 0
            && rect.width > 0
            && rect.height > 0
            && rect.x + rect.width <= self.width
            && rect.y + rect.height <= self.height
    }
}

/// 轴对齐矩形占位: 左上角 (x, y) + 宽高, 单位为网格单元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Rect { x, y, width, height }
    }

    /// 按旋转角生成实际占位(90°/270° 交换宽高, 锚点不变)
    pub fn with_rotation(x: i64, y: i64, width: i64, height: i64, rotation: Rotation) -> Self {
        if rotation.swaps_axes() {
            Rect { x, y, width: height, height: width }
        } else {
            Rect { x, y, width, height }
        }
    }

    /// 严格重叠判定: 共享至少一个单元格才算重叠, 贴边不算
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width * self.height
    }
}
