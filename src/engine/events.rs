// ==========================================
// 仓库布局与库存对账系统 - 引擎层事件发布
// ==========================================
// 职责: 定义布局/摄取事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，Recon 层实现适配器
// 红线: 布局变更只标脏, 从不在引擎内联重算
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 布局事件类型
// ==========================================

/// 布局/摄取事件触发类型
///
/// Engine 层定义的事件类型，用于通知下游系统
/// Recon 层的 RefreshTrigger 可以从此类型转换
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutEventType {
    /// 组件放置
    ComponentPlaced,
    /// 组件移动(含批量移动)
    ComponentMoved,
    /// 组件改尺寸
    ComponentResized,
    /// 组件移除
    ComponentRemoved,
    /// 快照批次摄取完成
    InventoryIngested,
    /// 手动触发
    ManualTrigger,
}

impl LayoutEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            LayoutEventType::ComponentPlaced => "ComponentPlaced",
            LayoutEventType::ComponentMoved => "ComponentMoved",
            LayoutEventType::ComponentResized => "ComponentResized",
            LayoutEventType::ComponentRemoved => "ComponentRemoved",
            LayoutEventType::InventoryIngested => "InventoryIngested",
            LayoutEventType::ManualTrigger => "ManualTrigger",
        }
    }

    /// 是否为布局突变(只影响布局依赖的事实)
    pub fn is_layout_mutation(&self) -> bool {
        matches!(
            self,
            LayoutEventType::ComponentPlaced
                | LayoutEventType::ComponentMoved
                | LayoutEventType::ComponentResized
                | LayoutEventType::ComponentRemoved
        )
    }
}

/// 布局事件
///
/// Engine 层发布的事件，包含区域作用域与触发类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutEvent {
    /// 区域作用域(None 表示全部区域)
    pub zone_code: Option<String>,
    /// 事件类型
    pub event_type: LayoutEventType,
    /// 事件来源描述
    pub source: Option<String>,
}

impl LayoutEvent {
    /// 创建区域作用域事件
    pub fn zone_scoped(zone_code: String, event_type: LayoutEventType, source: Option<String>) -> Self {
        Self {
            zone_code: Some(zone_code),
            event_type,
            source,
        }
    }

    /// 创建全量事件
    pub fn full_scope(event_type: LayoutEventType, source: Option<String>) -> Self {
        Self {
            zone_code: None,
            event_type,
            source,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 布局事件发布者 Trait
///
/// Engine 层定义，Recon 层实现
/// 通过 trait 实现依赖倒置，解除 Engine → Recon 的直接依赖
///
/// # 实现说明
/// - Recon 层的刷新队列适配器实现此 trait
/// - 将 `LayoutEvent` 转换为标脏 + 刷新任务入队
pub trait LayoutEventPublisher: Send + Sync {
    /// 发布布局事件
    ///
    /// # 返回
    /// - `Ok(task_id)`: 任务 ID（如果支持）或空字符串
    /// - `Err`: 发布失败
    fn publish(&self, event: LayoutEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl LayoutEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: LayoutEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - zone={:?}, event_type={}",
            event.zone_code,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn LayoutEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn LayoutEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn LayoutEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: LayoutEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - zone={:?}, event_type={}",
                    event.zone_code,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_event_zone_scoped() {
        let event = LayoutEvent::zone_scoped(
            "Z1".to_string(),
            LayoutEventType::ComponentMoved,
            Some("PlacementEngine".to_string()),
        );

        assert_eq!(event.zone_code.as_deref(), Some("Z1"));
        assert!(event.event_type.is_layout_mutation());
    }

    #[test]
    fn test_ingest_event_not_layout_mutation() {
        let event = LayoutEvent::full_scope(LayoutEventType::InventoryIngested, None);
        assert!(event.zone_code.is_none());
        assert!(!event.event_type.is_layout_mutation());
        assert!(!LayoutEventType::ManualTrigger.is_layout_mutation());
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = NoOpEventPublisher;
        let event = LayoutEvent::full_scope(LayoutEventType::ManualTrigger, None);

        let result = publisher.publish(event);
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());

        let event = LayoutEvent::full_scope(LayoutEventType::ManualTrigger, None);
        assert!(publisher.publish(event).is_ok());
    }

    #[test]
    fn test_optional_publisher_with_noop() {
        let noop = Arc::new(NoOpEventPublisher) as Arc<dyn LayoutEventPublisher>;
        let publisher = OptionalEventPublisher::with_publisher(noop);
        assert!(publisher.is_configured());

        let event = LayoutEvent::zone_scoped(
            "Z1".to_string(),
            LayoutEventType::ComponentPlaced,
            None,
        );
        assert!(publisher.publish(event).is_ok());
    }
}
