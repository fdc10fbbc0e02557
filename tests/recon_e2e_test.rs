// ==========================================
// 布局 + 双源对账端到端测试
// ==========================================
// 通过 AppState 走完整链路:
// 建区 → 摆组件 → 双源摄取 → 手动刷新 → 六类事实读取 → 布局变更标脏
// ==========================================

use chrono::{Duration, Utc};

use warehouse_recon::app::AppState;
use warehouse_recon::domain::component::{Component, ComponentKind, MaterialFilter, Numbering};
use warehouse_recon::domain::inventory::RawInventoryRecord;
use warehouse_recon::domain::types::{FactState, Rotation, SourceFeed, ZoneType};
use warehouse_recon::repository::component_repo::ZoneRecord;

fn setup_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("e2e_test.db").to_string_lossy().to_string();
    let state = AppState::new(db_path).unwrap();
    state
        .layout_api
        .upsert_zone(&ZoneRecord {
            zone_code: "Z1".to_string(),
            zone_name: Some("成品库".to_string()),
            grid_width: 20,
            grid_height: 10,
            cell_size_px: 50,
        })
        .unwrap();
    (state, dir)
}

/// 平面库位 Z1-F01: 2×3 = 6 容量, 仅限大类"原料"
fn flat_component() -> Component {
    Component {
        id: "flat1".to_string(),
        zone_code: "Z1".to_string(),
        location: "Z1-F01".to_string(),
        x: 0,
        y: 0,
        width: 3,
        height: 2,
        rotation: Rotation::R0,
        zone_type: ZoneType::Standard,
        filter: Some(MaterialFilter {
            major_category: Some("原料".to_string()),
            minor_category: None,
            allowed_items: Vec::new(),
        }),
        kind: ComponentKind::Flat { rows: 2, cols: 3, max_capacity: None },
    }
}

/// 货架 A1: 2 层 × 3 格 = 6 容量, 无限制
fn rack_component() -> Component {
    Component {
        id: "rack1".to_string(),
        zone_code: "Z1".to_string(),
        location: "A1".to_string(),
        x: 5,
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

fn feed_row(
    source: SourceFeed,
    identifier: &str,
    item: &str,
    lot: Option<&str>,
    qty: f64,
    valid_in_days: Option<i64>,
    batch_id: &str,
) -> RawInventoryRecord {
    let today = Utc::now().date_naive();
    RawInventoryRecord {
        id: 0,
        source,
        zone_code: "Z1".to_string(),
        cell_identifier: identifier.to_string(),
        item_code: item.to_string(),
        lot_key: lot.map(|s| s.to_string()),
        available_qty: qty,
        total_qty: qty,
        inb_date: None,
        valid_date: valid_in_days.map(|d| today + Duration::days(d)),
        batch_id: batch_id.to_string(),
        fetched_at: Utc::now(),
    }
}

/// 标准场景: 作业口径 4 行(含一行无法归属), 企业口径 2 行
fn ingest_feeds(state: &AppState) {
    state
        .inventory_repo
        .upsert_item_category("SKU-A", Some("原料"), None)
        .unwrap();
    state
        .inventory_repo
        .upsert_item_category("SKU-X", Some("辅料"), None)
        .unwrap();

    let op = SourceFeed::Operational;
    state
        .inventory_repo
        .insert_batch(&[
            feed_row(op, "Z1-F01", "SKU-A", Some("L1"), 5.0, None, "OP-1"),
            feed_row(op, "Z1-F01", "SKU-X", None, 1.0, None, "OP-1"),
            feed_row(op, "A1-1-2", "SKU-B", Some("L2"), 3.0, Some(10), "OP-1"),
            feed_row(op, "DOCK-9", "SKU-C", None, 2.0, None, "OP-1"),
        ])
        .unwrap();

    // 企业口径按库位整编码上报
    let ent = SourceFeed::Enterprise;
    state
        .inventory_repo
        .insert_batch(&[
            feed_row(ent, "Z1-F01", "SKU-A", Some("L1"), 8.0, None, "ENT-1"),
            feed_row(ent, "A1", "SKU-B", Some("L2"), 3.0, None, "ENT-1"),
        ])
        .unwrap();
}

fn refreshed_state() -> (AppState, tempfile::TempDir) {
    let (state, dir) = setup_state();
    state.layout_api.place_component(flat_component()).unwrap();
    state.layout_api.place_component(rack_component()).unwrap();
    ingest_feeds(&state);
    state.recon_api.trigger_refresh(Some("Z1")).unwrap();
    state.recon_api.process_pending_refreshes().unwrap();
    (state, dir)
}

#[test]
fn test_location_summaries_per_component() {
    let (state, _dir) = refreshed_state();

    let result = state.recon_api.get_location_summaries("Z1").unwrap();
    assert!(result.is_fresh());
    assert_eq!(result.rows.len(), 2, "每个物理组件一行");

    let flat = result.rows.iter().find(|r| r.location == "Z1-F01").unwrap();
    assert_eq!(flat.current_stock, 2, "行数口径, 与件数无关");
    assert_eq!(flat.max_capacity, 6);
    assert_eq!(flat.utilization_pct, 33.33);
    // 批次分布按数量降序
    assert_eq!(flat.lot_distribution[0].lot_key, "L1");
    assert_eq!(flat.lot_distribution[0].qty, 5.0);
    assert_eq!(flat.materials_summary[0].item_code, "SKU-A");

    let rack = result.rows.iter().find(|r| r.location == "A1").unwrap();
    assert_eq!(rack.current_stock, 1, "格位级行汇到整架");
    assert_eq!(rack.max_capacity, 6);
}

#[test]
fn test_zone_capacity_rollup() {
    let (state, _dir) = refreshed_state();

    let result = state.recon_api.get_zone_capacity("Z1").unwrap();
    assert!(result.is_fresh());
    let summary = result.rows.as_ref().unwrap();
    assert_eq!(summary.total_capacity, 12);
    assert_eq!(summary.total_stock, 3, "仅统计匹配上布局的作业行, 行数口径");
    assert_eq!(summary.utilization_pct, 25.0);
    assert_eq!(summary.location_count, 2);
    assert_eq!(summary.unique_items, 3);
}

#[test]
fn test_discrepancies_cross_source() {
    let (state, _dir) = refreshed_state();

    let result = state.recon_api.get_discrepancies("Z1").unwrap();
    assert!(result.is_fresh());
    // SKU-B 两侧数量一致(格位行汇到 A1 整编码) → 无差异行
    assert_eq!(result.rows.len(), 3);

    // |Δ| 降序
    let first = &result.rows[0];
    assert_eq!(first.item_code, "SKU-A");
    assert_eq!((first.operational_qty, first.enterprise_qty), (5.0, 8.0));
    assert_eq!(first.delta, 3.0);

    let second = &result.rows[1];
    assert_eq!(second.item_code, "SKU-C");
    assert_eq!(second.location_group, "DOCK-9", "未归属标识按归一化原文分组");
    assert_eq!(second.delta, -2.0);

    let third = &result.rows[2];
    assert_eq!(third.item_code, "SKU-X");
    assert_eq!(third.lot_key, "NO_LOT");
    assert_eq!(third.delta, -1.0);
}

#[test]
fn test_expiring_items_ordering() {
    let (state, _dir) = refreshed_state();

    let result = state.recon_api.get_expiring_items("Z1").unwrap();
    assert!(result.is_fresh());
    // 无效期行保留, 垫底
    assert_eq!(result.rows.len(), 4);

    let first = &result.rows[0];
    assert_eq!(first.item_code, "SKU-B");
    assert_eq!(first.days_remaining, Some(10));
    assert!(result.rows[1..].iter().all(|r| r.valid_date.is_none()));
}

#[test]
fn test_category_capacity_with_mismatch() {
    let (state, _dir) = refreshed_state();

    let result = state.recon_api.get_category_capacities("Z1").unwrap();
    assert!(result.is_fresh());
    // 仅受限组件参与分类归集(货架无限制不上榜)
    assert_eq!(result.rows.len(), 1);

    let raw = &result.rows[0];
    assert_eq!(raw.category, "原料");
    assert_eq!(raw.capacity, 6);
    assert_eq!(raw.current_stock, 1);
    assert_eq!(raw.mismatched_stock, 1, "辅料行落在原料限制库位");
}

#[test]
fn test_unassigned_locations_reported() {
    let (state, _dir) = refreshed_state();

    let result = state.recon_api.get_unassigned_locations("Z1").unwrap();
    assert!(result.is_fresh());
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].identifier, "DOCK-9");
    assert_eq!(result.rows[0].record_count, 1);
    assert_eq!(result.rows[0].total_qty, 2.0);
}

#[test]
fn test_layout_change_stales_layout_facts_only() {
    let (state, _dir) = refreshed_state();
    assert!(state.recon_api.get_location_summaries("Z1").unwrap().is_fresh());

    // 移动货架: 布局派生事实标脏, 纯库存事实不受影响
    state.layout_api.move_component("rack1", 1, 0).unwrap();

    assert_eq!(
        state.recon_api.get_location_summaries("Z1").unwrap().state,
        FactState::Stale
    );
    assert_eq!(
        state.recon_api.get_zone_capacity("Z1").unwrap().state,
        FactState::Stale
    );
    assert_eq!(
        state.recon_api.get_discrepancies("Z1").unwrap().state,
        FactState::Fresh
    );
    assert_eq!(
        state.recon_api.get_expiring_items("Z1").unwrap().state,
        FactState::Fresh
    );

    // 过期数据照常可读
    let stale = state.recon_api.get_location_summaries("Z1").unwrap();
    assert_eq!(stale.rows.len(), 2);

    // 布局事件已自动入队, 排空后恢复新鲜
    state.recon_api.process_pending_refreshes().unwrap();
    assert!(state.recon_api.get_location_summaries("Z1").unwrap().is_fresh());
}

#[test]
fn test_reingest_then_refresh_replaces_facts() {
    let (state, _dir) = refreshed_state();

    // 新批次覆盖旧批次: 平面库位清空
    state
        .inventory_repo
        .insert_batch(&[feed_row(
            SourceFeed::Operational,
            "A1-1-2",
            "SKU-B",
            Some("L2"),
            4.0,
            Some(10),
            "OP-2",
        )])
        .unwrap();
    state.recon_api.trigger_refresh(Some("Z1")).unwrap();
    state.recon_api.process_pending_refreshes().unwrap();

    let result = state.recon_api.get_location_summaries("Z1").unwrap();
    let flat = result.rows.iter().find(|r| r.location == "Z1-F01").unwrap();
    assert_eq!(flat.current_stock, 0, "以最新批次为准");
    let rack = result.rows.iter().find(|r| r.location == "A1").unwrap();
    assert_eq!(rack.current_stock, 1);

    let unassigned = state.recon_api.get_unassigned_locations("Z1").unwrap();
    assert!(unassigned.rows.is_empty(), "旧批次的未归属行不再出现");
}

#[test]
fn test_fact_states_cover_all_kinds() {
    let (state, _dir) = refreshed_state();

    let states = state.recon_api.get_fact_states().unwrap();
    let z1: Vec<_> = states.iter().filter(|s| s.scope == "Z1").collect();
    assert_eq!(z1.len(), 6, "六类事实各有状态行");
    assert!(z1.iter().all(|s| s.state == FactState::Fresh));
    assert!(z1.iter().all(|s| s.last_computed_at.is_some()));
}
