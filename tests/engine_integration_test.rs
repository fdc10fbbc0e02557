// ==========================================
// 布局引擎集成测试
// ==========================================
// 真实数据库文件上的放置/移动/改尺寸/批量移动全流程
// ==========================================

use std::sync::{Arc, Mutex};

use warehouse_recon::domain::component::{Component, ComponentKind, Numbering};
use warehouse_recon::domain::grid::Rect;
use warehouse_recon::domain::types::{Rotation, ZoneType};
use warehouse_recon::engine::placement::{LayoutError, MoveRequest, PlacementEngine};
use warehouse_recon::repository::component_repo::{ComponentRepository, ZoneRecord};

fn setup() -> (Arc<PlacementEngine>, Arc<ComponentRepository>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("layout_test.db");
    let conn = warehouse_recon::db::open_sqlite_connection(db_path.to_str().unwrap()).unwrap();
    warehouse_recon::db::ensure_schema(&conn).unwrap();
    let repo = Arc::new(ComponentRepository::from_connection(Arc::new(Mutex::new(conn))));
    repo.upsert_zone(&ZoneRecord {
        zone_code: "Z1".to_string(),
        zone_name: Some("一号库".to_string()),
        grid_width: 30,
        grid_height: 20,
        cell_size_px: 50,
    })
    .unwrap();
    let engine = Arc::new(PlacementEngine::new(Arc::clone(&repo)));
    (engine, repo, dir)
}

fn rack(id: &str, location: &str, x: i64, y: i64, w: i64, h: i64) -> Component {
    Component {
        id: id.to_string(),
        zone_code: "Z1".to_string(),
        location: location.to_string(),
        x,
        y,
        width: w,
        height: h,
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

#[test]
fn test_full_edit_cycle_persists() {
    let (engine, repo, _dir) = setup();

    engine.place(rack("r1", "A1", 0, 0, 4, 2)).unwrap();
    engine.move_component("r1", 3, 5).unwrap();
    engine.resize("r1", 6, 2).unwrap();

    let stored = repo.get("r1").unwrap().unwrap();
    assert_eq!((stored.x, stored.y), (3, 5));
    assert_eq!((stored.width, stored.height), (6, 2));

    engine.remove("r1").unwrap();
    assert!(repo.get("r1").unwrap().is_none());
}

#[test]
fn test_failed_move_leaves_no_state_change() {
    let (engine, repo, _dir) = setup();
    engine.place(rack("r1", "A1", 0, 0, 4, 2)).unwrap();
    engine.place(rack("r2", "A2", 10, 0, 4, 2)).unwrap();

    // r2 移到 r1 上 → 拒绝
    let err = engine.move_component("r2", -8, 0).unwrap_err();
    assert!(matches!(err, LayoutError::Overlap { .. }));

    let stored = repo.get("r2").unwrap().unwrap();
    assert_eq!((stored.x, stored.y), (10, 0), "拒绝后位置不变");
}

#[test]
fn test_rotated_footprint_collides() {
    let (engine, _repo, _dir) = setup();
    engine.place(rack("r1", "A1", 0, 0, 6, 2)).unwrap();

    // 4x2 在 (6,0) 原本放得下, 旋转 90° 后占 2x4 仍放得下;
    // 但放 (5,0) 时旋转后 x∈[5,7) 与 r1 的 x∈[0,6) 相交
    let mut rotated = rack("r2", "A2", 5, 0, 4, 2);
    rotated.rotation = Rotation::R90;
    let err = engine.place(rotated).unwrap_err();
    assert!(matches!(err, LayoutError::Overlap { .. }));

    let mut ok = rack("r3", "A3", 6, 0, 4, 2);
    ok.rotation = Rotation::R90;
    engine.place(ok).unwrap();
}

#[test]
fn test_batch_move_swap_is_atomic() {
    let (engine, repo, _dir) = setup();
    engine.place(rack("r1", "A1", 0, 0, 4, 2)).unwrap();
    engine.place(rack("r2", "A2", 10, 0, 4, 2)).unwrap();

    // 互换位置: 逐个校验会撞, 终态校验应放行
    engine
        .batch_move(
            "Z1",
            &[
                MoveRequest { component_id: "r1".to_string(), dx: 10, dy: 0 },
                MoveRequest { component_id: "r2".to_string(), dx: -10, dy: 0 },
            ],
        )
        .unwrap();
    assert_eq!(repo.get("r1").unwrap().unwrap().x, 10);
    assert_eq!(repo.get("r2").unwrap().unwrap().x, 0);

    // 一个成员越界 → 整批回绝, 两个都不动
    let err = engine
        .batch_move(
            "Z1",
            &[
                MoveRequest { component_id: "r1".to_string(), dx: 0, dy: 1 },
                MoveRequest { component_id: "r2".to_string(), dx: -1, dy: 0 },
            ],
        )
        .unwrap_err();
    assert!(matches!(err, LayoutError::OutOfBounds { .. }));
    assert_eq!(repo.get("r1").unwrap().unwrap().x, 10, "整批失败不留部分状态");
    assert_eq!(repo.get("r2").unwrap().unwrap().x, 0);
}

#[test]
fn test_find_free_space_prefers_region() {
    let (engine, _repo, _dir) = setup();
    engine.place(rack("r1", "A1", 0, 0, 4, 2)).unwrap();

    // 偏好区域有空位 → 用偏好区域内的位置
    let preferred = Rect { x: 10, y: 10, width: 10, height: 6 };
    let rect = engine.find_free_space("Z1", 4, 2, Some(preferred)).unwrap();
    assert!(rect.x >= 10 && rect.y >= 10, "应落在偏好区域内: {:?}", rect);

    // 偏好区域放不下 → 回退全网格行优先
    let tiny = Rect { x: 0, y: 0, width: 3, height: 1 };
    let rect = engine.find_free_space("Z1", 4, 2, Some(tiny)).unwrap();
    assert_eq!((rect.x, rect.y), (4, 0), "回退扫描跳过已占区域");
}

#[test]
fn test_annotations_share_space_with_racks() {
    let (engine, _repo, _dir) = setup();
    engine.place(rack("r1", "A1", 0, 0, 4, 2)).unwrap();

    // block 标注与货架重叠是允许的(视觉层)
    let mut aisle = rack("b1", "通道A", 0, 0, 8, 8);
    aisle.zone_type = ZoneType::Block;
    engine.place(aisle).unwrap();

    // 但标注本身必须在网格内
    let mut off = rack("b2", "通道B", 28, 18, 8, 8);
    off.zone_type = ZoneType::Flex;
    let err = engine.place(off).unwrap_err();
    assert!(matches!(err, LayoutError::OutOfBounds { .. }));
}
