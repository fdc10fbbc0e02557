// ==========================================
// 仓库布局与库存对账系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 集中建表: 布局表、快照表、六张事实表、刷新状态/队列/日志、config_kv
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建立全部业务表（幂等, CREATE TABLE IF NOT EXISTS）
///
/// # 参数
/// - conn: 已应用统一 PRAGMA 的连接
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- 区域登记(外部协作方维护, 本系统只读 scope)
        CREATE TABLE IF NOT EXISTS zone (
            zone_code TEXT PRIMARY KEY,
            zone_name TEXT,
            grid_width INTEGER NOT NULL,
            grid_height INTEGER NOT NULL,
            cell_size_px INTEGER NOT NULL DEFAULT 50,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 布局组件(货架/平面/标注)
        CREATE TABLE IF NOT EXISTS layout_component (
            id TEXT PRIMARY KEY,
            zone_code TEXT NOT NULL,
            location TEXT NOT NULL,
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            rotation INTEGER NOT NULL DEFAULT 0,
            zone_type TEXT NOT NULL DEFAULT 'STANDARD',
            kind_json TEXT NOT NULL,
            filter_json TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (zone_code, location)
        );
        CREATE INDEX IF NOT EXISTS idx_component_zone ON layout_component(zone_code);

        -- 物料分类维表(外部协作方维护, 仅做等值比较)
        CREATE TABLE IF NOT EXISTS item_category (
            item_code TEXT PRIMARY KEY,
            major_category TEXT,
            minor_category TEXT
        );

        -- 原始库存快照行(只追加, 以 feed+zone 最新批次为准)
        CREATE TABLE IF NOT EXISTS inventory_raw_row (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            zone_code TEXT NOT NULL,
            cell_identifier TEXT NOT NULL,
            item_code TEXT NOT NULL,
            lot_key TEXT,
            available_qty REAL NOT NULL DEFAULT 0,
            total_qty REAL NOT NULL DEFAULT 0,
            inb_date TEXT,
            valid_date TEXT,
            batch_id TEXT NOT NULL,
            fetched_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_raw_feed_zone_batch
            ON inventory_raw_row(source, zone_code, batch_id);

        -- F1 库位汇总 (current_stock = 匹配行数)
        CREATE TABLE IF NOT EXISTS location_summary (
            zone_code TEXT NOT NULL,
            component_id TEXT NOT NULL,
            location TEXT NOT NULL,
            current_stock INTEGER NOT NULL,
            max_capacity INTEGER NOT NULL,
            utilization_pct REAL NOT NULL,
            status TEXT NOT NULL,
            lot_distribution_json TEXT NOT NULL DEFAULT '[]',
            materials_summary_json TEXT NOT NULL DEFAULT '[]',
            computed_at TEXT NOT NULL,
            PRIMARY KEY (zone_code, component_id)
        );

        -- F2 区域容量
        CREATE TABLE IF NOT EXISTS zone_capacity (
            zone_code TEXT PRIMARY KEY,
            total_capacity INTEGER NOT NULL,
            total_stock INTEGER NOT NULL,
            utilization_pct REAL NOT NULL,
            status TEXT NOT NULL,
            location_count INTEGER NOT NULL,
            unique_items INTEGER NOT NULL,
            computed_at TEXT NOT NULL
        );

        -- F3 跨源差异 (delta = 企业 − 作业)
        CREATE TABLE IF NOT EXISTS stock_discrepancy (
            zone_code TEXT NOT NULL,
            location_group TEXT NOT NULL,
            item_code TEXT NOT NULL,
            lot_key TEXT NOT NULL,
            operational_qty REAL NOT NULL,
            enterprise_qty REAL NOT NULL,
            delta REAL NOT NULL,
            severity TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (zone_code, location_group, item_code, lot_key)
        );

        -- F4 效期桶
        CREATE TABLE IF NOT EXISTS expiring_item (
            zone_code TEXT NOT NULL,
            item_code TEXT NOT NULL,
            lot_key TEXT NOT NULL,
            available_qty REAL NOT NULL,
            location TEXT NOT NULL,
            valid_date TEXT,
            days_remaining INTEGER,
            urgency TEXT NOT NULL,
            computed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_expiring_zone ON expiring_item(zone_code);

        -- F5 分类容量
        CREATE TABLE IF NOT EXISTS category_capacity (
            zone_code TEXT NOT NULL,
            category TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            current_stock INTEGER NOT NULL,
            mismatched_stock INTEGER NOT NULL,
            utilization_pct REAL NOT NULL,
            status TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (zone_code, category)
        );

        -- F6 未匹配库位
        CREATE TABLE IF NOT EXISTS unassigned_location (
            zone_code TEXT NOT NULL,
            identifier TEXT NOT NULL,
            record_count INTEGER NOT NULL,
            total_qty REAL NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (zone_code, identifier)
        );

        -- 事实新鲜度状态机: STALE → REFRESHING → FRESH | FAILED
        CREATE TABLE IF NOT EXISTS fact_refresh_state (
            fact_kind TEXT NOT NULL,
            scope TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'STALE',
            last_computed_at TEXT,
            refreshing_since TEXT,
            last_error TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (fact_kind, scope)
        );

        -- 刷新任务队列
        CREATE TABLE IF NOT EXISTS recon_refresh_queue (
            task_id TEXT PRIMARY KEY,
            scope TEXT NOT NULL,
            trigger_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            error_message TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_refresh_queue_status
            ON recon_refresh_queue(status, created_at);

        -- 刷新运行日志
        CREATE TABLE IF NOT EXISTS recon_refresh_log (
            refresh_id TEXT PRIMARY KEY,
            scope TEXT NOT NULL,
            trigger_type TEXT NOT NULL,
            status TEXT NOT NULL,
            facts_refreshed INTEGER NOT NULL DEFAULT 0,
            facts_failed INTEGER NOT NULL DEFAULT 0,
            ambiguous_matches INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER,
            error_message TEXT,
            started_at TEXT NOT NULL,
            completed_at TEXT
        );

        -- 配置键值表
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;
    Ok(())
}
