// ==========================================
// 仓库布局与库存对账系统 - 库存快照仓储
// ==========================================
// 职责: inventory_raw_row / item_category 表的数据访问
// 红线: 快照行只追加; "最新批次"以 fetched_at 最大的 batch_id 为准
// ==========================================

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::open_sqlite_connection;
use crate::domain::inventory::RawInventoryRecord;
use crate::domain::types::SourceFeed;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 物料分类(item_category 维表行)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemCategory {
    pub major_category: Option<String>,
    pub minor_category: Option<String>,
}

// ==========================================
// InventoryRepository
// ==========================================
pub struct InventoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RawInventoryRecord> {
        let source: String = row.get(1)?;
        Ok(RawInventoryRecord {
            id: row.get(0)?,
            source: SourceFeed::from_str(&source),
            zone_code: row.get(2)?,
            cell_identifier: row.get(3)?,
            item_code: row.get(4)?,
            lot_key: row.get(5)?,
            available_qty: row.get(6)?,
            total_qty: row.get(7)?,
            inb_date: row.get(8)?,
            valid_date: row.get(9)?,
            batch_id: row.get(10)?,
            fetched_at: row.get(11)?,
        })
    }

    /// 批量写入一个拉取批次(单事务)
    ///
    /// # 参数
    /// - rows: 同一 batch_id 的快照行; id 字段忽略, 由自增列生成
    pub fn insert_batch(&self, rows: &[RawInventoryRecord]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO inventory_raw_row
                     (source, zone_code, cell_identifier, item_code, lot_key,
                      available_qty, total_qty, inb_date, valid_date, batch_id, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.source.as_str(),
                    r.zone_code,
                    r.cell_identifier,
                    r.item_code,
                    r.lot_key,
                    r.available_qty,
                    r.total_qty,
                    r.inb_date,
                    r.valid_date,
                    r.batch_id,
                    r.fetched_at,
                ])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(rows.len())
    }

    /// 某来源在某区域的最新批次号
    pub fn latest_batch_id(
        &self,
        source: SourceFeed,
        zone_code: &str,
    ) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                "SELECT batch_id FROM inventory_raw_row
                 WHERE source = ?1 AND zone_code = ?2
                 ORDER BY fetched_at DESC, id DESC LIMIT 1",
                params![source.as_str(), zone_code],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(batch)
    }

    /// 读取某来源在某区域的最新批次全部行(重算的快照读)
    pub fn list_latest(
        &self,
        source: SourceFeed,
        zone_code: &str,
    ) -> RepositoryResult<Vec<RawInventoryRecord>> {
        let batch_id = match self.latest_batch_id(source, zone_code)? {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source, zone_code, cell_identifier, item_code, lot_key,
                    available_qty, total_qty, inb_date, valid_date, batch_id, fetched_at
             FROM inventory_raw_row
             WHERE source = ?1 AND zone_code = ?2 AND batch_id = ?3
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![source.as_str(), zone_code, batch_id], Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // ===== 物料分类维表(只做等值比较) =====

    pub fn upsert_item_category(
        &self,
        item_code: &str,
        major: Option<&str>,
        minor: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO item_category (item_code, major_category, minor_category)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(item_code) DO UPDATE SET major_category = ?2, minor_category = ?3",
            params![item_code, major, minor],
        )?;
        Ok(())
    }
}
