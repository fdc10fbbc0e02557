// ==========================================
// 仓库布局与库存对账系统 - 布局组件仓储
// ==========================================
// 职责: zone / layout_component 表的数据访问
// 红线: Repository 不含业务逻辑, 几何校验在引擎层
// ==========================================

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::open_sqlite_connection;
use crate::domain::component::{Component, ComponentKind, MaterialFilter};
use crate::domain::grid::Grid;
use crate::domain::types::{Rotation, ZoneType};
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 区域登记行(外部协作方维护)
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord {
    pub zone_code: String,
    pub zone_name: Option<String>,
    pub grid_width: i64,
    pub grid_height: i64,
    pub cell_size_px: i64,
}

impl ZoneRecord {
    pub fn grid(&self) -> Grid {
        Grid::new(self.grid_width, self.grid_height)
    }
}

// ==========================================
// ComponentRepository
// ==========================================
pub struct ComponentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ComponentRepository {
    /// 创建新的仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建(共享同一把锁)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    // ===== 区域 =====

    pub fn upsert_zone(&self, zone: &ZoneRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO zone (zone_code, zone_name, grid_width, grid_height, cell_size_px)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(zone_code) DO UPDATE SET
                 zone_name = ?2, grid_width = ?3, grid_height = ?4, cell_size_px = ?5",
            params![
                zone.zone_code,
                zone.zone_name,
                zone.grid_width,
                zone.grid_height,
                zone.cell_size_px
            ],
        )?;
        Ok(())
    }

    pub fn get_zone(&self, zone_code: &str) -> RepositoryResult<Option<ZoneRecord>> {
        let conn = self.get_conn()?;
        let zone = conn
            .query_row(
                "SELECT zone_code, zone_name, grid_width, grid_height, cell_size_px
                 FROM zone WHERE zone_code = ?1",
                params![zone_code],
                |row| {
                    Ok(ZoneRecord {
                        zone_code: row.get(0)?,
                        zone_name: row.get(1)?,
                        grid_width: row.get(2)?,
                        grid_height: row.get(3)?,
                        cell_size_px: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(zone)
    }

    pub fn list_zone_codes(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT zone_code FROM zone ORDER BY zone_code")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut codes = Vec::new();
        for row in rows {
            codes.push(row?);
        }
        Ok(codes)
    }

    // ===== 组件 =====

    fn row_to_component(row: &Row<'_>) -> rusqlite::Result<Component> {
        let rotation_deg: i32 = row.get(7)?;
        let zone_type: String = row.get(8)?;
        let kind_json: String = row.get(9)?;
        let filter_json: Option<String> = row.get(10)?;

        let kind: ComponentKind = serde_json::from_str(&kind_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let filter: Option<MaterialFilter> = match filter_json {
            Some(j) => Some(serde_json::from_str(&j).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    10,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };

        Ok(Component {
            id: row.get(0)?,
            zone_code: row.get(1)?,
            location: row.get(2)?,
            x: row.get(3)?,
            y: row.get(4)?,
            width: row.get(5)?,
            height: row.get(6)?,
            rotation: Rotation::from_degrees(rotation_deg).unwrap_or(Rotation::R0),
            zone_type: ZoneType::from_str(&zone_type),
            filter,
            kind,
        })
    }

    const SELECT_COLS: &'static str = "id, zone_code, location, x, y, width, height, \
        rotation, zone_type, kind_json, filter_json";

    pub fn insert(&self, component: &Component) -> RepositoryResult<()> {
        let kind_json = serde_json::to_string(&component.kind)
            .map_err(|e| RepositoryError::ValidationError(format!("组件序列化失败: {}", e)))?;
        let filter_json = component
            .filter
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::ValidationError(format!("限制序列化失败: {}", e)))?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO layout_component
                 (id, zone_code, location, x, y, width, height, rotation, zone_type,
                  kind_json, filter_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))",
            params![
                component.id,
                component.zone_code,
                component.location,
                component.x,
                component.y,
                component.width,
                component.height,
                component.rotation.degrees(),
                component.zone_type.as_str(),
                kind_json,
                filter_json,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> RepositoryResult<Option<Component>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM layout_component WHERE id = ?1", Self::SELECT_COLS);
        let component = conn
            .query_row(&sql, params![id], Self::row_to_component)
            .optional()?;
        Ok(component)
    }

    /// 列出区域内全部组件(含 block/flex 标注)
    pub fn list_by_zone(&self, zone_code: &str) -> RepositoryResult<Vec<Component>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM layout_component WHERE zone_code = ?1 ORDER BY location",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![zone_code], Self::row_to_component)?;
        let mut components = Vec::new();
        for row in rows {
            components.push(row?);
        }
        Ok(components)
    }

    /// 更新位置与旋转(引擎校验通过后的提交动作)
    pub fn update_position(
        &self,
        id: &str,
        x: i64,
        y: i64,
        rotation: Rotation,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE layout_component
             SET x = ?2, y = ?3, rotation = ?4, updated_at = datetime('now')
             WHERE id = ?1",
            params![id, x, y, rotation.degrees()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "layout_component".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新尺寸(resize 提交动作)
    pub fn update_size(&self, id: &str, width: i64, height: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE layout_component
             SET width = ?2, height = ?3, updated_at = datetime('now')
             WHERE id = ?1",
            params![id, width, height],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "layout_component".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM layout_component WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "layout_component".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 批量位置提交: 全部成功或全部回滚
    pub fn commit_positions(&self, moves: &[(String, i64, i64)]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        for (id, x, y) in moves {
            let affected = tx.execute(
                "UPDATE layout_component
                 SET x = ?2, y = ?3, updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, x, y],
            )?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "layout_component".to_string(),
                    id: id.clone(),
                });
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::Numbering;

    fn test_repo() -> ComponentRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ComponentRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn sample_rack(id: &str, location: &str, x: i64) -> Component {
        Component {
            id: id.to_string(),
            zone_code: "Z1".to_string(),
            location: location.to_string(),
            x,
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

    #[test]
    fn test_insert_get_roundtrip() {
        let repo = test_repo();
        let c = sample_rack("c1", "A1", 0);
        repo.insert(&c).unwrap();
        let loaded = repo.get("c1").unwrap().expect("应能读回");
        assert_eq!(loaded, c);
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_unique_location_per_zone() {
        let repo = test_repo();
        repo.insert(&sample_rack("c1", "A1", 0)).unwrap();
        let err = repo.insert(&sample_rack("c2", "A1", 5)).unwrap_err();
        assert!(
            matches!(err, RepositoryError::UniqueConstraintViolation(_)),
            "同区域重复库位编码应违反唯一约束: {:?}",
            err
        );
    }

    #[test]
    fn test_update_position_and_delete() {
        let repo = test_repo();
        repo.insert(&sample_rack("c1", "A1", 0)).unwrap();
        repo.update_position("c1", 4, 2, Rotation::R90).unwrap();
        let loaded = repo.get("c1").unwrap().unwrap();
        assert_eq!((loaded.x, loaded.y), (4, 2));
        assert_eq!(loaded.rotation, Rotation::R90);

        repo.delete("c1").unwrap();
        assert!(repo.get("c1").unwrap().is_none());
        assert!(matches!(
            repo.delete("c1").unwrap_err(),
            RepositoryError::NotFound { .. }
        ));
    }

    #[test]
    fn test_commit_positions_atomic() {
        let repo = test_repo();
        repo.insert(&sample_rack("c1", "A1", 0)).unwrap();
        repo.insert(&sample_rack("c2", "B1", 5)).unwrap();

        // 含不存在的 id, 整批回滚
        let err = repo
            .commit_positions(&[
                ("c1".to_string(), 1, 1),
                ("ghost".to_string(), 2, 2),
            ])
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        let c1 = repo.get("c1").unwrap().unwrap();
        assert_eq!((c1.x, c1.y), (0, 0), "失败批次不得留下部分更新");

        repo.commit_positions(&[("c1".to_string(), 1, 1), ("c2".to_string(), 6, 0)])
            .unwrap();
        assert_eq!(repo.get("c1").unwrap().unwrap().x, 1);
        assert_eq!(repo.get("c2").unwrap().unwrap().x, 6);
    }

    #[test]
    fn test_zone_roundtrip() {
        let repo = test_repo();
        let zone = ZoneRecord {
            zone_code: "Z1".to_string(),
            zone_name: Some("一号库".to_string()),
            grid_width: 20,
            grid_height: 10,
            cell_size_px: 50,
        };
        repo.upsert_zone(&zone).unwrap();
        assert_eq!(repo.get_zone("Z1").unwrap(), Some(zone));
        assert_eq!(repo.list_zone_codes().unwrap(), vec!["Z1".to_string()]);
    }
}
