// ==========================================
// 对账刷新服务 - F4 效期桶
// ==========================================
// 窗口: [今天 − 回溯天数, 今天 + 前瞻天数], 无效期行保留
// 排序: 紧急度展示档位 → 效期升序(无效期垫底) → 数量降序
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Transaction};

use super::core::{RefreshSettings, ZoneSnapshot};
use super::*;
use crate::domain::types::ExpiryUrgency;

struct ExpiryRow<'a> {
    item_code: &'a str,
    lot_key: &'a str,
    available_qty: f64,
    location: String,
    valid_date: Option<NaiveDate>,
    days_remaining: Option<i64>,
    urgency: ExpiryUrgency,
}

impl ReconRefreshService {
    pub(super) fn refresh_expiry(
        &self,
        tx: &Transaction,
        snapshot: &ZoneSnapshot,
        settings: &RefreshSettings,
        computed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let today = computed_at.date_naive();
        let window_start = today - chrono::Duration::days(settings.expiry_past_window_days);
        let window_end = today + chrono::Duration::days(settings.expiry_future_window_days);

        let mut entries: Vec<ExpiryRow<'_>> = Vec::new();
        for record in &snapshot.operational {
            if let Some(valid) = record.valid_date {
                if valid < window_start || valid > window_end {
                    continue;
                }
            }
            let days_remaining = record.valid_date.map(|d| (d - today).num_days());
            entries.push(ExpiryRow {
                item_code: &record.item_code,
                lot_key: record.lot_group_key(),
                available_qty: record.available_qty,
                location: record.normalized_identifier(),
                valid_date: record.valid_date,
                days_remaining,
                urgency: ExpiryUrgency::from_days_remaining(days_remaining),
            });
        }

        entries.sort_by(|a, b| {
            a.urgency
                .display_rank()
                .cmp(&b.urgency.display_rank())
                .then_with(|| match (a.valid_date, b.valid_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| {
                    b.available_qty
                        .partial_cmp(&a.available_qty)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        entries.truncate(settings.expiry_top_n);

        tx.execute(
            "DELETE FROM expiring_item WHERE zone_code = ?1",
            params![snapshot.zone_code],
        )?;
        let mut rows = 0usize;
        for entry in &entries {
            tx.execute(
                "INSERT INTO expiring_item
                     (zone_code, item_code, lot_key, available_qty, location, valid_date,
                      days_remaining, urgency, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    snapshot.zone_code,
                    entry.item_code,
                    entry.lot_key,
                    entry.available_qty,
                    entry.location,
                    entry.valid_date,
                    entry.days_remaining,
                    entry.urgency.as_str(),
                    computed_at
                ],
            )?;
            rows += 1;
        }
        Ok(rows)
    }
}
