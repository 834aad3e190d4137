//! Trade persistence for the repository.

use crate::domain::{CloseReason, InstrumentId, Trade, TimeMs};
use crate::engine::GroupKey;
use crate::instruments::StoreError;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::{parse_column, parse_decimal_column, Repository};

fn close_reason_from_str(key: &str, raw: &str) -> Result<CloseReason, StoreError> {
    match raw {
        "executions" => Ok(CloseReason::Executions),
        "expired" => Ok(CloseReason::Expired),
        other => Err(StoreError::Corrupt(format!(
            "{}: invalid close_reason value {:?}",
            key, other
        ))),
    }
}

fn row_to_trade(row: &SqliteRow) -> Result<Trade, StoreError> {
    let group_key: String = row.get("group_key");
    let key = group_key.as_str();

    let instrument_id = row
        .get::<Option<String>, _>("instrument_id")
        .map(|id| {
            Uuid::parse_str(&id)
                .map(InstrumentId)
                .map_err(|_| StoreError::Corrupt(format!("{}: invalid instrument_id {:?}", key, id)))
        })
        .transpose()?;
    let close_reason = row
        .get::<Option<String>, _>("close_reason")
        .map(|raw| close_reason_from_str(key, &raw))
        .transpose()?;
    let decimal = |column: &str| -> String { row.get::<String, _>(column) };
    let optional_decimal = |column: &str| {
        row.get::<Option<String>, _>(column)
            .map(|raw| parse_decimal_column(column, key, &raw))
    };

    let trade = Trade {
        account: row.get("account"),
        instrument_key: row.get("instrument_key"),
        instrument_id,
        instrument_type: parse_column("instrument_type", key, &row.get::<String, _>("instrument_type"))?,
        symbol: row.get("symbol"),
        side: parse_column("side", key, &row.get::<String, _>("side"))?,
        status: parse_column("status", key, &row.get::<String, _>("status"))?,
        opened_at: TimeMs::new(row.get("opened_at")),
        closed_at: row.get::<Option<i64>, _>("closed_at").map(TimeMs::new),
        qty_opened: parse_decimal_column("qty_opened", key, &decimal("qty_opened")),
        qty_closed: parse_decimal_column("qty_closed", key, &decimal("qty_closed")),
        avg_open_price: parse_decimal_column("avg_open_price", key, &decimal("avg_open_price")),
        avg_close_price: optional_decimal("avg_close_price"),
        realized_pnl: optional_decimal("realized_pnl"),
        fees: parse_decimal_column("fees", key, &decimal("fees")),
        multiplier: parse_decimal_column("multiplier", key, &decimal("multiplier")),
        legs: serde_json::from_str(&row.get::<String, _>("legs"))?,
        close_reason,
        exec_ids: serde_json::from_str(&row.get::<String, _>("exec_ids"))?,
        group_key: group_key.clone(),
    };
    Ok(trade)
}

async fn write_trade(
    conn: &mut SqliteConnection,
    trade: &Trade,
    updated_at: i64,
) -> Result<usize, StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO trades (
            group_key, account, instrument_key, instrument_id, instrument_type,
            symbol, side, status, opened_at, closed_at, qty_opened, qty_closed,
            avg_open_price, avg_close_price, realized_pnl, fees, multiplier,
            close_reason, legs, exec_ids, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(group_key) DO UPDATE SET
            account = excluded.account,
            instrument_key = excluded.instrument_key,
            instrument_id = excluded.instrument_id,
            instrument_type = excluded.instrument_type,
            symbol = excluded.symbol,
            side = excluded.side,
            status = excluded.status,
            opened_at = excluded.opened_at,
            closed_at = excluded.closed_at,
            qty_opened = excluded.qty_opened,
            qty_closed = excluded.qty_closed,
            avg_open_price = excluded.avg_open_price,
            avg_close_price = excluded.avg_close_price,
            realized_pnl = excluded.realized_pnl,
            fees = excluded.fees,
            multiplier = excluded.multiplier,
            close_reason = excluded.close_reason,
            legs = excluded.legs,
            exec_ids = excluded.exec_ids,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(trade.group_key.as_str())
    .bind(trade.account.as_deref())
    .bind(trade.instrument_key.as_str())
    .bind(trade.instrument_id.map(|id| id.to_string()))
    .bind(trade.instrument_type.as_str())
    .bind(trade.symbol.as_str())
    .bind(trade.side.to_string())
    .bind(trade.status.as_str())
    .bind(trade.opened_at.as_ms())
    .bind(trade.closed_at.map(|t| t.as_ms()))
    .bind(trade.qty_opened.to_canonical_string())
    .bind(trade.qty_closed.to_canonical_string())
    .bind(trade.avg_open_price.to_canonical_string())
    .bind(trade.avg_close_price.map(|d| d.to_canonical_string()))
    .bind(trade.realized_pnl.map(|d| d.to_canonical_string()))
    .bind(trade.fees.to_canonical_string())
    .bind(trade.multiplier.to_canonical_string())
    .bind(trade.close_reason.map(|r| r.as_str()))
    .bind(serde_json::to_string(&trade.legs)?)
    .bind(serde_json::to_string(&trade.exec_ids)?)
    .bind(updated_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() as usize)
}

impl Repository {
    /// Insert or replace trades by `group_key` in one transaction.
    ///
    /// Re-importing the same executions rewrites the same rows.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_trades(&self, trades: &[Trade]) -> Result<usize, StoreError> {
        self.replace_trades(&[], trades).await
    }

    /// Rebuild whole groups: delete every stored trade for each
    /// `(account, instrument_key)` in `groups`, then write `trades`, all in
    /// one transaction.
    ///
    /// Trades whose first execution moved to an earlier one get a new
    /// `group_key`; the delete keeps their stale rows from surviving.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is written then.
    pub async fn replace_trades(
        &self,
        groups: &[GroupKey],
        trades: &[Trade],
    ) -> Result<usize, StoreError> {
        if groups.is_empty() && trades.is_empty() {
            return Ok(0);
        }

        let updated_at = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let mut removed = 0u64;
        for group in groups {
            let result = sqlx::query("DELETE FROM trades WHERE account IS ? AND instrument_key = ?")
                .bind(group.account.as_deref())
                .bind(group.instrument_key.as_str())
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }

        let mut written = 0usize;
        for trade in trades {
            written += write_trade(&mut *tx, trade, updated_at).await?;
        }

        tx.commit().await?;
        debug!(groups = groups.len(), removed, written, "Replaced trades");
        Ok(written)
    }

    /// All trades ordered by open time, then group key.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_trades(&self, symbol: Option<&str>) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT *
            FROM trades
            WHERE (?1 IS NULL OR symbol = ?1)
            ORDER BY opened_at ASC, group_key ASC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_trade).collect()
    }
}
