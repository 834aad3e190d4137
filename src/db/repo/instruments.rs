//! Instrument and alias operations for the repository.

use crate::domain::{Decimal, InstrumentId, InstrumentMeta, NormalizedInstrument, ResolvedInstrument};
use crate::instruments::{InstrumentStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use super::{parse_column, Repository};

fn row_to_instrument(row: &SqliteRow) -> Result<ResolvedInstrument, StoreError> {
    let id: String = row.get("id");
    let unique_symbol: String = row.get("unique_symbol");
    let instrument_type: String = row.get("instrument_type");
    let multiplier: String = row.get("multiplier");
    let meta: String = row.get("meta");

    let uuid = Uuid::parse_str(&id)
        .map_err(|_| StoreError::Corrupt(format!("{}: invalid id {:?}", unique_symbol, id)))?;
    // Every trade on the instrument scales by this; never default it.
    let multiplier: Decimal = parse_column("multiplier", &unique_symbol, &multiplier)?;
    if !multiplier.is_positive() {
        return Err(StoreError::Corrupt(format!(
            "{}: non-positive multiplier {}",
            unique_symbol, multiplier
        )));
    }

    Ok(ResolvedInstrument {
        instrument_id: InstrumentId(uuid),
        instrument_type: parse_column("instrument_type", &unique_symbol, &instrument_type)?,
        multiplier,
        meta: serde_json::from_str(&meta)?,
        unique_symbol,
    })
}

#[async_trait]
impl InstrumentStore for Repository {
    async fn find_instrument_by_symbol(
        &self,
        unique_symbol: &str,
    ) -> Result<Option<ResolvedInstrument>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, unique_symbol, instrument_type, multiplier, meta
            FROM instruments
            WHERE unique_symbol = ?
            "#,
        )
        .bind(unique_symbol)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_instrument).transpose()
    }

    /// Insert-if-absent on `unique_symbol`, then read back whichever row won.
    async fn create_instrument(
        &self,
        instrument: &NormalizedInstrument,
    ) -> Result<ResolvedInstrument, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let id = InstrumentId::new();
        let meta = serde_json::to_string(&instrument.meta)?;

        let result = sqlx::query(
            r#"
            INSERT INTO instruments (
                id, unique_symbol, instrument_type, multiplier, meta, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(unique_symbol) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(instrument.unique_symbol.as_str())
        .bind(instrument.instrument_type.as_str())
        .bind(instrument.multiplier.to_canonical_string())
        .bind(meta)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                unique_symbol = %instrument.unique_symbol,
                instrument_id = %id,
                "Created instrument"
            );
        }

        self.find_instrument_by_symbol(&instrument.unique_symbol)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "{}: missing after insert",
                    instrument.unique_symbol
                ))
            })
    }

    async fn update_instrument_multiplier(
        &self,
        id: InstrumentId,
        multiplier: Decimal,
        meta: &InstrumentMeta,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE instruments
            SET multiplier = ?, meta = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(multiplier.to_canonical_string())
        .bind(serde_json::to_string(meta)?)
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("unknown instrument id {}", id)));
        }
        Ok(())
    }

    async fn insert_alias(
        &self,
        id: InstrumentId,
        source: &str,
        alias: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO instrument_aliases (instrument_id, source, alias_symbol, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(source, alias_symbol) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(source)
        .bind(alias)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_instrument_by_alias(
        &self,
        source: &str,
        alias: &str,
    ) -> Result<Option<ResolvedInstrument>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT i.id, i.unique_symbol, i.instrument_type, i.multiplier, i.meta
            FROM instrument_aliases a
            JOIN instruments i ON i.id = a.instrument_id
            WHERE a.source = ? AND a.alias_symbol = ?
            "#,
        )
        .bind(source)
        .bind(alias)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_instrument).transpose()
    }
}
