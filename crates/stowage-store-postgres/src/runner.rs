// crates/stowage-store-postgres/src/runner.rs
// ============================================================================
// Module: Postgres Statement Runner
// Description: Executes statements in the configured statement mode.
// Purpose: Keep prepared and unprepared execution on one code path for the
//          store, the expiry sweep, and provisioning.
// Dependencies: postgres, postgres-types, stowage-core
// ============================================================================

//! ## Overview
//! Every parameter travels with an explicit type. In prepared mode the types
//! seed `prepare_typed`; otherwise they go to `query_typed`, which skips the
//! named prepare round trip and works behind transaction-mode poolers.

use postgres::Client;
use postgres::Row;
use postgres::Transaction;
use postgres_types::ToSql;
use postgres_types::Type;
use stowage_core::BackendKind;
use stowage_core::StorageError;

use crate::native::postgres_error;

/// Statement parameter paired with its declared type.
pub(crate) type Param<'a> = (&'a (dyn ToSql + Sync), Type);

/// Executes statements on a checked-out client.
pub(crate) struct Runner<'a> {
    /// Checked-out client.
    pub(crate) client: &'a mut Client,
    /// Whether statements are prepared before execution.
    prepared: bool,
}

impl<'a> Runner<'a> {
    /// Wraps a client.
    pub(crate) const fn new(client: &'a mut Client, prepared: bool) -> Self {
        Self {
            client,
            prepared,
        }
    }

    /// Runs a statement and returns its rows.
    pub(crate) fn query(
        &mut self,
        sql: &str,
        params: &[Param<'_>],
    ) -> Result<Vec<Row>, StorageError> {
        let rows = if self.prepared {
            let (types, values) = split_params(params);
            self.client
                .prepare_typed(sql, &types)
                .and_then(|statement| self.client.query(&statement, &values))
        } else {
            self.client.query_typed(sql, params)
        };
        rows.map_err(postgres_error)
    }

    /// Runs a single-count statement.
    pub(crate) fn count(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64, StorageError> {
        let rows = self.query(sql, params)?;
        Ok(u64::try_from(first_i64(&rows)?).unwrap_or(0))
    }
}

/// Runs a statement inside an open transaction in the given mode.
pub(crate) fn query_in_transaction(
    tx: &mut Transaction<'_>,
    prepared: bool,
    sql: &str,
    params: &[Param<'_>],
) -> Result<Vec<Row>, StorageError> {
    let rows = if prepared {
        let (types, values) = split_params(params);
        tx.prepare_typed(sql, &types).and_then(|statement| tx.query(&statement, &values))
    } else {
        tx.query_typed(sql, params)
    };
    rows.map_err(postgres_error)
}

/// Splits typed parameters into the declared types and the values.
fn split_params<'p>(params: &[Param<'p>]) -> (Vec<Type>, Vec<&'p (dyn ToSql + Sync)>) {
    params.iter().map(|(value, ty)| (ty.clone(), *value)).unzip()
}

/// Reads the first column of the first row.
pub(crate) fn first_i64(rows: &[Row]) -> Result<i64, StorageError> {
    let row = rows.first().ok_or_else(|| {
        StorageError::serialization(BackendKind::Postgres, "statement returned no rows")
    })?;
    row.try_get(0).map_err(postgres_error)
}
