//! The plugin: a session plus the table map, dispatching host queries to
//! list or get callbacks.

use std::collections::BTreeMap;
use std::sync::Arc;

use spcloud_api::{connect, ConnectionConfig};
use tracing::{error, info};

use crate::error::{TableError, WithOperation};
use crate::lister::Budget;
use crate::query::{QueryContext, Row, RowSink};
use crate::session::Session;
use crate::tables::{all_tables, Table};

pub struct Plugin {
    session: Session,
    tables: BTreeMap<&'static str, Arc<dyn Table>>,
}

impl Plugin {
    pub fn new(session: Session) -> Self {
        let tables = all_tables()
            .into_iter()
            .map(|table| (table.definition().name, table))
            .collect();
        Self { session, tables }
    }

    /// Resolve `config` and build a plugin with a fresh session.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, TableError> {
        let client = connect(config).with_operation("connect")?;
        Ok(Self::new(Session::new(client)))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn table(&self, name: &str) -> Option<&Arc<dyn Table>> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<dyn Table>> {
        self.tables.values()
    }

    /// Run a query against `table` and collect its rows.
    ///
    /// Rows already streamed are discarded when a later call fails; hosts
    /// that want them should use [`Plugin::execute_into`].
    pub async fn execute(&self, table: &str, ctx: &QueryContext) -> Result<Vec<Row>, TableError> {
        let mut sink = RowSink::new(ctx.limit);
        self.execute_into(table, ctx, &mut sink).await?;
        Ok(sink.into_rows())
    }

    /// Run a query against `table`, streaming rows into `sink`.
    ///
    /// The get callback runs when every get key has an equality qualifier;
    /// otherwise required list keys are checked and the list callback streams
    /// rows up to the sink's limit. Rows are a superset of the answer; the host
    /// still applies every predicate. On error the sink keeps every row
    /// streamed before the failing call.
    pub async fn execute_into(&self, table: &str, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let handler = self
            .tables
            .get(table)
            .ok_or_else(|| TableError::UnknownTable(table.to_string()))?;
        let def = handler.definition();

        if ctx.limit == Some(0) || sink.is_exhausted() {
            return Ok(());
        }

        let get_ready = !def.get_keys.is_empty() && def.get_keys.iter().all(|k| ctx.equals_str(k).is_some());
        if get_ready {
            info!("{}: get", table);
            let row = handler.get(&self.session, ctx).await.inspect_err(|e| error!("{}: get failed: {}", table, e))?;
            if let Some(row) = row {
                sink.stream_row(row);
            }
            return Ok(());
        }

        if let Some(missing) = def
            .list_keys
            .iter()
            .find(|k| k.required && ctx.equals_str(k.name).is_none())
        {
            return Err(TableError::MissingQual {
                table: table.to_string(),
                column: missing.name.to_string(),
            });
        }

        info!("{}: list (limit {:?})", table, ctx.limit);
        let result = handler.list(&self.session, ctx, sink).await;
        if let Err(e) = &result {
            error!("{}: list failed after {} row(s): {}", table, sink.len(), e);
        }
        result
    }
}
