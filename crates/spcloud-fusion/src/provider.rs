//! `TableProvider` over a plugin table.
//!
//! `scan` runs the table's list or get callback eagerly and serves the rows
//! from a `MemoryExec`. Pushed filters are reported as `Inexact`, so
//! DataFusion still evaluates every predicate on the result.
//!
//! When a later page fails after rows were already streamed, the scan becomes
//! a `PartialScanExec` that yields those rows first and then the error.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::catalog::Session;
use datafusion::datasource::TableProvider;
use arrow::record_batch::RecordBatch;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::TaskContext;
use datafusion::logical_expr::{TableProviderFilterPushDown, TableType};
use datafusion::physical_expr::EquivalenceProperties;
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::memory::MemoryExec;
use datafusion::physical_plan::stream::RecordBatchStreamAdapter;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, Partitioning, PlanProperties, SendableRecordBatchStream,
};
use datafusion::prelude::{Expr, SessionContext};
use spcloud_api::ConnectionConfig;
use spcloud_tables::{Plugin, QueryContext, RowSink, TableDef, TableError};
use tracing::{debug, info, warn};

use crate::arrow_rows::{arrow_schema, rows_to_record_batch};
use crate::pushdown::expr_to_condition;

pub struct CloudTableProvider {
    plugin: Arc<Plugin>,
    table: &'static str,
    schema: SchemaRef,
}

impl fmt::Debug for CloudTableProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudTableProvider")
            .field("table", &self.table)
            .field("columns", &self.schema.fields().len())
            .finish()
    }
}

impl CloudTableProvider {
    pub fn new(plugin: Arc<Plugin>, table: &str) -> Result<Self, TableError> {
        let def = plugin
            .table(table)
            .ok_or_else(|| TableError::UnknownTable(table.to_string()))?
            .definition();
        let schema = arrow_schema(def);
        let table = def.name;
        Ok(Self { plugin, table, schema })
    }

    fn definition(&self) -> DFResult<&TableDef> {
        self.plugin
            .table(self.table)
            .map(|t| t.definition())
            .ok_or_else(|| DataFusionError::Plan(format!("table '{}' is not registered", self.table)))
    }

    /// Qualifiers for the pushable subset of `filters`.
    fn query_context(&self, def: &TableDef, filters: &[Expr], limit: Option<usize>) -> QueryContext {
        let mut ctx = QueryContext::new();
        ctx.quals = filters
            .iter()
            .filter_map(expr_to_condition)
            .filter(|c| def.accepts_qual(&c.column, c.op))
            .collect();
        ctx.limit = limit.map(|n| n as u64);
        ctx
    }
}

#[async_trait]
impl TableProvider for CloudTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(&self, filters: &[&Expr]) -> DFResult<Vec<TableProviderFilterPushDown>> {
        let def = self.definition()?;
        Ok(filters
            .iter()
            .map(|expr| match expr_to_condition(expr) {
                Some(c) if def.accepts_qual(&c.column, c.op) => TableProviderFilterPushDown::Inexact,
                _ => TableProviderFilterPushDown::Unsupported,
            })
            .collect())
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        let def = self.definition()?;
        let ctx = self.query_context(def, filters, limit);
        debug!("{}: scan with {} qualifier(s), limit {:?}", self.table, ctx.quals.len(), ctx.limit);

        let mut sink = RowSink::new(ctx.limit);
        let outcome = match self.plugin.execute_into(self.table, &ctx, &mut sink).await {
            Err(e) if sink.is_empty() => return Err(DataFusionError::External(Box::new(e))),
            other => other,
        };

        let rows = sink.into_rows();
        let batch = rows_to_record_batch(def, &rows).map_err(|e| DataFusionError::Execution(e.to_string()))?;

        match outcome {
            Ok(()) => {
                let exec = MemoryExec::try_new(&[vec![batch]], Arc::clone(&self.schema), projection.cloned())?;
                Ok(Arc::new(exec))
            }
            Err(e) => {
                warn!("{}: serving {} row(s) before error: {}", self.table, rows.len(), e);
                let batch = match projection {
                    Some(indices) => batch.project(indices)?,
                    None => batch,
                };
                Ok(Arc::new(PartialScanExec::new(self.table, batch, e)))
            }
        }
    }
}

/// Leaf plan for a scan that failed part way: the rows fetched before the
/// failure, followed by the failure itself.
#[derive(Debug)]
pub struct PartialScanExec {
    table: &'static str,
    batch: RecordBatch,
    error: Arc<TableError>,
    properties: PlanProperties,
}

impl PartialScanExec {
    pub fn new(table: &'static str, batch: RecordBatch, error: TableError) -> Self {
        let properties = PlanProperties::new(
            EquivalenceProperties::new(batch.schema()),
            Partitioning::UnknownPartitioning(1),
            EmissionType::Incremental,
            Boundedness::Bounded,
        );
        Self {
            table,
            batch,
            error: Arc::new(error),
            properties,
        }
    }
}

impl DisplayAs for PartialScanExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PartialScanExec: table={}, rows={}, error={}",
            self.table,
            self.batch.num_rows(),
            self.error
        )
    }
}

impl ExecutionPlan for PartialScanExec {
    fn name(&self) -> &str {
        "PartialScanExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(self: Arc<Self>, children: Vec<Arc<dyn ExecutionPlan>>) -> DFResult<Arc<dyn ExecutionPlan>> {
        if children.is_empty() {
            Ok(self)
        } else {
            Err(DataFusionError::Internal(
                "PartialScanExec is a leaf node and cannot have children".to_string(),
            ))
        }
    }

    fn execute(&self, partition: usize, _context: Arc<TaskContext>) -> DFResult<SendableRecordBatchStream> {
        if partition != 0 {
            return Err(DataFusionError::Internal(format!(
                "PartialScanExec only supports partition 0, got {}",
                partition
            )));
        }

        let items = vec![
            Ok(self.batch.clone()),
            Err(DataFusionError::External(Box::new(Arc::clone(&self.error)))),
        ];
        Ok(Box::pin(RecordBatchStreamAdapter::new(
            self.batch.schema(),
            futures::stream::iter(items),
        )))
    }
}

/// Register every plugin table with `ctx` under its own name.
pub fn register_tables(ctx: &SessionContext, plugin: Arc<Plugin>) -> anyhow::Result<()> {
    let names: Vec<&'static str> = plugin.tables().map(|t| t.definition().name).collect();
    for name in &names {
        let provider = CloudTableProvider::new(Arc::clone(&plugin), name)?;
        ctx.register_table(*name, Arc::new(provider))?;
    }
    info!("Registered {} Steampipe Cloud tables", names.len());
    Ok(())
}

/// Connect with `config` and register every table in a fresh context.
pub fn session_context(config: &ConnectionConfig) -> anyhow::Result<SessionContext> {
    let plugin = Plugin::connect(config)?;
    let ctx = SessionContext::new();
    register_tables(&ctx, Arc::new(plugin))?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::prelude::{col, lit};
    use spcloud_api::ApiClient;
    use spcloud_tables::{FilterOp, Session};

    fn plugin() -> Arc<Plugin> {
        let client = ApiClient::new("spt_test", "http://127.0.0.1:9/api/v0").unwrap();
        Arc::new(Plugin::new(Session::new(client)))
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        let err = CloudTableProvider::new(plugin(), "steampipecloud_nope").unwrap_err();
        assert!(matches!(err, TableError::UnknownTable(_)));
    }

    #[test]
    fn test_pushdown_is_inexact_for_key_columns_only() {
        let provider = CloudTableProvider::new(plugin(), "steampipecloud_workspace_snapshot").unwrap();
        let visibility_eq = col("visibility").eq(lit("anyone_with_link"));
        let visibility_lt = col("visibility").lt(lit("b"));
        let created_gt = lit("2023-01-01").lt(col("created_at"));
        let state_eq = col("state").eq(lit("finished"));

        let support = provider
            .supports_filters_pushdown(&[&visibility_eq, &visibility_lt, &created_gt, &state_eq])
            .unwrap();
        assert_eq!(
            support,
            vec![
                TableProviderFilterPushDown::Inexact,
                TableProviderFilterPushDown::Unsupported,
                TableProviderFilterPushDown::Inexact,
                TableProviderFilterPushDown::Unsupported,
            ]
        );
    }

    #[test]
    fn test_query_context_keeps_only_pushable_filters() {
        let provider = CloudTableProvider::new(plugin(), "steampipecloud_workspace").unwrap();
        let def = provider.definition().unwrap();
        let filters = vec![
            col("identity_handle").eq(lit("acme")),
            col("workspace_state").eq(lit("running")),
        ];
        let ctx = provider.query_context(def, &filters, Some(7));
        assert_eq!(ctx.quals.len(), 1);
        assert_eq!(ctx.quals[0].op, FilterOp::Eq);
        assert_eq!(ctx.equals_str("identity_handle"), Some("acme"));
        assert_eq!(ctx.limit, Some(7));
    }

    #[tokio::test]
    async fn test_session_context_from_config() {
        let config = ConnectionConfig {
            token: Some("spt_config".to_string()),
            host: Some("https://pipes.example.com".to_string()),
        };
        let ctx = session_context(&config).unwrap();
        assert!(ctx.table_exist("steampipecloud_workspace_snapshot").unwrap());

        let bad = ConnectionConfig {
            token: Some("spt_config".to_string()),
            host: Some("localhost:8080".to_string()),
        };
        let err = session_context(&bad).err().expect("expected error");
        assert!(err.to_string().contains("missing protocol or host"));
    }

    #[tokio::test]
    async fn test_register_all_tables() {
        let ctx = SessionContext::new();
        register_tables(&ctx, plugin()).unwrap();
        assert!(ctx.table_exist("steampipecloud_workspace").unwrap());
        assert!(ctx.table_exist("steampipecloud_workspace_mod_variable").unwrap());
    }
}
