//! Tables nested under a workspace: mods, snapshots, pipelines, processes,
//! connections, aggregators and database logs.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use spcloud_api::{Resource, WorkspaceMod};

use crate::error::TableError;
use crate::filter::{compile_filter, FilterColumn};
use crate::identity::{resolve_identity, resolve_workspace_details, WorkspaceOrigin};
use crate::lister::Budget;
use crate::query::{QueryContext, Row, RowSink};
use crate::schema::{Column, KeyColumn, TableDef};
use crate::session::Session;
use crate::tables::{
    audit_columns, hydrated_columns, parent_workspaces, workspace_path, workspace_scope_columns, Table, WorkspaceKey,
};

const SNAPSHOT_FILTERS: &[FilterColumn] = &[
    FilterColumn::range("created_at"),
    FilterColumn::string("dashboard_name"),
    FilterColumn::string("dashboard_title"),
    FilterColumn::string("id"),
    FilterColumn::string("visibility"),
];

const PIPELINE_FILTERS: &[FilterColumn] = &[
    FilterColumn::range("created_at"),
    FilterColumn::string("id"),
    FilterColumn::string("pipeline"),
    FilterColumn::string("title"),
    FilterColumn::range("updated_at"),
];

const PROCESS_FILTERS: &[FilterColumn] = &[
    FilterColumn::range("created_at"),
    FilterColumn::string("id"),
    FilterColumn::string("pipeline_id"),
    FilterColumn::string("state"),
    FilterColumn::string("type"),
    FilterColumn::range("updated_at"),
];

/// Qualifiers naming the workspace and the item for a get; the identity comes from the identity qualifiers.
#[derive(Debug, Clone, Copy)]
struct GetRoute {
    workspace: &'static str,
    item: &'static str,
}

/// How child items decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Mod,
    Raw,
}

/// A child item that may name its owning identity and workspace.
trait ChildItem: DeserializeOwned + Serialize + Send + Sync {
    fn parent_ids(&self) -> Option<(&str, &str)>;
}

impl ChildItem for WorkspaceMod {
    fn parent_ids(&self) -> Option<(&str, &str)> {
        Some((&self.identity_id, &self.workspace_id))
    }
}

impl ChildItem for Resource {
    fn parent_ids(&self) -> Option<(&str, &str)> {
        self.str_field("identity_id").zip(self.str_field("workspace_id"))
    }
}

const BY_HANDLES_AND_ID: &[&str] = &["identity_handle", "workspace_handle", "id"];
const BY_HANDLES: &[&str] = &["identity_handle", "workspace_handle", "handle"];
const BY_IDS_AND_ALIAS: &[&str] = &["identity_id", "workspace_id", "alias"];

fn scope_keys(query_where: bool) -> Vec<KeyColumn> {
    let mut keys = vec![
        KeyColumn::optional("identity_handle"),
        KeyColumn::optional("identity_id"),
        KeyColumn::optional("workspace_handle"),
        KeyColumn::optional("workspace_id"),
    ];
    if query_where {
        keys.push(KeyColumn::optional("query_where"));
    }
    keys
}

fn child_columns(specific: Vec<Column>, audited: bool) -> Vec<Column> {
    let mut columns = vec![Column::string("id", "The unique identifier for the resource.")];
    columns.extend(workspace_scope_columns());
    columns.extend(specific);
    if audited {
        columns.extend(audit_columns());
    }
    columns
}

fn query_where_column() -> Column {
    Column::string(
        "query_where",
        "The query filter passed through to the API, for example \"state = 'finished'\".",
    )
}

/// A resource listed under `{scope}/{identity}/workspace/{workspace}/{segment}`.
pub struct WorkspaceChildTable {
    def: TableDef,
    segment: &'static str,
    list_operation: &'static str,
    get_operation: &'static str,
    get: Option<GetRoute>,
    workspace_key: WorkspaceKey,
    item: ItemKind,
}

impl WorkspaceChildTable {
    pub fn workspace_mod() -> Self {
        let columns = child_columns(
            vec![
                Column::string("alias", "Short name used to identify the mod."),
                Column::string("constraint", "Version constraint for the mod."),
                Column::string("installed_version", "Version of the mod installed in the workspace."),
                Column::string("state", "State of the mod: installed or failed."),
                Column::string("path", "The repository path of the mod."),
                Column::json("details", "Details of the mod."),
            ],
            true,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_mod",
                "Mods installed in a workspace.",
                columns,
            )
            .list_keys(scope_keys(false))
            .get_keys(BY_IDS_AND_ALIAS),
            segment: "mod",
            list_operation: "listWorkspaceMods",
            get_operation: "getWorkspaceMod",
            get: Some(GetRoute {
                workspace: "workspace_id",
                item: "alias",
            }),
            workspace_key: WorkspaceKey::Id,
            item: ItemKind::Mod,
        }
    }

    pub fn snapshot() -> Self {
        let columns = child_columns(
            vec![
                Column::string("state", "The current state of the snapshot."),
                Column::string("visibility", "The visibility of the snapshot."),
                Column::string("dashboard_name", "The mod-prefixed name of the dashboard this snapshot belongs to."),
                Column::string("dashboard_title", "The title of the dashboard this snapshot belongs to."),
                Column::string("schema_version", "The schema version of the underlying snapshot."),
                Column::json("inputs", "The inputs used for this snapshot."),
                Column::json("tags", "The tags for the snapshot."),
                Column::json("data", "The data for the snapshot."),
                query_where_column(),
            ],
            true,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_snapshot",
                "Snapshots are saved dashboard results in a workspace.",
                columns,
            )
            .list_keys(scope_keys(true))
            .filter_columns(SNAPSHOT_FILTERS)
            .get_keys(BY_HANDLES_AND_ID),
            segment: "snapshot",
            list_operation: "listWorkspaceSnapshots",
            get_operation: "getWorkspaceSnapshot",
            get: Some(GetRoute {
                workspace: "workspace_handle",
                item: "id",
            }),
            workspace_key: WorkspaceKey::Handle,
            item: ItemKind::Raw,
        }
    }

    pub fn pipeline() -> Self {
        let columns = child_columns(
            vec![
                Column::string("title", "The title of the pipeline."),
                Column::json("frequency", "The frequency at which the pipeline will be executed."),
                Column::string("pipeline", "The name of the pipeline to be executed."),
                Column::json("args", "The arguments passed to the pipeline."),
                Column::json("tags", "The tags for the pipeline."),
                Column::string("last_process_id", "The unique identifier of the last process run."),
                Column::json("last_process", "Information about the last process run."),
                query_where_column(),
            ],
            true,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_pipeline",
                "Pipelines run scheduled tasks in a workspace.",
                columns,
            )
            .list_keys(scope_keys(true))
            .filter_columns(PIPELINE_FILTERS)
            .get_keys(BY_HANDLES_AND_ID),
            segment: "pipeline",
            list_operation: "listWorkspacePipelines",
            get_operation: "getWorkspacePipeline",
            get: Some(GetRoute {
                workspace: "workspace_handle",
                item: "id",
            }),
            workspace_key: WorkspaceKey::Handle,
            item: ItemKind::Raw,
        }
    }

    pub fn process() -> Self {
        let columns = child_columns(
            vec![
                Column::string("pipeline_id", "The unique identifier of the pipeline that started the process."),
                Column::string("type", "The type of action executed by the process."),
                Column::string("state", "The current state of the process."),
                query_where_column(),
            ],
            true,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_process",
                "Processes are actions performed by pipelines and users in a workspace.",
                columns,
            )
            .list_keys(scope_keys(true))
            .filter_columns(PROCESS_FILTERS)
            .get_keys(BY_HANDLES_AND_ID),
            segment: "process",
            list_operation: "listWorkspaceProcesses",
            get_operation: "getWorkspaceProcess",
            get: Some(GetRoute {
                workspace: "workspace_handle",
                item: "id",
            }),
            workspace_key: WorkspaceKey::Handle,
            item: ItemKind::Raw,
        }
    }

    pub fn connection() -> Self {
        let columns = child_columns(
            vec![
                Column::string("connection_id", "The unique identifier for the connection."),
                Column::string("connection_handle", "The handle of the connection.").from_path("connection.handle"),
                Column::json("connection", "Information about the connection."),
            ],
            true,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_connection",
                "Associations between workspaces and connections.",
                columns,
            )
            .list_keys(scope_keys(false)),
            segment: "connection",
            list_operation: "listWorkspaceConnections",
            get_operation: "getWorkspaceConnection",
            get: None,
            workspace_key: WorkspaceKey::Handle,
            item: ItemKind::Raw,
        }
    }

    pub fn aggregator() -> Self {
        let columns = child_columns(
            vec![
                Column::string("handle", "The handle of the aggregator."),
                Column::string("type", "The type of the resource."),
                Column::string("plugin", "The plugin of the aggregator."),
                Column::json("connections", "Connections aggregated by this aggregator."),
            ],
            true,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_aggregator",
                "Aggregators combine connections of the same plugin in a workspace.",
                columns,
            )
            .list_keys(scope_keys(false))
            .get_keys(BY_HANDLES),
            segment: "aggregator",
            list_operation: "listWorkspaceAggregators",
            get_operation: "getWorkspaceAggregator",
            get: Some(GetRoute {
                workspace: "workspace_handle",
                item: "handle",
            }),
            workspace_key: WorkspaceKey::Handle,
            item: ItemKind::Raw,
        }
    }

    pub fn db_log() -> Self {
        let columns = child_columns(
            vec![
                Column::string("actor_id", "The unique identifier of the user who ran the query."),
                Column::string("actor_handle", "The handle of the user who ran the query."),
                Column::string("actor_display_name", "The display name of the user who ran the query."),
                Column::string("actor_avatar_url", "The avatar of the user who ran the query."),
                Column::int("duration", "The duration of the query in milliseconds."),
                Column::string("query", "The query that was executed in the workspace."),
                Column::timestamp("log_timestamp", "The time when the log was captured in the database."),
                Column::timestamp("created_at", "The time when the database log was created."),
            ],
            false,
        );
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_db_log",
                "Queries executed against a workspace database.",
                columns,
            )
            .list_keys(scope_keys(false)),
            segment: "db_log",
            list_operation: "listWorkspaceDbLogs",
            get_operation: "getWorkspaceDbLog",
            get: None,
            workspace_key: WorkspaceKey::Handle,
            item: ItemKind::Raw,
        }
    }

    fn filter(&self, ctx: &QueryContext) -> Option<String> {
        if self.def.filter_columns.is_empty() {
            return None;
        }
        Some(compile_filter(
            &ctx.quals,
            self.def.filter_columns,
            ctx.equals_str("query_where"),
        ))
    }

    async fn list_items<T: ChildItem>(
        &self,
        session: &Session,
        ctx: &QueryContext,
        sink: &mut RowSink,
    ) -> Result<(), TableError> {
        let filter = self.filter(ctx);
        for workspace in parent_workspaces(session, ctx).await? {
            if sink.is_exhausted() {
                break;
            }
            let path = workspace_path(session, &workspace, self.workspace_key)
                .await?
                .join(self.segment);
            let details = resolve_workspace_details(session, WorkspaceOrigin::FromParent(&workspace)).await?;
            let extras = hydrated_columns(&details, &workspace.identity_id, &workspace.id, ctx);
            session
                .list_into(self.list_operation, &path, filter.clone(), sink, |sink: &mut RowSink, item: T| {
                    sink.stream_row(self.def.project(&item, &extras)?);
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }

    async fn get_item<T: ChildItem>(
        &self,
        session: &Session,
        ctx: &QueryContext,
        route: GetRoute,
    ) -> Result<Option<Row>, TableError> {
        let (Some(workspace), Some(key)) = (ctx.equals_str(route.workspace), ctx.equals_str(route.item)) else {
            return Ok(None);
        };
        let actor = session.actor().await?;
        let owner = resolve_identity(&ctx.identity_ref(), actor)?;
        let path = owner
            .path()
            .join("workspace")
            .join(workspace)
            .join(self.segment)
            .join(key);

        let Some(item) = session.get_optional::<T>(self.get_operation, &path).await? else {
            return Ok(None);
        };

        let extras = match item.parent_ids() {
            Some((identity_id, workspace_id)) => {
                let origin = WorkspaceOrigin::FromItemFields {
                    identity_id,
                    workspace_id,
                };
                let details = resolve_workspace_details(session, origin).await?;
                hydrated_columns(&details, identity_id, workspace_id, ctx)
            }
            None => Vec::new(),
        };
        self.def.project(&item, &extras).map(Some)
    }
}

#[async_trait]
impl Table for WorkspaceChildTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        match self.item {
            ItemKind::Mod => self.list_items::<WorkspaceMod>(session, ctx, sink).await,
            ItemKind::Raw => self.list_items::<Resource>(session, ctx, sink).await,
        }
    }

    async fn get(&self, session: &Session, ctx: &QueryContext) -> Result<Option<Row>, TableError> {
        let Some(route) = self.get else {
            return Ok(None);
        };
        match self.item {
            ItemKind::Mod => self.get_item::<WorkspaceMod>(session, ctx, route).await,
            ItemKind::Raw => self.get_item::<Resource>(session, ctx, route).await,
        }
    }
}

/// Variables of one mod, addressed by workspace id and mod alias.
pub struct WorkspaceModVariableTable {
    def: TableDef,
}

impl WorkspaceModVariableTable {
    pub fn new() -> Self {
        let mut columns = vec![
            Column::string("id", "The unique identifier for the mod variable."),
            Column::string("workspace_id", "The unique identifier for the workspace."),
            Column::string("workspace_handle", "The handle of the workspace."),
            Column::string("mod_alias", "The alias of the mod the variable belongs to."),
            Column::string("name", "The name of the variable."),
            Column::string("description", "The description of the variable."),
            Column::string("type", "The type of the variable."),
            Column::json("value_default", "The default value of the variable."),
            Column::json("value_setting", "The value set for the variable in the workspace."),
            Column::json("value", "The effective value of the variable."),
        ];
        columns.extend(audit_columns());
        Self {
            def: TableDef::new(
                "steampipecloud_workspace_mod_variable",
                "Variables of a mod installed in a workspace.",
                columns,
            )
            .list_keys(vec![KeyColumn::required("workspace_id"), KeyColumn::required("mod_alias")]),
        }
    }
}

impl Default for WorkspaceModVariableTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for WorkspaceModVariableTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let Some(alias) = ctx.equals_str("mod_alias") else {
            return Err(TableError::MissingQual {
                table: self.def.name.to_string(),
                column: "mod_alias".to_string(),
            });
        };
        for workspace in parent_workspaces(session, ctx).await? {
            if sink.is_exhausted() {
                break;
            }
            let path = workspace_path(session, &workspace, WorkspaceKey::Id)
                .await?
                .join("mod")
                .join(alias)
                .join("variable");
            let extras = [
                ("workspace_id", json!(workspace.id)),
                ("workspace_handle", json!(workspace.handle)),
                ("mod_alias", json!(alias)),
            ];
            session
                .list_into("listWorkspaceModVariables", &path, None, sink, |sink: &mut RowSink, item: Resource| {
                    sink.stream_row(self.def.project(&item, &extras)?);
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }
}
