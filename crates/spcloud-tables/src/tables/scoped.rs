//! Tables that live directly under a user or org: workspaces, connections,
//! audit logs and pipeline processes.

use async_trait::async_trait;
use serde_json::{json, Value};
use spcloud_api::{ApiPath, Resource};
use tracing::error;

use crate::error::TableError;
use crate::identity::resolve_identity;
use crate::query::{QueryContext, Row, RowSink};
use crate::schema::{Column, KeyColumn, TableDef};
use crate::session::Session;
use crate::tables::{audit_columns, Table};

/// A table listed from `{scope}/{identity}/{segment}`.
pub struct IdentityScopedTable {
    def: TableDef,
    segment: &'static str,
    list_operation: &'static str,
    get_operation: &'static str,
    /// Without identity qualifiers list from `actor/{segment}` instead.
    actor_fallback: bool,
    /// Column whose value names a single item under the segment.
    item_key: Option<&'static str>,
}

fn identity_keys() -> Vec<KeyColumn> {
    vec![KeyColumn::optional("identity_handle"), KeyColumn::optional("identity_id")]
}

impl IdentityScopedTable {
    pub fn workspace() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_workspace",
                "Workspaces provide a bounded context for managing, operating, and securing Steampipe resources.",
                vec![
                    Column::string("id", "The unique identifier for the workspace."),
                    Column::string("handle", "The handle name for the workspace."),
                    Column::string("identity_id", "The unique identifier for an identity where the workspace has been created."),
                    Column::string("identity_handle", "The handle name for an identity where the workspace has been created.")
                        .from_path("identity.handle"),
                    Column::string("workspace_state", "The current workspace state."),
                    Column::string("database_name", "The database name for the workspace."),
                    Column::string("hive", "The database hive for this workspace."),
                    Column::json("identity", "Information about the identity."),
                    Column::timestamp("created_at", "The creation time for the workspace."),
                    Column::timestamp("updated_at", "The last updated time for the workspace."),
                    Column::int("version_id", "The current version ID for the workspace."),
                ],
            )
            .list_keys(identity_keys())
            .get_keys(&["identity_handle", "handle"]),
            segment: "workspace",
            list_operation: "listWorkspaces",
            get_operation: "getWorkspace",
            actor_fallback: true,
            item_key: Some("handle"),
        }
    }

    pub fn connection() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_connection",
                "Connections are created by users and organizations to query cloud resources.",
                vec![
                    Column::string("id", "The unique identifier for the connection."),
                    Column::string("handle", "The handle name for the connection."),
                    Column::string("identity_id", "The unique identifier for an identity where the connection has been created."),
                    Column::string("identity_handle", "The handle name for an identity where the connection has been created.")
                        .from_path("identity.handle"),
                    Column::string("plugin", "The plugin name for the connection."),
                    Column::string("type", "The connection type."),
                    Column::json("config", "The configuration for the connection."),
                    Column::json("identity", "Information about the identity."),
                    Column::timestamp("created_at", "The connection created time."),
                    Column::timestamp("updated_at", "The connection updated time."),
                    Column::int("version_id", "The current version ID for the connection."),
                ],
            )
            .list_keys(identity_keys())
            .get_keys(&["identity_handle", "handle"]),
            segment: "connection",
            list_operation: "listConnections",
            get_operation: "getConnection",
            actor_fallback: true,
            item_key: Some("handle"),
        }
    }

    pub fn audit_log() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_audit_log",
                "Audit logs record series of events performed on the identity.",
                vec![
                    Column::string("id", "The unique identifier for an audit log."),
                    Column::string("identity_id", "The unique identifier for an identity where the action has been performed."),
                    Column::string("identity_handle", "The handle name for an identity where the action has been performed."),
                    Column::string("action_type", "The action performed on the resource."),
                    Column::string("actor_avatar_url", "The avatar of an actor who has performed the action."),
                    Column::string("actor_display_name", "The display name of an actor."),
                    Column::string("actor_handle", "The handle name of an actor."),
                    Column::string("actor_id", "The unique identifier of an actor."),
                    Column::string("actor_ip", "The IP address of the actor."),
                    Column::string("target_handle", "The handle name of the entity on which the action has been performed."),
                    Column::string("target_id", "The unique identifier of the entity on which the action has been performed."),
                    Column::json("data", "The request data."),
                    Column::timestamp("created_at", "The time when the action was performed."),
                ],
            )
            .list_keys(identity_keys()),
            segment: "audit_log",
            list_operation: "listAuditLogs",
            get_operation: "getAuditLog",
            actor_fallback: false,
            item_key: None,
        }
    }

    pub fn process() -> Self {
        let mut columns = vec![
            Column::string("id", "The unique identifier for the process."),
            Column::string("identity_id", "The unique identifier for an identity where the process has been created."),
            Column::string("identity_handle", "The handle name for an identity where the process has been created."),
            Column::string("identity_type", "The type of identity, either user or org."),
            Column::string("pipeline_id", "The unique identifier of the pipeline that started the process."),
            Column::string("type", "The type of action executed by the process."),
            Column::string("state", "The current state of the process."),
        ];
        columns.extend(audit_columns());
        Self {
            def: TableDef::new(
                "steampipecloud_process",
                "Processes are actions performed by pipelines and users on an identity.",
                columns,
            )
            .list_keys(identity_keys())
            .get_keys(&["identity_handle", "id"]),
            segment: "process",
            list_operation: "listProcesses",
            get_operation: "getProcess",
            actor_fallback: false,
            item_key: Some("id"),
        }
    }

    /// Columns the item may not carry but the query pinned.
    fn pinned_columns(&self, ctx: &QueryContext, identity_type: Option<&str>) -> Vec<(&'static str, Value)> {
        let mut extras = Vec::new();
        if let Some(handle) = ctx.equals_str("identity_handle") {
            extras.push(("identity_handle", json!(handle)));
        }
        if let Some(kind) = identity_type {
            extras.push(("identity_type", json!(kind)));
        }
        extras
    }
}

#[async_trait]
impl Table for IdentityScopedTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let requested = ctx.identity_ref();
        let (path, scope) = if requested.is_empty() && self.actor_fallback {
            (ApiPath::actor().join(self.segment), None)
        } else {
            let actor = session.actor().await?;
            let resolved = resolve_identity(&requested, actor)?;
            (resolved.path().join(self.segment), Some(resolved.scope))
        };

        let mut extras = self.pinned_columns(ctx, scope.map(|s| s.as_str()));
        if requested.is_empty() && !self.actor_fallback {
            let actor = session.actor().await?;
            extras.push(("identity_handle", json!(actor.handle)));
        }

        let result = session
            .list_into(self.list_operation, &path, None, sink, |sink: &mut RowSink, item: Resource| {
                sink.stream_row(self.def.project(&item, &extras)?);
                Ok(())
            })
            .await;
        if let Err(e) = &result {
            error!("{}: {}", self.list_operation, e);
        }
        result
    }

    async fn get(&self, session: &Session, ctx: &QueryContext) -> Result<Option<Row>, TableError> {
        let Some(key) = self.item_key else {
            return Ok(None);
        };
        let (Some(identity_handle), Some(value)) = (ctx.equals_str("identity_handle"), ctx.equals_str(key)) else {
            return Ok(None);
        };
        let actor = session.actor().await?;
        let resolved = resolve_identity(&ctx.identity_ref(), actor)?;
        let path = resolved.path().join(self.segment).join(value);
        let extras = [
            ("identity_handle", json!(identity_handle)),
            ("identity_type", json!(resolved.scope.as_str())),
        ];
        session
            .get_optional::<Resource>(self.get_operation, &path)
            .await?
            .map(|item| self.def.project(&item, &extras))
            .transpose()
    }
}
