//! Table bindings: one `Table` per exposed relation.

mod organization;
mod scoped;
mod user;
mod workspace_child;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use spcloud_api::{ApiPath, Workspace};
use tracing::debug;

use crate::error::TableError;
use crate::identity::{resolve_identity, workspace_scope, IdentityWorkspaceDetails};
use crate::query::{QueryContext, Row, RowSink};
use crate::schema::{Column, TableDef};
use crate::session::Session;

pub use organization::{OrganizationMemberTable, OrganizationTable, OrganizationWorkspaceMemberTable};
pub use scoped::IdentityScopedTable;
pub use user::{TokenTable, UserEmailTable, UserPreferencesTable, UserTable};
pub use workspace_child::{WorkspaceChildTable, WorkspaceModVariableTable};

/// A relation backed by one or more API endpoints.
#[async_trait]
pub trait Table: Send + Sync {
    fn definition(&self) -> &TableDef;

    /// Stream every matching row into `sink`, stopping once it is full.
    async fn list(&self, session: &Session, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError>;

    /// Fetch a single row by the table's get keys. `None` when it does not exist.
    async fn get(&self, _session: &Session, _ctx: &QueryContext) -> Result<Option<Row>, TableError> {
        Ok(None)
    }
}

/// Every table the plugin exposes.
pub fn all_tables() -> Vec<Arc<dyn Table>> {
    vec![
        Arc::new(UserTable::new()),
        Arc::new(UserEmailTable::new()),
        Arc::new(UserPreferencesTable::new()),
        Arc::new(TokenTable::new()),
        Arc::new(OrganizationTable::new()),
        Arc::new(OrganizationMemberTable::new()),
        Arc::new(OrganizationWorkspaceMemberTable::new()),
        Arc::new(IdentityScopedTable::workspace()),
        Arc::new(IdentityScopedTable::connection()),
        Arc::new(IdentityScopedTable::audit_log()),
        Arc::new(IdentityScopedTable::process()),
        Arc::new(WorkspaceChildTable::workspace_mod()),
        Arc::new(WorkspaceModVariableTable::new()),
        Arc::new(WorkspaceChildTable::snapshot()),
        Arc::new(WorkspaceChildTable::pipeline()),
        Arc::new(WorkspaceChildTable::process()),
        Arc::new(WorkspaceChildTable::connection()),
        Arc::new(WorkspaceChildTable::aggregator()),
        Arc::new(WorkspaceChildTable::db_log()),
    ]
}

// ---------------------------------------------------------------------------
// Shared column sets
// ---------------------------------------------------------------------------

pub(crate) fn audit_columns() -> Vec<Column> {
    vec![
        Column::timestamp("created_at", "The time when the resource was created."),
        Column::string("created_by_id", "The unique identifier of the user who created the resource."),
        Column::json("created_by", "Information about the user who created the resource."),
        Column::timestamp("updated_at", "The time when the resource was last updated."),
        Column::string("updated_by_id", "The unique identifier of the user who last updated the resource."),
        Column::json("updated_by", "Information about the user who last updated the resource."),
        Column::int("version_id", "The current version ID of the resource."),
    ]
}

pub(crate) fn workspace_scope_columns() -> Vec<Column> {
    vec![
        Column::string("identity_id", "The unique identifier of the identity that owns the workspace."),
        Column::string("identity_handle", "The handle of the identity that owns the workspace."),
        Column::string("identity_type", "The type of identity, either user or org."),
        Column::string("workspace_id", "The unique identifier of the workspace."),
        Column::string("workspace_handle", "The handle of the workspace."),
    ]
}

// ---------------------------------------------------------------------------
// Parent workspace traversal
// ---------------------------------------------------------------------------

/// `actor/workspace` without identity qualifiers, `{scope}/{h}/workspace` otherwise.
pub(crate) async fn workspace_list_path(session: &Session, ctx: &QueryContext) -> Result<ApiPath, TableError> {
    let requested = ctx.identity_ref();
    if requested.is_empty() {
        return Ok(ApiPath::actor().join("workspace"));
    }
    let actor = session.actor().await?;
    Ok(resolve_identity(&requested, actor)?.path().join("workspace"))
}

/// Restricts parent workspaces to the `workspace_handle` / `workspace_id` qualifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WorkspaceSelector {
    handle: Option<String>,
    id: Option<String>,
}

impl WorkspaceSelector {
    pub(crate) fn from_ctx(ctx: &QueryContext) -> Self {
        Self {
            handle: ctx.equals_str("workspace_handle").map(str::to_string),
            id: ctx.equals_str("workspace_id").map(str::to_string),
        }
    }

    pub(crate) fn matches(&self, workspace: &Workspace) -> bool {
        self.handle.as_deref().map_or(true, |h| h == workspace.handle)
            && self.id.as_deref().map_or(true, |id| id == workspace.id)
    }
}

/// Workspaces whose children a child table should visit.
pub(crate) async fn parent_workspaces(session: &Session, ctx: &QueryContext) -> Result<Vec<Workspace>, TableError> {
    let path = workspace_list_path(session, ctx).await?;
    let selector = WorkspaceSelector::from_ctx(ctx);
    let workspaces: Vec<Workspace> = session.list_all("listWorkspaces", &path).await?;
    let total = workspaces.len();
    let selected: Vec<Workspace> = workspaces.into_iter().filter(|ws| selector.matches(ws)).collect();
    debug!("{}: {} of {} workspace(s) selected", path, selected.len(), total);
    Ok(selected)
}

/// Which workspace field names it in child endpoint paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkspaceKey {
    Handle,
    Id,
}

impl WorkspaceKey {
    fn of<'a>(&self, workspace: &'a Workspace) -> &'a str {
        match self {
            WorkspaceKey::Handle => &workspace.handle,
            WorkspaceKey::Id => &workspace.id,
        }
    }
}

/// `{scope}/{identity_id}/workspace/{handle or id}` for a workspace in hand.
pub(crate) async fn workspace_path(
    session: &Session,
    workspace: &Workspace,
    key: WorkspaceKey,
) -> Result<ApiPath, TableError> {
    let actor = session.actor().await?;
    let owner = workspace_scope(&workspace.identity_id, actor);
    Ok(ApiPath::workspace(owner.scope, &workspace.identity_id, key.of(workspace)))
}

/// Column values every workspace child row inherits from its parent.
pub(crate) fn hydrated_columns(
    details: &IdentityWorkspaceDetails,
    identity_id: &str,
    workspace_id: &str,
    ctx: &QueryContext,
) -> Vec<(&'static str, Value)> {
    let mut extras = vec![
        ("identity_id", json!(identity_id)),
        ("identity_handle", json!(details.identity_handle)),
        ("identity_type", json!(details.identity_type)),
        ("workspace_id", json!(workspace_id)),
        ("workspace_handle", json!(details.workspace_handle)),
    ];
    if let Some(raw) = ctx.equals_str("query_where") {
        extras.push(("query_where", json!(raw)));
    }
    extras
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn workspace(id: &str, handle: &str) -> Workspace {
        serde_json::from_value(json!({"id": id, "handle": handle, "identity_id": "o_1"})).unwrap()
    }

    #[test]
    fn test_table_names_are_unique_and_prefixed() {
        let tables = all_tables();
        let names: HashSet<&str> = tables.iter().map(|t| t.definition().name).collect();
        assert_eq!(names.len(), tables.len());
        assert!(names.iter().all(|n| n.starts_with("steampipecloud_")));
    }

    #[test]
    fn test_default_tables_match_constructors() {
        assert_eq!(UserTable::default().definition().name, UserTable::new().definition().name);
        assert_eq!(TokenTable::default().definition().name, "steampipecloud_token");
        assert_eq!(
            OrganizationWorkspaceMemberTable::default().definition().name,
            OrganizationWorkspaceMemberTable::new().definition().name
        );
    }

    #[test]
    fn test_key_columns_are_declared_columns() {
        for table in all_tables() {
            let def = table.definition();
            for key in def.list_keys.iter().map(|k| k.name).chain(def.get_keys.iter().copied()) {
                assert!(def.column(key).is_some(), "{} lacks key column {}", def.name, key);
            }
            for filter in def.filter_columns {
                assert!(def.column(filter.name).is_some(), "{} lacks {}", def.name, filter.name);
            }
        }
    }

    #[test]
    fn test_selector_requires_every_supplied_key() {
        let dev = workspace("w_1", "dev");
        assert!(WorkspaceSelector::default().matches(&dev));

        let by_handle = WorkspaceSelector::from_ctx(&QueryContext::new().with_eq("workspace_handle", "dev"));
        assert!(by_handle.matches(&dev));
        assert!(!by_handle.matches(&workspace("w_2", "prod")));

        let mismatched = WorkspaceSelector::from_ctx(
            &QueryContext::new()
                .with_eq("workspace_handle", "dev")
                .with_eq("workspace_id", "w_2"),
        );
        assert!(!mismatched.matches(&dev));
    }

    #[test]
    fn test_workspace_key_picks_field() {
        let dev = workspace("w_1", "dev");
        assert_eq!(WorkspaceKey::Handle.of(&dev), "dev");
        assert_eq!(WorkspaceKey::Id.of(&dev), "w_1");
    }

    #[test]
    fn test_hydrated_columns_echo_query_where() {
        let details = IdentityWorkspaceDetails {
            identity_handle: "acme".to_string(),
            identity_type: "org".to_string(),
            workspace_handle: "dev".to_string(),
        };
        let ctx = QueryContext::new().with_eq("query_where", "state = 'running'");
        let extras = hydrated_columns(&details, "o_1", "w_1", &ctx);
        assert!(extras.contains(&("query_where", json!("state = 'running'"))));
        assert!(extras.contains(&("identity_handle", json!("acme"))));
    }
}
