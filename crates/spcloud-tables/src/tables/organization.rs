//! Organization tables.

use async_trait::async_trait;
use serde_json::json;
use spcloud_api::{ApiPath, OrgMembership, Resource};
use tracing::debug;

use crate::error::TableError;
use crate::identity::{resolve_workspace_details, WorkspaceOrigin};
use crate::lister::Budget;
use crate::query::{QueryContext, Row, RowSink};
use crate::schema::{Column, KeyColumn, TableDef};
use crate::session::Session;
use crate::tables::{audit_columns, parent_workspaces, Table};

fn organization_columns() -> Vec<Column> {
    vec![
        Column::string("id", "The unique identifier for the organization."),
        Column::string("handle", "The handle name for the organization."),
        Column::string("display_name", "The display name for the organization."),
        Column::string("avatar_url", "The avatar URL of the organization."),
        Column::string("url", "The URL of the organization."),
        Column::timestamp("created_at", "The creation time of the organization."),
        Column::timestamp("updated_at", "The last update time of the organization."),
        Column::int("version_id", "The current version ID for the organization."),
    ]
}

/// The caller's organizations.
pub struct OrganizationTable {
    def: TableDef,
}

impl OrganizationTable {
    pub fn new() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_organization",
                "Organizations the authenticated user belongs to.",
                organization_columns(),
            )
            .get_keys(&["handle"]),
        }
    }
}

impl Default for OrganizationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for OrganizationTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, _ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let actor = session.actor().await?;
        let path = ApiPath::user(&actor.handle).join("org");
        session
            .list_into("listOrganizations", &path, None, sink, |sink: &mut RowSink, membership: OrgMembership| {
                sink.stream_row(self.def.project(&membership.org, &[])?);
                Ok(())
            })
            .await
    }

    async fn get(&self, session: &Session, ctx: &QueryContext) -> Result<Option<Row>, TableError> {
        let Some(handle) = ctx.equals_str("handle") else {
            return Ok(None);
        };
        session
            .get_optional::<Resource>("getOrganization", &ApiPath::org(handle))
            .await?
            .map(|org| self.def.project(&org, &[]))
            .transpose()
    }
}

fn member_columns() -> Vec<Column> {
    let mut columns = vec![
        Column::string("id", "The unique identifier for the member."),
        Column::string("org_id", "The unique identifier for the organization."),
        Column::string("org_handle", "The handle of the organization."),
        Column::string("user_id", "The unique identifier for the user."),
        Column::string("user_handle", "The handle name for the user."),
        Column::string("email", "The email address of the user."),
        Column::string("role", "The role of the member: member or owner."),
        Column::string("status", "The member's organization status: invited or accepted."),
        Column::json("user", "Information about the user."),
    ];
    columns.extend(audit_columns());
    columns
}

/// Members of every organization the caller belongs to.
pub struct OrganizationMemberTable {
    def: TableDef,
}

impl OrganizationMemberTable {
    pub fn new() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_organization_member",
                "Members of the organizations the authenticated user belongs to.",
                member_columns(),
            )
            .list_keys(vec![KeyColumn::optional("status")]),
        }
    }
}

/// Membership endpoints selected by a `status` qualifier.
fn member_lists(status: Option<&str>) -> Result<&'static [&'static str], TableError> {
    match status {
        None => Ok(&["invited", "accepted"]),
        Some("invited") => Ok(&["invited"]),
        Some("accepted") => Ok(&["accepted"]),
        Some(_) => Err(TableError::invalid_qual(
            "status",
            "possible values are: invited and accepted",
        )),
    }
}

impl Default for OrganizationMemberTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for OrganizationMemberTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let lists = member_lists(ctx.equals_str("status"))?;
        let actor = session.actor().await?;
        let orgs: Vec<OrgMembership> = session
            .list_all("listOrganizations", &ApiPath::user(&actor.handle).join("org"))
            .await?;

        for membership in &orgs {
            let org = &membership.org;
            for list in lists {
                if sink.is_exhausted() {
                    return Ok(());
                }
                let path = ApiPath::org(&org.handle).join("member").join(*list);
                let extras = [("org_handle", json!(org.handle)), ("org_id", json!(org.id))];
                session
                    .list_into("listOrganizationMembers", &path, None, sink, |sink: &mut RowSink, item: Resource| {
                        sink.stream_row(self.def.project(&item, &extras)?);
                        Ok(())
                    })
                    .await?;
            }
        }
        Ok(())
    }
}

/// Members of org-owned workspaces.
pub struct OrganizationWorkspaceMemberTable {
    def: TableDef,
}

impl OrganizationWorkspaceMemberTable {
    pub fn new() -> Self {
        let mut columns = vec![
            Column::string("id", "The unique identifier for the member."),
            Column::string("org_id", "The unique identifier for the organization."),
            Column::string("org_handle", "The handle of the organization."),
            Column::string("workspace_id", "The unique identifier for the workspace."),
            Column::string("workspace_handle", "The handle of the workspace."),
            Column::string("user_id", "The unique identifier for the user."),
            Column::string("user_handle", "The handle name for the user."),
            Column::string("email", "The email address of the user."),
            Column::string("role", "The role of the member in the workspace."),
            Column::string("scope", "The scope of the role."),
            Column::string("status", "The member's workspace status."),
        ];
        columns.extend(audit_columns());
        Self {
            def: TableDef::new(
                "steampipecloud_organization_workspace_member",
                "Members of workspaces owned by organizations.",
                columns,
            )
            .get_keys(&["org_handle", "workspace_handle", "user_handle"]),
        }
    }
}

impl Default for OrganizationWorkspaceMemberTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for OrganizationWorkspaceMemberTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        for workspace in parent_workspaces(session, ctx).await? {
            if sink.is_exhausted() {
                break;
            }
            if workspace.identity_id.starts_with("u_") {
                debug!("skipping user workspace {}", workspace.handle);
                continue;
            }
            let details = resolve_workspace_details(session, WorkspaceOrigin::FromParent(&workspace)).await?;
            let path = ApiPath::org(&workspace.identity_id)
                .join("workspace")
                .join(workspace.handle.as_str())
                .join("member");
            let extras = [
                ("org_id", json!(workspace.identity_id)),
                ("org_handle", json!(details.identity_handle)),
                ("workspace_id", json!(workspace.id)),
                ("workspace_handle", json!(workspace.handle)),
            ];
            session
                .list_into(
                    "listOrganizationWorkspaceMembers",
                    &path,
                    None,
                    sink,
                    |sink: &mut RowSink, item: Resource| {
                        sink.stream_row(self.def.project(&item, &extras)?);
                        Ok(())
                    },
                )
                .await?;
        }
        Ok(())
    }

    async fn get(&self, session: &Session, ctx: &QueryContext) -> Result<Option<Row>, TableError> {
        let (Some(org), Some(workspace), Some(user)) = (
            ctx.equals_str("org_handle"),
            ctx.equals_str("workspace_handle"),
            ctx.equals_str("user_handle"),
        ) else {
            return Ok(None);
        };
        let path = ApiPath::org(org)
            .join("workspace")
            .join(workspace)
            .join("member")
            .join(user);
        let extras = [("org_handle", json!(org)), ("workspace_handle", json!(workspace))];
        session
            .get_optional::<Resource>("getOrganizationWorkspaceMember", &path)
            .await?
            .map(|member| self.def.project(&member, &extras))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_lists_by_status() {
        assert_eq!(member_lists(None).unwrap(), &["invited", "accepted"]);
        assert_eq!(member_lists(Some("accepted")).unwrap(), &["accepted"]);
        let err = member_lists(Some("pending")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for 'status': possible values are: invited and accepted"
        );
    }
}
