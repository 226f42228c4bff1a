//! Identity Dispatcher: decide whether a request targets the user or the org
//! endpoint family, and hydrate identity/workspace details for child rows.

use spcloud_api::{ApiClient, ApiPath, Org, RetryPolicy, Scope, User, Workspace};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{TableError, WithOperation};
use crate::session::Session;

/// Identity requested by the query. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRef {
    pub handle: Option<String>,
    pub id: Option<String>,
}

impl IdentityRef {
    pub fn new(handle: Option<&str>, id: Option<&str>) -> Self {
        let present = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            handle: present(handle),
            id: present(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_none() && self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub scope: Scope,
    pub handle_or_id: String,
}

impl ResolvedIdentity {
    /// `{scope}/{handle_or_id}`
    pub fn path(&self) -> ApiPath {
        ApiPath::identity(self.scope, &self.handle_or_id)
    }
}

fn scope_of_id(id: &str, actor: &User) -> Scope {
    match Scope::from_identity_id(id) {
        Some(scope) => scope,
        None if id == actor.id => Scope::User,
        None => Scope::Org,
    }
}

fn scope_of_handle(handle: &str, actor: &User) -> Scope {
    if handle == actor.handle {
        Scope::User
    } else {
        Scope::Org
    }
}

/// Pick the endpoint family for `requested`.
///
/// No identity means the actor. Ids are classified by their `u_`/`o_` prefix
/// (or by equality with the actor's id); handles are the actor's own or an
/// org. A handle and an id that disagree on scope are rejected; when they
/// agree the id is used.
pub fn resolve_identity(requested: &IdentityRef, actor: &User) -> Result<ResolvedIdentity, TableError> {
    let by_handle = requested
        .handle
        .as_deref()
        .map(|h| (scope_of_handle(h, actor), h));
    let by_id = requested.id.as_deref().map(|id| (scope_of_id(id, actor), id));

    let (scope, handle_or_id) = match (by_handle, by_id) {
        (None, None) => (Scope::User, actor.handle.as_str()),
        (Some(resolved), None) | (None, Some(resolved)) => resolved,
        (Some((handle_scope, handle)), Some((id_scope, id))) => {
            if handle_scope != id_scope {
                return Err(TableError::ConflictingIdentity {
                    handle: handle.to_string(),
                    id: id.to_string(),
                    handle_scope: handle_scope.to_string(),
                    id_scope: id_scope.to_string(),
                });
            }
            (id_scope, id)
        }
    };

    Ok(ResolvedIdentity {
        scope,
        handle_or_id: handle_or_id.to_string(),
    })
}

/// Scope of the identity owning a workspace.
pub fn workspace_scope(identity_id: &str, actor: &User) -> ResolvedIdentity {
    ResolvedIdentity {
        scope: scope_of_id(identity_id, actor),
        handle_or_id: identity_id.to_string(),
    }
}

/// The caller's identity, fetched at most once per session.
#[derive(Debug, Default)]
pub struct ActorCache {
    cell: OnceCell<User>,
}

impl ActorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch(&self, client: &ApiClient, retry: &RetryPolicy) -> Result<&User, TableError> {
        self.cell
            .get_or_try_init(|| async {
                debug!("fetching actor identity");
                let path = ApiPath::actor();
                retry
                    .run("getUserIdentity", || client.get::<User>(&path))
                    .await
                    .with_operation("getUserIdentity")
            })
            .await
    }
}

/// Where a child row learns which workspace it belongs to.
#[derive(Debug, Clone, Copy)]
pub enum WorkspaceOrigin<'a> {
    /// Listed under a workspace already in hand.
    FromParent(&'a Workspace),
    /// Only the owning ids are known, from the item itself.
    FromItemFields {
        identity_id: &'a str,
        workspace_id: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityWorkspaceDetails {
    pub identity_handle: String,
    pub identity_type: String,
    pub workspace_handle: String,
}

async fn lookup_identity_handle(session: &Session, scope: Scope, identity_id: &str) -> Result<String, TableError> {
    match scope {
        Scope::User => {
            let user: User = session.get("getUser", &ApiPath::user(identity_id)).await?;
            Ok(user.handle)
        }
        Scope::Org => {
            let org: Org = session.get("getOrg", &ApiPath::org(identity_id)).await?;
            Ok(org.handle)
        }
    }
}

/// Identity handle, identity type and workspace handle for a child row.
pub async fn resolve_workspace_details(
    session: &Session,
    origin: WorkspaceOrigin<'_>,
) -> Result<IdentityWorkspaceDetails, TableError> {
    let actor = session.actor().await?;
    match origin {
        WorkspaceOrigin::FromParent(workspace) => {
            let owner = workspace_scope(&workspace.identity_id, actor);
            let identity_handle = match &workspace.identity {
                Some(summary) => summary.handle.clone(),
                None => lookup_identity_handle(session, owner.scope, &workspace.identity_id).await?,
            };
            Ok(IdentityWorkspaceDetails {
                identity_handle,
                identity_type: owner.scope.to_string(),
                workspace_handle: workspace.handle.clone(),
            })
        }
        WorkspaceOrigin::FromItemFields {
            identity_id,
            workspace_id,
        } => {
            let owner = workspace_scope(identity_id, actor);
            let identity_handle = lookup_identity_handle(session, owner.scope, identity_id).await?;
            let path = ApiPath::workspace(owner.scope, identity_id, workspace_id);
            let workspace: Workspace = session.get("getWorkspace", &path).await?;
            Ok(IdentityWorkspaceDetails {
                identity_handle,
                identity_type: owner.scope.to_string(),
                workspace_handle: workspace.handle,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn alice() -> User {
        User {
            id: "u_alice".to_string(),
            handle: "alice".to_string(),
            extra: Map::new(),
        }
    }

    fn resolve(handle: Option<&str>, id: Option<&str>) -> Result<ResolvedIdentity, TableError> {
        resolve_identity(&IdentityRef::new(handle, id), &alice())
    }

    fn scoped(scope: Scope, handle_or_id: &str) -> ResolvedIdentity {
        ResolvedIdentity {
            scope,
            handle_or_id: handle_or_id.to_string(),
        }
    }

    #[test]
    fn test_empty_reference_is_actor() {
        assert_eq!(resolve(None, None).unwrap(), scoped(Scope::User, "alice"));
        assert_eq!(resolve(Some(""), Some("")).unwrap(), scoped(Scope::User, "alice"));
    }

    #[test]
    fn test_id_prefix_is_trusted() {
        assert_eq!(resolve(None, Some("o_123")).unwrap(), scoped(Scope::Org, "o_123"));
        assert_eq!(resolve(None, Some("u_bob")).unwrap(), scoped(Scope::User, "u_bob"));
    }

    #[test]
    fn test_unprefixed_id() {
        let actor = User {
            id: "123".to_string(),
            ..alice()
        };
        let own = resolve_identity(&IdentityRef::new(None, Some("123")), &actor).unwrap();
        assert_eq!(own.scope, Scope::User);
        let other = resolve_identity(&IdentityRef::new(None, Some("456")), &actor).unwrap();
        assert_eq!(other.scope, Scope::Org);
    }

    #[test]
    fn test_handle_dispatch() {
        assert_eq!(resolve(Some("alice"), None).unwrap(), scoped(Scope::User, "alice"));
        assert_eq!(resolve(Some("bob"), None).unwrap(), scoped(Scope::Org, "bob"));
    }

    #[test]
    fn test_conflicting_handle_and_id() {
        let err = resolve(Some("alice"), Some("o_1")).unwrap_err();
        match err {
            TableError::ConflictingIdentity {
                handle_scope,
                id_scope,
                ..
            } => {
                assert_eq!(handle_scope, "user");
                assert_eq!(id_scope, "org");
            }
            other => panic!("expected ConflictingIdentity, got {:?}", other),
        }
    }

    #[test]
    fn test_agreeing_handle_and_id_prefers_id() {
        assert_eq!(resolve(Some("acme"), Some("o_1")).unwrap(), scoped(Scope::Org, "o_1"));
        assert_eq!(
            resolve(Some("alice"), Some("u_alice")).unwrap(),
            scoped(Scope::User, "u_alice")
        );
    }

    #[test]
    fn test_workspace_scope() {
        assert_eq!(workspace_scope("o_9", &alice()).path().to_string(), "org/o_9");
        assert_eq!(workspace_scope("u_alice", &alice()).scope, Scope::User);
    }
}
