//! Endpoint paths relative to the API base URL.

use std::fmt;

/// Which endpoint family an identity lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    User,
    Org,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Org => "org",
        }
    }

    /// Scope implied by an identity id prefix (`u_` or `o_`), if any.
    pub fn from_identity_id(id: &str) -> Option<Scope> {
        if id.starts_with("u_") {
            Some(Scope::User)
        } else if id.starts_with("o_") {
            Some(Scope::Org)
        } else {
            None
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slash-separated API path such as `org/acme/workspace/dev/snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    segments: Vec<String>,
}

impl ApiPath {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    pub fn actor() -> Self {
        Self::new("actor")
    }

    /// `{scope}/{handle_or_id}`
    pub fn identity(scope: Scope, handle_or_id: &str) -> Self {
        Self::new(scope.as_str()).join(handle_or_id)
    }

    pub fn user(handle_or_id: &str) -> Self {
        Self::identity(Scope::User, handle_or_id)
    }

    pub fn org(handle_or_id: &str) -> Self {
        Self::identity(Scope::Org, handle_or_id)
    }

    /// `{scope}/{identity}/workspace/{workspace}`
    pub fn workspace(scope: Scope, identity: &str, workspace: &str) -> Self {
        Self::identity(scope, identity).join("workspace").join(workspace)
    }

    pub fn join(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_prefix() {
        assert_eq!(Scope::from_identity_id("u_abc"), Some(Scope::User));
        assert_eq!(Scope::from_identity_id("o_abc"), Some(Scope::Org));
        assert_eq!(Scope::from_identity_id("abc"), None);
    }

    #[test]
    fn test_workspace_path() {
        let path = ApiPath::workspace(Scope::Org, "acme", "dev").join("snapshot");
        assert_eq!(path.to_string(), "org/acme/workspace/dev/snapshot");
        assert_eq!(ApiPath::actor().join("workspace").to_string(), "actor/workspace");
    }
}
