//! Tables about the authenticated user.

use async_trait::async_trait;
use spcloud_api::{ApiPath, Resource, User};

use crate::error::TableError;
use crate::query::{QueryContext, Row, RowSink};
use crate::schema::{Column, TableDef};
use crate::session::Session;
use crate::tables::Table;

pub struct UserTable {
    def: TableDef,
}

impl UserTable {
    pub fn new() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_user",
                "Users can manage connections, organizations, and workspaces.",
                vec![
                    Column::string("id", "The unique identifier for the user."),
                    Column::string("handle", "The handle name for the user."),
                    Column::string("display_name", "The display name for the user."),
                    Column::string("email", "The email address for the user."),
                    Column::string("status", "The user status."),
                    Column::string("url", "The URL of the user."),
                    Column::string("avatar_url", "The avatar URL of the user."),
                    Column::string("preview_access_mode", "The preview mode for the current user."),
                    Column::timestamp("created_at", "The user created time."),
                    Column::timestamp("updated_at", "The user updated time."),
                    Column::int("version_id", "The current version ID of the user."),
                ],
            ),
        }
    }
}

impl Default for UserTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for UserTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, _ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let actor: &User = session.actor().await?;
        sink.stream_row(self.def.project(actor, &[])?);
        Ok(())
    }
}

pub struct UserEmailTable {
    def: TableDef,
}

impl UserEmailTable {
    pub fn new() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_user_email",
                "Email addresses registered to the authenticated user.",
                vec![
                    Column::string("id", "The unique identifier for the email address."),
                    Column::string("email", "The email address."),
                    Column::string("status", "The status of the email address."),
                    Column::timestamp("created_at", "The time when the email was added."),
                    Column::int("version_id", "The current version ID of the email address."),
                ],
            ),
        }
    }
}

impl Default for UserEmailTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for UserEmailTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, _ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let actor = session.actor().await?;
        let path = ApiPath::user(&actor.handle).join("email");
        session
            .list_into("listUserEmails", &path, None, sink, |sink: &mut RowSink, item: Resource| {
                sink.stream_row(self.def.project(&item, &[])?);
                Ok(())
            })
            .await
    }
}

pub struct UserPreferencesTable {
    def: TableDef,
}

impl UserPreferencesTable {
    pub fn new() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_user_preferences",
                "Communication preferences of the authenticated user.",
                vec![
                    Column::string("id", "The unique identifier for the user preferences."),
                    Column::bool(
                        "communication_community_updates",
                        "Whether the user opted in to community update emails.",
                    ),
                    Column::bool(
                        "communication_product_updates",
                        "Whether the user opted in to product update emails.",
                    ),
                    Column::bool(
                        "communication_tips_and_tricks",
                        "Whether the user opted in to tips and tricks emails.",
                    ),
                    Column::timestamp("created_at", "The time when the preferences were created."),
                    Column::timestamp("updated_at", "The time when the preferences were last updated."),
                    Column::int("version_id", "The current version ID of the preferences."),
                ],
            ),
        }
    }
}

impl Default for UserPreferencesTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for UserPreferencesTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, _ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let actor = session.actor().await?;
        let path = ApiPath::user(&actor.handle).join("preferences");
        if let Some(preferences) = session.get_optional::<Resource>("getUserPreferences", &path).await? {
            sink.stream_row(self.def.project(&preferences, &[])?);
        }
        Ok(())
    }
}

pub struct TokenTable {
    def: TableDef,
}

impl TokenTable {
    pub fn new() -> Self {
        Self {
            def: TableDef::new(
                "steampipecloud_token",
                "API tokens of the authenticated user.",
                vec![
                    Column::string("id", "The unique identifier for the token."),
                    Column::string("user_id", "The unique identifier for the user."),
                    Column::string("status", "The token status."),
                    Column::string("last4", "The last 4 characters of the token."),
                    Column::timestamp("created_at", "The token created time."),
                    Column::timestamp("updated_at", "The token updated time."),
                    Column::int("version_id", "The current version ID of the token."),
                ],
            )
            .get_keys(&["id"]),
        }
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Table for TokenTable {
    fn definition(&self) -> &TableDef {
        &self.def
    }

    async fn list(&self, session: &Session, _ctx: &QueryContext, sink: &mut RowSink) -> Result<(), TableError> {
        let actor = session.actor().await?;
        let path = ApiPath::user(&actor.handle).join("token");
        session
            .list_into("listTokens", &path, None, sink, |sink: &mut RowSink, item: Resource| {
                sink.stream_row(self.def.project(&item, &[])?);
                Ok(())
            })
            .await
    }

    async fn get(&self, session: &Session, ctx: &QueryContext) -> Result<Option<Row>, TableError> {
        let Some(id) = ctx.equals_str("id") else {
            return Ok(None);
        };
        let actor = session.actor().await?;
        let path = ApiPath::user(&actor.handle).join("token").join(id);
        session
            .get_optional::<Resource>("getToken", &path)
            .await?
            .map(|token| self.def.project(&token, &[]))
            .transpose()
    }
}
