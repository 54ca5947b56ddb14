/// Database row types — these map directly to SQLite rows.
/// Distinct from parley-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub created_at: String,
}

/// User joined with its optional credential hash, as signin reads it.
/// `hash` is `None` for a user that owns no credential row.
pub struct UserCredentialRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub hash: Option<String>,
}

pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: String,
}

pub struct MembershipRow {
    pub channel_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}
