use crate::models::{ChannelRow, MembershipRow, UserCredentialRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert the user and its credential row in one transaction; a signup
    /// that fails midway must leave neither behind.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        name: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, name, username) VALUES (?1, ?2, ?3, ?4)",
                (id, email, name, username),
            )?;
            tx.execute(
                "INSERT INTO credentials (user_id, hash) VALUES (?1, ?2)",
                (id, password_hash),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    /// Signin lookup: the user plus its credential hash in one query, so a
    /// missing user and a missing credential are handled by the same path.
    pub fn get_user_with_credential(&self, email: &str) -> Result<Option<UserCredentialRow>> {
        self.with_conn(|conn| query_user_with_credential(conn, email))
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    // -- Channels --

    /// Insert the channel and the creator's ADMIN membership in one
    /// transaction. A channel without its creator's admin row must never be
    /// observable.
    pub fn create_channel(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO channels (id, name, description, created_by) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, name, description, created_by],
            )?;
            tx.execute(
                "INSERT INTO memberships (channel_id, user_id, role) VALUES (?1, ?2, 'ADMIN')",
                (id, created_by),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn channel_exists(&self, name: &str, created_by: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM channels WHERE name = ?1 AND created_by = ?2)",
                (name, created_by),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Channels the user holds any membership in, and nothing else.
    /// Ordered by (created_at, id) so pagination stays stable.
    pub fn channels_for_member(&self, user_id: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.description, c.created_by, c.created_at
                 FROM channels c
                 JOIN memberships m ON m.channel_id = c.id
                 WHERE m.user_id = ?1
                 ORDER BY c.created_at, c.id",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_by: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn memberships_for_channel(&self, channel_id: &str) -> Result<Vec<MembershipRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, user_id, role, created_at
                 FROM memberships
                 WHERE channel_id = ?1",
            )?;

            let rows = stmt
                .query_map([channel_id], |row| {
                    Ok(MembershipRow {
                        channel_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, email, name, username, created_at FROM users WHERE email = ?1")?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                username: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_with_credential(conn: &Connection, email: &str) -> Result<Option<UserCredentialRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.username, c.hash
         FROM users u
         LEFT JOIN credentials c ON c.user_id = u.id
         WHERE u.email = ?1",
    )?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserCredentialRow {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                hash: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{violated_constraint, Constraint, Database};
    use std::path::Path;

    fn open_db() -> Database {
        Database::open(Path::new(":memory:")).unwrap()
    }

    fn seed_user(db: &Database, id: &str, email: &str, username: &str) {
        db.create_user(id, email, "Test User", username, "argon2-hash")
            .unwrap();
    }

    #[test]
    fn create_user_persists_user_and_credential() {
        let db = open_db();
        db.create_user("u1", "a@x.com", "A", "a1234", "hash-a").unwrap();

        let user = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.name, "A");
        assert_eq!(user.username, "a1234");

        let row = db.get_user_with_credential("a@x.com").unwrap().unwrap();
        assert_eq!(row.hash.as_deref(), Some("hash-a"));
    }

    #[test]
    fn email_lookup_is_case_sensitive() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "a1000");
        assert!(db.get_user_by_email("A@x.com").unwrap().is_none());
        assert!(db.get_user_by_email("a@x.com").unwrap().is_some());
    }

    #[test]
    fn duplicate_email_trips_the_unique_constraint() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "a1000");

        let err = db
            .create_user("u2", "a@x.com", "B", "b2000", "hash-b")
            .unwrap_err();
        assert_eq!(violated_constraint(&err), Some(Constraint::UserEmail));

        // the failed signup rolled back: one credential row total
        let credentials: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM credentials", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(credentials, 1);
    }

    #[test]
    fn duplicate_username_trips_the_unique_constraint() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "same1000");

        let err = db
            .create_user("u2", "b@x.com", "B", "same1000", "hash-b")
            .unwrap_err();
        assert_eq!(violated_constraint(&err), Some(Constraint::UserUsername));
    }

    #[test]
    fn username_exists_sees_seeded_rows() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "taken1000");
        assert!(db.username_exists("taken1000").unwrap());
        assert!(!db.username_exists("free1000").unwrap());
    }

    #[test]
    fn user_without_credential_reads_back_none() {
        let db = open_db();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, username)
                 VALUES ('u9', 'ghost@x.com', 'Ghost', 'ghost1000')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let row = db.get_user_with_credential("ghost@x.com").unwrap().unwrap();
        assert!(row.hash.is_none());
    }

    #[test]
    fn channel_create_installs_exactly_one_admin_membership() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "a1000");
        db.create_channel("c1", "general", Some("the commons"), "u1")
            .unwrap();

        let members = db.memberships_for_channel("c1").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "u1");
        assert_eq!(members[0].role, "ADMIN");
    }

    #[test]
    fn channel_name_is_unique_per_creator_only() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "a1000");
        seed_user(&db, "u2", "b@x.com", "b1000");

        db.create_channel("c1", "general", None, "u1").unwrap();
        // a different creator may reuse the name
        db.create_channel("c2", "general", None, "u2").unwrap();
        // the same creator may not
        let err = db.create_channel("c3", "general", None, "u1").unwrap_err();
        assert_eq!(violated_constraint(&err), Some(Constraint::ChannelNameOwner));
    }

    #[test]
    fn duplicate_membership_trips_the_pair_constraint() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "a1000");
        db.create_channel("c1", "general", None, "u1").unwrap();

        let err = db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO memberships (channel_id, user_id, role)
                     VALUES ('c1', 'u1', 'MEMBER')",
                    [],
                )?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(violated_constraint(&err), Some(Constraint::ChannelMember));
    }

    #[test]
    fn failed_channel_create_leaves_no_rows() {
        let db = open_db();
        // unknown creator: the FK fails and the transaction rolls back
        assert!(db.create_channel("c1", "general", None, "missing").is_err());

        assert!(db.memberships_for_channel("c1").unwrap().is_empty());
        let channels: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM channels", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(channels, 0);
    }

    #[test]
    fn channel_listing_is_scoped_to_memberships() {
        let db = open_db();
        seed_user(&db, "u1", "a@x.com", "a1000");
        seed_user(&db, "u2", "b@x.com", "b1000");

        db.create_channel("c1", "alpha", None, "u1").unwrap();
        db.create_channel("c2", "beta", None, "u2").unwrap();
        db.create_channel("c3", "gamma", None, "u1").unwrap();

        let mut visible: Vec<String> = db
            .channels_for_member("u1")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        visible.sort();
        assert_eq!(visible, vec!["c1", "c3"]);

        assert!(db.channels_for_member("nobody").unwrap().is_empty());
    }
}
