//! Row-level-security SQL for the clinic tables.
//!
//! PostgREST runs every request as the `anon` or `authenticated` role, so the
//! per-user scoping of the `appointments` table lives here rather than in the
//! client.

use std::fmt;

/// SQL command an RLS policy restricts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlsCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for RlsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlsCommand::All => write!(f, "ALL"),
            RlsCommand::Select => write!(f, "SELECT"),
            RlsCommand::Insert => write!(f, "INSERT"),
            RlsCommand::Update => write!(f, "UPDATE"),
            RlsCommand::Delete => write!(f, "DELETE"),
        }
    }
}

/// Role a policy applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlsRole {
    Authenticated,
    Public,
}

impl fmt::Display for RlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlsRole::Authenticated => write!(f, "authenticated"),
            RlsRole::Public => write!(f, "public"),
        }
    }
}

/// A complete RLS policy definition.
#[derive(Debug, Clone)]
pub struct RlsPolicy {
    pub name: String,
    pub table: String,
    pub command: RlsCommand,
    pub role: RlsRole,
    /// `USING` expression: which existing rows the role may see or touch.
    pub using: Option<String>,
    /// `WITH CHECK` expression: which new row versions the role may write.
    pub check: Option<String>,
    /// Defaults to `public` when `None`.
    pub schema: Option<String>,
}

impl RlsPolicy {
    /// Policy restricting `command` on `table` to rows owned by the caller
    /// (`auth.uid() = owner_column`).
    pub fn owner_only(table: &str, command: RlsCommand, owner_column: &str) -> Self {
        let owned = format!("auth.uid() = \"{}\"", owner_column);
        let (using, check) = match command {
            RlsCommand::Insert => (None, Some(owned)),
            RlsCommand::Update | RlsCommand::All => (Some(owned.clone()), Some(owned)),
            RlsCommand::Select | RlsCommand::Delete => (Some(owned), None),
        };
        Self {
            name: format!("{} own rows {}", table, command.to_string().to_lowercase()),
            table: table.to_string(),
            command,
            role: RlsRole::Authenticated,
            using,
            check,
            schema: None,
        }
    }

    fn qualified_table(&self) -> String {
        format!(
            "\"{}\".\"{}\"",
            self.schema.as_deref().unwrap_or("public"),
            self.table
        )
    }

    /// `CREATE POLICY` statement.
    pub fn create_policy_sql(&self) -> String {
        let using_clause = self
            .using
            .as_ref()
            .map_or(String::new(), |u| format!(" USING ({})", u));
        let check_clause = self
            .check
            .as_ref()
            .map_or(String::new(), |c| format!(" WITH CHECK ({})", c));
        format!(
            "CREATE POLICY \"{}\" ON {} FOR {} TO {}{}{};",
            self.name,
            self.qualified_table(),
            self.command,
            self.role,
            using_clause,
            check_clause
        )
    }

    /// `DROP POLICY` statement.
    pub fn drop_policy_sql(&self) -> String {
        format!(
            "DROP POLICY IF EXISTS \"{}\" ON {};",
            self.name,
            self.qualified_table()
        )
    }
}

/// SQL enabling RLS on a table.
pub fn enable_rls_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "ALTER TABLE \"{}\".\"{}\" ENABLE ROW LEVEL SECURITY;",
        schema.unwrap_or("public"),
        table
    )
}

/// SQL disabling RLS on a table.
pub fn disable_rls_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "ALTER TABLE \"{}\".\"{}\" DISABLE ROW LEVEL SECURITY;",
        schema.unwrap_or("public"),
        table
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_only_select() {
        let policy = RlsPolicy::owner_only("appointments", RlsCommand::Select, "user_id");
        assert_eq!(
            policy.create_policy_sql(),
            "CREATE POLICY \"appointments own rows select\" ON \"public\".\"appointments\" \
             FOR SELECT TO authenticated USING (auth.uid() = \"user_id\");"
        );
    }

    #[test]
    fn owner_only_insert_uses_check() {
        let sql = RlsPolicy::owner_only("appointments", RlsCommand::Insert, "user_id")
            .create_policy_sql();
        assert!(sql.contains("FOR INSERT"));
        assert!(!sql.contains("USING"));
        assert!(sql.ends_with("WITH CHECK (auth.uid() = \"user_id\");"));
    }

    #[test]
    fn owner_only_update_uses_both() {
        let sql = RlsPolicy::owner_only("appointments", RlsCommand::Update, "user_id")
            .create_policy_sql();
        assert!(sql.contains("USING (auth.uid() = \"user_id\")"));
        assert!(sql.contains("WITH CHECK (auth.uid() = \"user_id\")"));
    }

    #[test]
    fn drop_and_toggle() {
        let policy = RlsPolicy::owner_only("appointments", RlsCommand::Delete, "user_id");
        assert_eq!(
            policy.drop_policy_sql(),
            "DROP POLICY IF EXISTS \"appointments own rows delete\" ON \"public\".\"appointments\";"
        );
        assert_eq!(
            enable_rls_sql("doctors", None),
            "ALTER TABLE \"public\".\"doctors\" ENABLE ROW LEVEL SECURITY;"
        );
        assert_eq!(
            disable_rls_sql("doctors", Some("clinic")),
            "ALTER TABLE \"clinic\".\"doctors\" DISABLE ROW LEVEL SECURITY;"
        );
    }
}
