use std::sync::Arc;

use crate::domain::registry::EntityRegistry;

/// One column of a persisted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<&'static str>,
}

impl ColumnDefinition {
    pub fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// Table mapping for a persisted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDefinition {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: Vec<ColumnDefinition>,
}

impl EntityDefinition {
    /// Name of the unique constraint on `column`, matching the name Postgres
    /// generates for an inline `UNIQUE`.
    pub fn unique_constraint(&self, column: &str) -> String {
        format!("{}_{}_key", self.table, column)
    }

    /// DDL that creates the table if it is missing. Safe to run repeatedly.
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        parts.extend(
            self.columns
                .iter()
                .filter(|column| column.unique)
                .map(|column| {
                    format!(
                        "CONSTRAINT {} UNIQUE ({})",
                        self.unique_constraint(column.name),
                        column.name
                    )
                }),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            parts.join(",\n    ")
        )
    }
}

/// Mapping of the `User` aggregate onto the `users` table.
pub fn user_entity() -> EntityDefinition {
    EntityDefinition {
        name: "User",
        table: "users",
        columns: vec![
            ColumnDefinition::new("id", "UUID").primary_key(),
            ColumnDefinition::new("username", "VARCHAR(32)").unique(),
            ColumnDefinition::new("email", "VARCHAR(255)").unique(),
            ColumnDefinition::new("password_hash", "TEXT"),
            ColumnDefinition::new("is_active", "BOOLEAN").default_value("TRUE"),
            ColumnDefinition::new("created_at", "TIMESTAMPTZ"),
            ColumnDefinition::new("updated_at", "TIMESTAMPTZ"),
            ColumnDefinition::new("password_changed_at", "TIMESTAMPTZ").nullable(),
            ColumnDefinition::new("password_reset_token", "TEXT").nullable(),
            ColumnDefinition::new("password_reset_expires", "TIMESTAMPTZ").nullable(),
            ColumnDefinition::new("failed_login_attempts", "INTEGER").default_value("0"),
            ColumnDefinition::new("last_login_at", "TIMESTAMPTZ").nullable(),
        ],
    }
}

/// Register every persisted entity. Repeated calls keep the first definitions.
pub fn register_entities(registry: &EntityRegistry<EntityDefinition>) -> Arc<EntityDefinition> {
    let user = user_entity();
    registry.register(user.name, user)
}
