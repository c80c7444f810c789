//! Table Model
//!
//! Structural metadata for a single table as handed over by introspection:
//! columns, keys, constraints and indexes. Descriptive only - nothing here
//! knows about roles, patterns or tensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Qualified Name
// =============================================================================

/// Schema-qualified table name, e.g. `public.users`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub const DEFAULT_SCHEMA: &'static str = "public";

    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.name`; a bare `name` lands in the default schema
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new(Self::DEFAULT_SCHEMA, qualified),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for QualifiedName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

// =============================================================================
// Data Types
// =============================================================================

/// Coarse category of a column's SQL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTypeCategory {
    Integer,
    Decimal,
    Float,
    Text,
    Boolean,
    Date,
    Timestamp,
    Time,
    Interval,
    Uuid,
    Json,
    Binary,
    Array,
    Enum,
    Other,
}

impl DataTypeCategory {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Enum)
    }
}

/// Column type: raw SQL spelling plus its category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    pub raw: String,
    pub category: DataTypeCategory,
}

impl DataType {
    pub fn new(raw: impl Into<String>, category: DataTypeCategory) -> Self {
        Self {
            raw: raw.into(),
            category,
        }
    }

    /// Classify a raw SQL type name (PostgreSQL spelling)
    pub fn from_raw(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            category: classify_raw_type(raw),
        }
    }
}

fn classify_raw_type(raw: &str) -> DataTypeCategory {
    let lowered = raw.trim().to_lowercase();
    if lowered.ends_with("[]") || lowered.starts_with("array") {
        return DataTypeCategory::Array;
    }

    // Drop length/precision modifiers: varchar(255), numeric(10,2)
    let base = lowered
        .split('(')
        .next()
        .unwrap_or(&lowered)
        .trim();

    match base {
        "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "serial"
        | "smallserial" | "bigserial" | "serial4" | "serial8" => DataTypeCategory::Integer,
        "numeric" | "decimal" | "money" => DataTypeCategory::Decimal,
        "real" | "float" | "float4" | "float8" | "double precision" | "double" => {
            DataTypeCategory::Float
        }
        "text" | "varchar" | "character varying" | "char" | "character" | "bpchar"
        | "citext" | "name" | "string" => DataTypeCategory::Text,
        "boolean" | "bool" => DataTypeCategory::Boolean,
        "date" => DataTypeCategory::Date,
        "time" | "timetz" | "time without time zone" | "time with time zone" => {
            DataTypeCategory::Time
        }
        "interval" => DataTypeCategory::Interval,
        "uuid" => DataTypeCategory::Uuid,
        "json" | "jsonb" => DataTypeCategory::Json,
        "bytea" | "blob" | "binary" | "varbinary" => DataTypeCategory::Binary,
        "enum" | "user-defined" => DataTypeCategory::Enum,
        other if other.starts_with("timestamp") || other == "datetime" => {
            DataTypeCategory::Timestamp
        }
        _ => DataTypeCategory::Other,
    }
}

// =============================================================================
// Columns, Keys, Constraints
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// GENERATED ... AS IDENTITY or equivalent
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub identity: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            default: None,
            identity: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn category(&self) -> DataTypeCategory {
        self.data_type.category
    }

    /// Value produced by the database rather than by the application
    pub fn is_generated(&self) -> bool {
        if self.identity {
            return true;
        }
        if self.data_type.raw.to_lowercase().contains("serial") {
            return true;
        }
        self.default.as_deref().is_some_and(|d| {
            let d = d.to_lowercase();
            d.contains("nextval(") || d.contains("uuid") || d.contains("identity")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<String>,
}

impl PrimaryKey {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

/// ON DELETE / ON UPDATE behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub target: QualifiedName,
    pub target_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

impl ForeignKey {
    pub fn new<I, S, J, T>(
        name: impl Into<String>,
        columns: I,
        target: impl Into<QualifiedName>,
        target_columns: J,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            target: target.into(),
            target_columns: target_columns.into_iter().map(Into::into).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Check,
    Unique,
    Exclusion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintType,
    pub columns: Vec<String>,
    /// Check definition text, e.g. `kind IN ('post', 'photo')`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Constraint {
    pub fn unique<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: ConstraintType::Unique,
            columns: columns.into_iter().map(Into::into).collect(),
            expression: None,
        }
    }

    pub fn check(name: impl Into<String>, column: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintType::Check,
            columns: vec![column.into()],
            expression: Some(expression.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMethod {
    #[default]
    Btree,
    Hash,
    Gin,
    Gist,
    Brin,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub method: IndexMethod,
    #[serde(default)]
    pub unique: bool,
    /// WHERE clause of a partial index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            method: IndexMethod::Btree,
            unique: false,
            predicate: None,
        }
    }

    pub fn method(mut self, method: IndexMethod) -> Self {
        self.method = method;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn partial(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

// =============================================================================
// Table
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(flatten)]
    pub name: QualifiedName,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
            comment: None,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, pk: PrimaryKey) -> Self {
        self.primary_key = Some(pk);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.columns.iter().any(|c| c == name))
    }

    pub fn is_foreign_key_column(&self, name: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.columns.iter().any(|c| c == name))
    }

    /// Primary key is composite and every key column belongs to some foreign key
    pub fn has_foreign_key_primary_key(&self) -> bool {
        self.primary_key.as_ref().is_some_and(|pk| {
            pk.is_composite() && pk.columns.iter().all(|c| self.is_foreign_key_column(c))
        })
    }

    /// Columns that are neither primary key nor foreign key columns
    pub fn payload_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| !self.is_primary_key_column(&c.name) && !self.is_foreign_key_column(&c.name))
    }

    /// The exact column set is guaranteed unique by the primary key, a unique
    /// constraint or a unique index
    pub fn is_unique_set(&self, columns: &[String]) -> bool {
        if columns.is_empty() {
            return false;
        }
        let same_set = |other: &[String]| {
            other.len() == columns.len() && columns.iter().all(|c| other.contains(c))
        };

        self.primary_key.as_ref().is_some_and(|pk| same_set(&pk.columns))
            || self
                .constraints
                .iter()
                .any(|c| c.kind == ConstraintType::Unique && same_set(&c.columns))
            || self
                .indexes
                .iter()
                .any(|i| i.unique && i.predicate.is_none() && same_set(&i.columns))
    }

    /// Some index (or the primary key) starts with exactly these columns
    pub fn has_leading_index(&self, columns: &[String]) -> bool {
        let leads = |indexed: &[String]| {
            indexed.len() >= columns.len()
                && columns.iter().all(|c| indexed[..columns.len()].contains(c))
        };

        self.primary_key.as_ref().is_some_and(|pk| leads(&pk.columns))
            || self.indexes.iter().any(|i| leads(&i.columns))
            || self
                .constraints
                .iter()
                .any(|c| c.kind == ConstraintType::Unique && leads(&c.columns))
    }
}
