use entorm_core_types::ValueType;
use thiserror::Error;

/// Result type alias using OrmError
pub type Result<T> = std::result::Result<T, OrmError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by entorm is classified into one of these kinds.
/// Each kind maps to a stable code usable for programmatic handling and in
/// test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrmErrorKind {
    // Domain taxonomy (translated once, at the CRUD boundary)
    /// Primary-key or unique violation
    RecordExists,
    /// Referential violation
    ForeignKey,
    /// Expected row is absent
    RecordNotFound,

    // Caller and metadata misuse
    /// Bad entity metadata, detected at registration
    Configuration,
    /// Wrong parameter count, unknown field/column, non-unique lookup key
    InvalidArgument,

    // Integration
    /// Untranslated store failure
    Persistence,
    Io,

    // Internal
    Internal,
}

impl OrmErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            OrmErrorKind::RecordExists => "ERR_RECORD_EXISTS",
            OrmErrorKind::ForeignKey => "ERR_FOREIGN_KEY",
            OrmErrorKind::RecordNotFound => "ERR_RECORD_NOT_FOUND",
            OrmErrorKind::Configuration => "ERR_CONFIGURATION",
            OrmErrorKind::InvalidArgument => "ERR_INVALID_ARGUMENT",
            OrmErrorKind::Persistence => "ERR_PERSISTENCE",
            OrmErrorKind::Io => "ERR_IO",
            OrmErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification plus whatever context the failing layer knew:
/// the operation, the table, the offending value, the SQL text and the
/// store's extended result code.
#[derive(Debug, Clone)]
pub struct OrmError {
    kind: OrmErrorKind,
    op: Option<String>,
    table: Option<String>,
    entity: Option<String>,
    sql: Option<String>,
    store_code: Option<i32>,
    message: String,
}

impl OrmError {
    /// Create a new error with the specified kind
    pub fn new(kind: OrmErrorKind) -> Self {
        Self {
            kind,
            op: None,
            table: None,
            entity: None,
            sql: None,
            store_code: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attach the offending value, rendered with `Debug`
    pub fn with_entity(mut self, entity: &dyn std::fmt::Debug) -> Self {
        self.entity = Some(format!("{:?}", entity));
        self
    }

    /// Add the SQL text being executed
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Add the store's extended result code
    pub fn with_store_code(mut self, code: i32) -> Self {
        self.store_code = Some(code);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Reclassify, keeping every piece of context
    pub fn with_kind(mut self, kind: OrmErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> OrmErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn store_code(&self) -> Option<i32> {
        self.store_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for OrmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        Ok(())
    }
}

impl std::error::Error for OrmError {}

// ========== End Error Facility ==========

/// Mapping and argument failures raised while deriving profiles or
/// validating calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    // ===== Metadata =====
    #[error("Type {type_name} is not marked as an entity")]
    NotAnEntity { type_name: String },

    #[error("Type {type_name} declares no persistable fields")]
    NoPersistentFields { type_name: String },

    #[error("Type {type_name} declares no id column")]
    MissingId { type_name: String },

    #[error("Type {type_name} declares more than one id column: {columns:?}")]
    MultipleIds {
        type_name: String,
        columns: Vec<String>,
    },

    #[error("Id field {field} of {type_name} must be an integer, found {found}")]
    IdNotInteger {
        type_name: String,
        field: String,
        found: ValueType,
    },

    #[error("Field {field} of {type_name} is immutable and must be marked transient")]
    ImmutableField { type_name: String, field: String },

    #[error("Type {type_name} declares field {field} twice")]
    DuplicateField { type_name: String, field: String },

    #[error("Type {type_name} maps column {column} twice")]
    DuplicateColumn { type_name: String, column: String },

    #[error("Unique constraint on {type_name} names unknown column {column}")]
    UnknownConstraintColumn { type_name: String, column: String },

    #[error("Field {field} on table {table} is not a many-to-many column")]
    NotAssociation { table: String, field: String },

    #[error("Many-to-many column {column} on table {table} is not wired to its target")]
    AssociationNotWired { table: String, column: String },

    #[error("Many-to-many column {column} on table {table} targets unregistered type {target}")]
    UnresolvedTarget {
        table: String,
        column: String,
        target: String,
    },

    #[error("Table {table} is registered more than once")]
    DuplicateTable { table: String },

    #[error("Type {type_name} is not registered")]
    NotRegistered { type_name: String },

    // ===== Caller misuse =====
    #[error("Unknown field {field} on table {table}")]
    UnknownField { table: String, field: String },

    #[error("Unknown column {column} on table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Field {field} on table {table} is not a scalar column")]
    NotScalar { table: String, field: String },

    #[error("Statement expects {expected} parameters, {actual} supplied")]
    ParameterCount { expected: usize, actual: usize },

    #[error("Query projects {actual} columns, table {table} has {expected}")]
    ProjectionTooNarrow {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Columns {columns:?} on table {table} matched more than one row")]
    NotUnique { table: String, columns: Vec<String> },

    #[error("{columns} columns given with {values} values")]
    ColumnValueMismatch { columns: usize, values: usize },

    #[error("Entity on table {table} has no id")]
    MissingIdentity { table: String },

    #[error("Element of {column} on table {table} has no id and the column is not writable")]
    DetachedElement { table: String, column: String },
}

impl From<EntityError> for OrmError {
    fn from(err: EntityError) -> Self {
        let kind = match &err {
            EntityError::NotAnEntity { .. }
            | EntityError::NoPersistentFields { .. }
            | EntityError::MissingId { .. }
            | EntityError::MultipleIds { .. }
            | EntityError::IdNotInteger { .. }
            | EntityError::ImmutableField { .. }
            | EntityError::DuplicateField { .. }
            | EntityError::DuplicateColumn { .. }
            | EntityError::UnknownConstraintColumn { .. }
            | EntityError::NotAssociation { .. }
            | EntityError::AssociationNotWired { .. }
            | EntityError::UnresolvedTarget { .. }
            | EntityError::DuplicateTable { .. }
            | EntityError::NotRegistered { .. } => OrmErrorKind::Configuration,
            EntityError::UnknownField { .. }
            | EntityError::UnknownColumn { .. }
            | EntityError::NotScalar { .. }
            | EntityError::ParameterCount { .. }
            | EntityError::ProjectionTooNarrow { .. }
            | EntityError::NotUnique { .. }
            | EntityError::ColumnValueMismatch { .. }
            | EntityError::MissingIdentity { .. }
            | EntityError::DetachedElement { .. } => OrmErrorKind::InvalidArgument,
        };
        let table = match &err {
            EntityError::AssociationNotWired { table, .. }
            | EntityError::NotAssociation { table, .. }
            | EntityError::UnresolvedTarget { table, .. }
            | EntityError::DuplicateTable { table }
            | EntityError::UnknownField { table, .. }
            | EntityError::UnknownColumn { table, .. }
            | EntityError::NotScalar { table, .. }
            | EntityError::ProjectionTooNarrow { table, .. }
            | EntityError::NotUnique { table, .. }
            | EntityError::MissingIdentity { table }
            | EntityError::DetachedElement { table, .. } => Some(table.clone()),
            _ => None,
        };
        let error = OrmError::new(kind).with_message(err.to_string());
        match table {
            Some(table) => error.with_table(table),
            None => error,
        }
    }
}

/// A stored or supplied value does not fit the field it is assigned to
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot convert {found} into {expected}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: String,
}

impl ConversionError {
    pub fn new(expected: &'static str, found: &entorm_core_types::Value) -> Self {
        Self {
            expected,
            found: match found.value_type() {
                Some(t) => t.name().to_string(),
                None => "NULL".to_string(),
            },
        }
    }
}

/// Values that do not fit their column are metadata defects, not caller errors
impl From<ConversionError> for OrmError {
    fn from(err: ConversionError) -> Self {
        OrmError::new(OrmErrorKind::Configuration).with_message(err.to_string())
    }
}
