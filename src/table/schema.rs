/// PostgreSQL column types used by the loaded tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Integer,
    Double,
    Text,
    Timestamp,
}

impl ColumnType {
    /// Type name for `CREATE TABLE`.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    /// Array cast used when binding a column to `UNNEST`.
    pub fn array_cast(self) -> &'static str {
        match self {
            ColumnType::BigInt => "bigint[]",
            ColumnType::Integer => "int[]",
            ColumnType::Double => "float8[]",
            ColumnType::Text => "text[]",
            ColumnType::Timestamp => "timestamp[]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type }
    }
}
