//! Declared types of planner constants. Pure data.
//!
//! Only the numeric/non-numeric split matters to the unparser: numeric
//! constants are emitted bare, everything else is single-quoted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Numeric,
    Utf8,
    Date,
    Timestamp,
    /// Any host type without a dedicated variant (name as the host reports it).
    Other(String),
}

impl DataType {
    /// Mirrors the host's int2/int4/int8/float4/float8/numeric family.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Float32
                | DataType::Float64
                | DataType::Numeric
        )
    }

    /// Resolve a host type name (`int4`, `float8`, `text`, ...).
    pub fn from_host_name(name: &str) -> Self {
        match name {
            "bool" | "boolean" | "Boolean" => DataType::Boolean,
            "int2" | "smallint" | "Int16" => DataType::Int16,
            "int4" | "integer" | "int" | "Int32" => DataType::Int32,
            "int8" | "bigint" | "Int64" => DataType::Int64,
            "float4" | "real" | "Float32" => DataType::Float32,
            "float8" | "double precision" | "Float64" => DataType::Float64,
            "numeric" | "decimal" | "Numeric" => DataType::Numeric,
            "text" | "varchar" | "bpchar" | "Utf8" => DataType::Utf8,
            "date" | "Date" => DataType::Date,
            "timestamp" | "timestamptz" | "Timestamp" => DataType::Timestamp,
            other => DataType::Other(other.to_string()),
        }
    }
}
