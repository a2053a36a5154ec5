//! Shared API type definitions
//!
//! This crate contains the wire types exchanged between a query-engine host and its
//! extensions: extension identity, the plugin registry declared at registration,
//! table column definitions, query contexts, and the request/response envelopes
//! carried over the manager and extension sockets.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Registry name under which table plugins are declared and called.
pub const TABLE_REGISTRY: &str = "table";

/// Identifier the host assigns to an extension on registration.
pub type ExtensionUuid = u64;

/// A single table row: column name to its text-encoded value.
pub type Row = BTreeMap<String, String>;

/// Rows returned by a plugin call.
pub type PluginResponse = Vec<Row>;

/// Registry name -> plugin name -> route information declared by the plugin.
pub type ExtensionRegistry = BTreeMap<String, BTreeMap<String, PluginResponse>>;

/// Identity an extension presents to the host when registering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub name: String,
    pub version: String,
    pub sdk_version: String,
    pub min_sdk_version: String,
}

/// SQL affinity of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Integer,
    Bigint,
    Double,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Bigint => "BIGINT",
            ColumnType::Double => "DOUBLE",
        };
        f.write_str(name)
    }
}

/// Name and type of one table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn bigint(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Bigint)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Double)
    }
}

/// One predicate the host pushed down for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// SQLite constraint operator code
    pub op: u8,
    pub expr: String,
}

/// All predicates the host pushed down for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintList {
    pub name: String,
    #[serde(default)]
    pub affinity: Option<ColumnType>,
    #[serde(default)]
    pub list: Vec<Constraint>,
}

/// Query context attached to a row-generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub constraints: Vec<ConstraintList>,
}

impl QueryContext {
    /// Parses the JSON context the host sends along with `generate`.
    ///
    /// An empty or whitespace-only string is an unconstrained query.
    pub fn parse(context: &str) -> Result<Self, serde_json::Error> {
        if context.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(context)
    }
}

/// Outcome of an operation as reported across the sockets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStatus {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub uuid: ExtensionUuid,
}

impl ExtensionStatus {
    pub const OK_CODE: i32 = 0;
    pub const ERROR_CODE: i32 = 1;

    pub fn ok() -> Self {
        Self::ok_with_uuid(0)
    }

    pub fn ok_with_uuid(uuid: ExtensionUuid) -> Self {
        Self {
            code: Self::OK_CODE,
            message: "OK".to_string(),
            uuid,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: Self::ERROR_CODE,
            message: message.into(),
            uuid: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK_CODE
    }
}

/// Requests an extension sends to the host's manager socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerRequest {
    RegisterExtension {
        info: ExtensionInfo,
        registry: ExtensionRegistry,
    },
    Ping,
    DeregisterExtension {
        uuid: ExtensionUuid,
    },
}

/// Host reply on the manager socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerResponse {
    pub status: ExtensionStatus,
}

/// Request payload of a plugin call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRequest {
    /// e.g. `columns` or `generate` for table plugins
    pub action: String,
    /// JSON-encoded [`QueryContext`] for `generate`
    #[serde(default)]
    pub context: Option<String>,
}

impl PluginRequest {
    pub fn columns() -> Self {
        Self {
            action: "columns".to_string(),
            context: None,
        }
    }

    pub fn generate(context: impl Into<String>) -> Self {
        Self {
            action: "generate".to_string(),
            context: Some(context.into()),
        }
    }
}

/// Host call routed to one registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCall {
    pub registry: String,
    pub item: String,
    pub request: PluginRequest,
}

/// Requests the host sends to an extension's own socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionRequest {
    Ping,
    Call(PluginCall),
    Shutdown,
}

/// Extension reply on its own socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionResponse {
    pub status: ExtensionStatus,
    #[serde(default)]
    pub response: PluginResponse,
}

impl ExtensionResponse {
    pub fn ok(response: PluginResponse) -> Self {
        Self {
            status: ExtensionStatus::ok(),
            response,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExtensionStatus::error(message),
            response: Vec::new(),
        }
    }
}
