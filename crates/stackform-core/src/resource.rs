//! Resource Declaration Layer
//!
//! Typed descriptors for every resource kind the composer understands. Each
//! config struct enumerates the full set of recognized options for its kind;
//! anything outside these fields simply does not exist at the type level.
//!
//! Descriptors are created once at declaration time and are immutable
//! afterward, except for the grant list which the resolver appends to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

// =============================================================================
// KINDS
// =============================================================================

/// The resource kinds the declaration layer knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Table,
    Function,
    ApiRoute,
    ScheduleRule,
    Role,
    Bucket,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Table => "table",
            ResourceKind::Function => "function",
            ResourceKind::ApiRoute => "api-route",
            ResourceKind::ScheduleRule => "schedule-rule",
            ResourceKind::Role => "role",
            ResourceKind::Bucket => "bucket",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SHARED CONFIG ENUMS
// =============================================================================

/// Key attribute type for table partition keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

/// What the provisioning platform should do with a resource on stack deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Destroy,
}

/// HTTP methods a route can bind to a function
///
/// OPTIONS is intentionally absent: the CORS attachment owns that method and
/// declaring it by hand would collide with the synthetic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

// =============================================================================
// PER-KIND CONFIGS
// =============================================================================

/// Key-value table declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub partition_key_name: String,
    pub partition_key_type: AttributeType,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

/// Serverless function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Path or archive the platform fetches the code from
    pub code_location: String,
    pub handler_name: String,
    pub runtime_version: String,
    /// Environment variables; values may be placeholder tokens (`${id.attr}`)
    /// resolved at emission time
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Execution role, by logical id
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "FunctionConfig::default_memory_mb")]
    pub memory_mb: u32,
    #[serde(default = "FunctionConfig::default_timeout_secs")]
    pub timeout_secs: u32,
}

impl FunctionConfig {
    fn default_memory_mb() -> u32 {
        128
    }

    fn default_timeout_secs() -> u32 {
        3
    }
}

/// REST route declaration: a path with method-to-function bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRouteConfig {
    pub path: String,
    /// Method → logical id of the handling function
    pub methods: BTreeMap<HttpMethod, String>,
    /// Attach the synthetic OPTIONS mock-integration method
    #[serde(default)]
    pub cors: bool,
}

/// Scheduled trigger declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRuleConfig {
    /// `rate(...)` or `cron(...)` expression
    pub expression: String,
    /// Logical id of the target function
    pub target: String,
}

/// Permission role declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub service_principal: String,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// Object storage bucket declaration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(default)]
    pub versioned: bool,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// The config payload of a descriptor, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceConfig {
    Table(TableConfig),
    Function(FunctionConfig),
    ApiRoute(ApiRouteConfig),
    ScheduleRule(ScheduleRuleConfig),
    Role(RoleConfig),
    Bucket(BucketConfig),
}

impl ResourceConfig {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceConfig::Table(_) => ResourceKind::Table,
            ResourceConfig::Function(_) => ResourceKind::Function,
            ResourceConfig::ApiRoute(_) => ResourceKind::ApiRoute,
            ResourceConfig::ScheduleRule(_) => ResourceKind::ScheduleRule,
            ResourceConfig::Role(_) => ResourceKind::Role,
            ResourceConfig::Bucket(_) => ResourceKind::Bucket,
        }
    }

    /// Validate the enumerated options for this kind
    ///
    /// Declaration-time check: a config that passes here can only fail later
    /// on unresolved references, never on its own shape.
    pub fn validate(&self, id: &str) -> Result<(), ComposeError> {
        match self {
            ResourceConfig::Table(c) => {
                if c.partition_key_name.trim().is_empty() {
                    return Err(ComposeError::invalid(id, "partition_key_name is empty"));
                }
            }
            ResourceConfig::Function(c) => {
                if c.code_location.trim().is_empty() {
                    return Err(ComposeError::invalid(id, "code_location is empty"));
                }
                if c.handler_name.trim().is_empty() {
                    return Err(ComposeError::invalid(id, "handler_name is empty"));
                }
                if c.runtime_version.trim().is_empty() {
                    return Err(ComposeError::invalid(id, "runtime_version is empty"));
                }
                if c.memory_mb == 0 {
                    return Err(ComposeError::invalid(id, "memory_mb must be positive"));
                }
                if c.timeout_secs == 0 {
                    return Err(ComposeError::invalid(id, "timeout_secs must be positive"));
                }
                for name in c.environment.keys() {
                    if name.trim().is_empty() {
                        return Err(ComposeError::invalid(id, "environment variable name is empty"));
                    }
                }
            }
            ResourceConfig::ApiRoute(c) => {
                if !c.path.starts_with('/') {
                    return Err(ComposeError::invalid(
                        id,
                        format!("route path '{}' must start with '/'", c.path),
                    ));
                }
                if c.methods.is_empty() {
                    return Err(ComposeError::invalid(id, "route declares no methods"));
                }
            }
            ResourceConfig::ScheduleRule(c) => {
                let expr = c.expression.trim();
                let well_formed = (expr.starts_with("rate(") || expr.starts_with("cron("))
                    && expr.ends_with(')')
                    && expr.len() > "rate()".len();
                if !well_formed {
                    return Err(ComposeError::invalid(
                        id,
                        format!("schedule expression '{}' is not rate(...) or cron(...)", expr),
                    ));
                }
                if c.target.trim().is_empty() {
                    return Err(ComposeError::invalid(id, "schedule target is empty"));
                }
            }
            ResourceConfig::Role(c) => {
                if c.service_principal.trim().is_empty() {
                    return Err(ComposeError::invalid(id, "service_principal is empty"));
                }
            }
            ResourceConfig::Bucket(_) => {}
        }
        Ok(())
    }
}

/// A derived access-control statement
///
/// Never declared directly: grants only come out of the resolver, which turns
/// each reference's capability into a fixed action set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Logical id of the resource the access is granted to
    pub principal: String,
    /// Allowed actions, e.g. `table:Get`
    pub actions: Vec<String>,
    /// Logical id of the resource the actions apply to
    pub resource: String,
}

/// A declared resource: identity, kind, config, and derived grants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: String,
    #[serde(flatten)]
    pub config: ResourceConfig,
    /// Grants derived by the resolver, in derivation order
    #[serde(default)]
    pub grants: Vec<Grant>,
    /// Position in declaration order; ties in the emission sort break on this
    #[serde(skip)]
    pub(crate) decl_index: usize,
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        self.config.kind()
    }
}
