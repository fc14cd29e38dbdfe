//! stackform-core: declaration graph, reference resolver, and emission pass
//!
//! This crate contains the pure composition logic with NO I/O:
//! - Typed resource descriptors with fully enumerated per-kind configs
//! - The declaration graph (arena + id lookup + reference edges)
//! - Reference resolution into grants, with deferred placeholder tokens
//! - Topological emission into a deterministic template document
//! - The fixed-contract CORS attachment
//!
//! The application layer (synth config, stack declarations, file output)
//! lives in the root `stackform` package, as it touches the filesystem.

pub mod cors;
pub mod dag;
pub mod emit;
pub mod error;
pub mod graph;
pub mod resolver;
pub mod resource;

// Re-export commonly used types
pub use emit::{emit, physical_name, EmitOptions, Template, TemplateRecord, FORMAT_VERSION};
pub use error::ComposeError;
pub use graph::{Capability, Reference, ResourceHandle, StackGraph};
pub use resolver::{resolve, scan_tokens, substitute_tokens, Token, TokenAttr};
pub use resource::{
    ApiRouteConfig, AttributeType, BucketConfig, FunctionConfig, Grant, HttpMethod, RemovalPolicy,
    ResourceConfig, ResourceDescriptor, ResourceKind, RoleConfig, ScheduleRuleConfig, TableConfig,
};
