//! Reference Resolver
//!
//! Two jobs, both before emission:
//!
//! 1. Turn every declared [`Reference`](crate::graph::Reference) and every
//!    config-level linkage (route method, schedule target, execution role)
//!    into a [`Grant`] on the target descriptor.
//! 2. Validate placeholder tokens (`${id.attr}`) embedded in config values.
//!    Their substitution is deferred to the emission pass because the
//!    generated physical values only exist there.
//!
//! Resolution is all-or-nothing: grants are collected first and applied only
//! once the whole graph has validated, so a dangling reference never leaves a
//! partially-resolved graph behind.

use tracing::{debug, info};

use crate::error::ComposeError;
use crate::graph::{Capability, StackGraph};
use crate::resource::{Grant, ResourceConfig, ResourceDescriptor, ResourceKind};

// =============================================================================
// PLACEHOLDER TOKENS
// =============================================================================

/// Attribute of a resource a token can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAttr {
    /// Generated physical name
    Name,
    /// Generated stack resource name (`srn:<env>:<kind>:<name>`)
    Srn,
}

impl TokenAttr {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(TokenAttr::Name),
            "srn" => Some(TokenAttr::Srn),
            _ => None,
        }
    }
}

/// A deferred value: `${target_id.attr}` inside a config string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub target_id: String,
    pub attr: TokenAttr,
}

/// Scan a config value for placeholder tokens
///
/// Text outside `${...}` spans is ignored. An unclosed `${`, an empty target
/// id, or an unknown attribute is malformed and reported as a reason string
/// for the caller to wrap into an [`ComposeError::InvalidConfig`].
pub fn scan_tokens(value: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in '{}'", value))?;
        let inner = &after[..end];

        let (target, attr) = inner
            .split_once('.')
            .ok_or_else(|| format!("placeholder '${{{}}}' is missing an attribute", inner))?;
        if target.is_empty() {
            return Err(format!("placeholder '${{{}}}' has an empty resource id", inner));
        }
        let attr = TokenAttr::parse(attr)
            .ok_or_else(|| format!("unknown placeholder attribute in '${{{}}}'", inner))?;

        tokens.push(Token {
            target_id: target.to_string(),
            attr,
        });
        rest = &after[end + 1..];
    }

    Ok(tokens)
}

/// Substitute every token in `value` via `lookup`
///
/// `lookup` returns the resolved text for a token, or `None` when the token
/// names a resource the graph does not contain.
pub fn substitute_tokens<F>(value: &str, mut lookup: F) -> Result<String, String>
where
    F: FnMut(&Token) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in '{}'", value))?;
        let inner = &after[..end];

        let (target, attr_str) = inner
            .split_once('.')
            .ok_or_else(|| format!("placeholder '${{{}}}' is missing an attribute", inner))?;
        let attr = TokenAttr::parse(attr_str)
            .ok_or_else(|| format!("unknown placeholder attribute in '${{{}}}'", inner))?;

        let token = Token {
            target_id: target.to_string(),
            attr,
        };
        let resolved = lookup(&token)
            .ok_or_else(|| format!("placeholder names unknown resource '{}'", target))?;
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve all references and config linkages into grants
///
/// Idempotent: derived grants are recomputed from scratch on every call, so
/// resolving twice leaves the graph exactly as resolving once.
pub fn resolve(graph: &mut StackGraph) -> Result<(), ComposeError> {
    // Phase 1: validate everything and collect grants without touching the graph.
    let mut pending: Vec<(usize, Grant)> = Vec::new();

    for reference in graph.references() {
        let source = graph.get(&reference.source_id).ok_or_else(|| {
            ComposeError::unknown(reference.source_id.as_str(), reference.source_id.as_str())
        })?;
        let target_index = graph.index_of(&reference.target_id).ok_or_else(|| {
            ComposeError::unknown(reference.source_id.as_str(), reference.target_id.as_str())
        })?;

        debug!(
            source = %source.id,
            target = %reference.target_id,
            capability = ?reference.capability,
            "resolved reference"
        );
        pending.push((
            target_index,
            derive_grant(&source.id, &reference.target_id, reference.capability),
        ));
    }

    for descriptor in graph.resources() {
        for (target_index, grant) in config_grants(graph, descriptor)? {
            pending.push((target_index, grant));
        }
        validate_tokens(graph, descriptor)?;
    }

    // Phase 2: apply.
    let count = pending.len();
    for index in 0..graph.len() {
        graph.descriptor_mut(index).grants.clear();
    }
    for (target_index, grant) in pending {
        graph.descriptor_mut(target_index).grants.push(grant);
    }

    info!(resources = graph.len(), grants = count, "resolution complete");
    Ok(())
}

fn derive_grant(principal: &str, resource: &str, capability: Capability) -> Grant {
    Grant {
        principal: principal.to_string(),
        actions: capability.actions().iter().map(|s| s.to_string()).collect(),
        resource: resource.to_string(),
    }
}

/// Grants implied by a descriptor's own config: route methods invoke their
/// functions, schedule rules invoke their targets, functions assume their role
fn config_grants(
    graph: &StackGraph,
    descriptor: &ResourceDescriptor,
) -> Result<Vec<(usize, Grant)>, ComposeError> {
    let mut grants = Vec::new();

    match &descriptor.config {
        ResourceConfig::ApiRoute(config) => {
            for (method, function_id) in &config.methods {
                let index = expect_kind(
                    graph,
                    &descriptor.id,
                    function_id,
                    ResourceKind::Function,
                    &format!("{} handler", method.as_str()),
                )?;
                grants.push((
                    index,
                    derive_grant(&descriptor.id, function_id, Capability::InvokeFunction),
                ));
            }
        }
        ResourceConfig::ScheduleRule(config) => {
            let index = expect_kind(
                graph,
                &descriptor.id,
                &config.target,
                ResourceKind::Function,
                "schedule target",
            )?;
            grants.push((
                index,
                derive_grant(&descriptor.id, &config.target, Capability::InvokeFunction),
            ));
        }
        ResourceConfig::Function(config) => {
            if let Some(role_id) = &config.role {
                let index = expect_kind(
                    graph,
                    &descriptor.id,
                    role_id,
                    ResourceKind::Role,
                    "execution role",
                )?;
                grants.push((
                    index,
                    derive_grant(&descriptor.id, role_id, Capability::AssumeRole),
                ));
            }
        }
        _ => {}
    }

    Ok(grants)
}

fn expect_kind(
    graph: &StackGraph,
    referrer: &str,
    target_id: &str,
    kind: ResourceKind,
    what: &str,
) -> Result<usize, ComposeError> {
    let index = graph
        .index_of(target_id)
        .ok_or_else(|| ComposeError::unknown(referrer, target_id))?;
    let target = &graph.resources()[index];
    if target.kind() != kind {
        return Err(ComposeError::invalid(
            referrer,
            format!("{} '{}' is a {}, expected a {}", what, target_id, target.kind(), kind),
        ));
    }
    Ok(index)
}

/// Check every placeholder token in a descriptor's config values
fn validate_tokens(graph: &StackGraph, descriptor: &ResourceDescriptor) -> Result<(), ComposeError> {
    if let ResourceConfig::Function(config) = &descriptor.config {
        for value in config.environment.values() {
            let tokens = scan_tokens(value)
                .map_err(|reason| ComposeError::invalid(descriptor.id.as_str(), reason))?;
            for token in tokens {
                if graph.get(&token.target_id).is_none() {
                    return Err(ComposeError::unknown(
                        descriptor.id.as_str(),
                        token.target_id.as_str(),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Logical ids a descriptor depends on, derived from its config
///
/// Used by the emission pass to build dependency edges; declared references
/// are added on top by the caller.
pub(crate) fn config_dependencies(descriptor: &ResourceDescriptor) -> Vec<String> {
    let mut deps = Vec::new();
    match &descriptor.config {
        ResourceConfig::ApiRoute(config) => {
            deps.extend(config.methods.values().cloned());
        }
        ResourceConfig::ScheduleRule(config) => {
            deps.push(config.target.clone());
        }
        ResourceConfig::Function(config) => {
            if let Some(role_id) = &config.role {
                deps.push(role_id.clone());
            }
            for value in config.environment.values() {
                if let Ok(tokens) = scan_tokens(value) {
                    deps.extend(tokens.into_iter().map(|t| t.target_id));
                }
            }
        }
        _ => {}
    }
    deps
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::resource::{
        AttributeType, FunctionConfig, RemovalPolicy, ScheduleRuleConfig, TableConfig,
    };

    fn graph_with_table_and_function() -> StackGraph {
        let mut graph = StackGraph::new();
        graph
            .add_table(
                "items",
                TableConfig {
                    partition_key_name: "itemId".to_string(),
                    partition_key_type: AttributeType::String,
                    removal_policy: RemovalPolicy::Destroy,
                },
            )
            .unwrap();
        graph
            .add_function(
                "get-all-items",
                FunctionConfig {
                    code_location: "dist/handlers".to_string(),
                    handler_name: "index.getAll".to_string(),
                    runtime_version: "node18".to_string(),
                    environment: BTreeMap::new(),
                    role: None,
                    memory_mb: 128,
                    timeout_secs: 3,
                },
            )
            .unwrap();
        graph
    }

    #[test]
    fn reference_derives_grant_on_target() {
        let mut graph = graph_with_table_and_function();
        graph.add_reference_by_id("get-all-items", "items", Capability::ReadTable);

        resolve(&mut graph).unwrap();

        let table = graph.get("items").unwrap();
        assert_eq!(table.grants.len(), 1);
        assert_eq!(table.grants[0].principal, "get-all-items");
        assert_eq!(table.grants[0].resource, "items");
        assert_eq!(
            table.grants[0].actions,
            vec!["table:Get", "table:Query", "table:Scan"]
        );
    }

    #[test]
    fn dangling_reference_resolves_nothing() {
        let mut graph = graph_with_table_and_function();
        graph.add_reference_by_id("get-all-items", "items", Capability::ReadTable);
        graph.add_reference_by_id("get-all-items", "ghost", Capability::ReadTable);

        let err = resolve(&mut graph).unwrap_err();
        assert_eq!(err, ComposeError::unknown("get-all-items", "ghost"));

        // The valid reference must not have been applied either.
        assert!(graph.get("items").unwrap().grants.is_empty());
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut graph = graph_with_table_and_function();
        graph.add_reference_by_id("get-all-items", "items", Capability::ReadWriteTable);

        resolve(&mut graph).unwrap();
        resolve(&mut graph).unwrap();

        assert_eq!(graph.get("items").unwrap().grants.len(), 1);
    }

    #[test]
    fn schedule_target_must_be_a_function() {
        let mut graph = graph_with_table_and_function();
        graph
            .add_schedule_rule(
                "nightly",
                ScheduleRuleConfig {
                    expression: "rate(1 day)".to_string(),
                    target: "items".to_string(),
                },
            )
            .unwrap();

        let err = resolve(&mut graph).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidConfig { .. }));
    }

    #[test]
    fn environment_token_to_unknown_resource_fails() {
        let mut graph = StackGraph::new();
        let mut environment = BTreeMap::new();
        environment.insert("TABLE_NAME".to_string(), "${ghost.name}".to_string());
        graph
            .add_function(
                "reader",
                FunctionConfig {
                    code_location: "dist".to_string(),
                    handler_name: "index.handler".to_string(),
                    runtime_version: "node18".to_string(),
                    environment,
                    role: None,
                    memory_mb: 128,
                    timeout_secs: 3,
                },
            )
            .unwrap();

        let err = resolve(&mut graph).unwrap_err();
        assert_eq!(err, ComposeError::unknown("reader", "ghost"));
    }

    #[test]
    fn scan_tokens_finds_embedded_placeholders() {
        let tokens = scan_tokens("prefix-${items.name}-and-${role.srn}").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].target_id, "items");
        assert_eq!(tokens[0].attr, TokenAttr::Name);
        assert_eq!(tokens[1].attr, TokenAttr::Srn);
    }

    #[test]
    fn scan_tokens_rejects_malformed() {
        assert!(scan_tokens("${items.name").is_err());
        assert!(scan_tokens("${items}").is_err());
        assert!(scan_tokens("${items.size}").is_err());
        assert!(scan_tokens("${.name}").is_err());
        assert!(scan_tokens("no tokens at all").unwrap().is_empty());
    }

    #[test]
    fn substitute_tokens_replaces_in_place() {
        let out = substitute_tokens("url=${items.name}/v1", |token| {
            assert_eq!(token.target_id, "items");
            Some("items-a1b2c3d4".to_string())
        })
        .unwrap();
        assert_eq!(out, "url=items-a1b2c3d4/v1");
    }
}
