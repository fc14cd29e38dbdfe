//! Emission Pass
//!
//! Walks the resolved graph in dependency order and produces the template
//! document the external provisioning platform consumes. Physical names are
//! derived from a stable hash of stack name and logical id, so emission is a
//! pure function of the graph: re-emitting an unchanged graph is
//! byte-identical. Any failure happens before a single record is produced or
//! while the document is still in memory; callers never see partial output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cors;
use crate::dag::emission_order;
use crate::error::ComposeError;
use crate::graph::StackGraph;
use crate::resolver::{self, config_dependencies, TokenAttr};
use crate::resource::{Grant, ResourceConfig, ResourceDescriptor, ResourceKind};

/// Template format version; bumped only on incompatible record changes
pub const FORMAT_VERSION: &str = "1";

/// Stack-level parameters of a single emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOptions {
    pub stack_name: String,
    pub environment: String,
}

/// One record per resource, in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub kind: ResourceKind,
    /// Generated physical name
    pub name: String,
    /// Generated stack resource name
    pub srn: String,
    /// Kind-specific config with all placeholder tokens substituted
    pub properties: serde_json::Value,
    pub grants: Vec<Grant>,
    pub depends_on: Vec<String>,
}

/// The emitted template document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub format_version: String,
    pub stack: String,
    pub environment: String,
    pub resources: Vec<TemplateRecord>,
}

impl Template {
    /// Render the document as pretty JSON
    ///
    /// `serde_json` maps are ordered, so equal templates render to equal
    /// bytes.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Deterministic physical name: `<stack>-<id>-<hash8>`
///
/// The hash suffix keeps names unique across stacks without consulting the
/// provisioning platform, which is what makes re-emission byte-identical.
pub fn physical_name(stack_name: &str, id: &str) -> String {
    let digest = Sha256::digest(format!("{stack_name}/{id}").as_bytes());
    format!("{stack_name}-{id}-{}", hex::encode(&digest[..4]))
}

fn stack_resource_name(options: &EmitOptions, kind: ResourceKind, name: &str) -> String {
    format!("srn:{}:{}:{}", options.environment, kind, name)
}

/// Emit the template for a resolved graph
///
/// Fails with `CyclicDependency` before any record is produced if the graph
/// is not acyclic, and with `UnknownResource` if a dependency or placeholder
/// token names an id the graph does not contain.
pub fn emit(graph: &StackGraph, options: &EmitOptions) -> Result<Template, ComposeError> {
    let order = emission_order(graph)?;

    // Second pass of deferred resolution: now that emission is underway the
    // generated values exist, keyed by logical id.
    let mut generated: HashMap<&str, (String, String)> = HashMap::new();
    for descriptor in graph.resources() {
        let name = physical_name(&options.stack_name, &descriptor.id);
        let srn = stack_resource_name(options, descriptor.kind(), &name);
        generated.insert(descriptor.id.as_str(), (name, srn));
    }

    let mut records = Vec::with_capacity(order.len());
    for node in order {
        let descriptor = &graph.resources()[node];
        let (name, srn) = generated[descriptor.id.as_str()].clone();

        let mut properties = config_properties(&descriptor.config)
            .map_err(|_| ComposeError::invalid(descriptor.id.as_str(), "config is not serializable"))?;
        substitute_value(&mut properties, &descriptor.id, &generated)?;

        if let ResourceConfig::ApiRoute(route) = &descriptor.config {
            if route.cors {
                properties["options_method"] = cors::options_method_record();
            }
        }

        let mut depends_on = Vec::new();
        for dep_id in dependency_ids(graph, descriptor) {
            if !generated.contains_key(dep_id.as_str()) {
                return Err(ComposeError::unknown(descriptor.id.as_str(), dep_id));
            }
            depends_on.push(dep_id);
        }
        depends_on.sort();
        depends_on.dedup();

        debug!(id = %descriptor.id, name = %name, "emitted record");
        records.push(TemplateRecord {
            id: descriptor.id.clone(),
            kind: descriptor.kind(),
            name,
            srn,
            properties,
            grants: descriptor.grants.clone(),
            depends_on,
        });
    }

    info!(
        stack = %options.stack_name,
        resources = records.len(),
        "emission complete"
    );
    Ok(Template {
        format_version: FORMAT_VERSION.to_string(),
        stack: options.stack_name.clone(),
        environment: options.environment.clone(),
        resources: records,
    })
}

/// Serialize the kind-specific config without the discriminant tag
fn config_properties(config: &ResourceConfig) -> Result<serde_json::Value, serde_json::Error> {
    match config {
        ResourceConfig::Table(c) => serde_json::to_value(c),
        ResourceConfig::Function(c) => serde_json::to_value(c),
        ResourceConfig::ApiRoute(c) => serde_json::to_value(c),
        ResourceConfig::ScheduleRule(c) => serde_json::to_value(c),
        ResourceConfig::Role(c) => serde_json::to_value(c),
        ResourceConfig::Bucket(c) => serde_json::to_value(c),
    }
}

/// Substitute placeholder tokens in every string of a JSON value
fn substitute_value(
    value: &mut serde_json::Value,
    owner_id: &str,
    generated: &HashMap<&str, (String, String)>,
) -> Result<(), ComposeError> {
    match value {
        serde_json::Value::String(s) => {
            if s.contains("${") {
                let substituted = resolver::substitute_tokens(s, |token| {
                    generated.get(token.target_id.as_str()).map(|(name, srn)| {
                        match token.attr {
                            TokenAttr::Name => name.clone(),
                            TokenAttr::Srn => srn.clone(),
                        }
                    })
                })
                .map_err(|reason| map_substitution_error(owner_id, reason))?;
                *s = substituted;
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_value(item, owner_id, generated)?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                substitute_value(item, owner_id, generated)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn map_substitution_error(owner_id: &str, reason: String) -> ComposeError {
    // A lookup miss means a dangling token target; anything else is a
    // malformed placeholder.
    if let Some(target) = reason
        .strip_prefix("placeholder names unknown resource '")
        .and_then(|r| r.strip_suffix('\''))
    {
        return ComposeError::unknown(owner_id, target);
    }
    ComposeError::invalid(owner_id, reason)
}

/// All logical ids a record depends on: config linkages plus declared
/// references originating at this resource
fn dependency_ids(graph: &StackGraph, descriptor: &ResourceDescriptor) -> Vec<String> {
    let mut deps = config_dependencies(descriptor);
    for reference in graph.references() {
        if reference.source_id == descriptor.id {
            deps.push(reference.target_id.clone());
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::Capability;
    use crate::resolver::resolve;
    use crate::resource::{
        ApiRouteConfig, AttributeType, FunctionConfig, HttpMethod, RemovalPolicy, TableConfig,
    };

    fn options() -> EmitOptions {
        EmitOptions {
            stack_name: "demo".to_string(),
            environment: "dev".to_string(),
        }
    }

    fn items_graph() -> StackGraph {
        let mut graph = StackGraph::new();
        let table = graph
            .add_table(
                "items",
                TableConfig {
                    partition_key_name: "itemId".to_string(),
                    partition_key_type: AttributeType::String,
                    removal_policy: RemovalPolicy::Destroy,
                },
            )
            .unwrap();

        let mut environment = BTreeMap::new();
        environment.insert("TABLE_NAME".to_string(), table.name_token());
        let function = graph
            .add_function(
                "get-all",
                FunctionConfig {
                    code_location: "dist/handlers".to_string(),
                    handler_name: "index.getAll".to_string(),
                    runtime_version: "node18".to_string(),
                    environment,
                    role: None,
                    memory_mb: 128,
                    timeout_secs: 3,
                },
            )
            .unwrap();
        graph.add_reference(&function, &table, Capability::ReadTable);

        let mut methods = BTreeMap::new();
        methods.insert(HttpMethod::Get, "get-all".to_string());
        graph
            .add_api_route(
                "items-route",
                ApiRouteConfig {
                    path: "/items".to_string(),
                    methods,
                    cors: true,
                },
            )
            .unwrap();
        graph
    }

    #[test]
    fn items_example_emits_three_ordered_records() {
        let mut graph = items_graph();
        resolve(&mut graph).unwrap();

        let template = emit(&graph, &options()).unwrap();

        let ids: Vec<&str> = template.resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["items", "get-all", "items-route"]);

        // The function's environment carries the resolved table name.
        let table_name = template.resources[0].name.clone();
        assert_eq!(
            template.resources[1].properties["environment"]["TABLE_NAME"],
            serde_json::Value::String(table_name)
        );
    }

    #[test]
    fn emission_is_byte_identical() {
        let mut graph = items_graph();
        resolve(&mut graph).unwrap();

        let first = emit(&graph, &options()).unwrap().to_json_string().unwrap();
        let second = emit(&graph, &options()).unwrap().to_json_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cors_route_carries_the_options_method() {
        let mut graph = items_graph();
        resolve(&mut graph).unwrap();

        let template = emit(&graph, &options()).unwrap();
        let route = &template.resources[2];
        let headers = route.properties["options_method"]["response_headers"]
            .as_object()
            .unwrap();
        assert_eq!(headers.len(), 4);
    }

    #[test]
    fn cycle_fails_before_any_record() {
        let mut graph = items_graph();
        graph.add_reference_by_id("items", "items-route", Capability::InvokeFunction);

        let err = emit(&graph, &options()).unwrap_err();
        assert!(matches!(err, ComposeError::CyclicDependency { .. }));
    }

    #[test]
    fn self_reference_fails_before_any_record() {
        let mut graph = items_graph();
        resolve(&mut graph).unwrap();
        graph.add_reference_by_id("get-all", "get-all", Capability::InvokeFunction);

        let err = emit(&graph, &options()).unwrap_err();
        assert!(matches!(err, ComposeError::CyclicDependency { .. }));
    }

    #[test]
    fn dangling_reference_fails_emission() {
        let mut graph = items_graph();
        graph.add_reference_by_id("get-all", "ghost", Capability::ReadTable);

        let err = emit(&graph, &options()).unwrap_err();
        assert_eq!(err, ComposeError::unknown("get-all", "ghost"));
    }

    #[test]
    fn physical_names_are_stable_and_scoped() {
        let a = physical_name("demo", "items");
        let b = physical_name("demo", "items");
        let other_stack = physical_name("prod", "items");

        assert_eq!(a, b);
        assert_ne!(a, other_stack);
        assert!(a.starts_with("demo-items-"));
        assert_eq!(a.len(), "demo-items-".len() + 8);
    }

    #[test]
    fn grants_survive_into_records() {
        let mut graph = items_graph();
        resolve(&mut graph).unwrap();

        let template = emit(&graph, &options()).unwrap();
        let table = &template.resources[0];
        assert!(table
            .grants
            .iter()
            .any(|g| g.principal == "get-all" && g.actions.contains(&"table:Scan".to_string())));

        let function = &template.resources[1];
        assert!(function.grants.iter().any(|g| g.principal == "items-route"));
    }
}
