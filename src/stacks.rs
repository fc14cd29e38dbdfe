//! Stack declarations
//!
//! The canonical items-service stack: a REST API over a key-value table, a
//! set of serverless functions, a versioned artifact bucket, and a scheduled
//! purge. This module is the declarative entry point; everything it builds is
//! plain graph mutation, resolved and emitted by the synth layer.

use std::collections::BTreeMap;

use stackform_core::{
    ApiRouteConfig, AttributeType, BucketConfig, Capability, ComposeError, FunctionConfig,
    HttpMethod, RemovalPolicy, ResourceHandle, RoleConfig, ScheduleRuleConfig, StackGraph,
    TableConfig,
};

use crate::config::SynthConfig;

const CODE_LOCATION: &str = "dist/handlers";
const RUNTIME: &str = "node18";

/// Declare the items-service stack
pub fn items_service(config: &SynthConfig) -> Result<StackGraph, ComposeError> {
    let mut graph = StackGraph::new();

    let role = graph.add_role(
        "service-role",
        RoleConfig {
            service_principal: "functions.platform".to_string(),
            policies: vec!["basic-execution".to_string()],
        },
    )?;

    // Deployment artifacts live in a versioned bucket so a bad rollout can be
    // rolled back to the previous object version.
    let artifacts = graph.add_bucket(
        "artifacts",
        BucketConfig {
            versioned: true,
            removal_policy: RemovalPolicy::Retain,
        },
    )?;

    let items = graph.add_table(
        "items",
        TableConfig {
            partition_key_name: "itemId".to_string(),
            partition_key_type: AttributeType::String,
            removal_policy: RemovalPolicy::Destroy,
        },
    )?;

    let get_all = handler(&mut graph, "get-all-items", "index.getAll", &items, &role)?;
    graph.add_reference(&get_all, &items, Capability::ReadTable);

    let get_one = handler(&mut graph, "get-one-item", "index.getOne", &items, &role)?;
    graph.add_reference(&get_one, &items, Capability::ReadTable);

    let create = handler(&mut graph, "create-item", "index.create", &items, &role)?;
    graph.add_reference(&create, &items, Capability::ReadWriteTable);

    let delete = handler(&mut graph, "delete-item", "index.delete", &items, &role)?;
    graph.add_reference(&delete, &items, Capability::ReadWriteTable);

    // The purge function also records tombstones in the artifact bucket.
    let mut purge_env = BTreeMap::new();
    purge_env.insert("TABLE_NAME".to_string(), items.name_token());
    purge_env.insert("ARCHIVE_BUCKET".to_string(), artifacts.name_token());
    let purge = graph.add_function(
        "purge-expired",
        FunctionConfig {
            code_location: CODE_LOCATION.to_string(),
            handler_name: "index.purgeExpired".to_string(),
            runtime_version: RUNTIME.to_string(),
            environment: purge_env,
            role: Some(role.id().to_string()),
            memory_mb: 256,
            timeout_secs: 60,
        },
    )?;
    graph.add_reference(&purge, &items, Capability::ReadWriteTable);

    let mut collection_methods = BTreeMap::new();
    collection_methods.insert(HttpMethod::Get, get_all.id().to_string());
    collection_methods.insert(HttpMethod::Post, create.id().to_string());
    graph.add_api_route(
        "items-route",
        ApiRouteConfig {
            path: "/items".to_string(),
            methods: collection_methods,
            cors: true,
        },
    )?;

    let mut item_methods = BTreeMap::new();
    item_methods.insert(HttpMethod::Get, get_one.id().to_string());
    item_methods.insert(HttpMethod::Delete, delete.id().to_string());
    graph.add_api_route(
        "item-route",
        ApiRouteConfig {
            path: "/items/{itemId}".to_string(),
            methods: item_methods,
            cors: true,
        },
    )?;

    graph.add_schedule_rule(
        "purge-schedule",
        ScheduleRuleConfig {
            expression: config.schedule_expression.clone(),
            target: purge.id().to_string(),
        },
    )?;

    Ok(graph)
}

/// A CRUD handler: shared code location and runtime, table name injected via
/// a placeholder token, execution role attached
fn handler(
    graph: &mut StackGraph,
    id: &str,
    handler_name: &str,
    table: &ResourceHandle,
    role: &ResourceHandle,
) -> Result<ResourceHandle, ComposeError> {
    let mut environment = BTreeMap::new();
    environment.insert("TABLE_NAME".to_string(), table.name_token());

    graph.add_function(
        id,
        FunctionConfig {
            code_location: CODE_LOCATION.to_string(),
            handler_name: handler_name.to_string(),
            runtime_version: RUNTIME.to_string(),
            environment,
            role: Some(role.id().to_string()),
            memory_mb: 128,
            timeout_secs: 10,
        },
    )
}
