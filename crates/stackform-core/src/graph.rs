//! Declaration graph
//!
//! An arena of [`ResourceDescriptor`]s with id-based lookup, plus the named
//! reference edges declared between them. Construction is the only mutation:
//! one constructor per resource kind, each validating its config and failing
//! on id reuse. Everything downstream (resolution, emission) reads the arena
//! through indices.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ComposeError;
use crate::resource::{
    ApiRouteConfig, BucketConfig, FunctionConfig, ResourceConfig, ResourceDescriptor, RoleConfig,
    ScheduleRuleConfig, TableConfig,
};

// =============================================================================
// REFERENCES
// =============================================================================

/// What a reference allows the source to do with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    ReadTable,
    ReadWriteTable,
    InvokeFunction,
    AssumeRole,
}

impl Capability {
    /// The fixed action set a grant derived from this capability carries
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            Capability::ReadTable => &["table:Get", "table:Query", "table:Scan"],
            Capability::ReadWriteTable => &[
                "table:Get",
                "table:Query",
                "table:Scan",
                "table:Put",
                "table:Update",
                "table:Delete",
            ],
            Capability::InvokeFunction => &["function:Invoke"],
            Capability::AssumeRole => &["role:Assume"],
        }
    }
}

/// A named edge from one descriptor to another, denoting a runtime dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub source_id: String,
    pub target_id: String,
    pub capability: Capability,
}

/// Handle returned by the declaration constructors
///
/// Carries the logical id and mints the placeholder tokens other declarations
/// embed in their configs (resolved only at emission).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    id: String,
}

impl ResourceHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token for the generated physical name, e.g. `${items.name}`
    pub fn name_token(&self) -> String {
        format!("${{{}.name}}", self.id)
    }

    /// Token for the generated stack resource name, e.g. `${items.srn}`
    pub fn srn_token(&self) -> String {
        format!("${{{}.srn}}", self.id)
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The in-memory declaration graph: descriptor arena plus reference edges
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    resources: Vec<ResourceDescriptor>,
    index: HashMap<String, usize>,
    references: Vec<Reference>,
}

impl StackGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Declaration constructors, one per kind
    // -------------------------------------------------------------------------

    pub fn add_table(
        &mut self,
        id: impl Into<String>,
        config: TableConfig,
    ) -> Result<ResourceHandle, ComposeError> {
        self.insert(id.into(), ResourceConfig::Table(config))
    }

    pub fn add_function(
        &mut self,
        id: impl Into<String>,
        config: FunctionConfig,
    ) -> Result<ResourceHandle, ComposeError> {
        self.insert(id.into(), ResourceConfig::Function(config))
    }

    pub fn add_api_route(
        &mut self,
        id: impl Into<String>,
        config: ApiRouteConfig,
    ) -> Result<ResourceHandle, ComposeError> {
        self.insert(id.into(), ResourceConfig::ApiRoute(config))
    }

    pub fn add_schedule_rule(
        &mut self,
        id: impl Into<String>,
        config: ScheduleRuleConfig,
    ) -> Result<ResourceHandle, ComposeError> {
        self.insert(id.into(), ResourceConfig::ScheduleRule(config))
    }

    pub fn add_role(
        &mut self,
        id: impl Into<String>,
        config: RoleConfig,
    ) -> Result<ResourceHandle, ComposeError> {
        self.insert(id.into(), ResourceConfig::Role(config))
    }

    pub fn add_bucket(
        &mut self,
        id: impl Into<String>,
        config: BucketConfig,
    ) -> Result<ResourceHandle, ComposeError> {
        self.insert(id.into(), ResourceConfig::Bucket(config))
    }

    fn insert(&mut self, id: String, config: ResourceConfig) -> Result<ResourceHandle, ComposeError> {
        if id.trim().is_empty() {
            return Err(ComposeError::invalid(id.as_str(), "resource id is empty"));
        }
        if self.index.contains_key(&id) {
            return Err(ComposeError::DuplicateId(id));
        }
        config.validate(&id)?;

        let decl_index = self.resources.len();
        debug!(id = %id, kind = %config.kind(), "declared resource");
        self.index.insert(id.clone(), decl_index);
        self.resources.push(ResourceDescriptor {
            id: id.clone(),
            config,
            grants: Vec::new(),
            decl_index,
        });
        Ok(ResourceHandle { id })
    }

    // -------------------------------------------------------------------------
    // References
    // -------------------------------------------------------------------------

    /// Record a reference edge
    ///
    /// Existence of both endpoints is checked by the resolver, not here, so
    /// that a dangling reference fails the whole resolution pass rather than
    /// leaving the graph half-built.
    pub fn add_reference(
        &mut self,
        source: &ResourceHandle,
        target: &ResourceHandle,
        capability: Capability,
    ) {
        self.add_reference_by_id(source.id(), target.id(), capability);
    }

    /// Same as [`StackGraph::add_reference`], for callers holding raw ids
    pub fn add_reference_by_id(
        &mut self,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        capability: Capability,
    ) {
        self.references.push(Reference {
            source_id: source_id.into(),
            target_id: target_id.into(),
            capability,
        });
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub(crate) fn descriptor_mut(&mut self, index: usize) -> &mut ResourceDescriptor {
        &mut self.resources[index]
    }
}
