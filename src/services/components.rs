//! Component Registry
//!
//! Components the model may choose to render for a message. The registry
//! only advertises them to the server; rendering happens elsewhere.

use std::collections::HashMap;

use threadline_client::AvailableComponent;
use threadline_core::SchemaDescriptor;

use crate::utils::error::{ThreadlineError, ThreadlineResult};

/// A renderable component known to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    pub name: String,
    pub description: String,
    pub props_schema: SchemaDescriptor,
    /// Tools the model should consider when populating this component
    pub associated_tools: Vec<String>,
}

impl ComponentDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        props_schema: SchemaDescriptor,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            props_schema,
            associated_tools: Vec::new(),
        }
    }

    /// Associate a tool by name.
    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.associated_tools.push(tool_name.into());
        self
    }

    /// Wire form sent with advance requests.
    pub fn to_available(&self) -> AvailableComponent {
        AvailableComponent {
            name: self.name.clone(),
            description: self.description.clone(),
            props_definition: self.props_schema.to_json_schema(),
            context_tools: self.associated_tools.clone(),
        }
    }
}

/// Registry of components, advertised in registration order.
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    components: HashMap<String, ComponentDefinition>,
    order: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, replacing any previous one with the same name.
    pub fn register(&mut self, component: ComponentDefinition) -> ThreadlineResult<()> {
        if component.name.trim().is_empty() {
            return Err(ThreadlineError::config("component name must not be empty"));
        }
        if !self.components.contains_key(&component.name) {
            self.order.push(component.name.clone());
        }
        self.components.insert(component.name.clone(), component);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Every component in wire form.
    pub fn available_components(&self) -> Vec<AvailableComponent> {
        self.order
            .iter()
            .filter_map(|name| self.components.get(name))
            .map(ComponentDefinition::to_available)
            .collect()
    }
}
