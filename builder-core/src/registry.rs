//! Component types known to the host application.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ItemConfig;

/// Default size of a component in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSize {
    /// Width in horizontal units.
    pub width: i32,
    /// Height in vertical units.
    pub height: i32,
}

impl Default for ComponentSize {
    fn default() -> Self {
        Self {
            width: 10,
            height: 6,
        }
    }
}

/// A registered component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    /// Registry key, stored as `Item::component_type`.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Display name given to new items.
    pub name: String,
    /// Size used for click-to-add placement.
    #[serde(default)]
    pub default_size: ComponentSize,
    /// Config every new item starts from.
    #[serde(default)]
    pub default_config: ItemConfig,
}

impl ComponentDefinition {
    /// Create a definition with default size and empty config.
    #[must_use]
    pub fn new(component_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            name: name.into(),
            default_size: ComponentSize::default(),
            default_config: ItemConfig::new(),
        }
    }

    /// Set the default size.
    #[must_use]
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.default_size = ComponentSize { width, height };
        self
    }

    /// Set the default config.
    #[must_use]
    pub fn with_config(mut self, config: ItemConfig) -> Self {
        self.default_config = config;
        self
    }
}

/// Component types keyed by type string.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    definitions: HashMap<String, ComponentDefinition>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one for the same type.
    pub fn register(&mut self, definition: ComponentDefinition) {
        self.definitions
            .insert(definition.component_type.clone(), definition);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, definition: ComponentDefinition) -> Self {
        self.register(definition);
        self
    }

    /// Look up a type.
    #[must_use]
    pub fn get(&self, component_type: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(component_type)
    }

    /// Whether a type is registered.
    #[must_use]
    pub fn contains(&self, component_type: &str) -> bool {
        self.definitions.contains_key(component_type)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
