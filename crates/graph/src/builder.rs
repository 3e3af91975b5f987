//! Implicit dependency inference over a declared batch.

use serde_json::Value;
use tracing::debug;

use stratus_core::{Error, Resource, ResourceId, ResourceSet};

use crate::schema::{RefCardinality, RefField, SchemaRegistry};

/// Adds the `requires` edges implied by kind schemas, beyond whatever edges
/// the declaring system already attached.
///
/// Errors are collected per referencing resource instead of failing fast:
/// a dangling reference poisons that resource and its dependents, while the
/// rest of the batch keeps reconciling.
pub struct DependencyBuilder<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> DependencyBuilder<'a> {
    /// Create a builder over a schema registry.
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Infer implicit edges, mutating `requires` in place.
    ///
    /// Returns the configuration errors found while resolving references.
    /// No side effects beyond edge insertion; external infrastructure is
    /// never contacted.
    pub fn infer(&self, set: &mut ResourceSet) -> Vec<Error> {
        let mut errors = Vec::new();
        let mut edges: Vec<(ResourceId, ResourceId)> = Vec::new();

        for resource in set.iter() {
            let Some(schema) = self.registry.get(&resource.id.kind) else {
                continue;
            };
            for ref_field in &schema.refs {
                self.collect_edges(set, resource, ref_field, &mut edges, &mut errors);
            }
        }

        for (from, to) in edges {
            debug!(resource = %from, requires = %to, "inferred dependency");
            if let Some(resource) = set.get_mut(&from) {
                resource.add_requirement(to);
            }
        }

        errors
    }

    fn collect_edges(
        &self,
        set: &ResourceSet,
        resource: &Resource,
        ref_field: &RefField,
        edges: &mut Vec<(ResourceId, ResourceId)>,
        errors: &mut Vec<Error>,
    ) {
        let Some(value) = resource.attributes.get(&ref_field.field) else {
            return;
        };
        let names = match referenced_names(value, ref_field) {
            Ok(names) => names,
            Err(reason) => {
                errors.push(Error::configuration(
                    resource.id.clone(),
                    format!("field '{}': {reason}", ref_field.field),
                ));
                return;
            }
        };

        for name in names {
            let target = ResourceId::new(&ref_field.target_kind, &name);
            if set.contains(&target) {
                edges.push((resource.id.clone(), target));
            } else if ref_field.required {
                errors.push(Error::dangling_reference(
                    resource.id.clone(),
                    &ref_field.field,
                    &ref_field.target_kind,
                    name,
                ));
            }
        }
    }
}

/// The names a declared reference value points at. Empty strings and nulls
/// mean "unset" and reference nothing.
fn referenced_names(value: &Value, ref_field: &RefField) -> Result<Vec<String>, String> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    match ref_field.cardinality {
        RefCardinality::One => match value.as_str() {
            Some("") => Ok(Vec::new()),
            Some(name) => Ok(vec![name.to_string()]),
            None => Err("expected a resource name".to_string()),
        },
        RefCardinality::Many => {
            let Some(items) = value.as_array() else {
                return Err("expected a list of resource names".to_string());
            };
            let mut names = Vec::new();
            for item in items {
                let name = match &ref_field.item_key {
                    Some(key) => item.get(key).and_then(Value::as_str),
                    None => item.as_str(),
                };
                match name {
                    Some("") => {}
                    Some(name) => names.push(name.to_string()),
                    None => {
                        return Err(match &ref_field.item_key {
                            Some(key) => format!("expected a '{key}' name on every element"),
                            None => "expected a list of resource names".to_string(),
                        })
                    }
                }
            }
            Ok(names)
        }
    }
}
