//! Reconciler: compares desired configuration with observed state
//!
//! [`diff`] walks the schema attribute by attribute using each attribute's
//! equality semantics, and [`plan`] turns the result into the ordered list of
//! remote operations that brings the remote object in line.

use crate::normalize::{dynamic_equal, normalize, unordered_equal, values_equal};
use crate::plan_modifier::PlanModifyRequest;
use crate::schema::{Block, NestedBlock, NestingMode, Schema};
use crate::types::{AttributePath, Config, Diagnostic, Dynamic, DynamicValue, State};
use std::collections::HashMap;
use std::fmt;

/// What a single attribute difference requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrAction {
    NoOp,
    Update,
    Replace,
}

/// One changed attribute or nested block
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDiff {
    pub attribute: String,
    pub old: Dynamic,
    pub new: Dynamic,
    pub action: AttrAction,
}

/// What has to happen to the resource as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Create,
    NoOp,
    Update,
    Replace,
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceAction::Create => "create",
            ResourceAction::NoOp => "no-op",
            ResourceAction::Update => "update",
            ResourceAction::Replace => "replace",
        };
        f.write_str(s)
    }
}

/// Result of comparing desired configuration with observed state.
/// Computed-only attributes never appear in `changes`.
#[derive(Debug, Clone)]
pub struct Diff {
    pub action: ResourceAction,
    pub changes: Vec<AttributeDiff>,
    /// Desired configuration with defaults filled in
    pub desired: Config,
    /// Expected state after the plan is applied; unknown where the remote
    /// system assigns the value
    pub planned: State,
    pub diagnostics: Vec<Diagnostic>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.action == ResourceAction::NoOp
    }

    pub fn requires_replace(&self) -> bool {
        self.action == ResourceAction::Replace
    }

    pub fn changed_attributes(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.attribute.as_str()).collect()
    }
}

/// A remote operation, in the order it must be executed
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create,
    /// In-place update carrying only the changed mutable attributes
    Update {
        changes: Vec<AttributeDiff>,
    },
    Delete,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update { .. } => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Fills schema defaults into every unset attribute, including those of
/// nested blocks, and converts every set attribute to the canonical
/// representation of its declared type.
pub fn apply_defaults(schema: &Schema, config: &Config) -> Config {
    DynamicValue::new(default_block(
        &schema.block,
        &config.value,
        &AttributePath::root(),
    ))
}

fn default_block(block: &Block, value: &Dynamic, path: &AttributePath) -> Dynamic {
    let mut obj = match value {
        Dynamic::Map(m) => m.clone(),
        _ => HashMap::new(),
    };

    for attr in &block.attributes {
        if let Some(v) = obj.get_mut(&attr.name).filter(|v| !v.is_null()) {
            *v = normalize(&attr.r#type, v);
            continue;
        }
        if let Some(v) = attr.resolve_default(&path.clone().attribute(&attr.name)) {
            if !v.is_null() {
                obj.insert(attr.name.clone(), v);
            }
        }
    }

    for nested in &block.block_types {
        let Some(v) = obj.get(&nested.type_name) else {
            continue;
        };
        let block_path = path.clone().attribute(&nested.type_name);
        let filled = match v {
            Dynamic::List(items) => Dynamic::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        default_block(&nested.block, item, &block_path.clone().index(i as i64))
                    })
                    .collect(),
            ),
            Dynamic::Map(_) => default_block(&nested.block, v, &block_path),
            other => other.clone(),
        };
        obj.insert(nested.type_name.clone(), filled);
    }

    Dynamic::Map(obj)
}

/// Compares one block instance. Unset server-assigned attributes and
/// computed-only attributes are not compared.
fn block_values_equal(block: &Block, desired: &Dynamic, observed: &Dynamic) -> bool {
    let empty = HashMap::new();
    let null = Dynamic::Null;
    let d = desired.as_map().unwrap_or(&empty);
    let o = observed.as_map().unwrap_or(&empty);

    let attributes_equal = block.attributes.iter().all(|attr| {
        let dv = d.get(&attr.name).unwrap_or(&null);
        let ov = o.get(&attr.name).unwrap_or(&null);
        if attr.is_computed_only() || dv.is_unknown() || (dv.is_null() && attr.computed) {
            return true;
        }
        values_equal(&attr.r#type, dv, ov)
    });

    attributes_equal
        && block.block_types.iter().all(|nested| {
            nested_blocks_equal(
                nested,
                d.get(&nested.type_name).unwrap_or(&null),
                o.get(&nested.type_name).unwrap_or(&null),
            )
        })
}

fn nested_blocks_equal(nested: &NestedBlock, desired: &Dynamic, observed: &Dynamic) -> bool {
    let (Some(d), Some(o)) = (nested.items(desired), nested.items(observed)) else {
        return dynamic_equal(desired, observed);
    };
    if d.len() != o.len() {
        return false;
    }
    match nested.nesting {
        NestingMode::Set => {
            unordered_equal(&d, &o, |x, y| block_values_equal(&nested.block, x, y))
        }
        NestingMode::List | NestingMode::Single => d
            .iter()
            .zip(&o)
            .all(|(x, y)| block_values_equal(&nested.block, x, y)),
    }
}

/// Planned state for a resource that does not exist yet
fn planned_for_create(schema: &Schema, desired: &Config) -> State {
    let mut obj = desired.value.as_map().cloned().unwrap_or_default();
    for attr in &schema.block.attributes {
        if attr.computed && obj.get(&attr.name).map_or(true, Dynamic::is_null) {
            obj.insert(attr.name.clone(), Dynamic::Unknown);
        }
    }
    DynamicValue::new(Dynamic::Map(obj))
}

/// Compares desired configuration against observed state.
///
/// `observed` is None when the remote object does not exist, which plans a
/// create. An attribute that requires replacement and differs short-circuits
/// the walk: the resource is replaced and nothing else needs comparing.
pub fn diff(schema: &Schema, desired: &Config, observed: Option<&State>) -> Diff {
    let desired = apply_defaults(schema, desired);

    let Some(observed) = observed else {
        return Diff {
            action: ResourceAction::Create,
            changes: Vec::new(),
            planned: planned_for_create(schema, &desired),
            desired,
            diagnostics: Vec::new(),
        };
    };

    let mut changes = Vec::new();
    let mut diagnostics = Vec::new();
    let mut planned = observed.value.as_map().cloned().unwrap_or_default();

    let replace = |changes: Vec<AttributeDiff>, diagnostics: Vec<Diagnostic>, desired: Config| {
        let planned = planned_for_create(schema, &desired);
        Diff {
            action: ResourceAction::Replace,
            changes,
            desired,
            planned,
            diagnostics,
        }
    };

    for attr in &schema.block.attributes {
        if attr.is_computed_only() {
            continue;
        }

        let path = AttributePath::new(&attr.name);
        let old = observed.attr(&attr.name).clone();
        let config_value = desired.attr(&attr.name).clone();

        // An unset server-assigned attribute keeps whatever the remote holds
        let mut new = if config_value.is_null() && attr.computed {
            old.clone()
        } else {
            normalize(&attr.r#type, &config_value)
        };

        let mut requires_replace = false;
        for modifier in &attr.plan_modifiers {
            let response = modifier.modify_plan(PlanModifyRequest {
                state: old.clone(),
                plan: new,
                config: config_value.clone(),
                attribute_path: path.clone(),
                attribute_type: attr.r#type.clone(),
            });
            new = response.plan_value;
            requires_replace |= response.requires_replace;
            diagnostics.extend(response.diagnostics);
        }

        if requires_replace {
            tracing::debug!(attribute = %attr.name, "change forces replacement");
            changes.push(AttributeDiff {
                attribute: attr.name.clone(),
                old,
                new,
                action: AttrAction::Replace,
            });
            return replace(changes, diagnostics, desired);
        }

        if !values_equal(&attr.r#type, &old, &new) {
            changes.push(AttributeDiff {
                attribute: attr.name.clone(),
                old,
                new: new.clone(),
                action: AttrAction::Update,
            });
        }
        planned.insert(attr.name.clone(), new);
    }

    for nested in &schema.block.block_types {
        let old = observed.attr(&nested.type_name);
        let new = desired.attr(&nested.type_name);
        if nested_blocks_equal(nested, new, old) {
            continue;
        }

        let action = if nested.requires_replace {
            AttrAction::Replace
        } else {
            AttrAction::Update
        };
        changes.push(AttributeDiff {
            attribute: nested.type_name.clone(),
            old: old.clone(),
            new: new.clone(),
            action,
        });

        if action == AttrAction::Replace {
            tracing::debug!(block = %nested.type_name, "block change forces replacement");
            return replace(changes, diagnostics, desired);
        }
        planned.insert(nested.type_name.clone(), new.clone());
    }

    let action = if changes.is_empty() {
        ResourceAction::NoOp
    } else {
        ResourceAction::Update
    };

    Diff {
        action,
        changes,
        desired,
        planned: DynamicValue::new(Dynamic::Map(planned)),
        diagnostics,
    }
}

/// Turns a diff into the ordered operations that apply it
pub fn plan(diff: &Diff) -> Vec<Operation> {
    match diff.action {
        ResourceAction::Create => vec![Operation::Create],
        ResourceAction::NoOp => Vec::new(),
        ResourceAction::Update => vec![Operation::Update {
            changes: diff
                .changes
                .iter()
                .filter(|c| c.action == AttrAction::Update)
                .cloned()
                .collect(),
        }],
        ResourceAction::Replace => vec![Operation::Delete, Operation::Create],
    }
}
