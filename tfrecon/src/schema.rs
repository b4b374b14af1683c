//! Schema types and builders for tfrecon
//!
//! A schema declares every attribute of a resource: its type, whether it is
//! required, optional, computed by the remote system, or has a default, and
//! whether changing it forces replacement. The same declaration drives
//! configuration validation and the reconciler's diffing rules.

use crate::error::{Violation, ViolationKind};
use crate::plan_modifier::{PlanModifier, RequiresReplaceIfChanged};
use crate::types::{AttributePath, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the value type of an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    pub fn list_of(elem: AttributeType) -> Self {
        AttributeType::List(Box::new(elem))
    }

    pub fn set_of(elem: AttributeType) -> Self {
        AttributeType::Set(Box::new(elem))
    }

    pub fn map_of(elem: AttributeType) -> Self {
        AttributeType::Map(Box::new(elem))
    }

    /// Checks that a configuration value conforms to this type.
    /// Numeric and boolean strings are accepted where numbers and bools are expected.
    pub fn conforms(&self, value: &Dynamic) -> bool {
        use crate::normalize::{lenient_bool, lenient_number};

        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::String, Dynamic::Number(_)) => true,
            (AttributeType::String, Dynamic::Bool(_)) => true,
            (AttributeType::Number, v) => lenient_number(v).is_some(),
            (AttributeType::Bool, v) => lenient_bool(v).is_some(),
            (AttributeType::List(elem), Dynamic::List(items))
            | (AttributeType::Set(elem), Dynamic::List(items)) => {
                items.iter().all(|i| elem.conforms(i))
            }
            (AttributeType::Map(elem), Dynamic::Map(m)) => m.values().all(|v| elem.conforms(v)),
            (AttributeType::Object(fields), Dynamic::Map(m)) => m
                .iter()
                .all(|(k, v)| fields.get(k).is_some_and(|ty| ty.conforms(v))),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AttributeType::String => "string".to_string(),
            AttributeType::Number => "number".to_string(),
            AttributeType::Bool => "bool".to_string(),
            AttributeType::List(e) => format!("list({})", e.describe()),
            AttributeType::Set(e) => format!("set({})", e.describe()),
            AttributeType::Map(e) => format!("map({})", e.describe()),
            AttributeType::Object(_) => "object".to_string(),
        }
    }
}

/// Schema describes one resource type.
/// Version is used for state migration.
#[derive(Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attribute(name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block.nested_block(name)
    }

    /// Validates a desired configuration. Every problem is collected; an
    /// empty result means the configuration may be submitted.
    pub fn validate(&self, config: &DynamicValue) -> Vec<Violation> {
        let mut violations = Vec::new();
        match &config.value {
            Dynamic::Map(obj) => self
                .block
                .validate_object(obj, &AttributePath::root(), &mut violations),
            Dynamic::Null => self.block.validate_object(
                &HashMap::new(),
                &AttributePath::root(),
                &mut violations,
            ),
            other => violations.push(Violation::new(
                ViolationKind::TypeMismatch,
                AttributePath::root(),
                format!("configuration must be an object, got {}", other.type_name()),
            )),
        }
        violations
    }

    /// Copy of `state` with every set sensitive attribute replaced by
    /// [`REDACTED`], for output that leaves the process
    pub fn redact(&self, state: &DynamicValue) -> DynamicValue {
        DynamicValue::new(self.block.redact(&state.value))
    }
}

pub const REDACTED: &str = "(sensitive value)";

/// Block represents a configuration block: attributes, nested blocks and
/// constraints that span several of them
#[derive(Clone)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub constraints: Vec<ConfigConstraint>,
    pub description: String,
}

impl Block {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            block_types: Vec::new(),
            constraints: Vec::new(),
            description: String::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }

    fn redact(&self, value: &Dynamic) -> Dynamic {
        let Dynamic::Map(obj) = value else {
            return value.clone();
        };
        let mut obj = obj.clone();

        for attr in self.attributes.iter().filter(|a| a.sensitive) {
            if let Some(v) = obj.get_mut(&attr.name).filter(|v| !v.is_null()) {
                *v = Dynamic::String(REDACTED.to_string());
            }
        }
        for nested in &self.block_types {
            if let Some(v) = obj.get_mut(&nested.type_name) {
                *v = match &*v {
                    Dynamic::List(items) => {
                        Dynamic::List(items.iter().map(|i| nested.block.redact(i)).collect())
                    }
                    other => nested.block.redact(other),
                };
            }
        }
        Dynamic::Map(obj)
    }

    fn is_set(obj: &HashMap<String, Dynamic>, name: &str) -> bool {
        match obj.get(name) {
            None | Some(Dynamic::Null) => false,
            Some(Dynamic::List(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    fn validate_object(
        &self,
        obj: &HashMap<String, Dynamic>,
        path: &AttributePath,
        violations: &mut Vec<Violation>,
    ) {
        let mut keys: Vec<&String> = obj.keys().collect();
        keys.sort();
        for key in keys {
            if self.attribute(key).is_none() && self.nested_block(key).is_none() {
                violations.push(Violation::new(
                    ViolationKind::UnknownAttribute,
                    path.clone().attribute(key),
                    format!("An argument named \"{}\" is not expected here", key),
                ));
            }
        }

        for attr in &self.attributes {
            let attr_path = path.clone().attribute(&attr.name);
            let value = obj.get(&attr.name).unwrap_or(&Dynamic::Null);
            attr.validate_value(value, &attr_path, violations);
        }

        for nested in &self.block_types {
            let block_path = path.clone().attribute(&nested.type_name);
            nested.validate_value(obj.get(&nested.type_name), &block_path, violations);
        }

        for constraint in &self.constraints {
            constraint.check(obj, path, violations);
        }
    }
}

impl std::default::Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .field("default", &self.default.is_some())
            .finish()
    }
}

impl Attribute {
    /// Set only by the remote system; never part of a diff
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Optional and computed: the remote system assigns a value when the
    /// configuration leaves it unset
    pub fn is_server_default(&self) -> bool {
        self.computed && self.optional
    }

    pub fn requires_replace(&self) -> bool {
        self.plan_modifiers.iter().any(|m| m.forces_replacement())
    }

    /// Value the configuration resolves to once defaults are applied
    pub fn resolve_default(&self, path: &AttributePath) -> Option<Dynamic> {
        self.default.as_ref().map(|d| {
            d.default_value(DefaultRequest { path: path.clone() })
                .value
                .value
        })
    }

    fn validate_value(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        if value.is_null() {
            if self.required {
                violations.push(Violation::new(
                    ViolationKind::MissingRequired,
                    path.clone(),
                    format!(
                        "The argument \"{}\" is required, but no definition was found",
                        self.name
                    ),
                ));
            }
            return;
        }

        if self.is_computed_only() {
            violations.push(Violation::new(
                ViolationKind::ComputedOnly,
                path.clone(),
                format!("\"{}\" is computed by the remote system and cannot be set", self.name),
            ));
            return;
        }

        if value.is_unknown() {
            return;
        }

        if !self.r#type.conforms(value) {
            violations.push(Violation::new(
                ViolationKind::TypeMismatch,
                path.clone(),
                format!(
                    "expected {}, got {}",
                    self.r#type.describe(),
                    value.type_name()
                ),
            ));
            return;
        }

        for validator in &self.validators {
            validator.validate(value, path, violations);
        }
    }
}

/// NestedBlock represents a repeated or single configuration block
#[derive(Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: usize,
    pub max_items: usize,
    pub requires_replace: bool,
}

impl NestedBlock {
    pub fn new(type_name: &str, nesting: NestingMode, block: Block) -> Self {
        Self {
            type_name: type_name.to_string(),
            block,
            nesting,
            min_items: 0,
            max_items: 0,
            requires_replace: false,
        }
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = min;
        self
    }

    /// Zero means unbounded
    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    /// Block instances in a configuration or state value
    pub fn items<'a>(&self, value: &'a Dynamic) -> Option<Vec<&'a Dynamic>> {
        match value {
            Dynamic::Null => Some(Vec::new()),
            Dynamic::List(items) => Some(items.iter().collect()),
            Dynamic::Map(_) if self.nesting == NestingMode::Single => Some(vec![value]),
            _ => None,
        }
    }

    fn validate_value(
        &self,
        value: Option<&Dynamic>,
        path: &AttributePath,
        violations: &mut Vec<Violation>,
    ) {
        let value = value.unwrap_or(&Dynamic::Null);
        let Some(items) = self.items(value) else {
            violations.push(Violation::new(
                ViolationKind::TypeMismatch,
                path.clone(),
                format!("\"{}\" must be a block list", self.type_name),
            ));
            return;
        };

        if items.len() < self.min_items {
            violations.push(Violation::new(
                ViolationKind::BlockCount,
                path.clone(),
                format!(
                    "At least {} \"{}\" blocks are required",
                    self.min_items, self.type_name
                ),
            ));
        }
        if self.max_items > 0 && items.len() > self.max_items {
            violations.push(Violation::new(
                ViolationKind::BlockCount,
                path.clone(),
                format!(
                    "No more than {} \"{}\" blocks are allowed",
                    self.max_items, self.type_name
                ),
            ));
        }

        for (i, item) in items.into_iter().enumerate() {
            let item_path = path.clone().index(i as i64);
            match item {
                Dynamic::Map(obj) => self.block.validate_object(obj, &item_path, violations),
                // An empty block written as `{}` in JSON may arrive as null
                Dynamic::Null => {
                    self.block
                        .validate_object(&HashMap::new(), &item_path, violations)
                }
                other => violations.push(Violation::new(
                    ViolationKind::TypeMismatch,
                    item_path,
                    format!("block must be an object, got {}", other.type_name()),
                )),
            }
        }
    }
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

/// Constraint spanning several attributes or nested blocks of one block
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigConstraint {
    /// At least one of the named members must be set
    AtLeastOneOf(Vec<String>),
    /// Exactly one of the named members must be set
    ExactlyOneOf(Vec<String>),
    /// At most one of the named members may be set
    ConflictsWith(Vec<String>),
    /// If any of the named members is set, all must be set
    RequiredWith(Vec<String>),
}

impl ConfigConstraint {
    fn check(
        &self,
        obj: &HashMap<String, Dynamic>,
        path: &AttributePath,
        violations: &mut Vec<Violation>,
    ) {
        match self {
            ConfigConstraint::AtLeastOneOf(names) => {
                if !names.iter().any(|n| Block::is_set(obj, n)) {
                    violations.push(Violation::new(
                        ViolationKind::AtLeastOneOf,
                        path.clone(),
                        format!(
                            "At least one attribute out of [{}] must be specified",
                            names.join(", ")
                        ),
                    ));
                }
            }
            ConfigConstraint::ExactlyOneOf(names) => {
                let set = names.iter().filter(|n| Block::is_set(obj, n)).count();
                if set != 1 {
                    violations.push(Violation::new(
                        ViolationKind::ExactlyOneOf,
                        path.clone(),
                        format!(
                            "Exactly one attribute out of [{}] must be specified",
                            names.join(", ")
                        ),
                    ));
                }
            }
            ConfigConstraint::ConflictsWith(names) => {
                let set: Vec<&String> = names.iter().filter(|n| Block::is_set(obj, n)).collect();
                if set.len() > 1 {
                    let listed: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
                    violations.push(Violation::new(
                        ViolationKind::MutuallyExclusive,
                        path.clone().attribute(set[0]),
                        format!(
                            "Attributes [{}] are mutually exclusive; only one may be specified",
                            listed.join(", ")
                        ),
                    ));
                }
            }
            ConfigConstraint::RequiredWith(names) => {
                let set = names.iter().filter(|n| Block::is_set(obj, n)).count();
                if set > 0 && set < names.len() {
                    violations.push(Violation::new(
                        ViolationKind::RequiredWith,
                        path.clone(),
                        format!("All of [{}] must be specified together", names.join(", ")),
                    ));
                }
            }
        }
    }
}

/// Default provides a value for an optional attribute the configuration omits
pub trait Default: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// Request for default values
pub struct DefaultRequest {
    pub path: AttributePath,
}

/// Response with default value
pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Changing this attribute destroys and recreates the resource
    pub fn requires_replace(self) -> Self {
        self.plan_modifier(Arc::new(RequiresReplaceIfChanged))
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: Arc<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    pub fn default(mut self, default: Arc<dyn Default>) -> Self {
        self.attribute.default = Some(default);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// BlockBuilder assembles a block of attributes, nested blocks and constraints
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self {
            block: Block::new(),
        }
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.block.block_types.push(block);
        self
    }

    pub fn constraint(mut self, constraint: ConfigConstraint) -> Self {
        self.block.constraints.push(constraint);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Block {
        self.block
    }
}

impl std::default::Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    version: i64,
    block: BlockBuilder,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            version: 0,
            block: BlockBuilder::new(),
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.block = self.block.attribute(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.block = self.block.block(block);
        self
    }

    pub fn constraint(mut self, constraint: ConfigConstraint) -> Self {
        self.block = self.block.constraint(constraint);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.block = self.block.description(desc);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            version: self.version,
            block: self.block.build(),
        }
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
