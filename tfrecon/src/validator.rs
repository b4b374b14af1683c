use crate::error::{Violation, ViolationKind};
use crate::normalize::{format_number, lenient_number};
use crate::types::{AttributePath, Dynamic};
use std::sync::Arc;

/// Validator checks a single, non-null configuration value.
/// Null and unknown values are never passed to validators.
pub trait Validator: Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>);
}

fn invalid(path: &AttributePath, message: String) -> Violation {
    Violation::new(ViolationKind::InvalidValue, path.clone(), message)
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_most(max: usize) -> Arc<dyn Validator> {
        Arc::new(Self {
            min: None,
            max: Some(max),
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("string length must be between {} and {}", min, max),
            (Some(min), None) => format!("string length must be at least {}", min),
            (None, Some(max)) => format!("string length must be at most {}", max),
            (None, None) => "any string".to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        if let Some(s) = value.as_string() {
            let len = s.chars().count();
            if let Some(min) = self.min {
                if len < min {
                    violations.push(invalid(
                        path,
                        format!("must have minimum length of {}, got {}", min, len),
                    ));
                }
            }
            if let Some(max) = self.max {
                if len > max {
                    violations.push(invalid(
                        path,
                        format!("must have maximum length of {}, got {}", max, len),
                    ));
                }
            }
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl StringPatternValidator {
    /// Panics only on an invalid literal pattern, which is a programming error
    /// caught by the schema tests of every resource using it.
    pub fn create(pattern: &str, description: &str) -> Arc<dyn Validator> {
        Arc::new(Self {
            pattern: regex::Regex::new(pattern).unwrap_or_else(|e| {
                panic!("invalid validator pattern {:?}: {}", pattern, e)
            }),
            description: description.to_string(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        if let Some(s) = value.as_string() {
            if !self.pattern.is_match(s) {
                violations.push(invalid(
                    path,
                    format!("{}, got {:?}", self.description, s),
                ));
            }
        }
    }
}

pub struct OneOfValidator {
    pub values: Vec<String>,
}

impl OneOfValidator {
    pub fn create(values: &[&str]) -> Arc<dyn Validator> {
        Arc::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }
}

impl Validator for OneOfValidator {
    fn description(&self) -> String {
        format!("value must be one of [{}]", self.values.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        // Set and list elements are each checked
        if let Dynamic::List(items) = value {
            for (i, item) in items.iter().enumerate() {
                self.validate(item, &path.clone().index(i as i64), violations);
            }
            return;
        }
        if let Some(s) = value.as_string() {
            if !self.values.iter().any(|v| v == s) {
                violations.push(invalid(
                    path,
                    format!("expected one of [{}], got {:?}", self.values.join(", "), s),
                ));
            }
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn between(min: f64, max: f64) -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_least(min: f64) -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!(
                "value must be between {} and {}",
                format_number(min),
                format_number(max)
            ),
            (Some(min), None) => format!("value must be at least {}", format_number(min)),
            (None, Some(max)) => format!("value must be at most {}", format_number(max)),
            (None, None) => "any number".to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        if let Some(n) = lenient_number(value) {
            if let Some(min) = self.min {
                if n < min {
                    violations.push(invalid(
                        path,
                        format!(
                            "must be at least {}, got {}",
                            format_number(min),
                            format_number(n)
                        ),
                    ));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    violations.push(invalid(
                        path,
                        format!(
                            "must be at most {}, got {}",
                            format_number(max),
                            format_number(n)
                        ),
                    ));
                }
            }
        }
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLengthValidator {
    pub fn between(min: usize, max: usize) -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!(
            "list must have between {} and {} items",
            self.min.unwrap_or(0),
            self.max.map(|m| m.to_string()).unwrap_or_else(|| "any".to_string())
        )
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        if let Dynamic::List(items) = value {
            if let Some(min) = self.min {
                if items.len() < min {
                    violations.push(invalid(
                        path,
                        format!("must have at least {} items, got {}", min, items.len()),
                    ));
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    violations.push(invalid(
                        path,
                        format!("must have at most {} items, got {}", max, items.len()),
                    ));
                }
            }
        }
    }
}

/// Accepts `arn:<partition>:<service>:<region>:<account>:<resource>`
pub struct ArnValidator {
    pattern: regex::Regex,
}

impl ArnValidator {
    const PATTERN: &'static str = r"^arn:[a-z0-9-]+:[a-z0-9-]+:[a-z0-9-]*:[0-9]{0,12}:.+$";

    pub fn create() -> Arc<dyn Validator> {
        Arc::new(Self {
            pattern: regex::Regex::new(Self::PATTERN)
                .unwrap_or_else(|e| panic!("invalid ARN pattern: {}", e)),
        })
    }

    pub fn is_arn(&self, s: &str) -> bool {
        self.pattern.is_match(s)
    }
}

impl Validator for ArnValidator {
    fn description(&self) -> String {
        "value must be a valid ARN".to_string()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, violations: &mut Vec<Violation>) {
        if let Some(s) = value.as_string() {
            if !self.is_arn(s) {
                violations.push(invalid(path, format!("{:?} is an invalid ARN", s)));
            }
        }
    }
}
