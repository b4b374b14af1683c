use crate::normalize::values_equal;
use crate::schema::AttributeType;
use crate::types::{AttributePath, Diagnostic, Dynamic};

#[derive(Debug, Clone)]
pub struct PlanModifyRequest {
    /// Observed value; Null when the resource does not exist yet
    pub state: Dynamic,
    /// Planned value after configuration and defaults were applied
    pub plan: Dynamic,
    pub config: Dynamic,
    pub attribute_path: AttributePath,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl PlanModifyResponse {
    fn keep(request: PlanModifyRequest) -> Self {
        Self {
            plan_value: request.plan,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

/// Adjusts the planned value of one attribute
///
/// Plan modifiers run while diffing an existing resource and can:
/// - Modify the planned value
/// - Mark an attribute as requiring replacement
/// - Add warnings or errors to the plan
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse;

    /// Whether this modifier may mark its attribute for replacement
    fn forces_replacement(&self) -> bool {
        false
    }
}

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "changing this value forces replacement".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = !matches!(
            (&request.state, &request.plan),
            (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
        ) && !values_equal(&request.attribute_type, &request.state, &request.plan);

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }

    fn forces_replacement(&self) -> bool {
        true
    }
}

/// Uses the current state value when the planned value is unknown
///
/// Keeps server-assigned values stable across plans instead of showing them
/// as "known after apply" on every run.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "value does not change once assigned".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = match (&request.plan, &request.state) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan,
            (Dynamic::Unknown, state) => state.clone(),
            _ => request.plan,
        };

        PlanModifyResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    pub fn new(predicate: F, description: impl Into<String>) -> Self {
        Self {
            predicate,
            description: description.into(),
        }
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        if request.state.is_null() || !(self.predicate)(&request) {
            return PlanModifyResponse::keep(request);
        }

        let diagnostics = vec![Diagnostic::warning(
            format!(
                "Attribute '{}' requires resource replacement",
                request.attribute_path
            ),
            self.description.clone(),
        )
        .with_attribute(request.attribute_path.clone())];

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace: true,
            diagnostics,
        }
    }

    fn forces_replacement(&self) -> bool {
        true
    }
}
