//! Program rule definitions
//!
//! Rules, their actions and their variables are host metadata: the engine
//! receives them fully built and never persists them. A rule's condition and
//! any action data are formula strings in rule-condition syntax, parsed
//! fresh on every evaluation pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// A program rule: a boolean condition plus the actions it triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule uid
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Program the rule belongs to
    pub program: String,
    /// Optional program-stage scope: when set, the rule only evaluates for
    /// events of this stage
    #[serde(default)]
    pub program_stage: Option<String>,
    /// Evaluation priority; lower runs first, absent runs last
    #[serde(default)]
    pub priority: Option<i32>,
    /// Boolean condition formula
    pub condition: String,
    /// Actions taken when the condition holds
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl Rule {
    /// Create a rule with no stage scope, no priority and no actions.
    pub fn new(id: impl Into<String>, program: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            program: program.into(),
            program_stage: None,
            priority: None,
            condition: condition.into(),
            actions: Vec::new(),
        }
    }

    /// Set the rule name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Scope the rule to one program stage.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.program_stage = Some(stage.into());
        self
    }

    /// Set the evaluation priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Append an action.
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Everything a triggered rule can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleAction {
    /// Write a computed value into a field
    Assign {
        /// Target field (data element or attribute uid)
        field: String,
        /// Value formula, evaluated in rule-condition syntax
        value: String,
    },
    /// Require the field to be non-blank once assigns have landed
    SetMandatory { field: String },
    /// Raise an error diagnostic; with `on_complete` it only fires for
    /// completed entities
    ShowError {
        field: Option<String>,
        content: String,
        /// Optional data formula appended to the content
        data: Option<String>,
        #[serde(default)]
        on_complete: bool,
    },
    /// Raise a warning diagnostic; same gating as `ShowError`
    ShowWarning {
        field: Option<String>,
        content: String,
        data: Option<String>,
        #[serde(default)]
        on_complete: bool,
    },
    /// Dispatch a notification template once per (template, entity)
    SendMessage { template: String },
    /// Like `SendMessage`, for a computed future date
    ScheduleMessage {
        template: String,
        /// Date formula; must evaluate to ISO `YYYY-MM-DD`
        date: String,
    },
    /// UI hint: hide a field
    HideField { field: String },
    /// UI hint: hide a form section
    HideSection { section: String },
}

impl RuleAction {
    /// The field this action targets, if it targets one.
    pub fn field(&self) -> Option<&str> {
        match self {
            RuleAction::Assign { field, .. } | RuleAction::SetMandatory { field } => Some(field),
            RuleAction::ShowError { field, .. } | RuleAction::ShowWarning { field, .. } => {
                field.as_deref()
            }
            RuleAction::HideField { field } => Some(field),
            _ => None,
        }
    }

    /// The formula the engine evaluates into the effect's data, if any.
    pub fn data_formula(&self) -> Option<&str> {
        match self {
            RuleAction::Assign { value, .. } => Some(value),
            RuleAction::ShowError { data, .. } | RuleAction::ShowWarning { data, .. } => {
                data.as_deref()
            }
            RuleAction::ScheduleMessage { date, .. } => Some(date),
            _ => None,
        }
    }
}

/// Where a rule variable reads its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableSource {
    /// The event under evaluation
    CurrentEvent,
    /// The newest event strictly older than the current one
    PreviousEvent,
    /// The newest event anywhere in the program
    NewestEvent,
    /// The newest event within one program stage
    NewestStageEvent,
    /// A tracked-entity attribute on the enrollment
    Attribute,
    /// Starts empty; only `Assign` actions populate it during a pass
    CalculatedValue,
}

/// A named variable available to rule conditions as `#{name}` / `A{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVariable {
    /// Variable name as written inside the braces
    pub name: String,
    /// Backing field: data element or attribute uid
    pub field: String,
    /// Declared type of the backing field
    pub value_type: ValueType,
    /// Value source
    pub source: VariableSource,
    /// Stage filter, used by `NewestStageEvent`
    #[serde(default)]
    pub program_stage: Option<String>,
}

impl RuleVariable {
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        value_type: ValueType,
        source: VariableSource,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            value_type,
            source,
            program_stage: None,
        }
    }

    /// Set the stage filter for `NewestStageEvent` variables.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.program_stage = Some(stage.into());
        self
    }
}

/// A program's rule metadata as one unit: the rules, the variables their
/// conditions read, and the constant values they may reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub variables: Vec<RuleVariable>,
    /// Constant uid -> value, addressed as `C{uid}`
    #[serde(default)]
    pub constants: HashMap<String, f64>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_variable(mut self, variable: RuleVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_constant(mut self, uid: impl Into<String>, value: f64) -> Self {
        self.constants.insert(uid.into(), value);
        self
    }
}

/// One action of one triggered rule, in engine order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEffect {
    /// Uid of the rule that triggered
    pub rule: String,
    /// The action to apply
    pub action: RuleAction,
    /// Evaluated data formula, rendered as text
    pub data: Option<String>,
}

impl RuleEffect {
    pub fn new(rule: impl Into<String>, action: RuleAction, data: Option<String>) -> Self {
        Self {
            rule: rule.into(),
            action,
            data,
        }
    }
}
