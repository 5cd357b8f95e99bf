//! Trigger and stored function definitions.

use ormkit_core::TableRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl TriggerTiming {
    pub const fn as_sql(self) -> &'static str {
        match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
            TriggerTiming::InsteadOf => "INSTEAD OF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Insert,
    /// UPDATE, optionally only of the named columns
    Update(Vec<String>),
    Delete,
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDef {
    pub table: TableRef,
    pub name: String,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    /// Function executed by the trigger
    pub function: String,
    pub args: Vec<String>,
    /// FOR EACH ROW rather than FOR EACH STATEMENT
    pub for_each_row: bool,
}

impl TriggerDef {
    pub fn new(
        table: impl Into<TableRef>,
        name: impl Into<String>,
        timing: TriggerTiming,
        function: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            timing,
            events: Vec::new(),
            function: function.into(),
            args: Vec::new(),
            for_each_row: true,
        }
    }

    #[must_use]
    pub fn on(mut self, event: TriggerEvent) -> Self {
        self.events.push(event);
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn for_each_statement(mut self) -> Self {
        self.for_each_row = false;
        self
    }
}

/// One parameter of a stored function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: Option<String>,
    pub data_type: String,
    /// IN, OUT or INOUT
    pub direction: Option<String>,
}

impl FunctionParam {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            name: None,
            data_type: data_type.into(),
            direction: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub return_type: String,
    pub language: String,
    pub body: String,
    /// Extra modifiers such as `IMMUTABLE`
    pub modifiers: Vec<String>,
    pub or_replace: bool,
}

impl FunctionDef {
    pub fn new(
        name: impl Into<String>,
        return_type: impl Into<String>,
        language: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: return_type.into(),
            language: language.into(),
            body: body.into(),
            modifiers: Vec::new(),
            or_replace: false,
        }
    }

    #[must_use]
    pub fn param(mut self, param: FunctionParam) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    #[must_use]
    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }
}
