//! Run context - working directory, environment and provisioned runtime

use crate::core::{error::StepError, trigger::TriggerEvent};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

/// Environment of a single Run.
///
/// Seeded from the host when the Run is created; afterwards it only grows
/// through [`RunEnvironment::append`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunEnvironment {
    #[serde(skip)]
    base: BTreeMap<String, String>,

    /// Mutations made by steps, in order
    entries: Vec<EnvEntry>,
}

/// One environment write made by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
    pub set_by: String,
}

impl RunEnvironment {
    /// Seed from the current process environment
    pub fn from_host() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            base: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            entries: Vec::new(),
        }
    }

    /// Layer workflow-level variables onto the seed (before any step runs)
    pub fn seed<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.base
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Current value; the latest write wins
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.as_str())
            .or_else(|| self.base.get(name).map(String::as_str))
    }

    /// Record a new value for `name`
    pub fn append(
        &mut self,
        name: &str,
        value: String,
        set_by: &str,
    ) -> Result<(), StepError> {
        if name.is_empty() {
            return Err(StepError::EnvironmentWrite("variable name is empty".to_string()));
        }
        if name.contains('=') || name.contains('\0') {
            return Err(StepError::EnvironmentWrite(format!(
                "invalid variable name '{}'",
                name.escape_debug()
            )));
        }
        if value.contains('\0') {
            return Err(StepError::EnvironmentWrite(format!(
                "value for {} contains a NUL byte",
                name
            )));
        }

        self.entries.push(EnvEntry {
            name: name.to_string(),
            value,
            set_by: set_by.to_string(),
        });
        Ok(())
    }

    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }

    /// Effective variables, for handing to child processes
    pub fn vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.base.clone();
        for entry in &self.entries {
            vars.insert(entry.name.clone(), entry.value.clone());
        }
        vars
    }
}

/// Interpreter selected by the provisioning step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Runtime {
    /// Version requested in the workflow, e.g. "3.13"
    pub requested: String,

    /// Version the interpreter reported, e.g. "3.13.1"
    pub version: String,

    /// Program used to invoke it
    pub interpreter: String,
}

/// Mutable state threaded through the steps of one Run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub trigger: TriggerEvent,

    /// Absolute path of the Run's working directory
    pub workspace: PathBuf,

    pub env: RunEnvironment,

    pub runtime: Option<Runtime>,
}

impl RunContext {
    pub fn new(run_id: Uuid, trigger: TriggerEvent, workspace: PathBuf, env: RunEnvironment) -> Self {
        Self {
            run_id,
            trigger,
            workspace,
            env,
            runtime: None,
        }
    }

    /// Variables available to `{{ ... }}` templates
    pub fn rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        for (name, value) in self.env.vars() {
            vars.insert(format!("env.{}", name), value);
        }

        vars.insert("workspace".to_string(), self.workspace.display().to_string());
        vars.insert("run.id".to_string(), self.run_id.to_string());
        vars.insert("trigger.event".to_string(), self.trigger.event.to_string());
        vars.insert("trigger.branch".to_string(), self.trigger.branch.clone());
        vars.insert(
            "trigger.sha".to_string(),
            self.trigger.sha.clone().unwrap_or_default(),
        );

        if let Some(runtime) = &self.runtime {
            vars.insert("runtime.version".to_string(), runtime.version.clone());
            vars.insert("runtime.interpreter".to_string(), runtime.interpreter.clone());
        }

        vars
    }

    /// Render a template; unknown placeholders are left untouched
    pub fn render(&self, template: &str) -> String {
        let vars = self.rendering_variables();
        placeholder_regex()
            .replace_all(template, |caps: &Captures| {
                vars.get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}
