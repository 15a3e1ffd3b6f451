//! Special-case checks attached to individual keys.
//!
//! Validators are resolved into a registry once per run. The reconciler never
//! sees them; they annotate finished entries afterwards.

use crate::collect::RunContext;
use crate::config::ValidatorSpec;
use crate::error::AuditError;
use crate::normalize::NormalizedValue;
use crate::types::{ConfigKey, ReconciliationEntry};
use indexmap::IndexMap;
use std::io::ErrorKind;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// A check that adds a note to one key's report entry.
pub trait SpecialCaseValidator: Send + Sync {
    /// Returns the note to attach, or `None` when there is nothing to say.
    fn check(
        &self,
        key: &ConfigKey,
        value: &NormalizedValue,
        ctx: &RunContext,
    ) -> anyhow::Result<Option<String>>;
}

/// The value is a path relative to the base directory that should exist.
pub struct FileExists;

impl SpecialCaseValidator for FileExists {
    fn check(
        &self,
        _key: &ConfigKey,
        value: &NormalizedValue,
        ctx: &RunContext,
    ) -> anyhow::Result<Option<String>> {
        if value.is_marker() {
            return Ok(None);
        }
        let path = ctx.base_dir().join(value.as_str());
        match std::fs::metadata(&path) {
            Ok(_) => Ok(Some("ADDITIONAL CHECK: file exists.".to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Some(
                "ADDITIONAL CHECK: this file does not exist! For proper functioning, \
                 please make sure to create this file."
                    .to_string(),
            )),
            Err(e) => Err(anyhow::anyhow!("cannot inspect {}: {}", path.display(), e)),
        }
    }
}

/// Lists the known implementations of a base type.
pub struct Implementations {
    base: String,
}

impl Implementations {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl SpecialCaseValidator for Implementations {
    fn check(
        &self,
        _key: &ConfigKey,
        _value: &NormalizedValue,
        ctx: &RunContext,
    ) -> anyhow::Result<Option<String>> {
        let implementations = ctx.catalog.implementations_of(&self.base);
        if implementations.is_empty() {
            Ok(Some(format!("No known implementations of {}.", self.base)))
        } else {
            Ok(Some(format!(
                "Available implementations of {}: {}",
                self.base,
                implementations.join(", ")
            )))
        }
    }
}

/// Key -> validator mapping.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: IndexMap<ConfigKey, Box<dyn SpecialCaseValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, replacing any previous one for the key.
    pub fn register(&mut self, key: ConfigKey, validator: impl SpecialCaseValidator + 'static) {
        self.validators.insert(key, Box::new(validator));
    }

    /// Resolve configured validator specs. Keys that are not `Namespace.field`
    /// are skipped with a warning.
    pub fn from_config(specs: &IndexMap<String, ValidatorSpec>) -> Self {
        let mut registry = Self::new();
        for (key, spec) in specs {
            let Some(parsed) = ConfigKey::parse(key) else {
                warn!("Ignoring validator for malformed key '{}'", key);
                continue;
            };
            match spec {
                ValidatorSpec::FileExists => registry.register(parsed, FileExists),
                ValidatorSpec::Implementations(base) => {
                    registry.register(parsed, Implementations::new(base))
                }
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run the validator for one key, if any.
    ///
    /// Errors and panics inside the validator both come back as
    /// `SpecialCaseValidatorFailure`.
    pub fn validate(
        &self,
        key: &ConfigKey,
        value: &NormalizedValue,
        ctx: &RunContext,
    ) -> Result<Option<String>, AuditError> {
        let Some(validator) = self.validators.get(key) else {
            return Ok(None);
        };
        let label = key.to_string();
        match catch_unwind(AssertUnwindSafe(|| validator.check(key, value, ctx))) {
            Ok(Ok(note)) => Ok(note),
            Ok(Err(e)) => Err(AuditError::validator_failure(&label, e)),
            Err(_) => Err(AuditError::validator_failure(&label, "validator panicked")),
        }
    }

    /// Annotate documented entries in place and return the failures.
    pub fn apply(&self, entries: &mut [ReconciliationEntry], ctx: &RunContext) -> Vec<AuditError> {
        let mut failures = Vec::new();
        for entry in entries.iter_mut() {
            if entry.description.is_none() {
                continue;
            }
            let Some(key) = entry.key() else {
                continue;
            };
            match self.validate(&key, &entry.live.normalized, ctx) {
                Ok(note) => entry.special_check = note,
                Err(e) => {
                    warn!("{}", e);
                    entry.warnings.push(e.message.clone());
                    failures.push(e);
                }
            }
        }
        debug!(
            "Applied {} validators, {} failures",
            self.validators.len(),
            failures.len()
        );
        failures
    }
}
