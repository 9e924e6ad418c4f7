//! Top-level configuration handler
//!
//! Bundles the staged chain driver with the annotation-rule validator into
//! one entry point. The default loader chain reads the process environment
//! first, then the command line, so flags override environment variables.

use indexmap::IndexMap;

use crate::chain::InterpolatingChainLoader;
use crate::error::Result;
use crate::loader::{CommandLineLoader, EnvLoader, Loader};
use crate::record::Record;
use crate::validate::Validator;

/// Loads and validates configuration records.
///
/// ```no_run
/// use chainconf_core::{Field, Handler, Record};
///
/// let mut record = Record::new(vec![
///     Field::text("Host").with_annotation(r#"env:"APP_HOST" validate:"required""#),
///     Field::int("Port").with_annotation(r#"env:"APP_PORT" flag:"port" validate:"min=1,max=65535""#),
/// ]);
///
/// let mut handler = Handler::new();
/// handler.load_and_validate(&mut record)?;
/// # Ok::<(), chainconf_core::Error>(())
/// ```
pub struct Handler {
    chain: InterpolatingChainLoader,
    validator: Validator,
}

impl Handler {
    /// Handler with the default loader chain: environment, then command line
    pub fn new() -> Self {
        Self::with_loaders(vec![
            Box::new(EnvLoader::new()),
            Box::new(CommandLineLoader::new()),
        ])
    }

    /// Handler over an explicit loader chain, in precedence order
    /// (later loaders overwrite earlier ones)
    pub fn with_loaders(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self {
            chain: InterpolatingChainLoader::new(loaders),
            validator: Validator::new(),
        }
    }

    /// Stop invoking loaders once every public field is non-default
    pub fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.chain = self.chain.with_short_circuit(enabled);
        self
    }

    /// Run the loader chain, staging on annotation interpolation as needed
    pub fn load(&mut self, record: &mut Record) -> Result<()> {
        self.chain.load(record)
    }

    /// Check the record against its `validate:"..."` rules
    pub fn validate(&self, record: &Record) -> Result<()> {
        self.validator.validate(record)
    }

    /// Load, then validate. Validation only runs on a successful load.
    pub fn load_and_validate(&mut self, record: &mut Record) -> Result<()> {
        self.load(record)?;
        self.validate(record)
    }

    /// Defensive copy of the interpolation context from the last load
    pub fn context(&self) -> IndexMap<String, String> {
        self.chain.context()
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}
