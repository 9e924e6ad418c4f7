//! Chain drivers
//!
//! Drivers run an ordered list of [`Loader`]s over one record. Later loaders
//! overwrite earlier ones for the same field, and any loader error aborts the
//! whole load. [`InterpolatingChainLoader`] adds dependency-aware staging on
//! top: fields whose annotations reference variables are loaded only after
//! the fields providing those variables.

use indexmap::IndexMap;

use crate::engine::InterpolationEngine;
use crate::error::Result;
use crate::loader::{Annotations, Loader};
use crate::record::Record;

/// Runs every loader once, in list order
pub struct ChainLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl ChainLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }
}

impl Loader for ChainLoader {
    fn name(&self) -> &str {
        "ChainLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        for loader in &self.loaders {
            loader.load(record, annotations)?;
        }
        Ok(())
    }
}

/// Runs loaders in order but stops as soon as every public field holds a
/// non-default value. The check runs before each loader, so a chain whose
/// first loader fills everything never invokes the second.
pub struct ShortCircuitChainLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl ShortCircuitChainLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }
}

impl Loader for ShortCircuitChainLoader {
    fn name(&self) -> &str {
        "ShortCircuitChainLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        for loader in &self.loaders {
            if record.is_fully_populated() {
                log::trace!("record fully populated; skipping remaining loaders");
                break;
            }
            loader.load(record, annotations)?;
        }
        Ok(())
    }
}

/// Dependency-aware chain driver.
///
/// Each `load` analyzes the record's annotations. Without any declarations or
/// references the loaders simply run in order (fast path). Otherwise fields
/// are processed stage by stage: the stage's annotations are interpolated
/// against the current context, every loader runs over the whole record, and
/// the stage's resolved values feed the context for the next stage.
///
/// Loaders always see the entire record; staging only controls when a
/// field's annotation text has its references resolved. A loader is expected
/// to skip fields whose effective annotation still carries `${NAME}` and pick
/// them up on a later stage's pass.
pub struct InterpolatingChainLoader {
    loaders: Vec<Box<dyn Loader>>,
    short_circuit: bool,
    engine: InterpolationEngine,
}

impl InterpolatingChainLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self {
            loaders,
            short_circuit: false,
            engine: InterpolationEngine::new(),
        }
    }

    /// Stop invoking loaders once every public field is non-default
    pub fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.short_circuit = enabled;
        self
    }

    /// Load the record, staging as needed
    pub fn load(&mut self, record: &mut Record) -> Result<()> {
        self.engine.analyze(record)?;

        let mut annotations = Annotations::from_record(record);

        if !self.engine.has_interpolation() {
            log::trace!("no interpolation needed; running loaders in sequence");
            self.run_loaders(record, &annotations)?;
            return Ok(());
        }

        let stages = self.engine.stages().to_vec();
        for (level, stage) in stages.iter().enumerate() {
            log::trace!("loading stage {} ({} field(s))", level, stage.len());

            for (index, resolved) in self.engine.interpolate(record, stage)? {
                annotations.set(index, resolved);
            }

            self.run_loaders(record, &annotations)?;

            for &index in stage {
                let value = record.field(index).value().clone();
                self.engine.update_context(index, &value)?;
            }
        }

        Ok(())
    }

    fn run_loaders(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        for loader in &self.loaders {
            if self.short_circuit && record.is_fully_populated() {
                log::trace!("record fully populated; skipping remaining loaders");
                break;
            }
            loader.load(record, annotations)?;
        }
        Ok(())
    }

    /// Defensive copy of the engine's interpolation context.
    /// Empty before the first load.
    pub fn context(&self) -> IndexMap<String, String> {
        self.engine.context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::loader::{FnLoader, MapSecretStore, SecretStoreLoader};
    use crate::record::Field;
    use pretty_assertions::assert_eq;

    fn set(name: &'static str, value: &'static str) -> Box<dyn Loader> {
        Box::new(FnLoader::new(format!("set-{}", name), move |record: &mut Record, _: &Annotations| {
            record.get_mut(name).unwrap().set_from_str(value)
        }))
    }

    #[test]
    fn test_chain_loader_later_overwrites_earlier() {
        let chain = ChainLoader::new(vec![set("Host", "first"), set("Host", "second")]);
        let mut record = Record::new(vec![Field::text("Host")]);
        let annotations = Annotations::from_record(&record);

        chain.load(&mut record, &annotations).unwrap();
        assert_eq!(record.get_text("Host"), Some("second"));
    }

    #[test]
    fn test_chain_loader_error_aborts() {
        let chain = ChainLoader::new(vec![
            Box::new(FnLoader::new("fail", |_: &mut Record, _: &Annotations| {
                Err(Error::loader("fail", "load", "boom"))
            })),
            set("Host", "never"),
        ]);
        let mut record = Record::new(vec![Field::text("Host")]);
        let annotations = Annotations::from_record(&record);

        assert!(chain.load(&mut record, &annotations).is_err());
        assert!(record.get("Host").unwrap().value().is_null());
    }

    #[test]
    fn test_short_circuit_chain_skips_once_populated() {
        let chain =
            ShortCircuitChainLoader::new(vec![set("Host", "first"), set("Host", "second")]);
        let mut record = Record::new(vec![Field::text("Host")]);
        let annotations = Annotations::from_record(&record);

        chain.load(&mut record, &annotations).unwrap();
        // The first loader fills the only field; the second never runs
        assert_eq!(record.get_text("Host"), Some("first"));
    }

    #[test]
    fn test_fast_path_without_interpolation() {
        let mut driver =
            InterpolatingChainLoader::new(vec![set("Host", "first"), set("Host", "second")]);
        let mut record = Record::new(vec![Field::text("Host")]);

        driver.load(&mut record).unwrap();
        assert_eq!(record.get_text("Host"), Some("second"));
        assert!(driver.context().is_empty());
    }

    #[test]
    fn test_fast_path_short_circuit() {
        let mut driver =
            InterpolatingChainLoader::new(vec![set("Host", "first"), set("Host", "second")])
                .with_short_circuit(true);
        let mut record = Record::new(vec![Field::text("Host")]);

        driver.load(&mut record).unwrap();
        assert_eq!(record.get_text("Host"), Some("first"));
    }

    #[test]
    fn test_staged_load_resolves_secret_path() {
        let store = MapSecretStore::new().insert("/app/prod/db-password", "s3cret");
        let mut driver = InterpolatingChainLoader::new(vec![
            set("Env", "prod"),
            Box::new(SecretStoreLoader::new(store)),
        ]);

        let mut record = Record::new(vec![
            Field::text("Env").with_annotation(r#"config:"availableAs=ENV""#),
            Field::text("DBPassword").with_annotation(r#"secret:"/app/${ENV}/db-password""#),
        ]);

        driver.load(&mut record).unwrap();

        assert_eq!(record.get_text("Env"), Some("prod"));
        assert_eq!(record.get_text("DBPassword"), Some("s3cret"));
        assert_eq!(
            driver.context().get("ENV").map(String::as_str),
            Some("prod")
        );
        // Field metadata stays pristine
        assert_eq!(
            record.field(1).annotation(),
            r#"secret:"/app/${ENV}/db-password""#
        );
    }

    #[test]
    fn test_staged_load_chained_variables() {
        // ENV resolves first, REGION depends on it, the secret on both
        let store = MapSecretStore::new()
            .insert("/regions/prod", "us-east-1")
            .insert("/app/prod/us-east-1/key", "api-key-value");
        let mut driver = InterpolatingChainLoader::new(vec![
            set("Env", "prod"),
            Box::new(SecretStoreLoader::new(store)),
        ]);

        let mut record = Record::new(vec![
            Field::text("Env").with_annotation(r#"config:"availableAs=ENV""#),
            Field::text("Region")
                .with_annotation(r#"secret:"/regions/${ENV}" config:"availableAs=REGION""#),
            Field::text("APIKey").with_annotation(r#"secret:"/app/${ENV}/${REGION}/key""#),
        ]);

        driver.load(&mut record).unwrap();

        assert_eq!(record.get_text("Region"), Some("us-east-1"));
        assert_eq!(record.get_text("APIKey"), Some("api-key-value"));

        let context = driver.context();
        assert_eq!(context.get("ENV").map(String::as_str), Some("prod"));
        assert_eq!(
            context.get("REGION").map(String::as_str),
            Some("us-east-1")
        );
    }

    #[test]
    fn test_staged_load_analysis_error_propagates() {
        let mut driver = InterpolatingChainLoader::new(vec![set("Env", "prod")]);
        let mut record = Record::new(vec![
            Field::text("Env").with_annotation(r#"config:"availableAs=ENV""#),
            Field::text("Dangling").with_annotation(r#"secret:"/app/${MISSING}""#),
        ]);

        let err = driver.load(&mut record).unwrap_err();
        assert!(format!("{}", err).contains("undefined variable '${MISSING}'"));
    }

    #[test]
    fn test_context_empty_before_first_load() {
        let driver = InterpolatingChainLoader::new(vec![]);
        assert!(driver.context().is_empty());
    }

    #[test]
    fn test_staged_short_circuit_still_resolves_providers() {
        // Even with short-circuit on, the provider stage runs first, so the
        // dependent secret still resolves before the check can skip anything
        let store = MapSecretStore::new().insert("/app/prod/db", "s3cret");
        let mut driver = InterpolatingChainLoader::new(vec![
            set("Env", "prod"),
            Box::new(SecretStoreLoader::new(store)),
        ])
        .with_short_circuit(true);

        let mut record = Record::new(vec![
            Field::text("Env").with_annotation(r#"config:"availableAs=ENV""#),
            Field::text("DBPassword").with_annotation(r#"secret:"/app/${ENV}/db""#),
        ]);

        driver.load(&mut record).unwrap();
        assert_eq!(record.get_text("DBPassword"), Some("s3cret"));
    }
}
