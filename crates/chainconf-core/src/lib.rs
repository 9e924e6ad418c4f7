//! chainconf-core: Staged configuration loading with annotation interpolation
//!
//! This crate loads configuration records from chains of sources
//! (environment, command line, JSON/YAML documents, secret stores) and lets
//! one field's loaded value feed into another field's source location via
//! `${NAME}` references in field annotations.
//!
//! A field opts in as a variable provider with `config:"availableAs=NAME"`.
//! Any other field may then reference `${NAME}` anywhere in its annotation
//! text, e.g. in a secret path. The chain driver analyzes these
//! declarations and references, orders the fields into dependency stages,
//! and resolves each stage's annotations before its loaders run.
//!
//! # Example
//!
//! ```rust
//! use chainconf_core::{
//!     Field, InterpolatingChainLoader, MapSecretStore, Record, SecretStoreLoader,
//! };
//!
//! let mut record = Record::new(vec![
//!     Field::text("Env")
//!         .with_annotation(r#"config:"availableAs=ENV""#)
//!         .with_value("prod"),
//!     Field::text("DBPassword").with_annotation(r#"secret:"/app/${ENV}/db-password""#),
//! ]);
//!
//! let store = MapSecretStore::new().insert("/app/prod/db-password", "s3cret");
//! let mut driver = InterpolatingChainLoader::new(vec![Box::new(SecretStoreLoader::new(store))]);
//!
//! driver.load(&mut record).unwrap();
//! assert_eq!(record.get_text("DBPassword"), Some("s3cret"));
//! ```

pub mod annotation;
pub mod chain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod loader;
pub mod record;
pub mod validate;

mod handler;

pub use chain::{ChainLoader, InterpolatingChainLoader, ShortCircuitChainLoader};
pub use engine::InterpolationEngine;
pub use error::{Error, ErrorKind, Result};
pub use handler::Handler;
pub use loader::{
    Annotations, CommandLineLoader, EnvLoader, FnLoader, JsonLoader, Loader, MapSecretStore,
    SecretStore, SecretStoreLoader, YamlLoader,
};
pub use record::{Field, FieldKind, FieldValue, Record};
pub use validate::Validator;
