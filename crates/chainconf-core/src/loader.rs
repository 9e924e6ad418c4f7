//! Configuration source loaders
//!
//! A [`Loader`] reads values from one external source (process environment,
//! command line, JSON/YAML documents, a secret store) into a [`Record`].
//! Loaders never read field annotations from the record directly; they
//! receive an [`Annotations`] overlay so that chain drivers can hand them
//! interpolated annotation text without mutating field metadata.

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::annotation::{self, contains_reference};
use crate::error::{Error, Result};
use crate::record::{FieldValue, Record};

/// Effective annotation text per field position.
///
/// Starts as a snapshot of the record's own annotations; chain drivers
/// overwrite individual entries with interpolated text as stages resolve.
/// The record's stored annotations are never touched.
#[derive(Debug, Clone)]
pub struct Annotations {
    entries: Vec<String>,
}

impl Annotations {
    /// Snapshot the raw annotations of every field
    pub fn from_record(record: &Record) -> Self {
        Self {
            entries: record
                .fields()
                .iter()
                .map(|f| f.annotation().to_string())
                .collect(),
        }
    }

    /// Replace the effective annotation for one field
    pub fn set(&mut self, index: usize, resolved: String) {
        self.entries[index] = resolved;
    }

    /// Effective annotation for one field
    pub fn get(&self, index: usize) -> &str {
        &self.entries[index]
    }
}

/// A single configuration source.
///
/// Loaders overwrite whatever a field already holds when their source has a
/// value for it, and leave the field alone otherwise. A loader must skip any
/// field whose relevant annotation still contains an unresolved `${NAME}`
/// reference; the chain driver will call it again once the reference
/// resolves.
pub trait Loader {
    /// Loader name for error reporting
    fn name(&self) -> &str;

    /// Load values from this source into the record
    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()>;
}

/// Adapter turning a closure into a [`Loader`].
///
/// ```
/// use chainconf_core::{Annotations, FnLoader, Loader, Record};
///
/// let defaults = FnLoader::new("defaults", |record: &mut Record, _: &Annotations| {
///     record.get_mut("Host").unwrap().set_from_str("localhost")
/// });
/// ```
pub struct FnLoader<F> {
    name: String,
    func: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&mut Record, &Annotations) -> Result<()>,
{
    /// Wrap a closure as a named loader
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Loader for FnLoader<F>
where
    F: Fn(&mut Record, &Annotations) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        (self.func)(record, annotations)
    }
}

/// Loads fields from process environment variables via `env:"VAR"` segments
#[derive(Debug, Default)]
pub struct EnvLoader;

impl EnvLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Loader for EnvLoader {
    fn name(&self) -> &str {
        "EnvLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        for index in 0..record.len() {
            let Some(var) = annotation::segment(annotations.get(index), "env") else {
                continue;
            };
            if var.is_empty() || contains_reference(var) {
                continue;
            }
            if let Ok(raw) = std::env::var(var) {
                record.field_mut(index).set_from_str(&raw)?;
            }
        }
        Ok(())
    }
}

/// Loads fields from command-line arguments via `flag:"name"` segments.
///
/// Accepts both `--name=value` and `--name value`. Unknown arguments are
/// ignored; parsing the full command line is someone else's job.
#[derive(Debug)]
pub struct CommandLineLoader {
    args: Vec<String>,
}

impl CommandLineLoader {
    /// Read flags from the process arguments (program name excluded)
    pub fn new() -> Self {
        Self::from_args(std::env::args().skip(1))
    }

    /// Read flags from an explicit argument list
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        Self {
            args: args.into_iter().collect(),
        }
    }

    fn flag_value(&self, flag: &str) -> Option<&str> {
        let long = format!("--{}", flag);
        let mut iter = self.args.iter().peekable();
        while let Some(arg) = iter.next() {
            if let Some(rest) = arg.strip_prefix(&long) {
                if let Some(value) = rest.strip_prefix('=') {
                    return Some(value);
                }
                if rest.is_empty() {
                    return iter.peek().map(|s| s.as_str());
                }
            }
        }
        None
    }
}

impl Default for CommandLineLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for CommandLineLoader {
    fn name(&self) -> &str {
        "CommandLineLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        for index in 0..record.len() {
            let Some(flag) = annotation::segment(annotations.get(index), "flag") else {
                continue;
            };
            if flag.is_empty() || contains_reference(flag) {
                continue;
            }
            if let Some(raw) = self.flag_value(flag) {
                let raw = raw.to_string();
                record.field_mut(index).set_from_str(&raw)?;
            }
        }
        Ok(())
    }
}

/// Where a document loader reads its bytes from
#[derive(Debug, Clone)]
pub enum Source {
    /// Read the document from a file at load time
    Path(PathBuf),
    /// Use an in-memory document
    Bytes(Vec<u8>),
}

impl Source {
    fn read(&self, loader: &str) -> Result<Vec<u8>> {
        match self {
            Source::Path(path) => std::fs::read(path).map_err(|e| {
                Error::loader(loader, "read file", e.to_string())
                    .with_source(path.display().to_string())
            }),
            Source::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Source::Path(path) => path.display().to_string(),
            Source::Bytes(_) => "<bytes>".into(),
        }
    }
}

/// Walk a dotted key path (`database.host`) through nested mappings
fn lookup_path<'a>(root: &'a FieldValue, path: &str) -> Option<&'a FieldValue> {
    let mut current = root;
    for part in path.split('.') {
        match current {
            FieldValue::Mapping(map) => current = map.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

fn load_document(
    loader: &str,
    key: &str,
    source: &Source,
    document: &FieldValue,
    record: &mut Record,
    annotations: &Annotations,
) -> Result<()> {
    for index in 0..record.len() {
        let Some(path) = annotation::segment(annotations.get(index), key) else {
            continue;
        };
        if path.is_empty() || contains_reference(path) {
            continue;
        }
        if let Some(value) = lookup_path(document, path) {
            let field_name = record.field(index).name().to_string();
            record
                .field_mut(index)
                .set_value(value.clone())
                .map_err(|e| {
                    Error::loader(loader, "assign value", e.to_string())
                        .with_source(source.describe())
                        .with_field(field_name)
                })?;
        }
    }
    Ok(())
}

/// Loads fields from a JSON document via `json:"dotted.path"` segments
#[derive(Debug)]
pub struct JsonLoader {
    source: Source,
}

impl JsonLoader {
    /// Load from a file path at each `load` call
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Path(path.into()),
        }
    }

    /// Load from an in-memory document
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Source::Bytes(bytes.into()),
        }
    }
}

impl Loader for JsonLoader {
    fn name(&self) -> &str {
        "JsonLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        let bytes = self.source.read(self.name())?;
        let document: FieldValue = serde_json::from_slice(&bytes).map_err(|e| {
            Error::loader(self.name(), "parse document", e.to_string())
                .with_source(self.source.describe())
        })?;
        load_document(self.name(), "json", &self.source, &document, record, annotations)
    }
}

/// Loads fields from a YAML document via `yaml:"dotted.path"` segments
#[derive(Debug)]
pub struct YamlLoader {
    source: Source,
}

impl YamlLoader {
    /// Load from a file path at each `load` call
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Path(path.into()),
        }
    }

    /// Load from an in-memory document
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Source::Bytes(bytes.into()),
        }
    }
}

impl Loader for YamlLoader {
    fn name(&self) -> &str {
        "YamlLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        let bytes = self.source.read(self.name())?;
        let document: FieldValue = serde_yaml::from_slice(&bytes).map_err(|e| {
            Error::loader(self.name(), "parse document", e.to_string())
                .with_source(self.source.describe())
        })?;
        load_document(self.name(), "yaml", &self.source, &document, record, annotations)
    }
}

/// A key/value secret backend.
///
/// `fetch` returns `Ok(None)` when the path simply has no secret, and an
/// error only for backend failures.
pub trait SecretStore {
    fn fetch(&self, path: &str) -> Result<Option<String>>;
}

/// In-memory secret store, mainly for tests and local development
#[derive(Debug, Default)]
pub struct MapSecretStore {
    secrets: IndexMap<String, String>,
}

impl MapSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret at a path
    pub fn insert(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(path.into(), value.into());
        self
    }
}

impl SecretStore for MapSecretStore {
    fn fetch(&self, path: &str) -> Result<Option<String>> {
        Ok(self.secrets.get(path).cloned())
    }
}

/// Loads fields from a [`SecretStore`] via `secret:"path"` segments.
///
/// Secret paths are the main consumers of interpolation: a path like
/// `/app/${ENV}/db-password` is skipped until the chain driver hands over an
/// annotation overlay with `${ENV}` resolved.
pub struct SecretStoreLoader<S> {
    store: S,
}

impl<S: SecretStore> SecretStoreLoader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: SecretStore> Loader for SecretStoreLoader<S> {
    fn name(&self) -> &str {
        "SecretStoreLoader"
    }

    fn load(&self, record: &mut Record, annotations: &Annotations) -> Result<()> {
        for index in 0..record.len() {
            let Some(path) = annotation::segment(annotations.get(index), "secret") else {
                continue;
            };
            if path.is_empty() || contains_reference(path) {
                continue;
            }
            let fetched = self.store.fetch(path).map_err(|e| {
                Error::loader(self.name(), "fetch secret", e.to_string()).with_source(path)
            })?;
            if let Some(raw) = fetched {
                record.field_mut(index).set_from_str(&raw)?;
            }
        }
        Ok(())
    }
}
