//! Error types for chainconf
//!
//! One structured error type for the whole crate: a kind describing what
//! went wrong, the field it happened on when known, and an actionable help
//! message.

use std::fmt;

/// Result type alias for chainconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chainconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Name of the field the error relates to, if known
    pub field: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed declaration syntax inside an annotation segment
    Annotation {
        /// Annotation segment key being parsed (e.g. "config")
        key: String,
    },
    /// The same variable name declared by more than one field
    DuplicateDeclaration { name: String, fields: Vec<String> },
    /// A `${NAME}` reference with no matching declaration
    DanglingReference { name: String },
    /// A declaration on a field that is not publicly accessible
    Accessibility,
    /// The dependency graph contains a cycle; carries the closed path
    CyclicDependency { cycle: Vec<String> },
    /// A declared field's runtime value cannot be rendered to text
    UnsupportedValueType { kind: &'static str },
    /// Substitution found references with no context entry
    MissingVariables { names: Vec<String> },
    /// Topological sort could not proceed despite a clean cycle check
    Structural { operation: String },
    /// A text value could not be coerced into the field's declared kind
    Coercion { expected: &'static str },
    /// Opaque failure from an external source loader
    Loader {
        loader: String,
        operation: String,
        source: Option<String>,
    },
    /// A record field failed a validation rule
    Validation { rule: String, value: Option<String> },
}

impl Error {
    /// Create an annotation parse error.
    ///
    /// The parser does not know which field it is parsing for, so the field
    /// is initially `"<unknown>"`; callers that do know overwrite it with
    /// [`Error::with_field`].
    pub fn annotation(key: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Annotation { key: key.into() },
            field: Some("<unknown>".into()),
            help: None,
            cause: Some(issue.into()),
        }
    }

    /// Create a duplicate declaration error listing every offending field
    pub fn duplicate_declaration(name: impl Into<String>, fields: Vec<String>) -> Self {
        let n = name.into();
        Self {
            kind: ErrorKind::DuplicateDeclaration {
                name: n.clone(),
                fields,
            },
            field: None,
            help: Some(format!(
                "Use a unique availableAs name for each declaring field (only one field may declare '{}')",
                n
            )),
            cause: None,
        }
    }

    /// Create a dangling reference error
    pub fn dangling_reference(field: impl Into<String>, name: impl Into<String>) -> Self {
        let n = name.into();
        Self {
            kind: ErrorKind::DanglingReference { name: n.clone() },
            field: Some(field.into()),
            help: Some(format!(
                "Add config:\"availableAs={}\" to the field providing this value",
                n
            )),
            cause: None,
        }
    }

    /// Create an accessibility error for a declaration on a non-public field
    pub fn accessibility(field: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Accessibility,
            field: Some(field.into()),
            help: Some("Fields with an availableAs declaration must be public".into()),
            cause: None,
        }
    }

    /// Create a cyclic dependency error carrying the closed cycle path
    pub fn cyclic_dependency(cycle: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::CyclicDependency { cycle },
            field: None,
            help: Some("Break the cycle by removing one of the references".into()),
            cause: None,
        }
    }

    /// Create an unsupported value type error
    pub fn unsupported_value_type(field: impl Into<String>, kind: &'static str) -> Self {
        Self {
            kind: ErrorKind::UnsupportedValueType { kind },
            field: Some(field.into()),
            help: Some(
                "Only text, integer, float, and boolean fields can provide variables".into(),
            ),
            cause: None,
        }
    }

    /// Create a missing variables error from substitution
    pub fn missing_variables(names: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::MissingVariables { names },
            field: None,
            help: Some("Load the providing fields before interpolating this text".into()),
            cause: None,
        }
    }

    /// Create a structural error (internal invariant violation)
    pub fn structural(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Structural {
                operation: operation.into(),
            },
            field: None,
            help: Some("This is likely a bug in chainconf. Please report it.".into()),
            cause: Some(message.into()),
        }
    }

    /// Create a coercion error for a value that does not fit the field kind
    pub fn coercion(
        field: impl Into<String>,
        expected: &'static str,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Coercion { expected },
            field: Some(field.into()),
            help: Some(format!("Ensure the value can be parsed as {}", expected)),
            cause: Some(format!("Got: {}", raw.into())),
        }
    }

    /// Create a loader error
    pub fn loader(
        loader: impl Into<String>,
        operation: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Loader {
                loader: loader.into(),
                operation: operation.into(),
                source: None,
            },
            field: None,
            help: None,
            cause: Some(cause.into()),
        }
    }

    /// Attach a source identifier (file path, variable name) to a loader error
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        if let ErrorKind::Loader { source: s, .. } = &mut self.kind {
            *s = Some(source.into());
        }
        self
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        rule: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Validation {
                rule: rule.into(),
                value,
            },
            field: Some(field.into()),
            help: Some("Fix the value to satisfy the rule".into()),
            cause: None,
        }
    }

    /// Set the field this error relates to
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Annotation { key } => {
                write!(f, "annotation parse error (segment: {})", key)?
            }
            ErrorKind::DuplicateDeclaration { name, fields } => write!(
                f,
                "duplicate availableAs='{}' declared in fields: {}",
                name,
                fields.join(", ")
            )?,
            ErrorKind::DanglingReference { name } => {
                write!(f, "undefined variable '${{{}}}'", name)?
            }
            ErrorKind::Accessibility => {
                write!(f, "availableAs declaration on a non-public field")?
            }
            ErrorKind::CyclicDependency { cycle } => {
                write!(f, "cyclic dependency detected: {}", cycle.join(" -> "))?
            }
            ErrorKind::UnsupportedValueType { kind } => {
                write!(f, "unsupported value type for interpolation: {}", kind)?
            }
            ErrorKind::MissingVariables { names } => {
                write!(f, "undefined variables: [{}]", names.join(", "))?
            }
            ErrorKind::Structural { operation } => {
                write!(f, "dependency graph error during {}", operation)?
            }
            ErrorKind::Coercion { expected } => {
                write!(f, "cannot coerce value to {}", expected)?
            }
            ErrorKind::Loader {
                loader,
                operation,
                source,
            } => {
                write!(f, "{} error during {}", loader, operation)?;
                if let Some(src) = source {
                    write!(f, " (source: {})", src)?;
                }
            }
            ErrorKind::Validation { rule, value } => {
                write!(f, "validation failed: rule '{}'", rule)?;
                if let Some(v) = value {
                    write!(f, " (value: {})", v)?;
                }
            }
        }

        if let Some(field) = &self.field {
            write!(f, "\n  Field: {}", field)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_error_starts_unknown() {
        let err = Error::annotation("config", "empty availableAs value");
        assert_eq!(err.field.as_deref(), Some("<unknown>"));

        let err = err.with_field("DatabaseURL");
        assert_eq!(err.field.as_deref(), Some("DatabaseURL"));
        let display = format!("{}", err);
        assert!(display.contains("annotation parse error (segment: config)"));
        assert!(display.contains("Field: DatabaseURL"));
        assert!(display.contains("empty availableAs value"));
    }

    #[test]
    fn test_duplicate_declaration_display() {
        let err = Error::duplicate_declaration("ENV", vec!["Environment".into(), "EnvName".into()]);
        let display = format!("{}", err);

        assert!(display.contains("duplicate availableAs='ENV'"));
        assert!(display.contains("Environment, EnvName"));
        assert!(display.contains("Help:"));
    }

    #[test]
    fn test_dangling_reference_display() {
        let err = Error::dangling_reference("DBPassword", "ENV");
        let display = format!("{}", err);

        assert!(display.contains("undefined variable '${ENV}'"));
        assert!(display.contains("Field: DBPassword"));
        assert!(display.contains("availableAs=ENV"));
    }

    #[test]
    fn test_cyclic_dependency_display() {
        let err =
            Error::cyclic_dependency(vec!["FieldA".into(), "FieldB".into(), "FieldA".into()]);
        let display = format!("{}", err);

        assert!(display.contains("cyclic dependency detected: FieldA -> FieldB -> FieldA"));
    }

    #[test]
    fn test_missing_variables_display() {
        let err = Error::missing_variables(vec!["ENV".into(), "REGION".into()]);
        assert!(format!("{}", err).contains("undefined variables: [ENV, REGION]"));
    }

    #[test]
    fn test_loader_error_with_source() {
        let err = Error::loader("JsonLoader", "read file", "no such file").with_source("conf.json");
        let display = format!("{}", err);

        assert!(display.contains("JsonLoader error during read file (source: conf.json)"));
        assert!(display.contains("no such file"));
    }

    #[test]
    fn test_structural_error_display() {
        let err = Error::structural("topological sort", "unable to complete sort");
        let display = format!("{}", err);

        assert!(display.contains("dependency graph error during topological sort"));
        assert!(display.contains("likely a bug"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = Error::validation("Port", "min=1", Some("0".into()));
        let display = format!("{}", err);

        assert!(display.contains("validation failed: rule 'min=1' (value: 0)"));
        assert!(display.contains("Field: Port"));
    }

    #[test]
    fn test_unsupported_value_type() {
        let err = Error::unsupported_value_type("Tags", "sequence");
        assert_eq!(err.kind, ErrorKind::UnsupportedValueType { kind: "sequence" });
        assert!(format!("{}", err).contains("unsupported value type for interpolation: sequence"));
    }
}
