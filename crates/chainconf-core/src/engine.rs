//! Interpolation engine
//!
//! Per-record orchestrator for the two-pass annotation analysis: pass 1
//! collects `availableAs` declarations, pass 2 collects `${NAME}`
//! references, then the dependency graph is built, checked for cycles, and
//! partitioned into stages. The engine also owns the interpolation context
//! (variable name -> resolved text) that chain drivers populate stage by
//! stage.

use indexmap::IndexMap;

use crate::annotation::{self, CONFIG_KEY};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::record::{FieldKind, FieldValue, Record};

/// Immutable result of one `analyze` call
#[derive(Debug, Default)]
struct Analysis {
    /// Field name per index, for error reporting
    field_names: Vec<String>,
    /// Declared kind per index, decided once for context conversion
    kinds: Vec<FieldKind>,
    /// Variable name -> declaring field index
    providers: IndexMap<String, usize>,
    /// Field index -> referenced variable names (first-seen order, deduped)
    dependencies: IndexMap<usize, Vec<String>>,
    /// Fields grouped by dependency level
    stages: Vec<Vec<usize>>,
    /// Whether any declaration or reference was found
    has_interpolation: bool,
}

/// Variable interpolation engine for one record shape.
///
/// ```
/// use chainconf_core::{Field, InterpolationEngine, Record};
///
/// let record = Record::new(vec![
///     Field::text("Env").with_annotation(r#"env:"ENV" config:"availableAs=ENV""#),
///     Field::text("DBPassword").with_annotation(r#"secret:"/app/${ENV}/db""#),
/// ]);
///
/// let mut engine = InterpolationEngine::new();
/// engine.analyze(&record).unwrap();
/// assert!(engine.has_interpolation());
/// assert_eq!(engine.stages(), &[vec![0], vec![1]]);
/// ```
#[derive(Debug, Default)]
pub struct InterpolationEngine {
    analysis: Option<Analysis>,
    context: IndexMap<String, String>,
}

impl InterpolationEngine {
    /// Create an engine with no analysis and an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze a record's annotations and build the staged load plan.
    ///
    /// Every call starts a fresh analysis and a fresh context; nothing leaks
    /// from previous calls. Fails fast on the first problem found, in this
    /// order: annotation parse error, declaration on a non-public field,
    /// duplicate declaration, dangling reference, cycle, and (defensively)
    /// a structural sort failure.
    pub fn analyze(&mut self, record: &Record) -> Result<()> {
        self.analysis = None;
        self.context.clear();

        let field_names: Vec<String> = record
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let kinds: Vec<FieldKind> = record.fields().iter().map(|f| f.kind()).collect();

        // Pass 1: declarations. Accessibility is rejected per field, before
        // the duplicate scan, so it wins when both conditions hold.
        let mut declared_by: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut providers: IndexMap<String, usize> = IndexMap::new();
        let mut has_interpolation = false;

        for (index, field) in record.fields().iter().enumerate() {
            let Some(config) = annotation::segment(field.annotation(), CONFIG_KEY) else {
                continue;
            };
            if config.is_empty() {
                continue;
            }

            let name = annotation::parse_declaration(config)
                .map_err(|e| e.with_field(field.name()))?;

            if !field.is_public() {
                return Err(Error::accessibility(field.name()));
            }

            declared_by
                .entry(name.clone())
                .or_default()
                .push(field.name().to_string());
            providers.insert(name, index);
            has_interpolation = true;
        }

        for (name, fields) in &declared_by {
            if fields.len() > 1 {
                return Err(Error::duplicate_declaration(name.clone(), fields.clone()));
            }
        }

        // Pass 2: references over the whole annotation blob. The first
        // dangling reference aborts; Interpolate's exhaustive collection is
        // deliberately not mirrored here.
        let mut dependencies: IndexMap<usize, Vec<String>> = IndexMap::new();
        for (index, field) in record.fields().iter().enumerate() {
            let mut vars: Vec<String> = Vec::new();
            for name in annotation::find_references(field.annotation()) {
                if vars.contains(&name) {
                    continue;
                }
                has_interpolation = true;
                if !providers.contains_key(&name) {
                    return Err(Error::dangling_reference(field.name(), name));
                }
                vars.push(name);
            }
            if !vars.is_empty() {
                dependencies.insert(index, vars);
            }
        }

        let mut analysis = Analysis {
            field_names,
            kinds,
            providers,
            dependencies,
            stages: Vec::new(),
            has_interpolation,
        };

        if has_interpolation {
            let graph = DependencyGraph::build(
                &analysis.dependencies,
                &analysis.providers,
                &analysis.field_names,
            )?;

            if let Some(cycle) = graph.detect_cycle() {
                return Err(Error::cyclic_dependency(cycle));
            }

            analysis.stages = graph.topological_sort()?;
            log::debug!(
                "interpolation analysis: {} field(s), {} stage(s)",
                analysis.field_names.len(),
                analysis.stages.len()
            );
        }

        self.analysis = Some(analysis);
        Ok(())
    }

    /// Whether the last analysis found any declaration or reference
    pub fn has_interpolation(&self) -> bool {
        self.analysis
            .as_ref()
            .map(|a| a.has_interpolation)
            .unwrap_or(false)
    }

    /// Fields grouped by dependency level. Empty before the first analysis
    /// and when no interpolation is needed.
    pub fn stages(&self) -> &[Vec<usize>] {
        self.analysis
            .as_ref()
            .map(|a| a.stages.as_slice())
            .unwrap_or(&[])
    }

    /// Add a field's resolved value to the interpolation context.
    ///
    /// No-op for fields without a declaration. The value is rendered to
    /// text per the field's declared kind; sequences, mappings, and opaque
    /// fields fail with an unsupported-value-type error.
    pub fn update_context(&mut self, index: usize, value: &FieldValue) -> Result<()> {
        let Some(analysis) = &self.analysis else {
            return Ok(());
        };
        let Some(name) = analysis
            .providers
            .iter()
            .find(|(_, &i)| i == index)
            .map(|(n, _)| n.clone())
        else {
            return Ok(());
        };

        let text = render_value(&analysis.field_names[index], analysis.kinds[index], value)?;
        log::trace!("interpolation context: {} = {}", name, text);
        self.context.insert(name, text);
        Ok(())
    }

    /// Compute the interpolated annotation text for the given fields.
    ///
    /// The record is never mutated; callers receive the resolved text and
    /// decide what to do with it (the chain driver feeds it to loaders as
    /// an annotation overlay).
    pub fn interpolate(&self, record: &Record, indices: &[usize]) -> Result<Vec<(usize, String)>> {
        let mut resolved = Vec::with_capacity(indices.len());
        for &index in indices {
            let field = record.field(index);
            let text = annotation::interpolate(field.annotation(), &self.context)
                .map_err(|e| e.with_field(field.name()))?;
            resolved.push((index, text));
        }
        Ok(resolved)
    }

    /// Defensive copy of the current context
    pub fn context(&self) -> IndexMap<String, String> {
        self.context.clone()
    }
}

/// Render a field value to its textual form for the context.
///
/// Unset values render as the declared kind's zero. Floats use the compact
/// shortest form (`1.0` -> `"1"`, `1.23e10` -> `"1.23e+10"`).
fn render_value(field: &str, kind: FieldKind, value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Sequence(_) | FieldValue::Mapping(_) => {
            Err(Error::unsupported_value_type(field, value.type_name()))
        }
        FieldValue::Null => match kind {
            FieldKind::Text => Ok(String::new()),
            FieldKind::SignedInt | FieldKind::UnsignedInt => Ok("0".into()),
            FieldKind::Float => Ok("0".into()),
            FieldKind::Bool => Ok("false".into()),
            FieldKind::Opaque => Err(Error::unsupported_value_type(field, kind.name())),
        },
        _ if kind == FieldKind::Opaque => {
            Err(Error::unsupported_value_type(field, value.type_name()))
        }
        FieldValue::Text(s) => Ok(s.clone()),
        FieldValue::Int(i) => Ok(i.to_string()),
        FieldValue::Uint(u) => Ok(u.to_string()),
        FieldValue::Float(f) => Ok(format_float(*f)),
        FieldValue::Bool(b) => Ok(b.to_string()),
    }
}

/// Format a float in its shortest round-trippable form.
///
/// Scientific notation with a two-digit signed exponent kicks in when the
/// decimal exponent is below -4 or at least 6; positional notation
/// otherwise. `NaN` and infinities are spelled out.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.into();
    }

    // `{:e}` already produces the shortest round-trippable mantissa
    let shortest = format!("{:e}", value);
    let (mantissa, exp) = shortest
        .split_once('e')
        .expect("exponential form always contains 'e'");
    let exp: i32 = exp.parse().expect("exponent is a decimal integer");
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if exp < -4 || exp >= 6 {
        let mut out = String::from(sign);
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exp.abs()));
        out
    } else if exp >= 0 {
        let point = exp as usize + 1;
        if digits.len() > point {
            format!("{}{}.{}", sign, &digits[..point], &digits[point..])
        } else {
            let zeros = "0".repeat(point - digits.len());
            format!("{}{}{}", sign, digits, zeros)
        }
    } else {
        let zeros = "0".repeat((-exp - 1) as usize);
        format!("{}0.{}{}", sign, zeros, digits)
    }
}
