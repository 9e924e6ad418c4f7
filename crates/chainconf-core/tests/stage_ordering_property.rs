//! Property tests for the staged load plan
//!
//! For any acyclic declaration/reference set, every field must land in a
//! strictly later stage than each of the fields providing the variables it
//! references, and the stages together must cover every field exactly once.

use chainconf_core::{Field, InterpolationEngine, Record};
use proptest::prelude::*;

/// Build a record of `n` fields where field `i` declares variable `Vi` and
/// references the variables of the given lower-indexed providers. Edges
/// always point from a lower index to a higher one, so the set is acyclic
/// by construction.
fn record_with_edges(n: usize, edges: &[(usize, usize)]) -> Record {
    let mut fields = Vec::with_capacity(n);
    for i in 0..n {
        let refs: String = edges
            .iter()
            .filter(|&&(_, dependent)| dependent == i)
            .map(|&(provider, _)| format!("${{V{}}}", provider))
            .collect();
        let annotation = if refs.is_empty() {
            format!(r#"config:"availableAs=V{}""#, i)
        } else {
            format!(r#"source:"{}" config:"availableAs=V{}""#, refs, i)
        };
        fields.push(Field::text(format!("F{}", i)).with_annotation(annotation));
    }
    Record::new(fields)
}

/// Normalize raw pairs into provider < dependent edges within `0..n`
fn normalize(n: usize, raw: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut edges: Vec<(usize, usize)> = raw
        .iter()
        .map(|&(a, b)| (a % n, b % n))
        .filter(|&(a, b)| a != b)
        .map(|(a, b)| (a.min(b), a.max(b)))
        .collect();
    edges.sort_unstable();
    edges.dedup();
    edges
}

proptest! {
    #[test]
    fn providers_always_resolve_in_earlier_stages(
        n in 2usize..8,
        raw in proptest::collection::vec((0usize..8, 0usize..8), 0..20),
    ) {
        let edges = normalize(n, &raw);
        let record = record_with_edges(n, &edges);

        let mut engine = InterpolationEngine::new();
        engine.analyze(&record).unwrap();

        // Every field appears in exactly one stage
        let stages = engine.stages();
        let mut stage_of = vec![None; n];
        for (level, stage) in stages.iter().enumerate() {
            for &index in stage {
                prop_assert!(stage_of[index].is_none(), "field {} staged twice", index);
                stage_of[index] = Some(level);
            }
        }
        prop_assert!(stage_of.iter().all(Option::is_some));

        // Each dependent sits strictly after all of its providers
        for &(provider, dependent) in &edges {
            prop_assert!(
                stage_of[dependent].unwrap() > stage_of[provider].unwrap(),
                "field {} (stage {:?}) must come after provider {} (stage {:?})",
                dependent,
                stage_of[dependent],
                provider,
                stage_of[provider],
            );
        }
    }

    #[test]
    fn substitution_is_identity_without_references(text in "[a-zA-Z0-9 /._-]{0,40}") {
        // No `${` can appear under this character class
        let context = [("ENV".to_string(), "prod".to_string())].into_iter().collect();
        let result = chainconf_core::annotation::interpolate(&text, &context).unwrap();
        prop_assert_eq!(result, text);
    }
}
