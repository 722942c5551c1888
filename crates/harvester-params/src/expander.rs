use harvester_core::{
    BaseParameters, ExpansionMode, JobDefinition, ParameterCombination, ParameterSource,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SourceWarning;
use crate::resolver::ValueSourceResolver;

/// Something the expander had to paper over. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpansionWarning {
    /// The mode name was not recognised; expanded as `SINGLE`.
    UnknownMode { mode: String },
    /// A varying mode with no active sources; nothing will be called.
    NoSources { mode: String },
    /// A source failed to resolve and contributed no values.
    Source(SourceWarning),
}

impl std::fmt::Display for ExpansionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpansionWarning::UnknownMode { mode } => {
                write!(f, "unknown expansion mode '{mode}', expanded as SINGLE")
            }
            ExpansionWarning::NoSources { mode } => {
                write!(f, "{mode} expansion has no active parameter sources")
            }
            ExpansionWarning::Source(w) => write!(f, "{w}"),
        }
    }
}

/// Result of one expansion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Expansion {
    pub combinations: Vec<ParameterCombination>,
    pub warnings: Vec<ExpansionWarning>,
}

impl Expansion {
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn source_warnings(&self) -> impl Iterator<Item = &SourceWarning> {
        self.warnings.iter().filter_map(|w| match w {
            ExpansionWarning::Source(s) => Some(s),
            _ => None,
        })
    }
}

/// Expands base parameters and parameter sources into concrete combinations.
#[derive(Clone, Default)]
pub struct ParameterSpaceExpander {
    resolver: ValueSourceResolver,
}

impl ParameterSpaceExpander {
    pub fn new(resolver: ValueSourceResolver) -> Self {
        Self { resolver }
    }

    pub async fn expand_job(&self, job: &JobDefinition) -> Expansion {
        self.expand(
            &job.base_parameters,
            &job.parameter_expansion_mode,
            &job.parameter_sources,
        )
        .await
    }

    pub async fn expand(
        &self,
        base: &BaseParameters,
        mode: &ExpansionMode,
        sources: &[ParameterSource],
    ) -> Expansion {
        let mut warnings = Vec::new();
        let combinations = match mode {
            ExpansionMode::Single => vec![ParameterCombination::from_base(base)],
            ExpansionMode::OneVarying => {
                self.expand_one_varying(base, sources, &mut warnings).await
            }
            ExpansionMode::Matrix => self.expand_matrix(base, sources, &mut warnings).await,
            ExpansionMode::Unknown(raw) => {
                warn!(mode = %raw, "unknown expansion mode, expanding as SINGLE");
                warnings.push(ExpansionWarning::UnknownMode { mode: raw.clone() });
                vec![ParameterCombination::from_base(base)]
            }
        };

        info!(
            mode = %mode,
            count = combinations.len(),
            warnings = warnings.len(),
            "parameter combinations generated"
        );
        Expansion {
            combinations,
            warnings,
        }
    }

    /// Only the first source (by sort order) varies; later sources are
    /// ignored even when configured.
    async fn expand_one_varying(
        &self,
        base: &BaseParameters,
        sources: &[ParameterSource],
        warnings: &mut Vec<ExpansionWarning>,
    ) -> Vec<ParameterCombination> {
        let ordered = ordered_sources(sources);
        let Some(first) = ordered.first() else {
            warn!("ONE_VARYING expansion has no active parameter sources");
            warnings.push(ExpansionWarning::NoSources {
                mode: ExpansionMode::OneVarying.to_string(),
            });
            return Vec::new();
        };

        let resolution = self.resolver.resolve(first).await;
        if let Some(w) = resolution.warning {
            warnings.push(ExpansionWarning::Source(w));
        }
        let name = first.parameter_name.as_str();
        resolution
            .values
            .iter()
            .map(|v| ParameterCombination::with_overrides(base, [(name, v.as_str())]))
            .collect()
    }

    async fn expand_matrix(
        &self,
        base: &BaseParameters,
        sources: &[ParameterSource],
        warnings: &mut Vec<ExpansionWarning>,
    ) -> Vec<ParameterCombination> {
        let ordered = ordered_sources(sources);
        if ordered.is_empty() {
            warn!("MATRIX expansion has no active parameter sources");
            warnings.push(ExpansionWarning::NoSources {
                mode: ExpansionMode::Matrix.to_string(),
            });
            return Vec::new();
        }

        let mut dimensions = Vec::with_capacity(ordered.len());
        for source in ordered {
            let resolution = self.resolver.resolve(source).await;
            info!(
                parameter = %source.parameter_name,
                count = resolution.values.len(),
                "parameter values resolved"
            );
            if let Some(w) = resolution.warning {
                warnings.push(ExpansionWarning::Source(w));
            }
            dimensions.push((source.parameter_name.clone(), resolution.values));
        }

        let dims: Vec<(&str, &[String])> = dimensions
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
            .collect();
        cartesian_product(base, &dims)
    }
}

/// Active sources ordered by `sort_order`; ties keep their listed order.
pub fn ordered_sources(sources: &[ParameterSource]) -> Vec<&ParameterSource> {
    let mut active: Vec<&ParameterSource> = sources.iter().filter(|s| s.is_active).collect();
    active.sort_by_key(|s| s.sort_order);
    active
}

/// Cartesian product of `dims` on top of `base`, first dimension outermost.
///
/// Walks a mixed-radix counter whose last digit turns fastest, which yields
/// the same order as nested loops. An empty dimension empties the product;
/// no dimensions at all yields the base parameters once.
pub fn cartesian_product(
    base: &BaseParameters,
    dims: &[(&str, &[String])],
) -> Vec<ParameterCombination> {
    if dims.iter().any(|(_, values)| values.is_empty()) {
        return Vec::new();
    }

    let total = dims
        .iter()
        .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()));
    let mut out = Vec::with_capacity(total.unwrap_or(0).min(1 << 16));
    let mut counter = vec![0usize; dims.len()];

    loop {
        out.push(ParameterCombination::with_overrides(
            base,
            dims.iter()
                .zip(&counter)
                .map(|((name, values), &i)| (*name, values[i].as_str())),
        ));

        let mut pos = dims.len();
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            counter[pos] += 1;
            if counter[pos] < dims[pos].1.len() {
                break;
            }
            counter[pos] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::SourceKind;
    use serde_json::json;

    fn base() -> BaseParameters {
        BaseParameters::from_json(r#"{"serviceKey":"k","numOfRows":100}"#).unwrap()
    }

    fn list(name: &str, values: &[&str], order: i32) -> ParameterSource {
        ParameterSource::new(name, SourceKind::StaticList, &json!(values).to_string())
            .with_sort_order(order)
    }

    fn broken(name: &str, order: i32) -> ParameterSource {
        ParameterSource::new(name, SourceKind::StaticList, "{not a list").with_sort_order(order)
    }

    fn expander() -> ParameterSpaceExpander {
        ParameterSpaceExpander::default()
    }

    fn values_of(expansion: &Expansion, key: &str) -> Vec<String> {
        expansion
            .combinations
            .iter()
            .map(|c| c.get_str(key).unwrap_or_default().to_string())
            .collect()
    }

    /// Nested-loop reference used to pin the enumeration order.
    fn recursive_product(
        base: &BaseParameters,
        dims: &[(&str, &[String])],
        chosen: &mut Vec<(String, String)>,
        out: &mut Vec<ParameterCombination>,
    ) {
        match dims.split_first() {
            None => out.push(ParameterCombination::with_overrides(
                base,
                chosen.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            )),
            Some(((name, values), rest)) => {
                for v in values.iter() {
                    chosen.push((name.to_string(), v.clone()));
                    recursive_product(base, rest, chosen, out);
                    chosen.pop();
                }
            }
        }
    }

    #[tokio::test]
    async fn single_ignores_sources() {
        let sources = vec![list("A", &["1", "2"], 0), broken("B", 1)];
        let e = expander()
            .expand(&base(), &ExpansionMode::Single, &sources)
            .await;
        assert_eq!(e.len(), 1);
        assert_eq!(e.combinations[0], ParameterCombination::from_base(&base()));
        assert!(e.warnings.is_empty());
    }

    #[tokio::test]
    async fn unknown_mode_degrades_to_single_with_warning() {
        let e = expander()
            .expand(
                &base(),
                &ExpansionMode::Unknown("ZIGZAG".to_string()),
                &[list("A", &["1"], 0)],
            )
            .await;
        assert_eq!(e.len(), 1);
        assert_eq!(
            e.warnings,
            vec![ExpansionWarning::UnknownMode {
                mode: "ZIGZAG".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn one_varying_uses_only_first_source() {
        // Known asymmetry: sources after the first are never expanded.
        let sources = vec![
            list("SECOND", &["x", "y", "z"], 2),
            list("FIRST", &["a", "b"], 1),
        ];
        let e = expander()
            .expand(&base(), &ExpansionMode::OneVarying, &sources)
            .await;
        assert_eq!(e.len(), 2);
        assert_eq!(values_of(&e, "FIRST"), vec!["a", "b"]);
        assert!(e.combinations.iter().all(|c| c.get("SECOND").is_none()));
        assert!(e
            .combinations
            .iter()
            .all(|c| c.get_str("serviceKey") == Some("k")));
    }

    #[tokio::test]
    async fn one_varying_without_sources_is_empty() {
        let e = expander()
            .expand(&base(), &ExpansionMode::OneVarying, &[])
            .await;
        assert!(e.is_empty());
        assert!(matches!(e.warnings[0], ExpansionWarning::NoSources { .. }));
    }

    #[tokio::test]
    async fn matrix_count_is_product_of_lengths() {
        let sources = vec![
            list("A", &["1", "2"], 0),
            list("B", &["x", "y", "z"], 1),
            list("C", &["p", "q"], 2),
        ];
        let e = expander()
            .expand(&base(), &ExpansionMode::Matrix, &sources)
            .await;
        assert_eq!(e.len(), 12);
        assert!(e.warnings.is_empty());
    }

    #[tokio::test]
    async fn matrix_outer_loop_is_lowest_sort_order() {
        let sources = vec![list("INNER", &["x", "y"], 5), list("OUTER", &["1", "2"], 1)];
        let e = expander()
            .expand(&base(), &ExpansionMode::Matrix, &sources)
            .await;
        assert_eq!(values_of(&e, "OUTER"), vec!["1", "1", "2", "2"]);
        assert_eq!(values_of(&e, "INNER"), vec!["x", "y", "x", "y"]);
    }

    #[tokio::test]
    async fn matrix_with_empty_factor_is_empty() {
        let sources = vec![list("A", &["1", "2"], 0), list("B", &[], 1)];
        let e = expander()
            .expand(&base(), &ExpansionMode::Matrix, &sources)
            .await;
        assert!(e.is_empty());
        assert!(e.warnings.is_empty());
    }

    #[tokio::test]
    async fn matrix_with_failed_source_is_empty_and_warns() {
        let sources = vec![list("A", &["1", "2"], 0), broken("B", 1)];
        let e = expander()
            .expand(&base(), &ExpansionMode::Matrix, &sources)
            .await;
        assert!(e.is_empty());
        let warned: Vec<_> = e.source_warnings().map(|w| w.parameter.as_str()).collect();
        assert_eq!(warned, vec!["B"]);
    }

    #[tokio::test]
    async fn inactive_sources_are_skipped() {
        let mut off = list("OFF", &["nope"], 0);
        off.is_active = false;
        let sources = vec![off, list("ON", &["1", "2"], 1)];
        let e = expander()
            .expand(&base(), &ExpansionMode::Matrix, &sources)
            .await;
        assert_eq!(e.len(), 2);
        assert!(e.combinations.iter().all(|c| c.get("OFF").is_none()));
    }

    #[tokio::test]
    async fn varying_value_overrides_base_key() {
        let sources = vec![list("numOfRows", &["10"], 0)];
        let e = expander()
            .expand(&base(), &ExpansionMode::Matrix, &sources)
            .await;
        assert_eq!(e.combinations[0].get_str("numOfRows"), Some("10"));
    }

    #[test]
    fn counter_order_matches_recursive_definition() {
        let a: Vec<String> = ["1", "2", "3"].iter().map(|s| s.to_string()).collect();
        let b: Vec<String> = ["x"].iter().map(|s| s.to_string()).collect();
        let c: Vec<String> = ["p", "q"].iter().map(|s| s.to_string()).collect();
        let dims: Vec<(&str, &[String])> =
            vec![("A", a.as_slice()), ("B", b.as_slice()), ("C", c.as_slice())];

        let mut expected = Vec::new();
        recursive_product(&base(), &dims, &mut Vec::new(), &mut expected);
        assert_eq!(cartesian_product(&base(), &dims), expected);
        assert_eq!(expected.len(), 6);
    }

    #[test]
    fn product_without_dimensions_is_base_once() {
        assert_eq!(
            cartesian_product(&base(), &[]),
            vec![ParameterCombination::from_base(&base())]
        );
    }
}
