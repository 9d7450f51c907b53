//! Seleção de colunas por nome literal ou padrão glob.

use globset::{Glob, GlobMatcher};
use std::collections::HashSet;

use crate::error::ConfigError;

/// Indica se o nome deve ser tratado como padrão glob.
///
/// Só `*` e `?` marcam um padrão; `Q1[SQ001]` continua sendo um nome literal.
pub fn is_glob_pattern(name: &str) -> bool {
    name.contains(['*', '?'])
}

/// Compila um padrão glob no estilo `fnmatch`
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, ConfigError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| ConfigError::InvalidValue {
            param: "pattern".to_string(),
            value: format!("{} ({})", pattern, e),
        })
}

/// Seleciona colunas a partir de nomes literais e/ou padrões
#[derive(Debug, Clone, Default)]
pub struct ColumnSelector {
    names: Vec<String>,
    patterns: Vec<(String, GlobMatcher)>,
}

impl ColumnSelector {
    pub fn new<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selector = Self::default();
        for entry in entries {
            let entry = entry.into();
            if is_glob_pattern(&entry) {
                let matcher = compile_glob(&entry)?;
                selector.patterns.push((entry, matcher));
            } else {
                selector.names.push(entry);
            }
        }
        Ok(selector)
    }

    pub fn is_match(&self, column: &str) -> bool {
        self.names.iter().any(|n| n == column)
            || self.patterns.iter().any(|(p, m)| p == column || m.is_match(column))
    }

    /// Subconjunto dos candidatos selecionados, na ordem dos candidatos e sem repetições
    pub fn select<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| self.is_match(c))
            .filter(|c| seen.insert(c.to_string()))
            .map(str::to_string)
            .collect()
    }
}

impl std::fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .chain(self.patterns.iter().map(|(p, _)| p.as_str()))
            .collect();
        write!(f, "{}", entries.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<&'static str> {
        vec!["id", "Q1", "Q10_1", "Q10_2", "Q2", "Q1", "timestamp"]
    }

    #[test]
    fn test_literals_and_patterns_preserve_candidate_order() {
        let selector = ColumnSelector::new(["Q2", "Q10_*", "id"]).unwrap();
        assert_eq!(selector.select(&candidates()), vec!["id", "Q10_1", "Q10_2", "Q2"]);
    }

    #[test]
    fn test_select_never_duplicates() {
        let selector = ColumnSelector::new(["Q1", "Q?"]).unwrap();
        assert_eq!(selector.select(&candidates()), vec!["Q1", "Q2"]);
    }

    #[test]
    fn test_select_is_subset_for_many_configurations() {
        let configs: Vec<Vec<&str>> = vec![
            vec![],
            vec!["*"],
            vec!["nope"],
            vec!["Q*", "Q1"],
            vec!["[it]*", "Q10_?"],
        ];
        let input = candidates();
        for config in configs {
            let selector = ColumnSelector::new(config.clone()).unwrap();
            let selected = selector.select(&input);

            let mut last = None;
            for name in &selected {
                let pos = input.iter().position(|c| c == name).expect("subconjunto");
                assert!(last.map_or(true, |l| pos > l), "ordem preservada para {:?}", config);
                last = Some(pos);
            }
            let unique: HashSet<_> = selected.iter().collect();
            assert_eq!(unique.len(), selected.len());
        }
    }

    #[test]
    fn test_invalid_glob() {
        assert!(ColumnSelector::new(["Q[1*"]).is_err());
    }

    #[test]
    fn test_brackets_in_literal_names() {
        let selector = ColumnSelector::new(["Q1[SQ001]", "Q[23]*"]).unwrap();
        let input = vec!["Q1[SQ001]", "Q1S", "Q3[SQ001]", "Q4"];
        assert_eq!(selector.select(&input), vec!["Q1[SQ001]", "Q3[SQ001]"]);
        assert!(selector.is_match("Q[23]*"));
    }
}
