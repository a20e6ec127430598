use std::collections::BTreeMap;

use tracing::debug;

use crate::value::{strip_angles, Term};

/// One solution as returned by the store: variable name to bound term.
/// Unbound variables are simply missing.
pub type Solution = BTreeMap<String, Term>;

/// All bindings for one subject, gathered across solutions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatRow {
    pub iri: String,
    pub bindings: BTreeMap<String, Vec<Term>>,
}

impl FlatRow {
    pub fn new(iri: &str) -> Self {
        FlatRow {
            iri: strip_angles(iri).to_string(),
            bindings: BTreeMap::new(),
        }
    }

    /// Add a binding unless the same term is already recorded
    pub fn bind(&mut self, var: &str, term: Term) {
        let terms = self.bindings.entry(var.to_string()).or_default();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    pub fn get(&self, var: &str) -> &[Term] {
        self.bindings.get(var).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Group solutions by `?iri`, keeping first-seen subject order.
///
/// Multi-valued predicates come back as one solution per value; grouping
/// folds them into a single row per subject. Solutions without `?iri` are
/// dropped.
pub fn group_rows(solutions: Vec<Solution>) -> Vec<FlatRow> {
    let mut rows: Vec<FlatRow> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for solution in solutions {
        let Some(subject) = solution.get("iri") else {
            debug!("dropping solution without ?iri");
            continue;
        };
        let iri = strip_angles(subject.lexical()).to_string();
        let pos = *index.entry(iri.clone()).or_insert_with(|| {
            rows.push(FlatRow::new(&iri));
            rows.len() - 1
        });
        for (var, term) in solution {
            if var != "iri" {
                rows[pos].bind(&var, term);
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(pairs: &[(&str, Term)]) -> Solution {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_group_by_subject() {
        let a = Term::iri("http://x.test#Software-a");
        let b = Term::iri("http://x.test#Software-b");
        let rows = group_rows(vec![
            solution(&[("iri", b.clone()), ("name", Term::literal("zeta"))]),
            solution(&[("iri", a.clone()), ("labels", Term::iri("l1"))]),
            solution(&[("iri", a.clone()), ("labels", Term::iri("l2"))]),
            solution(&[("iri", a), ("labels", Term::iri("l1"))]),
            solution(&[("name", Term::literal("orphan"))]),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iri, "http://x.test#Software-b");
        assert_eq!(rows[1].get("labels").len(), 2);
        assert!(rows[1].get("name").is_empty());
    }
}
