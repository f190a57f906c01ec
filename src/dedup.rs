//! Deduplication of source parameter tuples into a generator pool.
use std::collections::HashMap;

use crate::source::{ParameterKey, SourceParameters};

/// The result of deduplicating a flat sequence of parameter tuples.
///
/// `unique[spec_to_generator[i]]` equals the i-th input tuple for all i.
#[derive(Debug, PartialEq)]
pub struct Deduplication {
    /// The unique parameter tuples, in order of first occurrence.
    pub unique: Vec<SourceParameters>,
    /// For each input tuple, the index of its generator in `unique`.
    pub spec_to_generator: Vec<usize>,
}

/// Collapse structurally identical parameter tuples into a single generator.
///
/// Equality is exact (bit-for-bit over every field, see
/// [`SourceParameters::key`]); the unique tuples are ordered by first
/// occurrence, which keeps backend creation order aligned with submission
/// order.
pub fn deduplicate<'a, I>(parameters: I) -> Deduplication
where
    I: IntoIterator<Item = &'a SourceParameters>,
{
    let mut unique: Vec<SourceParameters> = Vec::new();
    let mut spec_to_generator: Vec<usize> = Vec::new();
    let mut index_of: HashMap<ParameterKey, usize> = HashMap::new();

    for tuple in parameters {
        let index = *index_of.entry(tuple.key()).or_insert_with(|| {
            unique.push(tuple.clone());
            unique.len() - 1
        });
        spec_to_generator.push(index);
    }

    Deduplication {
        unique,
        spec_to_generator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poisson(rate: f64) -> SourceParameters {
        SourceParameters::Poisson { rate }
    }

    #[test]
    fn test_deduplicate_identical() {
        let parameters = vec![poisson(2000.0), poisson(2000.0)];
        let dedup = deduplicate(&parameters);
        assert_eq!(dedup.unique, vec![poisson(2000.0)]);
        assert_eq!(dedup.spec_to_generator, vec![0, 0]);
    }

    #[test]
    fn test_deduplicate_first_occurrence_order() {
        let parameters = vec![
            poisson(3000.0),
            poisson(1000.0),
            poisson(3000.0),
            poisson(2000.0),
            poisson(1000.0),
        ];
        let dedup = deduplicate(&parameters);
        assert_eq!(
            dedup.unique,
            vec![poisson(3000.0), poisson(1000.0), poisson(2000.0)]
        );
        assert_eq!(dedup.spec_to_generator, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn test_deduplicate_reconstructs_input() {
        let parameters = vec![
            poisson(5.0),
            poisson(3.0),
            poisson(5.0),
            poisson(3.0),
            poisson(7.0),
        ];
        let dedup = deduplicate(&parameters);
        for (i, tuple) in parameters.iter().enumerate() {
            assert_eq!(&dedup.unique[dedup.spec_to_generator[i]], tuple);
        }
    }

    #[test]
    fn test_deduplicate_count_invariant_under_permutation() {
        let parameters = vec![poisson(1.0), poisson(2.0), poisson(1.0), poisson(3.0)];
        let permuted = vec![poisson(3.0), poisson(1.0), poisson(1.0), poisson(2.0)];
        assert_eq!(
            deduplicate(&parameters).unique.len(),
            deduplicate(&permuted).unique.len()
        );
    }

    #[test]
    fn test_deduplicate_no_tolerance() {
        let parameters = vec![poisson(2000.0), poisson(2000.0 + 1e-9)];
        let dedup = deduplicate(&parameters);
        assert_eq!(dedup.unique.len(), 2);
    }

    #[test]
    fn test_deduplicate_empty() {
        let parameters: Vec<SourceParameters> = vec![];
        let dedup = deduplicate(&parameters);
        assert!(dedup.unique.is_empty());
        assert!(dedup.spec_to_generator.is_empty());
    }
}
