//! Receptor classification of wiring edges by weight sign.
use serde::{Deserialize, Serialize};

use crate::error::StimError;

/// The receptor type of a wiring edge.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Receptor {
    Excitatory,
    Inhibitory,
}

impl Receptor {
    /// The canonical classification rule: positive weights are excitatory,
    /// non-positive weights (zero included) are inhibitory.
    pub fn from_weight(weight: f64) -> Self {
        if weight > 0.0 {
            Receptor::Excitatory
        } else {
            Receptor::Inhibitory
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Receptor::Excitatory => "excitatory",
            Receptor::Inhibitory => "inhibitory",
        }
    }
}

/// Classify a weight vector with the canonical rule.
pub fn classify(weights: &[f64]) -> Vec<Receptor> {
    weights.iter().map(|w| Receptor::from_weight(*w)).collect()
}

/// Reject a weight vector that carries only one receptor sign.
///
/// Used for shared-generator (calibration) topologies, where a population
/// must receive both excitatory and inhibitory noise.
pub fn check_mixed_signs(weights: &[f64]) -> Result<(), StimError> {
    if weights.iter().all(|w| *w > 0.0) {
        return Err(StimError::DegenerateConfiguration(
            "noise weights are all excitatory".to_string(),
        ));
    }
    if weights.iter().all(|w| *w <= 0.0) {
        return Err(StimError::DegenerateConfiguration(
            "noise weights are all inhibitory".to_string(),
        ));
    }
    Ok(())
}

/// Re-check classified edges against the canonical rule.
///
/// This is an internal consistency audit over the assembled wiring, not a
/// user-facing validation; it fires only if some code path classified a
/// weight with a different rule.
pub fn audit_sign_policy<'a, I>(edges: I) -> Result<(), StimError>
where
    I: IntoIterator<Item = (f64, &'a Receptor)>,
{
    for (weight, receptor) in edges {
        if Receptor::from_weight(weight) != *receptor {
            return Err(StimError::SignPolicyViolation(format!(
                "weight {} classified as {}",
                weight,
                receptor.as_str()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_rule() {
        assert_eq!(Receptor::from_weight(0.001), Receptor::Excitatory);
        assert_eq!(Receptor::from_weight(-0.001), Receptor::Inhibitory);
        // zero is always inhibitory
        assert_eq!(Receptor::from_weight(0.0), Receptor::Inhibitory);
        assert_eq!(Receptor::from_weight(-0.0), Receptor::Inhibitory);
    }

    #[test]
    fn test_classify_covers_all_specs() {
        let weights = [0.5, -0.5, 0.0, 1.0];
        let receptors = classify(&weights);
        let num_exc = receptors
            .iter()
            .filter(|r| **r == Receptor::Excitatory)
            .count();
        let num_inh = receptors
            .iter()
            .filter(|r| **r == Receptor::Inhibitory)
            .count();
        assert_eq!(num_exc + num_inh, weights.len());
        assert_eq!(num_exc, 2);
    }

    #[test]
    fn test_mixed_sign_guard() {
        assert_eq!(
            check_mixed_signs(&[0.1, 0.2]),
            Err(StimError::DegenerateConfiguration(
                "noise weights are all excitatory".to_string()
            ))
        );
        assert_eq!(
            check_mixed_signs(&[-0.1, -0.2]),
            Err(StimError::DegenerateConfiguration(
                "noise weights are all inhibitory".to_string()
            ))
        );
        // zero counts as inhibitory
        assert_eq!(
            check_mixed_signs(&[0.0, -0.2]),
            Err(StimError::DegenerateConfiguration(
                "noise weights are all inhibitory".to_string()
            ))
        );
        assert_eq!(check_mixed_signs(&[0.1, -0.2]), Ok(()));
        assert_eq!(check_mixed_signs(&[0.1, 0.0]), Ok(()));
    }

    #[test]
    fn test_sign_policy_audit() {
        let receptors = [Receptor::Excitatory, Receptor::Inhibitory];
        assert_eq!(
            audit_sign_policy([0.1, -0.1].iter().copied().zip(receptors.iter())),
            Ok(())
        );
        assert!(matches!(
            audit_sign_policy([-0.1, -0.1].iter().copied().zip(receptors.iter())),
            Err(StimError::SignPolicyViolation(_))
        ));
    }
}
