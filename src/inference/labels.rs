//! Label resolution
//!
//! Maps the classifier's probability vector to a `Category` and its fixed
//! explanation. The output index of each category is an explicit part of
//! the `Category` definition and must match the order the model was
//! trained with.

use serde::{Deserialize, Serialize};

use crate::utils::{ClassifierError, Result};

/// Corn leaf condition predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Blight,
    Common,
    Gray,
    Healthy,
}

impl Category {
    /// All categories in model output order
    pub const ALL: [Category; 4] = [
        Category::Blight,  // 0
        Category::Common,  // 1
        Category::Gray,    // 2
        Category::Healthy, // 3
    ];

    /// Number of categories, and the length of every probability vector
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this category in the model's output vector
    pub fn output_index(self) -> usize {
        match self {
            Category::Blight => 0,
            Category::Common => 1,
            Category::Gray => 2,
            Category::Healthy => 3,
        }
    }

    /// Category at a model output position
    pub fn from_output_index(index: usize) -> Option<Category> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Blight => "Blight",
            Category::Common => "Common",
            Category::Gray => "Gray",
            Category::Healthy => "Healthy",
        }
    }

    pub fn explanation(self) -> &'static str {
        match self {
            Category::Blight => {
                "Blight is a disease caused by fungal or bacterial infections, which can lead \
                 to serious damage to the leaves and plants of corn."
            }
            Category::Common => {
                "Common refers to the condition of a corn plant that shows no clear signs of \
                 disease or visible disturbances."
            }
            Category::Gray => {
                "Gray indicates a possible infection or mild damage to the corn plant, which \
                 could be caused by environmental factors or a mild disease."
            }
            Category::Healthy => {
                "Healthy means the corn plant is in good condition with no signs of issues or \
                 disease."
            }
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub category: Category,
    pub explanation: &'static str,
    /// Probability of the predicted category
    pub confidence: f32,
}

/// Index of the largest value; ties go to the lowest index.
///
/// NaN entries are skipped wherever they sit. `None` when no entry is
/// comparable.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, current)| v > current) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Maps probability vectors to categories
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelResolver;

impl LabelResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, probabilities: &[f32]) -> Result<PredictionResult> {
        let index = argmax(probabilities)
            .ok_or_else(|| ClassifierError::Inference("no comparable probability in output".to_string()))?;
        let category =
            Category::from_output_index(index).ok_or(ClassifierError::UnknownCategory(index))?;

        Ok(PredictionResult {
            category,
            explanation: category.explanation(),
            confidence: probabilities[index],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_output_index_round_trips_for_every_category() {
        for (position, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.output_index(), position);
            assert_eq!(Category::from_output_index(position), Some(*category));
        }
        assert_eq!(Category::from_output_index(Category::COUNT), None);
    }

    #[test]
    fn test_explanation_table_is_total_and_distinct() {
        let explanations: HashSet<&str> =
            Category::ALL.iter().map(|c| c.explanation()).collect();
        assert_eq!(explanations.len(), Category::COUNT);
        for category in Category::ALL {
            assert!(category.explanation().starts_with(category.name()));
        }
    }

    #[test]
    fn test_category_serializes_as_name() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.name()));
        }
    }

    #[test]
    fn test_argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.15, 0.05]), Some(1));
        assert_eq!(argmax(&[0.0, 0.0, 0.0, 1.0]), Some(3));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_ties_resolve_to_lowest_index() {
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), Some(0));
        assert_eq!(argmax(&[0.1, 0.4, 0.1, 0.4]), Some(1));
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax(&[0.2, f32::NAN, 0.5, 0.3]), Some(2));
        assert_eq!(argmax(&[f32::NAN, 0.1, 0.9, 0.0]), Some(2));
        assert_eq!(argmax(&[f32::NAN, 0.4, 0.4, f32::NAN]), Some(1));
        assert_eq!(argmax(&[f32::NAN; 4]), None);
    }

    #[test]
    fn test_resolve_matches_argmax_for_every_position() {
        let resolver = LabelResolver::new();
        for winner in 0..Category::COUNT {
            // Runner-up placed on every other position, including lower ones.
            for runner_up in (0..Category::COUNT).filter(|&i| i != winner) {
                let mut probs = vec![0.05; Category::COUNT];
                probs[runner_up] = 0.3;
                probs[winner] = 0.6;

                let result = resolver.resolve(&probs).unwrap();
                assert_eq!(result.category.output_index(), winner);
                assert_eq!(result.explanation, result.category.explanation());
                assert_eq!(result.confidence, 0.6);
            }
        }
    }

    #[test]
    fn test_resolve_healthy() {
        let result = LabelResolver::new().resolve(&[0.01, 0.02, 0.07, 0.9]).unwrap();
        assert_eq!(result.category, Category::Healthy);
        assert_eq!(
            result.explanation,
            "Healthy means the corn plant is in good condition with no signs of issues or disease."
        );
    }

    #[test]
    fn test_resolve_out_of_range_index() {
        let err = LabelResolver::new()
            .resolve(&[0.1, 0.1, 0.1, 0.1, 0.6])
            .unwrap_err();
        assert!(matches!(err, ClassifierError::UnknownCategory(4)));
    }

    #[test]
    fn test_resolve_all_nan_vector() {
        let err = LabelResolver::new().resolve(&[f32::NAN; 4]).unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
    }

    #[test]
    fn test_resolve_nan_at_first_position() {
        let result = LabelResolver::new()
            .resolve(&[f32::NAN, 0.1, 0.2, 0.7])
            .unwrap();
        assert_eq!(result.category, Category::Healthy);
    }

    #[test]
    fn test_resolve_empty_vector() {
        let err = LabelResolver::new().resolve(&[]).unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
    }
}
