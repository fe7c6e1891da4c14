use crate::domain::model::{MappingOutcome, RawPrediction, UnmappableReason};

/// 將模型原始分數轉成業務標籤；永遠不回傳錯誤
#[derive(Debug, Clone)]
pub struct PredictionMapper {
    positive_class: String,
}

impl PredictionMapper {
    pub fn new(positive_class: impl Into<String>) -> Self {
        Self {
            positive_class: positive_class.into(),
        }
    }

    pub fn map(&self, prediction: &RawPrediction) -> MappingOutcome {
        let scores = &prediction.scores;
        let classes = &prediction.classes;

        if scores.is_empty() {
            return MappingOutcome::Unknown(UnmappableReason::EmptyScores);
        }
        if scores.len() != classes.len() {
            return MappingOutcome::Unknown(UnmappableReason::LengthMismatch {
                scores: scores.len(),
                classes: classes.len(),
            });
        }
        if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
            return MappingOutcome::Unknown(UnmappableReason::NonFiniteScore { index });
        }

        // 同分時取最前面的索引
        let (max_index, max_score) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, scores[0]), |best, (i, s)| if s > best.1 { (i, s) } else { best });

        let class = &classes[max_index];
        if class.trim().is_empty() {
            return MappingOutcome::Unknown(UnmappableReason::MissingClass { index: max_index });
        }

        if *class == self.positive_class {
            MappingOutcome::Affirmative {
                class: class.clone(),
                score: max_score,
            }
        } else {
            MappingOutcome::Negative {
                class: class.clone(),
                score: max_score,
            }
        }
    }

    pub fn map_all(&self, predictions: &[RawPrediction]) -> Vec<MappingOutcome> {
        predictions.iter().map(|p| self.map(p)).collect()
    }
}

impl Default for PredictionMapper {
    fn default() -> Self {
        Self::new("1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BusinessLabel;

    #[test]
    fn test_max_score_on_positive_class_is_churn() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::new(vec![0.2, 0.8], vec!["0", "1"]));

        assert_eq!(outcome.label(), BusinessLabel::Churn);
        assert_eq!(
            outcome,
            MappingOutcome::Affirmative {
                class: "1".into(),
                score: 0.8
            }
        );
    }

    #[test]
    fn test_max_score_on_other_class_is_no_churn() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::new(vec![0.6, 0.4], vec!["0", "1"]));
        assert_eq!(outcome.label(), BusinessLabel::NoChurn);
    }

    #[test]
    fn test_tie_takes_first_index() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::new(vec![0.5, 0.5], vec!["0", "1"]));
        assert_eq!(outcome.label(), BusinessLabel::NoChurn);

        let outcome = mapper.map(&RawPrediction::new(vec![0.5, 0.5], vec!["1", "0"]));
        assert_eq!(outcome.label(), BusinessLabel::Churn);
    }

    #[test]
    fn test_empty_scores_is_unknown() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::default());
        assert_eq!(
            outcome,
            MappingOutcome::Unknown(UnmappableReason::EmptyScores)
        );
    }

    #[test]
    fn test_length_mismatch_is_unknown() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::new(vec![0.1, 0.9], vec!["0"]));
        assert_eq!(
            outcome,
            MappingOutcome::Unknown(UnmappableReason::LengthMismatch {
                scores: 2,
                classes: 1
            })
        );
    }

    #[test]
    fn test_nan_score_is_unknown() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::new(vec![f64::NAN, 0.9], vec!["0", "1"]));
        assert_eq!(outcome.label(), BusinessLabel::Unknown);
    }

    #[test]
    fn test_blank_class_is_unknown() {
        let mapper = PredictionMapper::default();
        let outcome = mapper.map(&RawPrediction::new(vec![0.9, 0.1], vec!["", "1"]));
        assert_eq!(
            outcome,
            MappingOutcome::Unknown(UnmappableReason::MissingClass { index: 0 })
        );
    }

    #[test]
    fn test_custom_positive_class() {
        let mapper = PredictionMapper::new("churned");
        let outcome = mapper.map(&RawPrediction::new(vec![0.3, 0.7], vec!["stayed", "churned"]));
        assert_eq!(outcome.label(), BusinessLabel::Churn);
    }

    #[test]
    fn test_labels_stay_in_fixed_set() {
        let mapper = PredictionMapper::default();
        let inputs = vec![
            RawPrediction::new(vec![0.1, 0.9], vec!["0", "1"]),
            RawPrediction::new(vec![0.9], vec!["0"]),
            RawPrediction::new(vec![], vec!["0"]),
            RawPrediction::new(vec![0.2, 0.3, 0.5], vec!["a", "b", "c"]),
        ];

        let outcomes = mapper.map_all(&inputs);
        assert_eq!(outcomes.len(), inputs.len());
        assert!(outcomes
            .iter()
            .all(|o| BusinessLabel::ALL.contains(&o.label())));
    }
}
