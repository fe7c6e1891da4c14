use crate::domain::model::{BusinessLabel, LabelShare, SummaryReport};
use std::collections::HashMap;

/// 計算各標籤佔整批的百分比 (含 Unknown)
#[derive(Debug, Clone, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// 依筆數遞減排序，同筆數依 Churn、No Churn、Unknown 的順序
    pub fn summarize(&self, labels: &[BusinessLabel]) -> SummaryReport {
        if labels.is_empty() {
            return SummaryReport::default();
        }

        let mut counts: HashMap<BusinessLabel, usize> = HashMap::new();
        for label in labels {
            *counts.entry(*label).or_insert(0) += 1;
        }

        let total = labels.len();
        let mut entries: Vec<LabelShare> = counts
            .into_iter()
            .map(|(label, count)| LabelShare {
                label,
                count,
                percentage: count as f64 * 100.0 / total as f64,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.label.cmp(&b.label)));

        SummaryReport { total, entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_returns_empty_report() {
        let report = Aggregator::new().summarize(&[]);
        assert!(report.is_empty());
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_percentages_include_unknown() {
        let labels = [
            BusinessLabel::Churn,
            BusinessLabel::NoChurn,
            BusinessLabel::NoChurn,
            BusinessLabel::Unknown,
        ];
        let report = Aggregator::new().summarize(&labels);

        assert_eq!(report.total, 4);
        assert_eq!(report.percentage_of(BusinessLabel::NoChurn), Some(50.0));
        assert_eq!(report.percentage_of(BusinessLabel::Churn), Some(25.0));
        assert_eq!(report.percentage_of(BusinessLabel::Unknown), Some(25.0));
        assert_eq!(report.entries[0].label, BusinessLabel::NoChurn);
        assert_eq!(report.entries[1].label, BusinessLabel::Churn);
    }

    #[test]
    fn test_only_present_labels_are_reported() {
        let report = Aggregator::new().summarize(&[BusinessLabel::Churn; 5]);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.percentage_of(BusinessLabel::NoChurn), None);
        assert_eq!(report.total_percentage(), 100.0);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        for n in 1..=50usize {
            let labels: Vec<BusinessLabel> = (0..n)
                .map(|i| BusinessLabel::ALL[(i * 7 + n) % 3])
                .collect();
            let report = Aggregator::new().summarize(&labels);

            assert!((report.total_percentage() - 100.0).abs() < 1e-6, "n = {n}");
            assert_eq!(
                report.entries.iter().map(|e| e.count).sum::<usize>(),
                n
            );
        }
    }
}
