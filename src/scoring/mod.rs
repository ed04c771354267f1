//! Weighted aggregation of category scores
//!
//! Every category has a fixed weight. The overall score is the weighted mean
//! of the measured categories only, with the weights of unmeasured
//! categories redistributed proportionally. Sums always run in weight-table
//! order so identical inputs give bit-identical results.

use crate::checks::{round1, Category, CategoryScore, CheckerReport, Effort, Finding, Severity};
use serde::Serialize;
use std::fmt;

/// Category weights, summing to 100
pub const WEIGHTS: [(Category, f64); 7] = [
    (Category::Technical, 25.0),
    (Category::Content, 25.0),
    (Category::OnPage, 20.0),
    (Category::Schema, 10.0),
    (Category::Performance, 10.0),
    (Category::Images, 5.0),
    (Category::AiReadiness, 5.0),
];

/// Maximum number of quick wins surfaced in reports
pub const MAX_QUICK_WINS: usize = 5;

/// Reason used when no scored checker reported on a category
const NOT_RUN: &str = "checker did not run";

pub fn weight(category: Category) -> f64 {
    WEIGHTS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, w)| *w)
        .unwrap_or(0.0)
}

/// Effective weights of the `measured` categories, rescaled to sum to 100
///
/// Returned in weight-table order; categories outside `measured` are absent.
pub fn renormalized_weights(measured: &[Category]) -> Vec<(Category, f64)> {
    let total: f64 = WEIGHTS
        .iter()
        .filter(|(c, _)| measured.contains(c))
        .map(|(_, w)| w)
        .sum();
    if total <= 0.0 {
        return Vec::new();
    }
    WEIGHTS
        .iter()
        .filter(|(c, _)| measured.contains(c))
        .map(|(c, w)| (*c, w / total * 100.0))
        .collect()
}

/// Score band of an overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Excellent,
    Strong,
    Good,
    NeedsImprovement,
    AtRisk,
}

impl Band {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 80.0 {
            Self::Strong
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::NeedsImprovement
        } else {
            Self::AtRisk
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Strong => "Strong",
            Self::Good => "Good",
            Self::NeedsImprovement => "Needs Improvement",
            Self::AtRisk => "At Risk",
        }
    }

    pub fn grade(&self) -> Grade {
        match self {
            Self::Excellent => Grade::A,
            Self::Strong => Grade::B,
            Self::Good => Grade::C,
            Self::NeedsImprovement => Grade::D,
            Self::AtRisk => Grade::F,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Letter grade at the band cut-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        write!(f, "{}", letter)
    }
}

/// Score of one category as it enters the overall score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResult {
    pub category: Category,
    /// Weight from the fixed table
    pub weight: f64,
    /// Renormalized weight, `None` when not measured
    pub effective_weight: Option<f64>,
    pub score: CategoryScore,
}

/// All category scores plus the overall score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub overall: f64,
    pub band: Band,
    pub grade: Grade,
    /// Weight-table order
    pub categories: Vec<CategoryResult>,
}

impl Scorecard {
    pub fn measured(&self) -> impl Iterator<Item = &CategoryResult> {
        self.categories.iter().filter(|c| c.score.is_measured())
    }

    pub fn get(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Builds the scorecard from checker reports
///
/// Only reports that contribute a score are considered; the first such
/// report per category wins.
pub fn score(reports: &[CheckerReport]) -> Scorecard {
    let scores: Vec<(Category, CategoryScore)> = WEIGHTS
        .iter()
        .map(|(category, _)| {
            let score = reports
                .iter()
                .filter(|r| r.contributes_score && r.category == *category)
                .find_map(|r| r.score.clone())
                .unwrap_or_else(|| CategoryScore::not_measured(NOT_RUN));
            (*category, score)
        })
        .collect();
    scorecard(scores)
}

/// Builds the scorecard from one score per category
pub fn scorecard(scores: Vec<(Category, CategoryScore)>) -> Scorecard {
    let measured: Vec<Category> = scores
        .iter()
        .filter(|(_, s)| s.is_measured())
        .map(|(c, _)| *c)
        .collect();
    let effective = renormalized_weights(&measured);

    let overall = overall(&scores);
    let band = Band::from_score(overall);

    let categories = WEIGHTS
        .iter()
        .map(|(category, weight)| {
            let score = scores
                .iter()
                .find(|(c, _)| c == category)
                .map(|(_, s)| s.clone())
                .unwrap_or_else(|| CategoryScore::not_measured(NOT_RUN));
            let effective_weight = effective
                .iter()
                .find(|(c, _)| c == category)
                .map(|(_, w)| (w * 100.0).round() / 100.0);
            CategoryResult {
                category: *category,
                weight: *weight,
                effective_weight,
                score,
            }
        })
        .collect();

    Scorecard {
        overall,
        band,
        grade: band.grade(),
        categories,
    }
}

/// Weighted mean over measured categories, one decimal, 0 when none measured
pub fn overall(scores: &[(Category, CategoryScore)]) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (category, weight) in WEIGHTS.iter() {
        let value = scores
            .iter()
            .find(|(c, _)| c == category)
            .and_then(|(_, s)| s.value());
        if let Some(value) = value {
            weighted += value * weight;
            total += weight;
        }
    }
    if total <= 0.0 {
        return 0.0;
    }
    round1(weighted / total)
}

/// Critical and High findings that take little effort, most urgent first
pub fn quick_wins(findings: &[Finding]) -> Vec<&Finding> {
    let mut wins: Vec<&Finding> = findings
        .iter()
        .filter(|f| matches!(f.severity, Severity::Critical | Severity::High))
        .filter(|f| f.effort == Effort::Low)
        .collect();
    wins.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    wins.truncate(MAX_QUICK_WINS);
    wins
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_measured(value: f64) -> Vec<(Category, CategoryScore)> {
        Category::ALL
            .iter()
            .map(|c| (*c, CategoryScore::measured(value)))
            .collect()
    }

    #[test]
    fn test_weights_sum_to_100() {
        let total: f64 = WEIGHTS.iter().map(|(_, w)| w).sum();
        assert_eq!(total, 100.0);
        assert_eq!(weight(Category::OnPage), 20.0);
    }

    #[test]
    fn test_renormalized_weights_sum_to_100_for_every_subset() {
        for mask in 1u32..(1 << 7) {
            let measured: Vec<Category> = Category::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| *c)
                .collect();
            let sum: f64 = renormalized_weights(&measured).iter().map(|(_, w)| w).sum();
            assert!((sum - 100.0).abs() < 1e-6, "mask {:b} sums to {}", mask, sum);
        }
        assert!(renormalized_weights(&[]).is_empty());
    }

    #[test]
    fn test_unmeasured_performance_redistributes_weight() {
        let measured: Vec<Category> = Category::ALL
            .iter()
            .copied()
            .filter(|c| *c != Category::Performance)
            .collect();
        let weights = renormalized_weights(&measured);
        assert_eq!(weights.len(), 6);
        let technical = weights.iter().find(|(c, _)| *c == Category::Technical).unwrap().1;
        assert!((technical - 25.0 / 90.0 * 100.0).abs() < 1e-9);
        assert!((technical - 27.78).abs() < 0.01);
    }

    #[test]
    fn test_overall_ignores_unmeasured() {
        let mut scores = all_measured(80.0);
        scores[4] = (Category::Performance, CategoryScore::not_measured("no API key"));
        assert_eq!(overall(&scores), 80.0);

        scores[0] = (Category::Technical, CategoryScore::measured(50.0));
        // (50*25 + 80*65) / 90
        assert_eq!(overall(&scores), 71.7);
    }

    #[test]
    fn test_overall_zero_when_nothing_measured() {
        let scores: Vec<_> = Category::ALL
            .iter()
            .map(|c| (*c, CategoryScore::not_measured("no pages")))
            .collect();
        assert_eq!(overall(&scores), 0.0);
        assert_eq!(scorecard(scores).band, Band::AtRisk);
    }

    #[test]
    fn test_bands_and_grades() {
        assert_eq!(Band::from_score(90.0), Band::Excellent);
        assert_eq!(Band::from_score(89.9), Band::Strong);
        assert_eq!(Band::from_score(70.0), Band::Good);
        assert_eq!(Band::from_score(60.0).label(), "Needs Improvement");
        assert_eq!(Band::from_score(12.0).grade(), Grade::F);
        assert_eq!(Band::Strong.grade().to_string(), "B");
    }

    #[test]
    fn test_scorecard_from_reports() {
        let report = |category: Category, contributes: bool, score: f64| CheckerReport {
            checker: category.key().to_string(),
            category,
            contributes_score: contributes,
            score: Some(CategoryScore::measured(score)),
            findings: Vec::new(),
            artifacts: Vec::new(),
        };
        let reports = vec![
            report(Category::Technical, true, 90.0),
            // findings-only reports never score
            report(Category::Technical, false, 0.0),
            report(Category::Content, true, 70.0),
        ];
        let card = score(&reports);

        assert_eq!(card.overall, 80.0);
        assert_eq!(card.grade, Grade::B);
        assert_eq!(card.measured().count(), 2);
        assert_eq!(card.get(Category::Technical).unwrap().effective_weight, Some(50.0));
        assert_eq!(card.get(Category::Schema).unwrap().effective_weight, None);
        assert!(!card.get(Category::Schema).unwrap().score.is_measured());
    }

    #[test]
    fn test_scores_deterministic() {
        let scores: Vec<_> = Category::ALL
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, CategoryScore::measured(33.3 + i as f64 * 7.1)))
            .collect();
        let mut reversed = scores.clone();
        reversed.reverse();
        assert_eq!(overall(&scores), overall(&reversed));
    }

    #[test]
    fn test_quick_wins() {
        let finding = |severity: Severity, effort: Effort, title: &str| {
            Finding::new(Category::Technical, severity, title, "").effort(effort)
        };
        let mut findings = vec![
            finding(Severity::High, Effort::Low, "b"),
            finding(Severity::Critical, Effort::High, "hard"),
            finding(Severity::Medium, Effort::Low, "medium"),
            finding(Severity::Critical, Effort::Low, "a"),
        ];
        for i in 0..6 {
            findings.push(finding(Severity::High, Effort::Low, &format!("z{}", i)));
        }
        let wins = quick_wins(&findings);
        assert_eq!(wins.len(), MAX_QUICK_WINS);
        assert_eq!(wins[0].title, "a");
        assert_eq!(wins[1].title, "b");
        assert!(wins.iter().all(|f| f.effort == Effort::Low));
    }
}
