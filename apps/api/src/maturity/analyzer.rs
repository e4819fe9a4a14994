use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::opportunities::{self, Opportunity, MAX_SCORE};
use super::parser::{parse_axes, Axis};
use super::recommendations::Recommendations;
use super::records::{parse_records, FlatRecord};
use super::sheet::{load_grid, SheetError};

pub const EVALUATION_ARCHITECTURE: &str = "architecture";
pub const EVALUATION_DEVSECOPS: &str = "devsecops";

static AXIS_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^axe\s*\d+\s*[-–:]\s*").unwrap());

/// Everything read from the uploaded spreadsheet, before any scoring.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub axes: Vec<Axis>,
    pub records: Vec<FlatRecord>,
}

impl ParsedSheet {
    /// Blocking: loads the grid and runs both parsing passes over it.
    pub fn from_upload(file_name: &str, bytes: &[u8]) -> Result<Self, SheetError> {
        let grid = load_grid(file_name, bytes)?;
        Ok(Self {
            axes: parse_axes(&grid),
            records: parse_records(&grid),
        })
    }

    /// Opportunities from the response ladders, or from the flat records when
    /// no question has one.
    pub fn opportunities(&self) -> Vec<Opportunity> {
        let from_axes = opportunities::from_axes(&self.axes);
        if !from_axes.is_empty() || self.records.is_empty() {
            return from_axes;
        }
        opportunities::from_records(&self.records, &self.axes)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisSummary {
    pub name: String,
    pub definition: String,
    pub average_score: f64,
    pub max_score: f64,
    pub questions_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaturityReport {
    pub evaluation_type: String,
    pub global_score: f64,
    pub total_axes: usize,
    pub axes_analysis: Vec<AxisSummary>,
    pub flat_records: Vec<FlatRecord>,
    pub improvement_opportunities: Vec<Opportunity>,
    pub recommendations: Recommendations,
}

/// `"Axe 2 - Mesure"` and `"Mesure"` share the key `"mesure"`.
pub fn normalize_axis_label(label: &str) -> String {
    AXIS_PREFIX.replace(label.trim(), "").trim().to_lowercase()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Axis score per normalised label, as stated on the axis rows of the sheet.
/// A label seen twice keeps its last score.
fn record_axis_scores(records: &[FlatRecord]) -> HashMap<String, f64> {
    records
        .iter()
        .filter(|r| !r.axe.is_empty())
        .filter_map(|r| r.axe_score.map(|score| (normalize_axis_label(&r.axe), score)))
        .collect()
}

pub fn normalize_evaluation_type(raw: Option<&str>) -> String {
    raw.map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| EVALUATION_DEVSECOPS.to_string())
}

/// Scores the parsed sheet. Architecture assessments only trust the axis
/// averages; the others prefer the scores written on the axis rows.
pub fn build_report(
    evaluation_type: String,
    parsed: ParsedSheet,
    opportunities: Vec<Opportunity>,
    recommendations: Recommendations,
) -> MaturityReport {
    let architecture = evaluation_type == EVALUATION_ARCHITECTURE;
    let record_scores = record_axis_scores(&parsed.records);
    let axis_average = || mean(parsed.axes.iter().map(|a| a.average_score)).unwrap_or(0.0);

    let global_score = if architecture {
        axis_average()
    } else {
        mean(record_scores.values().copied()).unwrap_or_else(axis_average)
    };

    let axes_analysis = parsed
        .axes
        .iter()
        .map(|axis| {
            let average = if architecture {
                axis.average_score
            } else {
                record_scores
                    .get(&normalize_axis_label(&axis.name))
                    .copied()
                    .unwrap_or(axis.average_score)
            };
            AxisSummary {
                name: axis.name.clone(),
                definition: axis.definition.clone(),
                average_score: round2(average),
                max_score: MAX_SCORE,
                questions_count: axis.questions.len(),
            }
        })
        .collect();

    MaturityReport {
        evaluation_type,
        global_score: round2(global_score),
        total_axes: parsed.axes.len(),
        axes_analysis,
        flat_records: parsed.records,
        improvement_opportunities: opportunities,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maturity::parser::tests::standard_sheet;
    use crate::maturity::recommendations::default_recommendations;

    fn parsed() -> ParsedSheet {
        let grid = standard_sheet();
        ParsedSheet {
            axes: parse_axes(&grid),
            records: parse_records(&grid),
        }
    }

    fn record(axe: &str, axe_score: Option<f64>) -> FlatRecord {
        FlatRecord {
            axe: axe.to_string(),
            axe_score,
            question: "Q ?".to_string(),
            answer_type: "VRAI".to_string(),
            answer_score: Some(3.0),
            answer_text: "text".to_string(),
        }
    }

    #[test]
    fn test_normalize_axis_label() {
        assert_eq!(normalize_axis_label("Axe 1 - Hypothèse"), "hypothèse");
        assert_eq!(normalize_axis_label("  axe2: Mesure "), "mesure");
        assert_eq!(normalize_axis_label("AXE 3 – Culture"), "culture");
        assert_eq!(normalize_axis_label("Outillage"), "outillage");
    }

    #[test]
    fn test_normalize_evaluation_type() {
        assert_eq!(normalize_evaluation_type(None), "devsecops");
        assert_eq!(normalize_evaluation_type(Some("")), "devsecops");
        assert_eq!(normalize_evaluation_type(Some("Architecture")), "architecture");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.5), 2.5);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_devsecops_report_falls_back_to_axis_averages() {
        let parsed = parsed();
        let opportunities = parsed.opportunities();
        let recommendations = default_recommendations(&opportunities);
        let report = build_report("devsecops".to_string(), parsed, opportunities, recommendations);

        assert_eq!(report.total_axes, 2);
        // (2.5 + 5.0) / 2
        assert_eq!(report.global_score, 3.75);
        assert_eq!(report.axes_analysis[0].average_score, 2.5);
        assert_eq!(report.axes_analysis[0].max_score, 5.0);
        assert_eq!(report.axes_analysis[0].questions_count, 2);
        assert_eq!(report.improvement_opportunities.len(), 2);
        assert_eq!(report.recommendations.len(), 2);
    }

    #[test]
    fn test_devsecops_prefers_record_axis_scores() {
        let mut parsed = parsed();
        parsed.records = vec![
            record("Axe 1 - Hypothèse", Some(1.0)),
            record("Axe 1 - Hypothèse", Some(1.5)),
            record("Axe 9 - Autre", Some(4.0)),
            record("Axe 10 - Vide", None),
        ];
        let report = build_report("devsecops".to_string(), parsed, Vec::new(), Recommendations::default());

        // last score per label wins: (1.5 + 4.0) / 2
        assert_eq!(report.global_score, 2.75);
        assert_eq!(report.axes_analysis[0].average_score, 1.5);
        assert_eq!(report.axes_analysis[1].average_score, 5.0);
    }

    #[test]
    fn test_architecture_ignores_record_scores() {
        let mut parsed = parsed();
        parsed.records = vec![record("Axe 1 - Hypothèse", Some(1.0))];
        let report = build_report("architecture".to_string(), parsed, Vec::new(), Recommendations::default());
        assert_eq!(report.global_score, 3.75);
        assert_eq!(report.axes_analysis[0].average_score, 2.5);
    }

    #[test]
    fn test_opportunities_fall_back_to_records() {
        let mut parsed = parsed();
        for axis in &mut parsed.axes {
            for question in &mut axis.questions {
                question.responses.clear();
            }
        }
        parsed.records = vec![record("Axe 1 - Hypothèse", Some(2.0))];
        let opportunities = parsed.opportunities();
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].next_level_score, 3.0);
        assert_eq!(opportunities[0].axis_definition, "Formulation des hypothèses");
    }

    #[test]
    fn test_from_upload_reads_csv() {
        let csv = "\
;;Axe 1 - Culture
;;Travail en équipe
;;Comment collaborez-vous ?
VRAI;2;<<Ponctuellement>>
FAUX;4;<<En continu>>
";
        let parsed = ParsedSheet::from_upload("eval.csv", csv.as_bytes()).unwrap();
        assert_eq!(parsed.axes.len(), 1);
        assert_eq!(parsed.axes[0].definition, "Travail en équipe");
        assert_eq!(parsed.axes[0].questions[0].current_score, 2);
        assert_eq!(parsed.opportunities()[0].next_level_score, 4.0);
    }
}
