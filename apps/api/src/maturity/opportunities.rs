use serde::Serialize;

use super::parser::Axis;
use super::records::FlatRecord;

pub const MAX_SCORE: f64 = 5.0;

/// A question whose answer can move up one level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub axis_name: String,
    pub axis_definition: String,
    pub question: String,
    pub current_response: String,
    pub current_score: f64,
    pub next_level_response: String,
    pub next_level_score: f64,
    pub improvement_gap: f64,
}

/// Every question below the maximum that lists a better response.
pub fn from_axes(axes: &[Axis]) -> Vec<Opportunity> {
    axes.iter()
        .flat_map(|axis| {
            axis.questions.iter().filter_map(move |question| {
                let current = question.current_score as f64;
                if current >= MAX_SCORE {
                    return None;
                }
                let next = question.next_level()?;
                Some(Opportunity {
                    axis_name: axis.name.clone(),
                    axis_definition: axis.definition.clone(),
                    question: question.text.clone(),
                    current_response: question.current_response().to_string(),
                    current_score: current,
                    next_level_response: next.text.clone(),
                    next_level_score: next.score as f64,
                    improvement_gap: next.score as f64 - current,
                })
            })
        })
        .collect()
}

/// Fallback when the parsed questions carry no response ladder: each
/// selected (`VRAI`) answer below the maximum targets the next score.
pub fn from_records(records: &[FlatRecord], axes: &[Axis]) -> Vec<Opportunity> {
    records
        .iter()
        .filter(|r| r.answer_type.trim().eq_ignore_ascii_case("VRAI"))
        .filter_map(|record| {
            let axe = record.axe.trim();
            let question = record.question.trim();
            let answer = record.answer_text.trim();
            let score = record.answer_score?;
            if axe.is_empty() || question.is_empty() || answer.is_empty() || score >= MAX_SCORE {
                return None;
            }

            let definition = axis_definition_for(axe, axes);
            Some(Opportunity {
                axis_name: axe.to_string(),
                axis_definition: if definition.is_empty() {
                    axe.to_string()
                } else {
                    definition.to_string()
                },
                question: question.to_string(),
                current_response: answer.to_string(),
                current_score: score,
                next_level_response: String::new(),
                next_level_score: score + 1.0,
                improvement_gap: 1.0,
            })
        })
        .collect()
}

/// Definition of the first parsed axis whose name contains, or is contained
/// in, the record label (case-insensitive).
fn axis_definition_for<'a>(label: &str, axes: &'a [Axis]) -> &'a str {
    let label = label.to_lowercase();
    axes.iter()
        .find(|axis| {
            let key = axis.name.trim().to_lowercase();
            label.contains(&key) || key.contains(&label)
        })
        .map(|axis| axis.definition.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maturity::parser::{
        parse_axes,
        tests::{grid, standard_sheet},
    };

    fn record(axe: &str, answer_type: &str, score: Option<f64>, text: &str) -> FlatRecord {
        FlatRecord {
            axe: axe.to_string(),
            axe_score: None,
            question: "Comment faites-vous ?".to_string(),
            answer_type: answer_type.to_string(),
            answer_score: score,
            answer_text: text.to_string(),
        }
    }

    #[test]
    fn test_from_axes_targets_next_level() {
        let axes = parse_axes(&standard_sheet());
        let opportunities = from_axes(&axes);
        assert_eq!(opportunities.len(), 2);

        let first = &opportunities[0];
        assert_eq!(first.axis_name, "Hypothèse");
        assert_eq!(first.current_response, "Modèle standard");
        assert_eq!(first.current_score, 3.0);
        assert_eq!(first.next_level_response, "Outillage automatisé");
        assert_eq!(first.next_level_score, 5.0);
        assert_eq!(first.improvement_gap, 2.0);

        let second = &opportunities[1];
        assert_eq!(second.current_score, 2.0);
        assert_eq!(second.next_level_score, 4.0);
    }

    #[test]
    fn test_extreme_scores_give_a_finite_gap() {
        let axes = parse_axes(&grid(&[
            &["Axe 1 - Mesure"],
            &["", "", "Indicateurs"],
            &["", "", "Comment mesurez-vous ?"],
            &["VRAI", "-1e300", "<<Bas>>"],
            &["FAUX", "5", "<<Haut>>"],
        ]));
        let opportunities = from_axes(&axes);
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].current_score, f64::from(i32::MIN));
        assert_eq!(opportunities[0].next_level_score, 5.0);
        assert_eq!(opportunities[0].improvement_gap, 5.0 - f64::from(i32::MIN));
    }

    #[test]
    fn test_from_records_keeps_selected_answers_below_max() {
        let axes = parse_axes(&standard_sheet());
        let records = vec![
            record("Axe 1 - Hypothèse", "VRAI", Some(3.0), "Modèle standard"),
            record("Axe 1 - Hypothèse", "FAUX", Some(1.0), "Oralement"),
            record("Axe 2 - Mesure", "VRAI", Some(5.0), "Complet"),
            record("Axe 3 - Inconnu", "vrai", Some(2.0), "Partiel"),
            record("Axe 3 - Inconnu", "VRAI", None, "Sans score"),
            record("Axe 3 - Inconnu", "VRAI", Some(1.0), ""),
        ];
        let opportunities = from_records(&records, &axes);
        assert_eq!(opportunities.len(), 2);

        assert_eq!(opportunities[0].axis_definition, "Formulation des hypothèses");
        assert_eq!(opportunities[0].next_level_score, 4.0);
        assert_eq!(opportunities[0].improvement_gap, 1.0);
        assert_eq!(opportunities[0].next_level_response, "");

        assert_eq!(opportunities[1].axis_name, "Axe 3 - Inconnu");
        assert_eq!(opportunities[1].axis_definition, "Axe 3 - Inconnu");
    }
}
