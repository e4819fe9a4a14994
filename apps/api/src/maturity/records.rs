//! Flat, row oriented view of an assessment: one record per candidate answer.
//!
//! This pass is independent from the axis parser and tolerates layouts where
//! the axis title sits in C or D, questions are numbered in B or C, and the
//! `VRAI` / `FAUX` flag appears anywhere in A to C.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::sheet::{cell_number, Grid};

static AXIS_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^axe\s*\d+").unwrap());
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    pub axe: String,
    pub axe_score: Option<f64>,
    pub question: String,
    pub answer_type: String,
    pub answer_score: Option<f64>,
    pub answer_text: String,
}

/// Longest non-empty candidate; the earliest wins ties.
fn longest<'a>(candidates: &[&'a str]) -> &'a str {
    candidates
        .iter()
        .copied()
        .fold("", |best, c| {
            if c.chars().count() > best.chars().count() {
                c
            } else {
                best
            }
        })
}

pub fn parse_records(grid: &Grid) -> Vec<FlatRecord> {
    let mut records = Vec::new();
    let mut axis: Option<(String, Option<f64>)> = None;
    let mut question: Option<String> = None;

    for row in 0..grid.height() {
        let cols: [&str; 5] = std::array::from_fn(|col| grid.cell(row, col));
        let [_, col_b, col_c, col_d, col_e] = cols;

        if let Some(label) = [col_c, col_d].into_iter().find(|c| AXIS_LABEL.is_match(c)) {
            axis = Some((label.to_string(), cell_number(col_b)));
            continue;
        }

        // Answer flags are checked before question markers: a flagged row
        // often starts with a number too.
        let flag = cols[..3]
            .iter()
            .position(|c| matches!(c.to_uppercase().as_str(), "VRAI" | "FAUX"));

        if let (Some(flag_col), Some((axe, axe_score)), Some(question)) =
            (flag, axis.as_ref(), question.as_ref())
        {
            let neighbours = [flag_col.checked_sub(1), Some(flag_col + 1), Some(1), Some(3)];
            let answer_score = neighbours
                .into_iter()
                .flatten()
                .filter(|col| *col < cols.len())
                .find_map(|col| cell_number(cols[col]));

            records.push(FlatRecord {
                axe: axe.clone(),
                axe_score: *axe_score,
                question: question.clone(),
                answer_type: cols[flag_col].to_uppercase(),
                answer_score,
                answer_text: longest(&[col_d, col_e, col_c, col_b]).to_string(),
            });
            continue;
        }

        if LEADING_NUMBER.is_match(col_c) || LEADING_NUMBER.is_match(col_b) {
            let text = if col_d.is_empty() { col_c } else { col_d };
            if !text.is_empty() {
                question = Some(text.to_string());
                continue;
            }
        }
        if col_c.ends_with('?') {
            question = Some(col_c.to_string());
        } else if col_d.ends_with('?') {
            question = Some(col_d.to_string());
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maturity::parser::tests::grid;

    #[test]
    fn test_records_follow_axis_and_question() {
        let grid = grid(&[
            &["", "3,5", "Axe 1 - Hypothèse", "", ""],
            &["", "1", "", "Comment documentez-vous ?", ""],
            &["VRAI", "3", "", "Modèle standard", ""],
            &["FAUX", "5", "", "Outillage automatisé", "Commentaire plus long encore"],
            &["", "", "Axe 2 - Mesure", "", ""],
            &["", "", "Quels indicateurs ?", "", ""],
            &["", "faux", "2", "Aucun", ""],
        ]);
        let records = parse_records(&grid);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].axe, "Axe 1 - Hypothèse");
        assert_eq!(records[0].axe_score, Some(3.5));
        assert_eq!(records[0].question, "Comment documentez-vous ?");
        assert_eq!(records[0].answer_type, "VRAI");
        assert_eq!(records[0].answer_score, Some(3.0));
        assert_eq!(records[0].answer_text, "Modèle standard");

        assert_eq!(records[1].answer_type, "FAUX");
        assert_eq!(records[1].answer_score, Some(5.0));
        assert_eq!(records[1].answer_text, "Commentaire plus long encore");

        assert_eq!(records[2].axe, "Axe 2 - Mesure");
        assert_eq!(records[2].axe_score, None);
        assert_eq!(records[2].question, "Quels indicateurs ?");
        assert_eq!(records[2].answer_type, "FAUX");
        assert_eq!(records[2].answer_score, Some(2.0));
        assert_eq!(records[2].answer_text, "Aucun");
    }

    #[test]
    fn test_answers_before_any_question_are_ignored() {
        let grid = grid(&[
            &["", "", "Axe 1 - Culture"],
            &["VRAI", "", "sans question"],
        ]);
        assert!(parse_records(&grid).is_empty());
    }

    #[test]
    fn test_answers_without_axis_are_ignored() {
        let grid = grid(&[
            &["", "1", "Quelle pratique ?"],
            &["VRAI", "2", "<<Oui>>"],
        ]);
        assert!(parse_records(&grid).is_empty());
    }

    #[test]
    fn test_longest_prefers_first_on_tie() {
        assert_eq!(longest(&["abc", "xyz", "a"]), "abc");
        assert_eq!(longest(&["", ""]), "");
        assert_eq!(longest(&["é", "ab"]), "ab");
    }
}
