//! Infers the axis / question / response hierarchy of an assessment grid.
//!
//! Two layouts are recognised. The standard one has `Axe N - Name` headers,
//! the axis definition on the next row, then questions in column C, each
//! followed by its `<<response>>` rows (column A flags the selected answer
//! with `VRAI`, column B holds the score). The architecture capabilities
//! layout numbers its axes in column C and keeps titles and questions in
//! column E; it is only tried when no standard axis exists.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::sheet::{cell_number, Grid};

const HEADER_SCAN_COLS: usize = 5;
const MAX_RESPONSES: usize = 10;
/// Rows searched for the next axis header before giving up on the sheet.
const AXIS_SEARCH_WINDOW: usize = 50;

// Column indexes.
const COL_A: usize = 0;
const COL_B: usize = 1;
const COL_C: usize = 2;
const COL_D: usize = 3;
const COL_E: usize = 4;

static AXIS_HEADERS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)^Axe\s+(\d+)\s*[-–]\s*(.+)").unwrap(),
        Regex::new(r"(?i)^Axe\s+(\d+)\s*:\s*(.+)").unwrap(),
        Regex::new(r"(?i)^Axe\s+(\d+)\s+(.+)").unwrap(),
        Regex::new(r"^(\d+)\.\s*(.+)").unwrap(),
    ]
});

static QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Comment.*\?|Dans quelle mesure.*\?|Quel.*\?").unwrap()
});

static ARCHITECTURE_AXIS_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.?$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub text: String,
    pub score: i64,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub text: String,
    pub responses: Vec<Response>,
    pub current_score: i64,
}

impl Question {
    fn new(text: String, responses: Vec<Response>) -> Self {
        let current_score = responses
            .iter()
            .find(|r| r.selected)
            .map(|r| r.score)
            .unwrap_or(0);
        Self {
            text,
            responses,
            current_score,
        }
    }

    /// Text of the selected response, empty when nothing is selected.
    pub fn current_response(&self) -> &str {
        self.responses
            .iter()
            .find(|r| r.selected)
            .map(|r| r.text.as_str())
            .unwrap_or("")
    }

    /// The lowest-scoring response above the current score. The first one
    /// listed wins a tie.
    pub fn next_level(&self) -> Option<&Response> {
        self.responses
            .iter()
            .filter(|r| r.score > self.current_score)
            .fold(None, |best: Option<&Response>, r| match best {
                Some(b) if b.score <= r.score => Some(b),
                _ => Some(r),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub definition: String,
    pub questions: Vec<Question>,
    pub average_score: f64,
}

/// Integer part of a score cell, 0 when absent. Bounded to the `i32` range so
/// sums and gaps over a sheet stay within `i64`.
fn score_cell(cell: &str) -> i64 {
    cell_number(cell)
        .map(|n| n.trunc().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i64)
        .unwrap_or(0)
}

fn mean_score(questions: &[Question]) -> f64 {
    if questions.is_empty() {
        return 0.0;
    }
    let total: i64 = questions.iter().map(|q| q.current_score).sum();
    total as f64 / questions.len() as f64
}

/// Standard layout first, architecture layout when it finds nothing.
pub fn parse_axes(grid: &Grid) -> Vec<Axis> {
    let axes = standard_axes(grid);
    if !axes.is_empty() {
        return axes;
    }
    debug!("No standard axis header found, trying the architecture layout");
    architecture_axes(grid)
}

// ─── Standard layout ─────────────────────────────────────────────────────────

/// Axis name from a header cell. Numeric cells (scores such as `3.5`) are
/// never headers even though they look like `N. name`.
fn axis_header(cell: &str) -> Option<String> {
    if cell.is_empty() || cell_number(cell).is_some() {
        return None;
    }
    AXIS_HEADERS
        .iter()
        .find_map(|re| re.captures(cell))
        .map(|caps| caps[2].trim().to_string())
}

fn find_axis(grid: &Grid, from: usize) -> Option<(usize, String)> {
    let cols = grid.width().min(HEADER_SCAN_COLS);
    let end = from.saturating_add(AXIS_SEARCH_WINDOW).min(grid.height());
    (from..end).find_map(|row| {
        (0..cols).find_map(|col| axis_header(grid.cell(row, col)).map(|name| (row, name)))
    })
}

fn is_question(cell: &str) -> bool {
    QUESTION.is_match(cell)
}

fn is_response(cell: &str) -> bool {
    cell.len() >= 4 && cell.starts_with("<<") && cell.ends_with(">>")
}

fn responses_from(grid: &Grid, start: usize) -> Vec<Response> {
    let end = (start + MAX_RESPONSES).min(grid.height());
    (start..end)
        .map_while(|row| {
            let cell = grid.cell(row, COL_C);
            is_response(cell).then(|| Response {
                text: cell[2..cell.len() - 2].trim().to_string(),
                score: score_cell(grid.cell(row, COL_B)),
                selected: grid.cell(row, COL_A).to_uppercase() == "VRAI",
            })
        })
        .collect()
}

/// Reads consecutive questions from `start`; returns them with the first row
/// after the last consumed one.
fn questions_from(grid: &Grid, start: usize) -> (Vec<Question>, usize) {
    let mut questions = Vec::new();
    let mut row = start;
    while row < grid.height() && is_question(grid.cell(row, COL_C)) {
        let responses = responses_from(grid, row + 1);
        let consumed = responses.len() + 1;
        questions.push(Question::new(grid.cell(row, COL_C).to_string(), responses));
        row += consumed;
    }
    (questions, row)
}

pub fn standard_axes(grid: &Grid) -> Vec<Axis> {
    let mut axes = Vec::new();
    let mut row = 0;
    while let Some((header_row, name)) = find_axis(grid, row) {
        let definition = grid.cell(header_row + 1, COL_C).to_string();
        let (questions, next_row) = questions_from(grid, header_row + 2);
        debug!(
            "Axis '{name}' at row {header_row}: {} question(s)",
            questions.len()
        );
        axes.push(Axis {
            name,
            definition,
            average_score: mean_score(&questions),
            questions,
        });
        row = next_row;
    }
    axes
}

// ─── Architecture capabilities layout ────────────────────────────────────────

/// Numbered row with a title in E. A question row may also carry a level in
/// C, so titles ending with `?` never open an axis.
fn is_architecture_axis(grid: &Grid, row: usize) -> bool {
    let title = grid.cell(row, COL_E);
    ARCHITECTURE_AXIS_INDEX.is_match(grid.cell(row, COL_C))
        && !title.is_empty()
        && !title.ends_with('?')
}

pub fn architecture_axes(grid: &Grid) -> Vec<Axis> {
    let mut axes = Vec::new();
    if grid.width() < 5 {
        return axes;
    }

    let mut row = 0;
    while row < grid.height() {
        if !is_architecture_axis(grid, row) {
            row += 1;
            continue;
        }

        let header_row = row;
        let name = format!("{} {}", grid.cell(header_row, COL_C), grid.cell(header_row, COL_E))
            .trim()
            .to_string();
        let header_score = cell_number(grid.cell(header_row, COL_D));

        let mut definition = String::new();
        let mut questions = Vec::new();
        row = header_row + 1;
        while row < grid.height() && !is_architecture_axis(grid, row) {
            let text = grid.cell(row, COL_E);
            if text.ends_with('?') {
                let current_score = score_cell(grid.cell(row, COL_C));
                questions.push(Question {
                    text: text.to_string(),
                    responses: Vec::new(),
                    current_score,
                });
            } else if !text.is_empty() && definition.is_empty() {
                definition = text.to_string();
            }
            row += 1;
        }

        axes.push(Axis {
            name,
            definition,
            average_score: header_score.unwrap_or_else(|| mean_score(&questions)),
            questions,
        });
    }
    axes
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    /// Two axes in the standard layout, as exported by the assessment workbook.
    pub(crate) fn standard_sheet() -> Grid {
        grid(&[
            &["", "", "Évaluation DevSecOps"],
            &["", "", "Axe 1 - Hypothèse"],
            &["", "", "Formulation des hypothèses"],
            &["", "", "Comment vos hypothèses sont-elles documentées ?"],
            &["FAUX", "1", "<<Oralement>>"],
            &["VRAI", "3", "<<Modèle standard>>"],
            &["FAUX", "5", "<<Outillage automatisé>>"],
            &["", "", "Dans quelle mesure sont-elles validées ?"],
            &["VRAI", "2", "<<Rarement>>"],
            &["FAUX", "4", "<<Systématiquement>>"],
            &["", "", ""],
            &["Axe 2 : Mesure", "", ""],
            &["", "", "Suivi des indicateurs"],
            &["", "", "Quels indicateurs suivez-vous ?"],
            &["faux", "2", "<<Aucun>>"],
            &["vrai", "5", "<<Tableau de bord complet>>"],
        ])
    }

    #[test]
    fn test_axis_header_patterns() {
        assert_eq!(axis_header("Axe 1 - Hypothèse").as_deref(), Some("Hypothèse"));
        assert_eq!(axis_header("AXE 2 – Mesure").as_deref(), Some("Mesure"));
        assert_eq!(axis_header("axe 3: Culture").as_deref(), Some("Culture"));
        assert_eq!(axis_header("Axe 4 Outillage").as_deref(), Some("Outillage"));
        assert_eq!(axis_header("5. Sécurité").as_deref(), Some("Sécurité"));
        assert_eq!(axis_header("Axes transverses"), None);
        assert_eq!(axis_header("3.5"), None);
        assert_eq!(axis_header(""), None);
    }

    #[test]
    fn test_standard_layout() {
        let axes = parse_axes(&standard_sheet());
        assert_eq!(axes.len(), 2);

        let first = &axes[0];
        assert_eq!(first.name, "Hypothèse");
        assert_eq!(first.definition, "Formulation des hypothèses");
        assert_eq!(first.questions.len(), 2);
        assert_eq!(first.questions[0].responses.len(), 3);
        assert_eq!(first.questions[0].current_score, 3);
        assert_eq!(first.questions[0].current_response(), "Modèle standard");
        assert_eq!(first.questions[1].current_score, 2);
        assert!((first.average_score - 2.5).abs() < f64::EPSILON);

        let second = &axes[1];
        assert_eq!(second.name, "Mesure");
        assert_eq!(second.questions.len(), 1);
        assert_eq!(second.questions[0].current_score, 5);
        assert!(second.questions[0].responses[1].selected);
    }

    #[test]
    fn test_next_level_is_lowest_higher_score() {
        let axes = standard_axes(&standard_sheet());
        let question = &axes[0].questions[0];
        let next = question.next_level().unwrap();
        assert_eq!(next.score, 5);
        assert_eq!(next.text, "Outillage automatisé");
        assert!(axes[1].questions[0].next_level().is_none());
    }

    #[test]
    fn test_axis_search_stops_after_window() {
        let mut rows: Vec<&[&str]> = Vec::new();
        rows.push(&["Axe 1 - Culture"]);
        rows.push(&["", "", "Définition"]);
        rows.push(&["", "", "Quelle est votre pratique ?"]);
        rows.push(&["VRAI", "2", "<<Partielle>>"]);
        let far = rows.len() + AXIS_SEARCH_WINDOW;
        while rows.len() < far {
            rows.push(&[""]);
        }
        rows.push(&["Axe 2 - Mesure"]);
        let axes = standard_axes(&grid(&rows));
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].name, "Culture");

        rows.remove(10);
        assert_eq!(standard_axes(&grid(&rows)).len(), 2);
    }

    #[test]
    fn test_score_cells_are_bounded() {
        assert_eq!(score_cell("3.9"), 3);
        assert_eq!(score_cell(""), 0);
        assert_eq!(score_cell("1e300"), i64::from(i32::MAX));
        assert_eq!(score_cell("-1e300"), i64::from(i32::MIN));
    }

    #[test]
    fn test_huge_scores_average_without_overflow() {
        let grid = grid(&[
            &["Axe 1 - Culture"],
            &["", "", "Définition"],
            &["", "", "Quelle est votre pratique ?"],
            &["VRAI", "1e300", "<<Totale>>"],
            &["", "", "Quel outillage ?"],
            &["VRAI", "1e300", "<<Complet>>"],
        ]);
        let axes = standard_axes(&grid);
        assert_eq!(axes[0].questions.len(), 2);
        assert_eq!(axes[0].average_score, f64::from(i32::MAX));
    }

    #[test]
    fn test_unselected_question_scores_zero() {
        let grid = grid(&[
            &["Axe 1 - Culture"],
            &["", "", "Définition"],
            &["", "", "Quelle est votre pratique ?"],
            &["FAUX", "abc", "<<Aucune>>"],
            &["FAUX", "", "<<Partielle>>"],
        ]);
        let axes = standard_axes(&grid);
        assert_eq!(axes.len(), 1);
        let question = &axes[0].questions[0];
        assert_eq!(question.current_score, 0);
        assert_eq!(question.current_response(), "");
        assert!(question.responses.iter().all(|r| r.score == 0));
    }

    #[test]
    fn test_responses_capped_and_contiguous() {
        let mut rows: Vec<Vec<String>> = vec![
            vec!["Axe 1 - Culture".into()],
            vec!["".into(), "".into(), "Def".into()],
            vec!["".into(), "".into(), "Comment faites-vous ?".into()],
        ];
        for i in 0..12 {
            rows.push(vec!["FAUX".into(), i.to_string(), format!("<<R{i}>>")]);
        }
        let axes = standard_axes(&Grid::from_rows(rows));
        assert_eq!(axes[0].questions[0].responses.len(), MAX_RESPONSES);
    }

    #[test]
    fn test_architecture_layout() {
        let grid = grid(&[
            &["", "", "", "", "Evaluation Architecture Capabilities"],
            &["", "", "1.", "3", "Gouvernance"],
            &["", "", "", "", "Pilotage des décisions d'architecture"],
            &["", "", "2", "", "Les décisions sont-elles tracées ?"],
            &["", "", "4", "", "Existe-t-il un comité ?"],
            &["", "", "2.", "", "Modélisation"],
            &["", "", "1", "", "Les modèles sont-ils partagés ?"],
            &["", "", "", "", "Référentiel commun"],
            &["", "", "x", "", "Sont-ils à jour ?"],
        ]);
        let axes = parse_axes(&grid);
        assert_eq!(axes.len(), 2);

        assert_eq!(axes[0].name, "1. Gouvernance");
        assert_eq!(axes[0].definition, "Pilotage des décisions d'architecture");
        assert_eq!(axes[0].questions.len(), 2);
        assert!((axes[0].average_score - 3.0).abs() < f64::EPSILON);

        assert_eq!(axes[1].name, "2. Modélisation");
        assert_eq!(axes[1].definition, "Référentiel commun");
        assert_eq!(axes[1].questions[1].current_score, 0);
        assert!((axes[1].average_score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_narrow_grid_has_no_architecture_axes() {
        let grid = grid(&[&["", "", "1.", "3"]]);
        assert!(parse_axes(&grid).is_empty());
    }
}
