use std::fmt::Write;

use super::opportunities::Opportunity;

const MISSION: &str = "\
In the context of a DevSecOps maturity audit, analyse the situations below and produce structured recommendations.

MISSION:
For each question, propose concrete, actionable recommendations that move the current situation towards the target.

TIMELINES (chosen from the current score):
- short_term (0-3 months): questions whose current score is 2
- medium_term (3-12 months): questions whose current score is 3
- long_term (12+ months): questions whose current score is 4
";

const RESPONSE_FORMAT: &str = r#"
EXPECTED ANSWER (strict JSON):
{
  "short_term": [
    {
      "axis_name": "Axis name",
      "question": "Question text",
      "current_situation": "Current situation",
      "target_situation": "Target situation",
      "recommendation": "Concrete action for the next 0-3 months",
      "priority": "high|medium|low"
    }
  ],
  "medium_term": [ same fields, actions for 3-12 months ],
  "long_term": [ same fields, actions for 12+ months ]
}

RULES:
1. A question with current score 2 goes to "short_term".
2. A question with current score 3 goes to "medium_term".
3. A question with current score 4 goes to "long_term".
4. Recommendations must be concrete, actionable and fit their timeline.
5. Take technical, organisational and dependency constraints into account.
6. Prioritise by impact and feasibility.
7. Write the recommendations in the language of the questions.
"#;

/// Lists the opportunities grouped by axis, in first-seen order.
pub fn recommendation_prompt(opportunities: &[Opportunity]) -> String {
    let mut groups: Vec<(&str, &str, Vec<&Opportunity>)> = Vec::new();
    for opportunity in opportunities {
        match groups
            .iter_mut()
            .find(|(name, _, _)| *name == opportunity.axis_name)
        {
            Some((_, _, items)) => items.push(opportunity),
            None => groups.push((
                opportunity.axis_name.as_str(),
                opportunity.axis_definition.as_str(),
                vec![opportunity],
            )),
        }
    }

    let mut prompt = String::from(MISSION);
    for (name, definition, items) in groups {
        let _ = writeln!(prompt, "\n## Axis: {name}");
        let _ = writeln!(prompt, "Definition: {definition}");
        for (idx, opportunity) in items.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "\n### Question {} (current score {}/5 → target {}/5)",
                idx + 1,
                opportunity.current_score,
                opportunity.next_level_score
            );
            let _ = writeln!(prompt, "Question: {}", opportunity.question);
            let _ = writeln!(prompt, "Current situation: {}", opportunity.current_response);
            let _ = writeln!(prompt, "Target: {}", opportunity.next_level_response);
        }
    }
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity(axis: &str, question: &str, score: f64) -> Opportunity {
        Opportunity {
            axis_name: axis.to_string(),
            axis_definition: format!("{axis} definition"),
            question: question.to_string(),
            current_response: "now".to_string(),
            current_score: score,
            next_level_response: "later".to_string(),
            next_level_score: score + 1.0,
            improvement_gap: 1.0,
        }
    }

    #[test]
    fn test_prompt_groups_by_axis() {
        let prompt = recommendation_prompt(&[
            opportunity("Culture", "Q1 ?", 2.0),
            opportunity("Mesure", "Q2 ?", 3.0),
            opportunity("Culture", "Q3 ?", 4.0),
        ]);
        assert_eq!(prompt.matches("## Axis: Culture").count(), 1);
        assert_eq!(prompt.matches("## Axis: Mesure").count(), 1);

        let culture = prompt.find("## Axis: Culture").unwrap();
        let mesure = prompt.find("## Axis: Mesure").unwrap();
        let q3 = prompt.find("Question: Q3 ?").unwrap();
        assert!(culture < q3 && q3 < mesure);

        assert!(prompt.contains("### Question 2 (current score 4/5 → target 5/5)"));
        assert!(prompt.contains("Definition: Mesure definition"));
        assert!(prompt.contains("strict JSON"));
    }
}
