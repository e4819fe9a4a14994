use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::opportunities::Opportunity;
use super::prompts::recommendation_prompt;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{GenerationParams, LlmClient, LlmError};

const RECOMMENDATION_PARAMS: GenerationParams = GenerationParams {
    max_tokens: Some(4000),
    temperature: Some(0.7),
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub axis_name: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub current_situation: String,
    #[serde(default)]
    pub target_situation: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub short_term: Vec<Recommendation>,
    #[serde(default)]
    pub medium_term: Vec<Recommendation>,
    #[serde(default)]
    pub long_term: Vec<Recommendation>,
}

impl Recommendations {
    pub fn len(&self) -> usize {
        self.short_term.len() + self.medium_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket_mut(&mut self, timeline: Timeline) -> &mut Vec<Recommendation> {
        match timeline {
            Timeline::ShortTerm => &mut self.short_term,
            Timeline::MediumTerm => &mut self.medium_term,
            Timeline::LongTerm => &mut self.long_term,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeline {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl Timeline {
    /// Score 2 is a quick win, 4 a long haul; anything else lands in between.
    pub fn for_score(score: f64) -> Self {
        if score == 2.0 {
            Timeline::ShortTerm
        } else if score == 4.0 {
            Timeline::LongTerm
        } else {
            Timeline::MediumTerm
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeline::ShortTerm => "short_term",
            Timeline::MediumTerm => "medium_term",
            Timeline::LongTerm => "long_term",
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

/// Canned recommendations used whenever the LLM is unavailable or answers
/// with something unusable.
pub fn default_recommendations(opportunities: &[Opportunity]) -> Recommendations {
    let mut recommendations = Recommendations::default();
    for opportunity in opportunities {
        let timeline = Timeline::for_score(opportunity.current_score);
        recommendations.bucket_mut(timeline).push(Recommendation {
            axis_name: opportunity.axis_name.clone(),
            question: opportunity.question.clone(),
            current_situation: opportunity.current_response.clone(),
            target_situation: opportunity.next_level_response.clone(),
            recommendation: format!(
                "Improve {} by moving from '{}...' to '{}...'. Set up a progressive action plan.",
                opportunity.axis_name,
                preview(&opportunity.current_response),
                preview(&opportunity.next_level_response),
            ),
            timeline: Some(timeline.as_str().to_string()),
            priority: default_priority(),
        });
    }
    recommendations
}

/// One LLM call for all opportunities, falling back to the defaults.
pub async fn recommend(llm: Option<&LlmClient>, opportunities: &[Opportunity]) -> Recommendations {
    if opportunities.is_empty() {
        warn!("No improvement opportunity found, no recommendation to generate");
        return Recommendations::default();
    }
    let Some(llm) = llm else {
        warn!("LLM unavailable, using default recommendations");
        return default_recommendations(opportunities);
    };

    let prompt = recommendation_prompt(opportunities);
    let answer = llm
        .generate_json::<Recommendations>(JSON_ONLY_SYSTEM, &prompt, RECOMMENDATION_PARAMS)
        .await;
    settle(answer, opportunities)
}

/// Keeps a usable LLM answer; an error or an empty answer gives the defaults.
fn settle(
    answer: Result<Recommendations, LlmError>,
    opportunities: &[Opportunity],
) -> Recommendations {
    match answer {
        Ok(recommendations) if !recommendations.is_empty() => {
            info!(
                "LLM recommendations: {} in total ({} short term, {} medium term, {} long term)",
                recommendations.len(),
                recommendations.short_term.len(),
                recommendations.medium_term.len(),
                recommendations.long_term.len()
            );
            recommendations
        }
        Ok(_) => {
            warn!("LLM returned no recommendation, using defaults");
            default_recommendations(opportunities)
        }
        Err(e) => {
            warn!("Recommendation generation failed, using defaults: {e}");
            default_recommendations(opportunities)
        }
    }
}
