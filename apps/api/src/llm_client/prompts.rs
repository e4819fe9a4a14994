// Prompt fragments shared by every feature that calls the LLM.
// Feature specific prompts live next to the feature.

/// System prompt for calls whose answer is parsed as JSON.
pub const JSON_ONLY_SYSTEM: &str = "You are a rigorous consultant producing structured output. \
    Answer with one valid JSON object and nothing else: \
    no prose before or after it and no markdown code fences.";
