#[cfg(test)]
#[path = "prompt_test.rs"]
mod tests;

/// Section headers the model must emit, in order. Clients split answers on
/// these exact markers so they stay in English whatever the answer language.
pub const SECTION_HEADERS: [&str; 4] = [
    "**TOPIC IDENTIFICATION**",
    "**STEP-BY-STEP GUIDANCE**",
    "**KEY CONSIDERATIONS**",
    "**ADDITIONAL RESOURCES**",
];

pub struct Prompt {
    pub text: String,
}

impl Prompt {
    /// Wraps a farmer's question in the agricultural expert template, asking
    /// for an answer written only in `language`.
    pub fn build(message: &str, language: &str) -> Prompt {
        let [topic, steps, considerations, resources] = SECTION_HEADERS;

        let text = format!(
            r#"You are an agricultural expert assistant who responds ONLY in {language} language. Do not include any English translation.

For the question: {message}

Provide a detailed, helpful response in {language} only, following this EXACT structure with clear section headers:

{topic}
Identify the main agricultural topic (crop, soil, weather, pest, etc.) in exactly one sentence.

{steps}
Provide specific, actionable advice using EXACTLY this format:
1. [First step with specific details]
2. [Second step with specific details]
3. [Continue with numbered steps as needed]

{considerations}
Include any relevant warnings, precautions, or important factors using EXACTLY this format:
• [First consideration]
• [Second consideration]
• [Continue with bullet points as needed]

{resources}
Suggest additional resources or next steps using EXACTLY this format:
• [First resource or next step]
• [Second resource or next step]
• [Continue with bullet points as needed]

CRITICAL FORMATTING RULES:
- Use ONLY the section headers shown above in ALL CAPS
- Use numbered lists for steps and bullet points for considerations/resources
- Keep each section header on its own line
- Keep your response concise but informative, suitable for farmers with varying levels of education
- Respond ONLY in {language} - do not include any English words or translations
- Avoid overly technical jargon. Use simple, clear language that farmers can easily understand
- Do not include any markdown formatting symbols like asterisks or underscores except for the section headers shown"#
        );

        return Prompt { text };
    }

    #[cfg(test)]
    /// Byte offsets of each section header in the prompt, in template order.
    pub fn header_positions(&self) -> Vec<Option<usize>> {
        return SECTION_HEADERS
            .iter()
            .map(|header| {
                return self.text.find(header);
            })
            .collect();
    }
}
