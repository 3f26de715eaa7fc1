//! Prompt construction for the analyzer and generator.

use atelier_core::analysis::Analysis;
use atelier_core::collaborators::TemplateInfo;
use atelier_core::dialect::Dialect;

pub const ANALYZER_SYSTEM_PROMPT: &str = "\
You are a product analyst for a web app builder. Given a user requirement, \
produce a short structured analysis: the goal, the key UI elements, the \
interactions and state involved, and anything ambiguous that a reasonable \
default was chosen for. Be concise; the analysis seeds a code generator.";

const COMPONENT_SYSTEM_PROMPT: &str = "\
You are an expert frontend engineer. Generate a single, self-contained React \
component in TSX that fulfils the analysis below. Rules: export the component \
as the default export; import everything you use; use Tailwind classes for \
styling; no explanations, output only the code.";

const PLAIN_SYSTEM_PROMPT: &str = "\
You are an expert frontend engineer. Generate one complete, self-contained \
HTML document (inline CSS and JavaScript allowed) that fulfils the analysis \
below. Output only the document, starting with <!DOCTYPE html>; no \
explanations.";

const CONTINUE_SYSTEM_PROMPT: &str = "\
You are modifying an existing generated app. Apply the requested change and \
output the full updated source, nothing else.";

/// System prompt for first-pass generation in the given dialect.
pub fn generation_system_prompt(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::ComponentMarkup => COMPONENT_SYSTEM_PROMPT,
        Dialect::PlainMarkup => PLAIN_SYSTEM_PROMPT,
    }
}

/// System prompt for iterative continuation.
pub fn continuation_system_prompt() -> &'static str {
    CONTINUE_SYSTEM_PROMPT
}

/// User message for the analyzer call.
pub fn analyzer_user_prompt(requirement: &str, template: Option<&TemplateInfo>) -> String {
    match template {
        Some(template) => format!(
            "Requirement: {requirement}\n\nThe user picked the template \"{}\" ({}): {}",
            template.name, template.category, template.description
        ),
        None => format!("Requirement: {requirement}"),
    }
}

/// User message seeding first-pass generation from an analysis.
pub fn generation_user_prompt(analysis: &Analysis, template: Option<&TemplateInfo>) -> String {
    let mut prompt = format!(
        "Requirement: {}\n\nAnalysis:\n{}",
        analysis.requirement, analysis.content
    );
    if let Some(template) = template {
        prompt.push_str(&format!(
            "\n\nStart from this {} template and adapt it:\n{}",
            template.language, template.source
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_embeds_template_source() {
        let mut analysis = Analysis::new("a todo list");
        analysis.append("Needs add/remove and a list.");
        let template = TemplateInfo {
            id: "t1".into(),
            name: "List".into(),
            category: "productivity".into(),
            description: "simple list".into(),
            source: "export default function List() {}".into(),
            language: "tsx".into(),
        };
        let prompt = generation_user_prompt(&analysis, Some(&template));
        assert!(prompt.contains("a todo list"));
        assert!(prompt.contains("export default function List()"));
    }
}
