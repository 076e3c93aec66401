// Instruction turns sent ahead of the conversation on every request

use crate::history::ConversationTurn;
use crate::language::Language;
use crate::memory::MemoryProfile;

pub const PERSONA_NAME: &str = "Tytronis";

const UNKNOWN_NAME: &str = "unknown";
const NO_PROJECTS: &str = "none";

const STYLE_LEGEND: &str = r#"Styles:
- terse → short, direct answers.
- normal → balanced answers.
- verbose → detailed answers."#;

const MEMORY_RULES: &str = r#"Rules:
- Never reveal that you use a memory.
- Use this information naturally.
- If the user wants you to stop using their name, stop using it."#;

/// Persona and memory prompt for the current profile. Must be rebuilt per request.
pub fn build_system_message(profile: &MemoryProfile) -> ConversationTurn {
    let name = profile.name.as_deref().unwrap_or(UNKNOWN_NAME);

    let joined = profile.projects.join(", ");
    let projects = if joined.is_empty() { NO_PROJECTS } else { joined.as_str() };

    ConversationTurn::system(format!(
        r#"
You are {persona}.

Language rule:
- Detect the language of the user's message.
- Reply in that language.
- If you cannot detect it, reply in French.

Memory:
Name: {name}
Style: {style}
Projects: {projects}

{legend}

{rules}
"#,
        persona = PERSONA_NAME,
        name = name,
        style = profile.response_style.as_str(),
        projects = projects,
        legend = STYLE_LEGEND,
        rules = MEMORY_RULES,
    ))
}

/// Transient turn carrying the detected language tag
pub fn build_language_directive(language: Language) -> ConversationTurn {
    ConversationTurn::system(format!(
        "Reply in the detected language: {}",
        language.as_str()
    ))
}
