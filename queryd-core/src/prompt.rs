//! Adaptive Prompt Builder (spec §4.8, C8).
//!
//! Grounded on the per-intent template constants style used in
//! `vtcode-config::constants::prompts`: each intent gets its own fixed
//! system-prompt text, composed with the gathered context at build time.

use crate::context::{GatherIntent, GatheredContext};
use crate::types::Query;

#[derive(Debug, Clone, Default)]
pub struct QualityRequirements {
    pub require_examples: bool,
    pub require_context: bool,
}

#[derive(Debug, Clone)]
pub struct AdaptivePrompt {
    pub system: String,
    pub user: String,
    pub context: String,
    pub examples: String,
}

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(
        query: &Query,
        intent: GatherIntent,
        gathered: &GatheredContext,
        quality: &QualityRequirements,
    ) -> AdaptivePrompt {
        let mut system = system_prompt_for(intent).to_string();
        if quality.require_examples {
            system.push_str("\nInclude specific code examples in your answer.");
        }
        if quality.require_context {
            system.push_str("\nUse the provided project context; do not invent files or symbols.");
        }

        let user = format!("Project root: {}\nQuestion: {}", query.project_root.display(), query.text);

        let context = match intent {
            GatherIntent::SystemStatus => gathered.system_info.clone(),
            GatherIntent::Search => format!("Candidate files:\n{}", gathered.relevant_files.join("\n")),
            _ => format!(
                "Project structure:\n{}\n\nKey files:\n{}\n\nSystem info:\n{}",
                gathered.project_info,
                gathered.relevant_files.join("\n"),
                gathered.system_info,
            ),
        };

        let examples = gathered
            .code_examples
            .iter()
            .map(|hit| format!("{}:{} (score {:.2})\n{}", hit.file, hit.line, hit.score, hit.context))
            .collect::<Vec<_>>()
            .join("\n\n");

        AdaptivePrompt {
            system,
            user,
            context,
            examples,
        }
    }
}

fn system_prompt_for(intent: GatherIntent) -> &'static str {
    match intent {
        GatherIntent::Explain => {
            "You explain the architecture and data flow of the project. Favor \
             concrete module names and the path data actually takes over \
             generic descriptions."
        }
        GatherIntent::Generate => {
            "You write idiomatic code that matches the style already present \
             in the project: its error handling conventions, its naming, and \
             its existing abstractions."
        }
        GatherIntent::SystemStatus => "Report the system snapshot verbatim, formatted for a terminal.",
        GatherIntent::Search => {
            "You answer concisely, pointing at the candidate files most likely \
             to contain what the user is looking for. Embed the candidate file \
             list; do not paraphrase it."
        }
        GatherIntent::Other => {
            "You answer concisely, citing the specific files that support your answer."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn require_examples_appends_directive() {
        let query = Query::new("q", "explain this", PathBuf::from("/proj"));
        let gathered = GatheredContext::default();
        let quality = QualityRequirements {
            require_examples: true,
            require_context: false,
        };
        let prompt = PromptBuilder::build(&query, GatherIntent::Explain, &gathered, &quality);
        assert!(prompt.system.contains("Include specific code examples"));
    }

    #[test]
    fn search_context_embeds_candidate_file_list() {
        let query = Query::new("q", "find the router module", PathBuf::from("/proj"));
        let mut gathered = GatheredContext::default();
        gathered.relevant_files = vec!["src/router.rs".to_string()];
        let prompt = PromptBuilder::build(&query, GatherIntent::Search, &gathered, &QualityRequirements::default());
        assert!(prompt.context.contains("src/router.rs"));
    }

    #[test]
    fn system_status_context_is_just_system_info() {
        let query = Query::new("q", "memory status", PathBuf::from("/proj"));
        let mut gathered = GatheredContext::default();
        gathered.system_info = "42% used".to_string();
        let prompt = PromptBuilder::build(&query, GatherIntent::SystemStatus, &gathered, &QualityRequirements::default());
        assert_eq!(prompt.context, "42% used");
    }
}
