//! Prompt documents for the documentation-checking agent.
//!
//! A prompt is a markdown file with an optional leading YAML front-matter
//! block. The body is a template rendered with the run's variables (currently
//! just `target`). A default prompt ships embedded in the binary; callers can
//! substitute their own file via the CLI.

use std::path::Path;

use serde_yaml::Mapping;
use tera::{Context, Tera};

use crate::error::PromptError;

/// Front-matter delimiter line.
const FRONT_MATTER_FENCE: &str = "---";

/// The prompt used when the caller does not supply one.
const DEFAULT_PROMPT: &str = include_str!("default_prompt.md");

/// A loaded prompt document: template body plus front-matter metadata.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Template body, front matter stripped.
    pub text: String,
    /// Parsed front-matter metadata. Empty when the document had none.
    pub metadata: Mapping,
}

impl Prompt {
    /// Renders the prompt body with the given target path substituted.
    pub fn render(&self, target: &str) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("target", target);
        Tera::one_off(&self.text, &context, false).map_err(PromptError::Render)
    }
}

/// Returns the embedded default prompt.
///
/// The embedded document is validated by tests, so parsing it cannot fail at
/// runtime.
pub fn default_prompt() -> Prompt {
    parse(DEFAULT_PROMPT, "<embedded>").unwrap_or_else(|_| Prompt {
        text: DEFAULT_PROMPT.to_string(),
        metadata: Mapping::new(),
    })
}

/// Loads a prompt document from a file.
pub fn load_prompt(path: impl AsRef<Path>) -> Result<Prompt, PromptError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, &path.display().to_string())
}

/// Splits optional front matter from the body and parses both.
fn parse(content: &str, origin: &str) -> Result<Prompt, PromptError> {
    let Some((front, body)) = split_front_matter(content) else {
        return Ok(Prompt {
            text: content.to_string(),
            metadata: Mapping::new(),
        });
    };

    let metadata: Mapping =
        serde_yaml::from_str(front).map_err(|e| PromptError::FrontMatter {
            path: origin.to_string(),
            message: e.to_string(),
        })?;

    Ok(Prompt {
        text: body.to_string(),
        metadata,
    })
}

/// Returns `(front_matter, body)` when the document opens with a `---` block.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix(FRONT_MATTER_FENCE)?;
    let rest = rest.strip_prefix('\n')?;
    let end = rest.find("\n---")?;
    let front = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('\n');
    Some((front, body))
}
