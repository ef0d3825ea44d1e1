//! Caller-facing configuration for tag elicitation.
//!
//! [`CotConfig`] holds the three values that fully determine both the prompt
//! injector and the tag splitter: the start tag, the end tag, and an optional
//! custom instruction. Everything else (API keys, endpoints, models) belongs
//! to the transport.
//!
//! # Examples
//!
//! Defaults (`<thinking>` / `</thinking>`, generated instruction):
//!
//! ```
//! use ghostcot::config::CotConfig;
//!
//! let config = CotConfig::default();
//! assert_eq!(config.start_tag, "<thinking>");
//! assert!(config.instruction().contains("</thinking>"));
//! ```
//!
//! Custom tags:
//!
//! ```
//! use ghostcot::config::CotConfig;
//!
//! let config = CotConfig::default().with_tags("<reason>", "</reason>");
//! assert!(config.instruction().contains("<reason>"));
//! assert!(config.validate().is_ok());
//! ```

use crate::prompt::cot_instruction;
use crate::{DEFAULT_END_TAG, DEFAULT_START_TAG};

/// Invalid caller configuration, reported before any transport call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("start tag must not be empty")]
    EmptyStartTag,
    #[error("end tag must not be empty")]
    EmptyEndTag,
}

/// Tag pair and instruction used for one chat wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CotConfig {
    /// Literal delimiter opening the reasoning block. Default: `<thinking>`.
    pub start_tag: String,
    /// Literal delimiter closing the reasoning block. Default: `</thinking>`.
    pub end_tag: String,
    /// Custom instruction. When `None`, one is generated from the tags.
    pub instruction: Option<String>,
}

impl Default for CotConfig {
    fn default() -> Self {
        Self {
            start_tag: DEFAULT_START_TAG.to_string(),
            end_tag: DEFAULT_END_TAG.to_string(),
            instruction: None,
        }
    }
}

impl CotConfig {
    /// Replace both tags.
    pub fn with_tags(mut self, start_tag: impl Into<String>, end_tag: impl Into<String>) -> Self {
        self.start_tag = start_tag.into();
        self.end_tag = end_tag.into();
        self
    }

    /// Use a custom instruction instead of the generated template.
    ///
    /// The caller is responsible for telling the model to use the same tags
    /// the splitter looks for.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// The instruction to inject: the custom one if set, else the template
    /// filled in with this config's tags.
    pub fn instruction(&self) -> String {
        match &self.instruction {
            Some(custom) => custom.clone(),
            None => cot_instruction(&self.start_tag, &self.end_tag),
        }
    }

    /// Reject configurations the splitter cannot meaningfully act on.
    ///
    /// Equal start and end tags are allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_tag.is_empty() {
            return Err(ConfigError::EmptyStartTag);
        }
        if self.end_tag.is_empty() {
            return Err(ConfigError::EmptyEndTag);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_thinking_tags() {
        let config = CotConfig::default();
        assert_eq!(config.start_tag, "<thinking>");
        assert_eq!(config.end_tag, "</thinking>");
        assert!(config.instruction.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn generated_instruction_follows_custom_tags() {
        let config = CotConfig::default().with_tags("[[", "]]");
        let instruction = config.instruction();
        assert!(instruction.contains("[["));
        assert!(instruction.contains("]]"));
        assert!(!instruction.contains("<thinking>"));
    }

    #[test]
    fn custom_instruction_wins() {
        let config = CotConfig::default().with_instruction("Think in <thinking> tags.");
        assert_eq!(config.instruction(), "Think in <thinking> tags.");
    }

    #[test]
    fn empty_tags_rejected() {
        let config = CotConfig::default().with_tags("", "</x>");
        assert_eq!(config.validate(), Err(ConfigError::EmptyStartTag));

        let config = CotConfig::default().with_tags("<x>", "");
        assert_eq!(config.validate(), Err(ConfigError::EmptyEndTag));
    }

    #[test]
    fn equal_tags_allowed() {
        let config = CotConfig::default().with_tags("|||", "|||");
        assert!(config.validate().is_ok());
    }
}
