//! Prompt definition and builder API.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{GetPromptResult, PromptArgument, PromptDefinition};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type PromptFn =
    dyn Fn(HashMap<String, String>) -> BoxFuture<'static, Result<GetPromptResult>> + Send + Sync;

/// A prompt template with declared arguments.
pub struct Prompt {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
    handler: Arc<PromptFn>,
}

impl Prompt {
    pub fn builder(name: impl Into<String>) -> PromptBuilder {
        PromptBuilder::new(name)
    }

    /// The definition for `prompts/list`.
    pub fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self.arguments.clone(),
        }
    }

    /// Render the prompt with the given arguments.
    pub fn get(&self, arguments: HashMap<String, String>) -> BoxFuture<'static, Result<GetPromptResult>> {
        (self.handler)(arguments)
    }
}

/// Builder for prompts.
pub struct PromptBuilder {
    name: String,
    description: Option<String>,
    arguments: Vec<PromptArgument>,
}

impl PromptBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required_arg(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: Some(description.into()),
            required: true,
        });
        self
    }

    pub fn optional_arg(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: Some(description.into()),
            required: false,
        });
        self
    }

    /// Finish with a rendering handler.
    pub fn handler<F, Fut>(self, handler: F) -> Prompt
    where
        F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GetPromptResult>> + Send + 'static,
    {
        Prompt {
            name: self.name,
            description: self.description,
            arguments: self.arguments,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prompt_renders_with_arguments() {
        let prompt = PromptBuilder::new("plan_outdoor_activity")
            .description("Plan an activity around the weather")
            .required_arg("activity", "The activity to plan")
            .optional_arg("location", "Where")
            .handler(|args| async move {
                let activity = args.get("activity").cloned().unwrap_or_default();
                Ok(GetPromptResult::user_message(format!(
                    "Find a good window for {} using weather.assess_activity_windows.",
                    activity
                )))
            });

        let def = prompt.definition();
        assert_eq!(def.arguments.len(), 2);
        assert!(def.arguments[0].required);
        assert!(!def.arguments[1].required);

        let mut args = HashMap::new();
        args.insert("activity".to_string(), "running".to_string());
        let result = prompt.get(args).await.unwrap();
        match &result.messages[0].content {
            crate::protocol::Content::Text { text } => {
                assert!(text.contains("running"));
            }
        }
    }
}
