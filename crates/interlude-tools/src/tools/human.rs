//! Human-assistance tool - suspends the run until a person answers
//!
//! Two flavours share the reserved name `human_assistance`:
//!
//! - `query`:  args `{query}`, payload `{query}`, resume `{data}` becomes the result.
//! - `review`: args `{name, birthday}`, payload `{question, name, birthday}`,
//!   resume `{correct: "y..."}` confirms, otherwise `{name?, birthday?}` corrects.

use crate::registry::{Resolution, Tool, ToolResult};
use interlude_core::Arguments;
use serde_json::{json, Value};

pub const HUMAN_ASSISTANCE: &str = "human_assistance";

const REVIEW_QUESTION: &str = "Is this correct?";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssistanceMode {
    /// Free-form question answered with free-form text.
    Query,
    /// Confirm or correct extracted `name` / `birthday`.
    #[default]
    Review,
}

impl AssistanceMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(Self::Query),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

pub struct HumanAssistanceTool {
    mode: AssistanceMode,
}

impl HumanAssistanceTool {
    pub fn new(mode: AssistanceMode) -> Self {
        Self { mode }
    }

    pub fn query() -> Self {
        Self::new(AssistanceMode::Query)
    }

    pub fn review() -> Self {
        Self::new(AssistanceMode::Review)
    }

    pub fn mode(&self) -> AssistanceMode {
        self.mode
    }
}

fn str_arg<'a>(args: &'a Arguments, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

#[async_trait::async_trait]
impl Tool for HumanAssistanceTool {
    fn name(&self) -> &str {
        HUMAN_ASSISTANCE
    }

    fn description(&self) -> &str {
        "Request assistance from a human."
    }

    fn input_schema(&self) -> Value {
        match self.mode {
            AssistanceMode::Query => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "What to ask the human" }
                },
                "required": ["query"]
            }),
            AssistanceMode::Review => json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "birthday": { "type": "string" }
                },
                "required": ["name", "birthday"]
            }),
        }
    }

    fn suspends(&self) -> bool {
        true
    }

    async fn execute(&self, args: Arguments) -> ToolResult {
        match self.mode {
            AssistanceMode::Query => match str_arg(&args, "query") {
                Some(query) => ToolResult::suspend(json!({ "query": query })),
                None => ToolResult::error("missing required argument: query"),
            },
            AssistanceMode::Review => ToolResult::suspend(json!({
                "question": REVIEW_QUESTION,
                "name": str_arg(&args, "name").unwrap_or_default(),
                "birthday": str_arg(&args, "birthday").unwrap_or_default(),
            })),
        }
    }

    fn resolve(&self, args: &Arguments, resume: &Value) -> Option<Resolution> {
        match self.mode {
            AssistanceMode::Query => {
                let answer = resume
                    .get("data")
                    .and_then(Value::as_str)
                    .or_else(|| resume.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| resume.to_string());
                Some(Resolution::content(answer))
            }
            AssistanceMode::Review => {
                let name = str_arg(args, "name").unwrap_or_default();
                let birthday = str_arg(args, "birthday").unwrap_or_default();
                let confirmed = resume
                    .get("correct")
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.to_lowercase().starts_with('y'));
                if confirmed {
                    return Some(
                        Resolution::content("Correct")
                            .with_update("name", name)
                            .with_update("birthday", birthday),
                    );
                }
                let verified_name = resume.get("name").and_then(Value::as_str).unwrap_or(name);
                let verified_birthday = resume
                    .get("birthday")
                    .and_then(Value::as_str)
                    .unwrap_or(birthday);
                Some(
                    Resolution::content(format!("Made a correction: {}", resume))
                        .with_update("name", verified_name)
                        .with_update("birthday", verified_birthday),
                )
            }
        }
    }
}
