//! System instruction for the generation backend.
//!
//! [`SystemPrompt`] renders the fixed assistant rules plus an optional
//! runtime section listing the tools available in this process.

/// Base instruction for the Kubernetes assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a Kubernetes assistant with access to cluster tools.

RULES:
1. Call tools only when the user asks about cluster state (pods, deployments, services, nodes, logs).
2. Answer greetings and general questions directly, without tools.
3. Call several tools in one turn when the question needs them.
4. After tool results arrive, answer with a clear summary of what they show.
5. Render lists of pods or deployments as readable tables.

Before calling a tool, decide whether the question needs one. If it does not, just answer."#;

/// Builder for the system instruction sent with every generation call.
///
/// # Example
///
/// ```rust
/// use kubepilot::agent::SystemPrompt;
///
/// let prompt = SystemPrompt::new()
///     .with_tools(vec!["list_pods".to_string(), "get_logs".to_string()])
///     .build();
/// assert!(prompt.starts_with("You are a Kubernetes assistant"));
/// assert!(prompt.contains("Available tools: list_pods, get_logs"));
/// ```
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    base: String,
    tools: Vec<String>,
    current_time: Option<String>,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self {
            base: DEFAULT_SYSTEM_PROMPT.to_string(),
            tools: Vec::new(),
            current_time: None,
        }
    }
}

impl SystemPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the base instruction.
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = base.to_string();
        self
    }

    /// List tool names in the runtime section.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Stamp the runtime section with the current UTC time.
    pub fn with_current_time(mut self) -> Self {
        self.current_time = Some(chrono::Utc::now().to_rfc3339());
        self
    }

    pub fn build(&self) -> String {
        let mut lines = Vec::new();
        if !self.tools.is_empty() {
            lines.push(format!("- Available tools: {}", self.tools.join(", ")));
        }
        if let Some(time) = &self.current_time {
            lines.push(format!("- Started: {}", time));
        }
        if lines.is_empty() {
            return self.base.clone();
        }
        format!("{}\n\n## Runtime\n{}", self.base, lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_base_only() {
        assert_eq!(SystemPrompt::new().build(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_runtime_section() {
        let prompt = SystemPrompt::new()
            .with_tools(vec!["list_pods".into()])
            .with_current_time()
            .build();
        assert!(prompt.contains("## Runtime"));
        assert!(prompt.contains("- Available tools: list_pods"));
        assert!(prompt.contains("- Started: "));
    }

    #[test]
    fn test_custom_base() {
        let prompt = SystemPrompt::new().with_base("Be terse.").build();
        assert_eq!(prompt, "Be terse.");
    }
}
