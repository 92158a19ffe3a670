//! Tool definitions and execution.

use agent_core::{AgentError, Result, Tool};

use crate::core::search::{BraveSearch, WebSearchParams};

/// Name the model uses to call the web search tool.
pub const WEB_SEARCH_TOOL: &str = "brave_web_search";

/// Tools available to an agent.
///
/// A registry without a search client offers no tools at all.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    search: Option<BraveSearch>,
}

impl ToolRegistry {
    /// A registry with no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry offering web search.
    #[must_use]
    pub const fn with_search(search: BraveSearch) -> Self {
        Self {
            search: Some(search),
        }
    }

    /// Whether any tool is available.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.search.is_none()
    }

    /// Tool definitions sent to the model.
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        let mut tools = Vec::new();

        if self.search.is_some() {
            tools.push(Tool {
                name: WEB_SEARCH_TOOL.to_string(),
                description: "Search the web with the Brave Search API. Use it to find \
                              recent articles, releases and discussions about a topic."
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query"
                        },
                        "country": {
                            "type": "string",
                            "description": "Country code for results, e.g. JP or US"
                        },
                        "count": {
                            "type": "integer",
                            "description": "Maximum number of results (1-20)"
                        },
                        "search_lang": {
                            "type": "string",
                            "description": "Search language, e.g. ja or en"
                        }
                    },
                    "required": ["query"]
                }),
            });
        }

        tools
    }

    /// Execute a tool by name.
    ///
    /// # Errors
    ///
    /// Returns error if the tool is unknown, its input is invalid, or execution fails.
    pub async fn execute(&self, name: &str, input: serde_json::Value) -> Result<String> {
        match name {
            WEB_SEARCH_TOOL => self.execute_web_search(input).await,
            _ => Err(AgentError::ToolExecution(format!("unknown tool: {name}"))),
        }
    }

    async fn execute_web_search(&self, input: serde_json::Value) -> Result<String> {
        let Some(search) = &self.search else {
            return Err(AgentError::ToolExecution(
                "web search is not configured".to_string(),
            ));
        };

        let params: WebSearchParams = serde_json::from_value(input)
            .map_err(|e| AgentError::ToolExecution(format!("invalid search input: {e}")))?;

        if params.query.trim().is_empty() {
            return Err(AgentError::ToolExecution("missing query".to_string()));
        }

        tracing::info!(query = %params.query, "executing web search");

        search
            .web_search(params)
            .await
            .map(|result| result.output)
            .map_err(|e| AgentError::ToolExecution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::search::SearchDefaults;

    #[test]
    fn empty_registry_has_no_definitions() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.definitions().is_empty());
    }

    #[test]
    fn search_registry_defines_brave_web_search() {
        let registry =
            ToolRegistry::with_search(BraveSearch::new("key", SearchDefaults::default()));
        let tools = registry.definitions();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "brave_web_search");
        assert_eq!(tools[0].input_schema["required"], serde_json::json!(["query"]));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let err = ToolRegistry::new()
            .execute("shell", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown tool: shell"));
    }

    #[tokio::test]
    async fn search_without_client_is_an_error() {
        let err = ToolRegistry::new()
            .execute(WEB_SEARCH_TOOL, serde_json::json!({"query": "Rust"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution(_)));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_any_request() {
        let registry =
            ToolRegistry::with_search(BraveSearch::new("key", SearchDefaults::default()));
        let err = registry
            .execute(WEB_SEARCH_TOOL, serde_json::json!({"query": "  "}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing query"));
    }
}
