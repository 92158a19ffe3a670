//! The two request flows and everything that differs between them.
//!
//! Both flows run through the same responder; a [`Flow`] supplies the prompt,
//! the opening status line and the fixed strings the encoder emits.

use serde::{Deserialize, Deserializer, Serialize};

use super::error::{Error, Result};

/// Audience used when an ideas request omits one.
pub const DEFAULT_AUDIENCE: &str = "初心者";

/// Which pipeline a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Blog topic ideas for a technology and audience.
    Ideas,
    /// Review of a submitted blog draft.
    Review,
}

/// Fixed strings that vary between flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowLiterals {
    /// Content of the `initial` trace.
    pub initial: &'static str,
    /// Tool name placeholder when the first step called no tool.
    pub no_tool: &'static str,
    /// Query placeholder when the first tool call had no query.
    pub no_query: &'static str,
    /// Content of the `tool-result` trace.
    pub tool_result: &'static str,
    /// Status emitted after the last text chunk.
    pub completed: &'static str,
    /// Whether `thinking` steps get their own trace kind.
    pub thinking_steps: bool,
}

const IDEAS: FlowLiterals = FlowLiterals {
    initial: "エージェントが処理を開始しました",
    no_tool: "Unknown Tool",
    no_query: "Unknown Query",
    tool_result: "検索完了",
    completed: "出力完了",
    thinking_steps: false,
};

const REVIEW: FlowLiterals = FlowLiterals {
    initial: "エージェントが記事の分析を開始しました",
    no_tool: "No Tool",
    no_query: "No Query",
    tool_result: "分析完了",
    completed: "レビュー完了",
    thinking_steps: true,
};

impl Flow {
    /// The literal table for this flow.
    #[must_use]
    pub const fn literals(self) -> &'static FlowLiterals {
        match self {
            Self::Ideas => &IDEAS,
            Self::Review => &REVIEW,
        }
    }

    /// Name used in logs and routes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ideas => "ideas",
            Self::Review => "review",
        }
    }
}

/// Body of `POST /api/stream` and `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdeaRequest {
    /// Technology to research.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tech: String,

    /// Intended readers, for example `初心者` or `上級者`.
    #[serde(default = "default_audience", deserialize_with = "null_as_empty")]
    pub target_audience: String,
}

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

/// Read an explicit `null` the same way as a missing field.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of `POST /api/review`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewRequest {
    /// Blog draft to review.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// A validated-or-not request for either flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowRequest {
    Ideas(IdeaRequest),
    Review(ReviewRequest),
}

impl FlowRequest {
    /// Build an ideas request, defaulting an empty audience.
    #[must_use]
    pub fn ideas(tech: impl Into<String>, target_audience: impl Into<String>) -> Self {
        let mut target_audience = target_audience.into();
        if target_audience.trim().is_empty() {
            target_audience = default_audience();
        }
        Self::Ideas(IdeaRequest {
            tech: tech.into(),
            target_audience,
        })
    }

    /// Build a review request.
    #[must_use]
    pub fn review(content: impl Into<String>) -> Self {
        Self::Review(ReviewRequest {
            content: content.into(),
        })
    }

    /// The flow this request runs through.
    #[must_use]
    pub const fn flow(&self) -> Flow {
        match self {
            Self::Ideas(_) => Flow::Ideas,
            Self::Review(_) => Flow::Review,
        }
    }

    /// Reject requests whose required text is empty or blank.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Ideas(req) if req.tech.trim().is_empty() => {
                Err(Error::Validation("Tech is required".to_string()))
            }
            Self::Review(req) if req.content.trim().is_empty() => {
                Err(Error::Validation("Content is required".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// The prompt handed to the agent.
    #[must_use]
    pub fn prompt(&self) -> String {
        match self {
            Self::Ideas(req) => format!(
                "{}に関する最新情報を検索し、{}向けのブログ記事のアイデアを提案してください。",
                req.tech, req.target_audience
            ),
            Self::Review(req) => req.content.clone(),
        }
    }

    /// The first status line of the stream.
    #[must_use]
    pub fn start_status(&self) -> String {
        match self {
            Self::Ideas(req) => format!(
                "検索開始: {}に関する最新情報を取得します (対象: {})",
                req.tech, req.target_audience
            ),
            Self::Review(_) => "レビュー開始: ブログ記事の分析を開始します".to_string(),
        }
    }

    /// Run metadata recorded on the agent span.
    #[must_use]
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let value = match self {
            Self::Ideas(req) => serde_json::json!({
                "query": req.tech,
                "targetAudience": req.target_audience,
            }),
            Self::Review(req) => serde_json::json!({
                "sessionId": format!("session-{}", chrono::Utc::now().timestamp_millis()),
                "contentLength": req.content.chars().count(),
            }),
        };

        match value {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideas_prompt_and_status_interpolate_request() {
        let req = FlowRequest::ideas("Rust", "中級者");
        assert_eq!(
            req.prompt(),
            "Rustに関する最新情報を検索し、中級者向けのブログ記事のアイデアを提案してください。"
        );
        assert_eq!(
            req.start_status(),
            "検索開始: Rustに関する最新情報を取得します (対象: 中級者)"
        );
    }

    #[test]
    fn review_prompt_is_content_verbatim() {
        let req = FlowRequest::review("# 下書き\n本文");
        assert_eq!(req.prompt(), "# 下書き\n本文");
        assert_eq!(req.start_status(), "レビュー開始: ブログ記事の分析を開始します");
    }

    #[test]
    fn blank_required_fields_fail_validation() {
        let err = FlowRequest::review("   ").validate().unwrap_err();
        assert_eq!(err.to_string(), "Content is required");

        let err = FlowRequest::ideas("", "上級者").validate().unwrap_err();
        assert_eq!(err.to_string(), "Tech is required");

        assert!(FlowRequest::review("ok").validate().is_ok());
    }

    #[test]
    fn missing_audience_defaults_to_beginners() {
        let req: IdeaRequest = serde_json::from_str(r#"{"tech":"Go"}"#).unwrap();
        assert_eq!(req.target_audience, DEFAULT_AUDIENCE);

        let FlowRequest::Ideas(req) = FlowRequest::ideas("Go", " ") else {
            panic!("expected ideas request");
        };
        assert_eq!(req.target_audience, DEFAULT_AUDIENCE);
    }

    #[test]
    fn missing_review_content_deserializes_empty() {
        let req: ReviewRequest = serde_json::from_str("{}").unwrap();
        assert!(req.content.is_empty());
    }

    #[test]
    fn null_fields_read_as_missing() {
        let req: ReviewRequest = serde_json::from_str(r#"{"content":null}"#).unwrap();
        assert!(req.content.is_empty());

        let req: IdeaRequest =
            serde_json::from_str(r#"{"tech":null,"targetAudience":null}"#).unwrap();
        assert!(req.tech.is_empty());
        assert!(req.target_audience.is_empty());

        let FlowRequest::Ideas(req) = FlowRequest::ideas(req.tech, req.target_audience) else {
            panic!("expected ideas request");
        };
        assert_eq!(req.target_audience, DEFAULT_AUDIENCE);
    }

    #[test]
    fn review_metadata_carries_session_and_length() {
        let meta = FlowRequest::review("あいう").metadata();
        assert_eq!(meta["contentLength"], 3);
        assert!(meta["sessionId"].as_str().unwrap().starts_with("session-"));
    }

    #[test]
    fn literal_tables_differ_per_flow() {
        assert_eq!(Flow::Ideas.literals().tool_result, "検索完了");
        assert_eq!(Flow::Review.literals().tool_result, "分析完了");
        assert!(!Flow::Ideas.literals().thinking_steps);
        assert!(Flow::Review.literals().thinking_steps);
    }
}
