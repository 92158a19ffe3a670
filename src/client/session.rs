//! Client-side classification of trace events into display items.

use std::fmt;

use chrono::{DateTime, Local};

use super::http::ClientError;
use super::lines::LineDecoder;
use crate::core::{TraceEvent, TraceKind};

/// Tool output up to this many characters is shown inline.
const INLINE_RESULT_CHARS: usize = 50;

/// Identifier of a trace item, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display category of a trace item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TraceCategory {
    Thinking,
    ToolCall,
    ToolResult,
    Observation,
    Reasoning,
    SearchStart,
    SearchComplete,
    Completed,
    Tokens,
    Initial,
    Error,
    Cancelled,
    Other,
    /// A trace kind with no dedicated category, named by its `traceType`.
    Custom(String),
}

impl TraceCategory {
    /// Category of a status line, by its prefix.
    #[must_use]
    pub fn of_status(content: &str) -> Self {
        const PREFIXES: [(&str, TraceCategory); 10] = [
            ("思考中:", TraceCategory::Thinking),
            ("ツール使用:", TraceCategory::ToolCall),
            ("ツール結果:", TraceCategory::ToolResult),
            ("観察:", TraceCategory::Observation),
            ("推論:", TraceCategory::Reasoning),
            ("検索開始:", TraceCategory::SearchStart),
            ("検索完了", TraceCategory::SearchComplete),
            ("情報取得完了:", TraceCategory::Completed),
            ("合計トークン数:", TraceCategory::Tokens),
            ("初期化:", TraceCategory::Initial),
        ];

        PREFIXES
            .into_iter()
            .find(|(prefix, _)| content.starts_with(prefix))
            .map_or(Self::Other, |(_, category)| category)
    }
}

/// One line in the trace list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceItem {
    pub id: ItemId,
    pub text: String,
    pub kind: TraceCategory,
    pub expanded: bool,
    pub details: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl TraceItem {
    /// Whether the item can be expanded.
    #[must_use]
    pub const fn has_details(&self) -> bool {
        self.details.is_some()
    }
}

/// State of the current request as seen by the client.
///
/// Items are append-only while a request runs and are discarded when the
/// next one begins.
#[derive(Debug, Default)]
pub struct TraceSession {
    items: Vec<TraceItem>,
    answer: String,
    total_tokens: Option<u64>,
    loading: bool,
    aborted: bool,
    next_id: u64,
    decoder: LineDecoder,
    scroll_requested: bool,
}

impl TraceSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new request and mark it loading.
    pub fn begin(&mut self) {
        self.items.clear();
        self.answer.clear();
        self.total_tokens = None;
        self.loading = true;
        self.aborted = false;
        self.decoder.reset();
        self.scroll_requested = true;
    }

    /// Feed a chunk of the response body.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.aborted {
            return;
        }
        for line in self.decoder.push(chunk) {
            self.apply_line(&line);
        }
    }

    /// The body ended normally.
    pub fn finish(&mut self) {
        if self.aborted {
            return;
        }
        if let Some(line) = self.decoder.finish() {
            self.apply_line(&line);
        }
        self.loading = false;
    }

    /// The user cancelled the request.
    pub fn abort(&mut self) {
        if !self.loading {
            return;
        }
        self.loading = false;
        self.aborted = true;
        self.decoder.reset();
        self.push(TraceCategory::Cancelled, "処理が中止されました", None);
    }

    /// The transport failed.
    ///
    /// Failures after an abort add nothing.
    pub fn fail(&mut self, error: &ClientError) {
        if self.aborted {
            return;
        }
        self.loading = false;
        self.push(TraceCategory::Error, format!("接続エラー: {error}"), None);
    }

    fn apply_line(&mut self, line: &str) {
        match serde_json::from_str::<TraceEvent>(line) {
            Ok(event) => self.apply(event),
            Err(e) => tracing::warn!(error = %e, line, "skipping unparseable trace line"),
        }
    }

    /// Apply one decoded event.
    pub fn apply(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::Content { content } => self.answer.push_str(&content),
            TraceEvent::Status { content } => {
                let kind = TraceCategory::of_status(&content);
                self.push(kind, content, None);
            }
            TraceEvent::Usage { total_tokens } => {
                if self.total_tokens.is_none() {
                    self.total_tokens = total_tokens;
                }
                let shown = total_tokens.map_or_else(|| "N/A".to_string(), |n| n.to_string());
                self.push(TraceCategory::Tokens, format!("合計トークン数: {shown}"), None);
            }
            TraceEvent::Error { content } => {
                self.push(TraceCategory::Error, format!("エラー: {content}"), None);
            }
            trace @ TraceEvent::Trace { .. } => self.apply_trace(trace),
        }
    }

    fn apply_trace(&mut self, event: TraceEvent) {
        let TraceEvent::Trace {
            trace_type,
            content,
            tool_name,
            query,
            tool_results_text,
        } = &event
        else {
            return;
        };
        let content = content.as_deref().filter(|c| !c.is_empty());

        match trace_type {
            TraceKind::Initial => {
                self.push(
                    TraceCategory::Initial,
                    format!("初期化: {}", content.unwrap_or_default()),
                    None,
                );
                let tool_name = tool_name.as_deref().filter(|s| !s.is_empty());
                let query = query.as_deref().filter(|s| !s.is_empty());
                if let (Some(tool_name), Some(query)) = (tool_name, query) {
                    self.push(
                        TraceCategory::ToolCall,
                        format!("ツール使用: {tool_name}\n検索クエリ: {query}"),
                        None,
                    );
                }
            }
            TraceKind::ToolResultsData => {
                let Some(text) = tool_results_text.as_deref().filter(|s| !s.is_empty()) else {
                    return;
                };
                if text.chars().count() <= INLINE_RESULT_CHARS {
                    self.push(TraceCategory::ToolResult, text, None);
                } else {
                    let head: String = text.chars().take(INLINE_RESULT_CHARS).collect();
                    self.push(
                        TraceCategory::ToolResult,
                        format!("{head}..."),
                        Some(text.to_string()),
                    );
                }
            }
            TraceKind::ToolResult => {
                self.push(
                    TraceCategory::SearchComplete,
                    content.unwrap_or("検索完了"),
                    None,
                );
            }
            TraceKind::Reasoning => {
                self.push(
                    TraceCategory::Reasoning,
                    format!("推論: {}", content.unwrap_or_default()),
                    None,
                );
            }
            TraceKind::Thinking => {
                self.push(TraceCategory::Thinking, content.unwrap_or("思考中..."), None);
            }
            TraceKind::Other(kind) => {
                let text = content.map_or_else(
                    || serde_json::to_string(&event).unwrap_or_default(),
                    str::to_string,
                );
                self.push(TraceCategory::Custom(kind.clone()), text, None);
            }
        }
    }

    fn push(&mut self, kind: TraceCategory, text: impl Into<String>, details: Option<String>) {
        self.next_id += 1;
        self.items.push(TraceItem {
            id: ItemId(self.next_id),
            text: text.into(),
            kind,
            expanded: false,
            details,
            timestamp: Local::now(),
        });
        self.scroll_requested = true;
    }

    /// Flip an item's expansion. Items without details are left alone.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.has_details() => {
                item.expanded = !item.expanded;
                true
            }
            _ => false,
        }
    }

    /// Expand or collapse every item that has details.
    pub fn set_all_expanded(&mut self, expanded: bool) {
        for item in self.items.iter_mut().filter(|item| item.has_details()) {
            item.expanded = expanded;
        }
    }

    /// Whether an append happened since the last call.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    #[must_use]
    pub fn items(&self) -> &[TraceItem] {
        &self.items
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub const fn total_tokens(&self) -> Option<u64> {
        self.total_tokens
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> TraceSession {
        let mut session = TraceSession::new();
        session.begin();
        session
    }

    fn kinds(session: &TraceSession) -> Vec<TraceCategory> {
        session.items().iter().map(|item| item.kind.clone()).collect()
    }

    #[test]
    fn content_accumulates_into_answer() {
        let mut s = session();
        s.feed(b"{\"type\":\"content\",\"content\":\"Hello \"}\n{\"type\":\"content\",\"content\":\"world\"}\n");
        assert_eq!(s.answer(), "Hello world");
        assert!(s.items().is_empty());
    }

    #[test]
    fn initial_trace_yields_initial_and_tool_call_items() {
        let mut s = session();
        s.apply(TraceEvent::initial("開始", "Search", "Q"));

        assert_eq!(kinds(&s), vec![TraceCategory::Initial, TraceCategory::ToolCall]);
        assert_eq!(s.items()[0].text, "初期化: 開始");
        assert_eq!(s.items()[1].text, "ツール使用: Search\n検索クエリ: Q");
    }

    #[test]
    fn initial_trace_without_query_has_no_tool_call() {
        let mut s = session();
        s.apply(TraceEvent::initial("開始", "Search", ""));
        assert_eq!(kinds(&s), vec![TraceCategory::Initial]);
    }

    #[test]
    fn short_tool_output_is_inline() {
        let mut s = session();
        let text = "a".repeat(50);
        s.apply(TraceEvent::tool_results_data(text.clone()));

        let item = &s.items()[0];
        assert_eq!(item.kind, TraceCategory::ToolResult);
        assert_eq!(item.text, text);
        assert!(item.details.is_none());
        assert!(!item.expanded);
    }

    #[test]
    fn long_tool_output_is_truncated_with_details() {
        let mut s = session();
        let text = "あ".repeat(51);
        s.apply(TraceEvent::tool_results_data(text.clone()));

        let item = &s.items()[0];
        assert_eq!(item.text, format!("{}...", "あ".repeat(50)));
        assert_eq!(item.details.as_deref(), Some(text.as_str()));
        assert!(!item.expanded);
    }

    #[test]
    fn empty_tool_output_adds_nothing() {
        let mut s = session();
        s.apply(TraceEvent::tool_results_data(""));
        assert!(s.items().is_empty());
    }

    #[test]
    fn trace_kinds_map_to_categories() {
        let mut s = session();
        s.apply(TraceEvent::trace(TraceKind::ToolResult, "分析完了"));
        s.apply(TraceEvent::trace(TraceKind::Reasoning, "理由"));
        s.apply(TraceEvent::trace(TraceKind::Thinking, ""));
        s.apply(TraceEvent::trace(TraceKind::from("continue"), "続き"));

        assert_eq!(
            kinds(&s),
            vec![
                TraceCategory::SearchComplete,
                TraceCategory::Reasoning,
                TraceCategory::Thinking,
                TraceCategory::Custom("continue".to_string()),
            ]
        );
        let texts: Vec<&str> = s.items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["分析完了", "推論: 理由", "思考中...", "続き"]);
    }

    #[test]
    fn custom_trace_without_content_shows_the_event() {
        let mut s = session();
        s.feed(b"{\"type\":\"trace\",\"traceType\":\"step\"}\n");
        assert_eq!(s.items()[0].text, r#"{"type":"trace","traceType":"step"}"#);
    }

    #[test]
    fn status_lines_are_classified_by_prefix() {
        for (content, kind) in [
            ("思考中: x", TraceCategory::Thinking),
            ("ツール使用: x", TraceCategory::ToolCall),
            ("ツール結果: x", TraceCategory::ToolResult),
            ("観察: x", TraceCategory::Observation),
            ("推論: x", TraceCategory::Reasoning),
            ("検索開始: x", TraceCategory::SearchStart),
            ("検索完了", TraceCategory::SearchComplete),
            ("情報取得完了: stop", TraceCategory::Completed),
            ("合計トークン数: 5", TraceCategory::Tokens),
            ("初期化: x", TraceCategory::Initial),
            ("出力完了", TraceCategory::Other),
        ] {
            assert_eq!(TraceCategory::of_status(content), kind, "{content}");
        }
    }

    #[test]
    fn usage_sets_tokens_and_adds_item() {
        let mut s = session();
        s.apply(TraceEvent::usage(Some(42)));
        s.apply(TraceEvent::usage(Some(7)));

        assert_eq!(s.total_tokens(), Some(42));
        assert_eq!(s.items()[0].text, "合計トークン数: 42");

        s.apply(TraceEvent::usage(None));
        assert_eq!(s.items()[2].text, "合計トークン数: N/A");
    }

    #[test]
    fn error_event_adds_error_item() {
        let mut s = session();
        s.apply(TraceEvent::error("boom"));
        assert_eq!(s.items()[0].kind, TraceCategory::Error);
        assert_eq!(s.items()[0].text, "エラー: boom");
    }

    #[test]
    fn malformed_line_does_not_stop_later_lines() {
        let mut s = session();
        s.feed(b"{not json}\n{\"type\":\"status\",\"content\":\"A\"}\n");
        s.finish();

        assert_eq!(s.items().len(), 1);
        assert_eq!(s.items()[0].text, "A");
        assert!(!s.is_loading());
    }

    #[test]
    fn trailing_line_without_newline_is_applied_on_finish() {
        let mut s = session();
        s.feed(b"{\"type\":\"content\",\"content\":\"x\"}");
        assert_eq!(s.answer(), "");
        s.finish();
        assert_eq!(s.answer(), "x");
    }

    #[test]
    fn ids_increase_monotonically() {
        let mut s = session();
        s.apply(TraceEvent::status("a"));
        s.apply(TraceEvent::status("b"));
        s.begin();
        s.apply(TraceEvent::status("c"));

        assert_eq!(s.items().len(), 1);
        assert_eq!(s.items()[0].id, ItemId(3));
    }

    #[test]
    fn abort_stops_loading_without_error() {
        let mut s = session();
        s.apply(TraceEvent::status("検索開始: x"));
        s.abort();
        s.fail(&ClientError::Stream("connection reset".to_string()));
        s.feed(b"{\"type\":\"status\",\"content\":\"late\"}\n");

        assert!(!s.is_loading());
        assert!(!kinds(&s).contains(&TraceCategory::Error));
        assert_eq!(s.items().last().unwrap().kind, TraceCategory::Cancelled);
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn transport_failure_adds_connection_error() {
        let mut s = session();
        s.fail(&ClientError::Status(502));

        assert!(!s.is_loading());
        assert_eq!(s.items()[0].text, "接続エラー: API error: 502");
    }

    #[test]
    fn toggle_only_affects_items_with_details() {
        let mut s = session();
        s.apply(TraceEvent::status("plain"));
        s.apply(TraceEvent::tool_results_data("x".repeat(80)));
        let plain = s.items()[0].id;
        let rich = s.items()[1].id;

        assert!(!s.toggle(plain));
        assert!(!s.items()[0].expanded);

        assert!(s.toggle(rich));
        assert!(s.items()[1].expanded);

        s.set_all_expanded(false);
        assert!(!s.items()[1].expanded);
        s.set_all_expanded(true);
        assert!(s.items()[1].expanded);
        assert!(!s.items()[0].expanded);
    }

    #[test]
    fn appends_raise_a_scroll_request() {
        let mut s = session();
        assert!(s.take_scroll_request());
        assert!(!s.take_scroll_request());

        s.apply(TraceEvent::status("a"));
        assert!(s.take_scroll_request());
    }
}
