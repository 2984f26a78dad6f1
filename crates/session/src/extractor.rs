//! Turns raw generator text into an [`ActionCommand`].
//!
//! Strategies run in order and the first success wins:
//! 1. a fenced JSON object (```` ```json {…} ``` ````),
//! 2. the whole text as JSON,
//! 3. keyword heuristics over the prose.
//!
//! Finding nothing is a normal outcome (`None`), not an error.

use std::ops::Range;

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    tracing::debug,
    wayfinder_common::{ActionCommand, ActionKind},
};

const NAVIGATE_KEYWORDS: &[&str] = &["navigate", "url", "go to", "open", "visit", "移動", "開"];
const CLICK_KEYWORDS: &[&str] = &["click", "press", "tap", "クリック", "押"];
const TYPE_KEYWORDS: &[&str] = &["type", "enter", "input", "入力", "タイプ"];

const QUOTE_PAIRS: &[(char, char)] = &[
    ('「', '」'),
    ('『', '』'),
    ('“', '”'),
    ('"', '"'),
    ('\'', '\''),
];

/// Selector used for inferred `type` commands.
pub const DEFAULT_INPUT_SELECTOR: &str = "input";

/// Prefix of `reasoning` on every heuristic match.
pub const INFERRED_PREFIX: &str = "inferred:";

/// Run the full strategy chain.
pub fn extract_command(text: &str) -> Option<ActionCommand> {
    if let Some(cmd) = parse_structured(text) {
        return Some(cmd);
    }
    let inferred = infer_command(text);
    if let Some(cmd) = &inferred {
        debug!(action = %cmd.action, "command inferred from prose");
    }
    inferred
}

/// Only the JSON strategies (fenced block, then whole text).
pub fn parse_structured(text: &str) -> Option<ActionCommand> {
    fenced_blocks(text)
        .into_iter()
        .filter(|block| block.starts_with('{'))
        .find_map(parse_command)
        .or_else(|| parse_command(text.trim()))
}

fn parse_command(raw: &str) -> Option<ActionCommand> {
    let cmd: ActionCommand = serde_json::from_str(raw).ok()?;
    (!cmd.action.trim().is_empty()).then_some(cmd)
}

/// Bodies of every closed ```` ``` ```` fence, with a leading `json` tag
/// stripped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after = &rest[open + FENCE.len()..];
        let Some(close) = after.find(FENCE) else {
            break;
        };
        let body = after[..close].trim_start();
        let body = body
            .strip_prefix("json")
            .or_else(|| body.strip_prefix("JSON"))
            .unwrap_or(body);
        blocks.push(body.trim());
        rest = &after[close + FENCE.len()..];
    }

    blocks
}

// ── Heuristics ──────────────────────────────────────────────────────────────

/// Most characters allowed between a keyword and the quoted phrase it
/// applies to (`click the "Sign in"`, `「ログイン」ボタンをクリック`).
const MAX_KEYWORD_GAP: usize = 12;

fn infer_command(text: &str) -> Option<ActionCommand> {
    // ASCII-only lowering keeps byte offsets identical to `text`.
    let lower = text.to_ascii_lowercase();

    if !keyword_hits(&lower, NAVIGATE_KEYWORDS).is_empty()
        && let Some(url) = find_url(text)
    {
        return Some(
            ActionCommand::navigate(url)
                .with_reasoning(format!("{INFERRED_PREFIX} navigation to {url}")),
        );
    }

    if let Some(target) = phrase_near(text, &keyword_hits(&lower, CLICK_KEYWORDS)) {
        let mut params = Map::new();
        params.insert("selector".into(), Value::String(target.to_string()));
        return Some(
            ActionCommand::new(ActionKind::Click, params)
                .with_reasoning(format!("{INFERRED_PREFIX} click on \"{target}\"")),
        );
    }

    if let Some(phrase) = phrase_near(text, &keyword_hits(&lower, TYPE_KEYWORDS)) {
        let mut params = Map::new();
        params.insert(
            "selector".into(),
            Value::String(DEFAULT_INPUT_SELECTOR.to_string()),
        );
        params.insert("text".into(), Value::String(phrase.to_string()));
        return Some(
            ActionCommand::new(ActionKind::Type, params)
                .with_reasoning(format!("{INFERRED_PREFIX} typing \"{phrase}\"")),
        );
    }

    None
}

/// Byte ranges of every keyword occurrence. ASCII keywords only count as
/// whole words ("press" is not found in "pressure"); CJK keywords match
/// anywhere.
fn keyword_hits(lower: &str, keywords: &[&str]) -> Vec<Range<usize>> {
    let mut hits = Vec::new();
    for keyword in keywords {
        for (start, _) in lower.match_indices(keyword) {
            let end = start + keyword.len();
            if keyword.is_ascii() && touches_word(lower, start, end) {
                continue;
            }
            hits.push(start..end);
        }
    }
    hits
}

fn touches_word(text: &str, start: usize, end: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        || text[end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
}

/// First `http(s)://` URL made of URL-safe ASCII, without trailing sentence
/// punctuation.
fn find_url(text: &str) -> Option<&str> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| text.find(scheme))
        .min()?;
    let rest = &text[start..];
    let end = rest
        .char_indices()
        .find(|&(_, c)| !is_url_char(c))
        .map_or(rest.len(), |(i, _)| i);
    let url = rest[..end].trim_end_matches(['.', ',', ';', ':', '!', '?']);

    let (_, host) = url.split_once("://")?;
    (!host.is_empty()).then_some(url)
}

fn is_url_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&*+,;=%".contains(c)
}

/// A quoted phrase; `span` covers both quote marks.
struct Quoted<'a> {
    span: Range<usize>,
    phrase: &'a str,
}

/// Earliest quoted phrase that sits next to one of `hits`. A keyword inside
/// the quotes does not count.
fn phrase_near<'a>(text: &'a str, hits: &[Range<usize>]) -> Option<&'a str> {
    if hits.is_empty() {
        return None;
    }
    let gap = |from: usize, to: usize| text[from..to].chars().count();
    quoted_phrases(text)
        .into_iter()
        .find(|q| {
            hits.iter().any(|hit| {
                if hit.end <= q.span.start {
                    gap(hit.end, q.span.start) <= MAX_KEYWORD_GAP
                } else if q.span.end <= hit.start {
                    gap(q.span.end, hit.start) <= MAX_KEYWORD_GAP
                } else {
                    false
                }
            })
        })
        .map(|q| q.phrase)
}

/// Every non-empty quoted phrase across all recognised quote styles, in
/// text order.
fn quoted_phrases(text: &str) -> Vec<Quoted<'_>> {
    let mut found: Vec<Quoted<'_>> = QUOTE_PAIRS
        .iter()
        .flat_map(|&(open, close)| quoted_spans(text, open, close))
        .collect();
    found.sort_by_key(|q| q.span.start);
    found
}

fn quoted_spans(text: &str, open: char, close: char) -> Vec<Quoted<'_>> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find(open) {
        let start = from + rel;
        let inner = start + open.len_utf8();
        // An ASCII apostrophe inside a word ("don't") is not a quote.
        if open == '\''
            && text[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric)
        {
            from = inner;
            continue;
        }
        let Some(len) = text[inner..].find(close) else {
            break;
        };
        let end = inner + len + close.len_utf8();
        let phrase = text[inner..inner + len].trim();
        if !phrase.is_empty() {
            spans.push(Quoted {
                span: start..end,
                phrase,
            });
        }
        from = end;
    }
    spans
}

// ── Suggestions and analysis ────────────────────────────────────────────────

/// One next step proposed by the generator for the current page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl SuggestedAction {
    /// Placeholder returned when no usable suggestions exist.
    pub fn error(description: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            action: "error".into(),
            params: Map::new(),
            description: Some(description.into()),
            reasoning: Some(reasoning.into()),
        }
    }
}

/// Parse a JSON array of suggestions (fenced or whole text). Unparseable
/// output yields a single `error` suggestion.
pub fn extract_suggestions(text: &str) -> Vec<SuggestedAction> {
    let parsed = fenced_blocks(text)
        .into_iter()
        .filter(|block| block.starts_with('['))
        .find_map(|block| serde_json::from_str::<Vec<SuggestedAction>>(block).ok())
        .or_else(|| serde_json::from_str(text.trim()).ok());

    match parsed {
        Some(list) => list,
        None => vec![SuggestedAction::error(
            "could not parse suggestions",
            "the generator response was not a JSON array of actions",
        )],
    }
}

/// Any JSON object in the text (fenced first, then whole text).
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let as_object = |raw: &str| match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };
    fenced_blocks(text)
        .into_iter()
        .filter(|block| block.starts_with('{'))
        .find_map(as_object)
        .or_else(|| as_object(text.trim()))
}
