//! Prompt construction for every generator call a session makes.

use {
    std::fmt::Write as _,
    wayfinder_common::{ActionCommand, BrowserState, ExecutionResult, GeneratorRequest},
};

const FEEDBACK_MAX_TOKENS: u32 = 300;
const ANALYSIS_MAX_TOKENS: u32 = 800;

/// System prompt declaring the action vocabulary and parameter schema.
pub const INSTRUCTION_SYSTEM_PROMPT: &str = r#"You are an assistant that operates a web browser on the user's behalf.
Decide the single next browser action that moves the user's instruction forward.

Reply with exactly one command in a fenced JSON block:
```json
{
  "action": "<action type>",
  "params": { },
  "reasoning": "<why this action>"
}
```

Available actions:
1. navigate - load a URL
   {"action": "navigate", "params": {"url": "https://www.google.com"}}
2. click - click an element by CSS selector, or at viewport coordinates
   {"action": "click", "params": {"selector": "button.submit"}}
   {"action": "click", "params": {"x": 640, "y": 360}}
3. type - type text into an element, optionally pressing Enter afterwards
   {"action": "type", "params": {"selector": "input#search", "text": "query", "pressEnter": true}}
4. wait - pause for a number of milliseconds
   {"action": "wait", "params": {"time": 2000}}
5. extract - read the text content of an element
   {"action": "extract", "params": {"selector": "div.content"}}
6. scroll - scroll the page; direction is up, down, left or right
   {"action": "scroll", "params": {"direction": "down", "amount": 500}}

Use only these actions and parameter names. Take the current browser state into account."#;

const FEEDBACK_SYSTEM_PROMPT: &str = "You evaluate the outcome of a browser action. Assess progress toward the user's instruction and suggest the next step in a few sentences.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You analyse screenshots of web pages. Identify the page structure, its main elements and the parts a user can interact with.";

/// Short textual summary of a snapshot; screenshots and HTML are referred to,
/// never inlined.
pub fn describe_state(state: &BrowserState) -> String {
    let availability = |present: bool| if present { "available" } else { "unavailable" };
    let mut out = String::new();
    let _ = writeln!(out, "URL: {}", state.url.as_deref().unwrap_or("none"));
    let _ = writeln!(out, "Title: {}", state.title.as_deref().unwrap_or("none"));
    let _ = writeln!(
        out,
        "Screenshot: {}",
        availability(state.screenshot.is_some())
    );
    let _ = write!(
        out,
        "Page content: {}",
        availability(state.content.is_some())
    );
    if let Some(error) = &state.error {
        let _ = write!(out, "\nSnapshot error: {error}");
    }
    out
}

/// The main instruction prompt.
pub fn instruction(prompt: &str, state: &BrowserState, max_tokens: u32) -> GeneratorRequest {
    let user = format!(
        "Current browser state:\n{}\n\nUser instruction: {prompt}\n\nDecide the next browser action.",
        describe_state(state)
    );
    GeneratorRequest::new(INSTRUCTION_SYSTEM_PROMPT, user).with_max_tokens(max_tokens)
}

/// Ask the generator to evaluate a directly executed instruction.
pub fn feedback(prompt: &str, result: &ExecutionResult) -> GeneratorRequest {
    let mut user = format!(
        "Original instruction: {prompt}\n\nResult of the browser action:\nURL: {}\nTitle: {}\nSucceeded: {}",
        result.url.as_deref().unwrap_or("none"),
        result.title.as_deref().unwrap_or("none"),
        if result.success { "yes" } else { "no" },
    );
    if let Some(error) = &result.error {
        let _ = write!(user, "\nError: {error}");
    }
    user.push_str("\n\nEvaluate this result, report progress on the instruction, and propose the next step.");
    GeneratorRequest::new(FEEDBACK_SYSTEM_PROMPT, user).with_max_tokens(FEEDBACK_MAX_TOKENS)
}

/// Ask for a revised command given operator feedback.
pub fn modification(
    original: &ActionCommand,
    feedback: &str,
    state: &BrowserState,
    max_tokens: u32,
) -> GeneratorRequest {
    let original_json =
        serde_json::to_string_pretty(original).unwrap_or_else(|_| original.action.clone());
    let instruction = format!(
        "Revise the following browser command according to the operator's feedback.\n\nOriginal command:\n{original_json}\n\nFeedback: {feedback}\n\nReturn the revised command in the same JSON format."
    );
    self::instruction(&instruction, state, max_tokens)
}

/// Ask for three candidate next actions as a JSON array.
pub fn suggestions(state: &BrowserState, max_tokens: u32) -> GeneratorRequest {
    let instruction = "Analyse the page currently shown and suggest three actions that could be performed next. \
Return them as a JSON array in this format:\n\
[\n  {\n    \"action\": \"<action type>\",\n    \"params\": { },\n    \"description\": \"<what the action does>\",\n    \"reasoning\": \"<why it is suggested>\"\n  }\n]";
    self::instruction(instruction, state, max_tokens)
}

/// Ask for a short explanation of the current page.
pub fn explanation(state: &BrowserState, max_tokens: u32) -> GeneratorRequest {
    let instruction = "Briefly explain the state of the page currently shown. Cover:\n\
1. the main purpose of the page\n\
2. its main content\n\
3. the available interactions (links, buttons, forms)\n\
4. what the user might want to do next";
    self::instruction(instruction, state, max_tokens)
}

/// Ask for a structured analysis of the screenshot.
pub fn analysis(state: &BrowserState) -> GeneratorRequest {
    let user = format!(
        "Analyse this web page:\nURL: {}\nTitle: {}\n\nExtract:\n\
1. the main sections of the page and their content\n\
2. clickable elements (buttons, links) and where they are\n\
3. input fields and their purpose\n\
4. the overall purpose of the page\n\n\
Return the result as a JSON object.",
        state.url.as_deref().unwrap_or("none"),
        state.title.as_deref().unwrap_or("none"),
    );
    GeneratorRequest::new(ANALYSIS_SYSTEM_PROMPT, user)
        .with_image(state.screenshot.clone())
        .with_max_tokens(ANALYSIS_MAX_TOKENS)
}
