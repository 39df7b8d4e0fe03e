use super::{data_payload, decode, ChunkState};
use serde_json::{json, Map, Value};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const DELTA_EVENT: &str = "content_block_delta";

pub(super) fn body(model: &str, prompt: &str, system_prompt: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("system".into(), json!(system_prompt));
    m.insert(
        "messages".into(),
        json!([{ "role": "user", "content": prompt }]),
    );
    m.insert("model".into(), json!(model));
    m.insert("stream".into(), json!(true));
    m.insert("max_tokens".into(), json!(MAX_TOKENS));
    m
}

pub(super) fn auth_headers(credential: Option<&str>) -> Vec<(String, String)> {
    let Some(key) = credential else {
        return Vec::new();
    };
    vec![
        ("x-api-key".to_string(), key.to_string()),
        ("anthropic-version".to_string(), API_VERSION.to_string()),
    ]
}

/// `event:` lines set the tag; `data:` lines count only under
/// `content_block_delta`.
pub(super) fn parse_chunk(line: &str, mut state: ChunkState) -> (Option<String>, ChunkState) {
    if let Some(tag) = line.strip_prefix("event:") {
        state.event = Some(tag.trim().to_string());
        return (None, state);
    }

    let Some(payload) = data_payload(line) else {
        return (None, state);
    };
    if state.event.as_deref() != Some(DELTA_EVENT) {
        return (None, state);
    }

    let delta = decode(payload).and_then(|v| v["delta"]["text"].as_str().map(str::to_string));
    (delta, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_line_updates_tag() {
        let (delta, state) = parse_chunk("event: ping", ChunkState::default());
        assert_eq!(delta, None);
        assert_eq!(state.event.as_deref(), Some("ping"));
    }

    #[test]
    fn tag_survives_data_lines() {
        let state = ChunkState {
            event: Some(DELTA_EVENT.to_string()),
        };
        let (a, state) = parse_chunk(r#"data: {"delta":{"text":"a"}}"#, state);
        let (b, state) = parse_chunk(r#"data: {"delta":{"text":"b"}}"#, state);
        assert_eq!(a.as_deref(), Some("a"));
        assert_eq!(b.as_deref(), Some("b"));
        assert_eq!(state.event.as_deref(), Some(DELTA_EVENT));
    }

    #[test]
    fn missing_text_path_is_not_an_error() {
        let state = ChunkState {
            event: Some(DELTA_EVENT.to_string()),
        };
        let (delta, _) = parse_chunk(
            r#"data: {"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            state,
        );
        assert_eq!(delta, None);
    }

    #[test]
    fn no_key_means_no_version_header() {
        assert!(auth_headers(None).is_empty());
    }
}
