use super::{data_payload, decode};
use serde_json::{json, Map, Value};

// Only lines carrying a delta object are decoded. Finish and error chunks
// without one are skipped as well.
const DELTA_MARKER: &str = "\"delta\":";

pub(super) fn body(model: &str, prompt: &str, system_prompt: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(
        "messages".into(),
        json!([
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": prompt },
        ]),
    );
    m.insert("model".into(), json!(model));
    m.insert("stream".into(), json!(true));
    m
}

pub(super) fn auth_headers(credential: Option<&str>) -> Vec<(String, String)> {
    match credential {
        Some(key) => vec![("Authorization".to_string(), format!("Bearer {key}"))],
        None => Vec::new(),
    }
}

pub(super) fn parse_chunk(line: &str) -> Option<String> {
    let payload = data_payload(line)?;
    if !payload.contains(DELTA_MARKER) {
        return None;
    }
    let v = decode(payload)?;
    v["choices"][0]["delta"]["content"].as_str().map(str::to_string)
}
