//! Normalization of provider outputs into cached node output

use serde_json::Value;

use crate::resolver::is_valid_value;
use crate::types::ValueMap;

/// Shape of a synchronous provider result
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedOutput {
    Text { text: String, extra: ValueMap },
    Images { urls: Vec<String>, extra: ValueMap },
    Video { url: String, extra: ValueMap },
    Generic(ValueMap),
}

impl NormalizedOutput {
    /// Classify a raw provider output
    ///
    /// Objects keep every field they came with; the recognised result is
    /// additionally published under the canonical keys (`text`, `image` and
    /// `images`, `video`).
    pub fn classify(output: Value) -> Self {
        match output {
            Value::String(text) => Self::Text {
                text,
                extra: ValueMap::new(),
            },
            Value::Array(items) => match urls(&items) {
                Some(urls) => Self::Images {
                    urls,
                    extra: ValueMap::new(),
                },
                None => Self::Generic(single("output", Value::Array(items))),
            },
            Value::Object(map) => Self::classify_object(map),
            Value::Null => Self::Generic(ValueMap::new()),
            other => Self::Generic(single("output", other)),
        }
    }

    fn classify_object(map: ValueMap) -> Self {
        if let Some(url) = first_string(&map, &["video", "videoUrl"]) {
            return Self::Video { url, extra: map };
        }
        let listed = ["images", "imageUrls"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_array))
            .find_map(|items| urls(items));
        if let Some(urls) = listed {
            return Self::Images { urls, extra: map };
        }
        if let Some(url) = first_string(&map, &["image", "imageUrl", "url"]) {
            return Self::Images {
                urls: vec![url],
                extra: map,
            };
        }
        if let Some(text) = first_string(&map, &["text", "content", "result"]) {
            return Self::Text { text, extra: map };
        }
        Self::Generic(map)
    }

    /// Cached-output map stored on the node
    pub fn into_cached_output(self) -> ValueMap {
        match self {
            Self::Text { text, mut extra } => {
                extra.insert("text".to_string(), Value::String(text));
                extra
            }
            Self::Images { urls, mut extra } => {
                if let Some(first) = urls.first() {
                    extra.insert("image".to_string(), Value::String(first.clone()));
                }
                extra.insert(
                    "images".to_string(),
                    Value::Array(urls.into_iter().map(Value::String).collect()),
                );
                extra
            }
            Self::Video { url, mut extra } => {
                extra.insert("video".to_string(), Value::String(url));
                extra
            }
            Self::Generic(map) => map,
        }
    }
}

fn single(key: &str, value: Value) -> ValueMap {
    let mut map = ValueMap::new();
    map.insert(key.to_string(), value);
    map
}

fn first_string(map: &ValueMap, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .filter(|v| is_valid_value(v))
        .find_map(|v| v.as_str().map(str::to_string))
}

/// Urls of a non-empty list of strings or `{url}` objects
fn urls(items: &[Value]) -> Option<Vec<String>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_text() {
        let output = NormalizedOutput::classify(json!("a poem"));
        assert_eq!(
            output.into_cached_output(),
            json!({"text": "a poem"}).as_object().unwrap().clone()
        );

        let output = NormalizedOutput::classify(json!({"content": "hi", "tokens": 3}));
        assert!(matches!(output, NormalizedOutput::Text { ref text, .. } if text == "hi"));
        let cached = output.into_cached_output();
        assert_eq!(cached["text"], "hi");
        assert_eq!(cached["tokens"], 3);
    }

    #[test]
    fn test_classify_images() {
        let output = NormalizedOutput::classify(json!([{"url": "u1"}, {"url": "u2"}]));
        let cached = output.into_cached_output();
        assert_eq!(cached["images"], json!(["u1", "u2"]));
        assert_eq!(cached["image"], "u1");

        let output = NormalizedOutput::classify(json!({"imageUrl": "u9", "seed": 1}));
        assert!(matches!(output, NormalizedOutput::Images { ref urls, .. } if urls == &["u9"]));
    }

    #[test]
    fn test_classify_video_wins() {
        let output = NormalizedOutput::classify(json!({"videoUrl": "v.mp4", "image": "thumb.png"}));
        let cached = output.into_cached_output();
        assert_eq!(cached["video"], "v.mp4");
        assert_eq!(cached["image"], "thumb.png");
    }

    #[test]
    fn test_classify_generic() {
        let output = NormalizedOutput::classify(json!({"story": {"title": "X"}}));
        assert!(matches!(output, NormalizedOutput::Generic(_)));
        assert_eq!(output.into_cached_output()["story"]["title"], "X");

        assert_eq!(
            NormalizedOutput::classify(json!(42)).into_cached_output()["output"],
            42
        );
        assert!(NormalizedOutput::classify(Value::Null)
            .into_cached_output()
            .is_empty());
    }
}
