//! Maps an upstream artwork document to an [`ArtworkRecord`].
//!
//! Only the title, author id and author name are mandatory. Everything else
//! degrades to its zero value when absent or of an unexpected type, because
//! the upstream omits or reshapes optional fields freely.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use pixshelf_core::{ArtworkRecord, Error, ImageUrls, Result};

/// Normalize the `body` object of an artwork response.
pub fn normalize(pid: i64, body: &Value) -> Result<ArtworkRecord> {
    let title = required_str(pid, body, "illustTitle")?;
    let author_uid = match body.get("userId") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(missing(pid, "userId")),
    };
    let author_name = required_str(pid, body, "userName")?;

    let (tags, tag_translations) = extract_tags(body);

    Ok(ArtworkRecord {
        pid,
        title,
        author_uid,
        author_name,
        tags,
        tag_translations,
        bookmark_count: coerce_count(body.get("bookmarkCount")).max(0),
        is_bookmarked: body.get("bookmarkData").is_some_and(|v| !v.is_null()),
        urls: extract_urls(body),
        page_count: coerce_count(body.get("pageCount")).clamp(0, i32::MAX as i64) as i32,
    })
}

fn missing(pid: i64, field: &str) -> Error {
    Error::Malformed(format!("pid {}: missing or invalid '{}'", pid, field))
}

fn required_str(pid: i64, body: &Value, field: &str) -> Result<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| missing(pid, field))
}

/// Integer, float, or numeric string; anything else is 0.
fn coerce_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn extract_tags(body: &Value) -> (Vec<String>, BTreeMap<String, String>) {
    let mut names = Vec::new();
    let mut translations = BTreeMap::new();
    let mut seen = HashSet::new();

    let Some(items) = body
        .get("tags")
        .and_then(|t| t.get("tags"))
        .and_then(Value::as_array)
    else {
        return (names, translations);
    };

    for item in items {
        let Some(name) = item.get("tag").and_then(Value::as_str).map(str::trim) else {
            continue;
        };
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        if let Some(en) = item
            .get("translation")
            .and_then(|t| t.get("en"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|en| !en.is_empty())
        {
            translations.insert(name.to_string(), en.to_string());
        }
        names.push(name.to_string());
    }

    (names, translations)
}

fn extract_urls(body: &Value) -> ImageUrls {
    let urls = body.get("urls");
    let url = |key: &str| {
        urls.and_then(|u| u.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    ImageUrls {
        original: url("original"),
        mini: url("mini"),
        thumb: url("thumb"),
        small: url("small"),
        regular: url("regular"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_body() -> Value {
        json!({
            "illustTitle": "夕焼け",
            "userId": "12345",
            "userName": "painter",
            "bookmarkCount": 42,
            "bookmarkData": {"id": "999", "private": false},
            "pageCount": 3,
            "tags": {
                "tags": [
                    {"tag": "風景", "translation": {"en": "landscape"}},
                    {"tag": "オリジナル"},
                    {"tag": "風景"},
                    {"tag": ""},
                    {"tag": 7}
                ]
            },
            "urls": {
                "original": "https://i.example/o.png",
                "mini": "https://i.example/m.jpg",
                "thumb": null,
                "small": "",
                "regular": "https://i.example/r.jpg"
            }
        })
    }

    #[test]
    fn test_normalize_full_payload() {
        let record = normalize(100, &full_body()).unwrap();
        assert_eq!(record.pid, 100);
        assert_eq!(record.title, "夕焼け");
        assert_eq!(record.author_uid, "12345");
        assert_eq!(record.author_name, "painter");
        assert_eq!(record.tags, vec!["風景".to_string(), "オリジナル".to_string()]);
        assert_eq!(
            record.tag_translations.get("風景").map(String::as_str),
            Some("landscape")
        );
        assert_eq!(record.bookmark_count, 42);
        assert!(record.is_bookmarked);
        assert_eq!(record.page_count, 3);
        assert_eq!(record.urls.original.as_deref(), Some("https://i.example/o.png"));
        assert_eq!(record.urls.thumb, None);
        assert_eq!(record.urls.small, None);
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let mut body = full_body();
        body.as_object_mut().unwrap().remove("illustTitle");
        let err = normalize(1, &body).unwrap_err();
        assert!(matches!(err, Error::Malformed(ref m) if m.contains("illustTitle")));
    }

    #[test]
    fn test_mistyped_user_name_is_malformed() {
        let mut body = full_body();
        body["userName"] = json!(12);
        assert!(matches!(normalize(1, &body), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_numeric_user_id_is_accepted() {
        let mut body = full_body();
        body["userId"] = json!(678);
        assert_eq!(normalize(1, &body).unwrap().author_uid, "678");
    }

    #[test]
    fn test_bookmark_count_coercion() {
        let mut body = full_body();
        body["bookmarkCount"] = json!(12.9);
        assert_eq!(normalize(1, &body).unwrap().bookmark_count, 12);

        body["bookmarkCount"] = json!("31");
        assert_eq!(normalize(1, &body).unwrap().bookmark_count, 31);

        body["bookmarkCount"] = json!("many");
        assert_eq!(normalize(1, &body).unwrap().bookmark_count, 0);

        body["bookmarkCount"] = json!(null);
        assert_eq!(normalize(1, &body).unwrap().bookmark_count, 0);
    }

    #[test]
    fn test_null_bookmark_data_means_not_bookmarked() {
        let mut body = full_body();
        body["bookmarkData"] = Value::Null;
        assert!(!normalize(1, &body).unwrap().is_bookmarked);

        body.as_object_mut().unwrap().remove("bookmarkData");
        assert!(!normalize(1, &body).unwrap().is_bookmarked);
    }

    #[test]
    fn test_minimal_payload_degrades_to_defaults() {
        let body = json!({
            "illustTitle": "t",
            "userId": "1",
            "userName": "n",
            "tags": "not an object",
            "urls": []
        });
        let record = normalize(5, &body).unwrap();
        assert!(record.tags.is_empty());
        assert!(record.tag_translations.is_empty());
        assert_eq!(record.bookmark_count, 0);
        assert!(!record.is_bookmarked);
        assert_eq!(record.urls, ImageUrls::default());
        assert_eq!(record.page_count, 0);
    }
}
