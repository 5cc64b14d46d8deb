use crudsmoke_http::HttpResponse;
use serde::Serialize;
use serde_json::json;

use super::error::{Error, Result};

pub const PATH_CONTENT: &str = "/content";

/// Body of `POST /content`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewContent {
    pub title: String,
    pub body: String,
    pub author: String,
    pub status: String,
    pub data: serde_json::Value,
}

impl NewContent {
    /// Unique content for chain `seq`.
    pub fn synthetic(seq: u64, now_unix: u64) -> Self {
        Self {
            title: format!("Smoke Test Content {seq}"),
            body: format!("This is smoke test content number {seq}"),
            author: "Smoke Tester".to_string(),
            status: "draft".to_string(),
            data: json!({
                "test_id": seq,
                "created_at": now_unix,
            }),
        }
    }
}

/// Body of `PUT /content/{id}`. Unset fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ContentPatch {
    pub fn synthetic(id: &str, now_unix: u64) -> Self {
        Self {
            title: Some(format!("Updated Smoke Test Content {id}")),
            body: Some("Updated Smoke Test Body".to_string()),
            author: Some("Updated Smoke Tester".to_string()),
            status: Some("published".to_string()),
            data: Some(json!({
                "updated_at": now_unix,
                "updated_by": "smoke_test",
            })),
        }
    }
}

pub fn item_path(base_url: &str, id: &str) -> String {
    format!("{base_url}{PATH_CONTENT}/{id}")
}

/// Pulls the new entity's id out of a CREATE response.
///
/// Services disagree on id types, so integers are accepted and stringified.
pub fn created_id(res: &HttpResponse) -> Result<String> {
    let v: serde_json::Value = res.json()?;
    match v.get("id") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        _ => Err(Error::MissingEntityId),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn response(body: &'static str) -> HttpResponse {
        HttpResponse {
            status: 201,
            body: body.as_bytes().to_vec().into(),
            headers: Vec::new(),
        }
    }

    #[test]
    fn synthetic_content_references_sequence_number() {
        let c = NewContent::synthetic(7, 1_700_000_000);
        assert_eq!(c.title, "Smoke Test Content 7");
        assert_eq!(c.body, "This is smoke test content number 7");
        assert_eq!(c.status, "draft");
        assert_eq!(c.data["test_id"], 7);
        assert_eq!(c.data["created_at"], 1_700_000_000u64);
    }

    #[test]
    fn patch_skips_unset_fields() {
        let patch = ContentPatch {
            status: Some("published".to_string()),
            ..ContentPatch::default()
        };
        let v = serde_json::to_value(&patch).unwrap();
        assert_eq!(v, json!({"status": "published"}));

        let full = serde_json::to_value(ContentPatch::synthetic("abc", 1)).unwrap();
        assert_eq!(full["title"], "Updated Smoke Test Content abc");
        assert_eq!(full["data"]["updated_by"], "smoke_test");
    }

    #[test]
    fn created_id_accepts_string_and_integer_ids() {
        assert_eq!(created_id(&response(r#"{"id":"a-1"}"#)).unwrap(), "a-1");
        assert_eq!(created_id(&response(r#"{"id":42,"title":"x"}"#)).unwrap(), "42");
    }

    #[test]
    fn created_id_rejects_missing_or_odd_ids() {
        assert!(matches!(
            created_id(&response(r#"{"title":"x"}"#)),
            Err(Error::MissingEntityId)
        ));
        assert!(matches!(
            created_id(&response(r#"{"id":""}"#)),
            Err(Error::MissingEntityId)
        ));
        assert!(matches!(
            created_id(&response(r#"{"id":1.5}"#)),
            Err(Error::MissingEntityId)
        ));
        assert!(matches!(created_id(&response("oops")), Err(Error::Http(_))));
    }

    #[test]
    fn item_path_joins_base_and_id() {
        assert_eq!(
            item_path("http://localhost:8888", "abc"),
            "http://localhost:8888/content/abc"
        );
    }
}
