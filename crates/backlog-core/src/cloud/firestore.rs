//! REST client for a Firestore-compatible document database.
//!
//! Writes go through `documents:commit` so that server timestamps and
//! existence preconditions are applied atomically with the write. Reads use
//! plain `GET` on the document name; listing uses `documents:runQuery`.

use super::{Direction, Document, DocumentStore, Fields, Filter, OrderBy, Value};
use crate::error::{Result, StoreError};
use crate::timestamp::Timestamp;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map};
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_DATABASE: &str = "(default)";

/// HTTP client for one Firestore database.
pub struct FirestoreClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    token: Option<String>,
}

impl FirestoreClient {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, project_id)
    }

    /// Build a client whose requests give up after `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, project_id))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            token: None,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Bearer token sent with every request.
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn database_name(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.project_id, self.database
        )
    }

    fn documents_url(&self) -> String {
        format!("{}/v1/{}/documents", self.base_url, self.database_name())
    }

    fn doc_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{collection}/{id}", self.database_name())
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!("{}/v1/{}", self.base_url, self.doc_name(collection, id))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a single write through `documents:commit`. Returns the HTTP
    /// status on a 404 so callers can interpret "missing" themselves.
    async fn commit(&self, write: serde_json::Value) -> Result<Option<u16>> {
        let response = self
            .authorize(
                self.client
                    .post(format!("{}:commit", self.documents_url()))
                    .json(&json!({ "writes": [write] })),
            )
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Some(404));
        }
        ensure_success(response).await?;
        Ok(None)
    }

    fn write_for(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mask: bool,
        exists: Option<bool>,
    ) -> Result<serde_json::Value> {
        let (plain, server_stamped) = split_sentinels(fields);
        let mut write = Map::new();
        if mask {
            let paths: Vec<String> = plain.keys().map(|k| field_path(k)).collect();
            write.insert("updateMask".into(), json!({ "fieldPaths": paths }));
        }
        write.insert(
            "update".into(),
            json!({
                "name": self.doc_name(collection, id),
                "fields": encode_fields(&plain)?,
            }),
        );
        if !server_stamped.is_empty() {
            let transforms: Vec<serde_json::Value> = server_stamped
                .iter()
                .map(|k| json!({ "fieldPath": field_path(k), "setToServerValue": "REQUEST_TIME" }))
                .collect();
            write.insert("updateTransforms".into(), serde_json::Value::Array(transforms));
        }
        if let Some(exists) = exists {
            write.insert("currentDocument".into(), json!({ "exists": exists }));
        }
        Ok(serde_json::Value::Object(write))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn create_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let write = self.write_for(collection, &id, fields, false, Some(false))?;
        if let Some(status) = self.commit(write).await? {
            return Err(StoreError::CloudApi {
                status,
                body: format!("collection '{collection}' not found"),
            });
        }
        Ok(id)
    }

    async fn set_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let write = self.write_for(collection, id, fields, false, None)?;
        if let Some(status) = self.commit(write).await? {
            return Err(StoreError::CloudApi {
                status,
                body: format!("collection '{collection}' not found"),
            });
        }
        Ok(())
    }

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let response = self
            .authorize(self.client.get(self.doc_url(collection, id)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = ensure_success(response).await?.json().await?;
        Ok(Some(raw.decode()?))
    }

    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        let write = self.write_for(collection, id, fields, true, Some(true))?;
        Ok(self.commit(write).await?.is_none())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.doc_url(collection, id)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn query_docs(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let body = json!({ "structuredQuery": structured_query(collection, filters, order_by)? });
        let response = self
            .authorize(
                self.client
                    .post(format!("{}:runQuery", self.documents_url()))
                    .json(&body),
            )
            .send()
            .await?;
        let rows: Vec<RunQueryRow> = ensure_success(response).await?.json().await?;
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(RawDocument::decode)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(StoreError::CloudApi {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, serde_json::Value>,
}

impl RawDocument {
    fn decode(self) -> Result<Document> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StoreError::CloudResponse(format!("bad document name '{}'", self.name)))?
            .to_string();
        let fields = self
            .fields
            .into_iter()
            .map(|(k, v)| Ok((k, decode_value(&v)?)))
            .collect::<Result<Fields>>()?;
        Ok(Document { id, fields })
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    #[serde(default)]
    document: Option<RawDocument>,
}

// ---------------------------------------------------------------------------
// Value encoding
// ---------------------------------------------------------------------------

/// Pull top-level `ServerTimestamp` sentinels out of `fields`; they become
/// commit transforms instead of field values.
fn split_sentinels(fields: Fields) -> (Fields, Vec<String>) {
    let mut plain = Fields::new();
    let mut stamped = Vec::new();
    for (k, v) in fields {
        match v {
            Value::ServerTimestamp => stamped.push(k),
            other => {
                plain.insert(k, other);
            }
        }
    }
    (plain, stamped)
}

static SIMPLE_PATH_RE: OnceLock<Regex> = OnceLock::new();

/// Quote a field name for use in a field path when it is not a plain
/// identifier.
fn field_path(name: &str) -> String {
    let re = SIMPLE_PATH_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
    if re.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn encode_fields(fields: &Fields) -> Result<serde_json::Value> {
    let mut out = Map::new();
    for (k, v) in fields {
        out.insert(k.clone(), encode_value(v)?);
    }
    Ok(serde_json::Value::Object(out))
}

fn encode_value(v: &Value) -> Result<serde_json::Value> {
    Ok(match v {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Integer(i) => json!({ "integerValue": i.to_string() }),
        Value::Double(d) => json!({ "doubleValue": d }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Timestamp(ts) => json!({ "timestampValue": ts.to_rfc3339()? }),
        Value::Array(items) => {
            let values = items.iter().map(encode_value).collect::<Result<Vec<_>>>()?;
            json!({ "arrayValue": { "values": values } })
        }
        Value::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields)? } }),
        Value::ServerTimestamp => {
            return Err(StoreError::CloudResponse(
                "server timestamps are only supported on top-level fields".into(),
            ))
        }
    })
}

fn decode_value(v: &serde_json::Value) -> Result<Value> {
    let obj = v
        .as_object()
        .ok_or_else(|| StoreError::CloudResponse(format!("expected typed value, got {v}")))?;
    let Some((kind, inner)) = obj.iter().next() else {
        return Err(StoreError::CloudResponse("empty typed value".into()));
    };
    let bad = || StoreError::CloudResponse(format!("bad {kind}: {inner}"));
    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(bad)?),
        "integerValue" => Value::Integer(match inner {
            serde_json::Value::String(s) => s.parse().map_err(|_| bad())?,
            other => other.as_i64().ok_or_else(bad)?,
        }),
        "doubleValue" => Value::Double(match inner {
            serde_json::Value::String(s) => s.parse().map_err(|_| bad())?,
            other => other.as_f64().ok_or_else(bad)?,
        }),
        "stringValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().ok_or_else(bad)?.to_string())
        }
        "timestampValue" => Value::Timestamp(Timestamp::parse(inner.as_str().ok_or_else(bad)?)?),
        "arrayValue" => Value::Array(match inner.get("values") {
            Some(serde_json::Value::Array(items)) => {
                items.iter().map(decode_value).collect::<Result<_>>()?
            }
            _ => Vec::new(),
        }),
        "mapValue" => Value::Map(match inner.get("fields") {
            Some(serde_json::Value::Object(fields)) => fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
                .collect::<Result<_>>()?,
            _ => Fields::new(),
        }),
        "geoPointValue" => Value::Map(
            [
                ("latitude".to_string(), Value::Double(inner["latitude"].as_f64().unwrap_or(0.0))),
                ("longitude".to_string(), Value::Double(inner["longitude"].as_f64().unwrap_or(0.0))),
            ]
            .into_iter()
            .collect(),
        ),
        _ => return Err(StoreError::CloudResponse(format!("unknown value kind '{kind}'"))),
    })
}

fn structured_query(
    collection: &str,
    filters: &[Filter],
    order_by: Option<&OrderBy>,
) -> Result<serde_json::Value> {
    let mut query = Map::new();
    query.insert("from".into(), json!([{ "collectionId": collection }]));

    let field_filters = filters
        .iter()
        .map(|f| match f {
            Filter::Equal { field, value } => Ok(json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(field) },
                    "op": "EQUAL",
                    "value": encode_value(value)?,
                }
            })),
        })
        .collect::<Result<Vec<_>>>()?;
    match field_filters.len() {
        0 => {}
        1 => {
            query.insert("where".into(), field_filters.into_iter().next().unwrap_or_default());
        }
        _ => {
            query.insert(
                "where".into(),
                json!({ "compositeFilter": { "op": "AND", "filters": field_filters } }),
            );
        }
    }

    if let Some(order) = order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        query.insert(
            "orderBy".into(),
            json!([{ "field": { "fieldPath": field_path(&order.field) }, "direction": direction }]),
        );
    }
    Ok(serde_json::Value::Object(query))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const DOCS: &str = "/v1/projects/demo/databases/test/documents";

    fn client(server: &mockito::ServerGuard) -> FirestoreClient {
        FirestoreClient::new(server.url(), "demo")
            .database("test")
            .token(Some("tok".into()))
    }

    fn doc_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "name": format!("projects/demo/databases/test/documents/projects/{id}"),
            "fields": {
                "name": { "stringValue": name },
                "archived": { "booleanValue": false },
                "updated_at": { "timestampValue": "2024-05-01T10:00:00.250Z" },
            }
        })
    }

    #[tokio::test]
    async fn get_decodes_document() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", format!("{DOCS}/projects/p1").as_str())
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(doc_json("p1", "Acme").to_string())
            .create_async()
            .await;

        let doc = client(&server)
            .get_doc("projects", "p1")
            .await
            .unwrap()
            .unwrap();
        m.assert_async().await;
        assert_eq!(doc.id, "p1");
        assert_eq!(doc.fields["name"], Value::from("Acme"));
        assert_eq!(
            doc.fields["updated_at"],
            Value::Timestamp(Timestamp {
                seconds: 1_714_557_600,
                nanos: 250_000_000
            })
        );
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{DOCS}/projects/nope").as_str())
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"status":"NOT_FOUND"}}"#)
            .create_async()
            .await;
        assert!(client(&server)
            .get_doc("projects", "nope")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn create_commits_with_precondition_and_transforms() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", format!("{DOCS}:commit").as_str())
            .match_body(Matcher::PartialJson(json!({
                "writes": [{
                    "update": {
                        "name": "projects/demo/databases/test/documents/projects/p1",
                        "fields": { "name": { "stringValue": "Acme" } }
                    },
                    "currentDocument": { "exists": false },
                    "updateTransforms": [
                        { "fieldPath": "updated_at", "setToServerValue": "REQUEST_TIME" }
                    ]
                }]
            })))
            .with_status(200)
            .with_body(r#"{"writeResults":[{}],"commitTime":"2024-05-01T10:00:00Z"}"#)
            .create_async()
            .await;

        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from("Acme"));
        fields.insert("updated_at".into(), Value::ServerTimestamp);
        let id = client(&server)
            .create_doc("projects", Some("p1"), fields)
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(id, "p1");
    }

    #[tokio::test]
    async fn create_conflict_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{DOCS}:commit").as_str())
            .with_status(409)
            .with_body(r#"{"error":{"code":409,"status":"ALREADY_EXISTS"}}"#)
            .create_async()
            .await;
        let err = client(&server)
            .create_doc("projects", Some("p1"), Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CloudApi { status: 409, .. }));
    }

    #[tokio::test]
    async fn update_sends_mask_and_reports_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{DOCS}:commit").as_str())
            .match_body(Matcher::PartialJson(json!({
                "writes": [{
                    "updateMask": { "fieldPaths": ["name"] },
                    "currentDocument": { "exists": true }
                }]
            })))
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"status":"NOT_FOUND"}}"#)
            .create_async()
            .await;

        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from("X"));
        fields.insert("updated_at".into(), Value::ServerTimestamp);
        assert!(!client(&server)
            .update_doc("projects", "gone", fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn query_builds_filters_and_skips_empty_rows() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", format!("{DOCS}:runQuery").as_str())
            .match_body(Matcher::PartialJson(json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "projects" }],
                    "where": { "compositeFilter": { "op": "AND" } },
                    "orderBy": [{ "field": { "fieldPath": "updated_at" }, "direction": "DESCENDING" }]
                }
            })))
            .with_status(200)
            .with_body(
                json!([
                    { "document": doc_json("b", "B"), "readTime": "2024-05-01T10:00:00Z" },
                    { "document": doc_json("a", "A"), "readTime": "2024-05-01T10:00:00Z" },
                    { "readTime": "2024-05-01T10:00:00Z" }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let docs = client(&server)
            .query_docs(
                "projects",
                &[Filter::equal("userId", "u1"), Filter::equal("archived", false)],
                Some(&OrderBy::desc("updated_at")),
            )
            .await
            .unwrap();
        m.assert_async().await;
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn delete_tolerates_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", format!("{DOCS}/projects/p1").as_str())
            .with_status(404)
            .create_async()
            .await;
        client(&server).delete_doc("projects", "p1").await.unwrap();
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{DOCS}/projects/p1").as_str())
            .with_status(503)
            .with_body("backend unavailable")
            .create_async()
            .await;
        match client(&server).get_doc("projects", "p1").await {
            Err(StoreError::CloudApi { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.contains("unavailable"));
            }
            other => panic!("expected CloudApi error, got {other:?}"),
        }
    }

    #[test]
    fn value_encoding_round_trip() {
        let mut inner = Fields::new();
        inner.insert("n".into(), Value::Integer(-7));
        let v = Value::Array(vec![
            Value::Null,
            Value::Bool(true),
            Value::Double(0.5),
            Value::Map(inner),
            Value::Timestamp(Timestamp {
                seconds: 10,
                nanos: 1,
            }),
        ]);
        assert_eq!(decode_value(&encode_value(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn empty_array_decodes() {
        assert_eq!(
            decode_value(&json!({ "arrayValue": {} })).unwrap(),
            Value::Array(Vec::new())
        );
    }

    #[test]
    fn nested_server_timestamp_rejected() {
        assert!(encode_value(&Value::Array(vec![Value::ServerTimestamp])).is_err());
    }

    #[test]
    fn field_paths_are_quoted_when_needed() {
        assert_eq!(field_path("updated_at"), "updated_at");
        assert_eq!(field_path("journey-maps"), "`journey-maps`");
    }
}
