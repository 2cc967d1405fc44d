//! Wire protocol between feather and the bridge script running inside Blender
//!
//! Requests are single JSON lines on the bridge's stdin:
//! `{"id": 7, "op": "remove_block", "category": "brushes", "name": "Draw"}`.
//! Responses are single stdout lines starting with [`RESPONSE_MARKER`]:
//! `@feather {"id": 7, "ok": true, "value": null}`. Anything else Blender
//! prints is not part of the protocol.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::document::{Category, LinkParent, ReloadRequest};
use crate::error::{FeatherError, Result};

pub const PROTOCOL_VERSION: u32 = 1;

/// Prefix of every bridge response line
pub const RESPONSE_MARKER: &str = "@feather ";

/// Id the bridge uses for its unsolicited greeting
pub const HELLO_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Blocks { category: Category },
    ActiveScene,
    CollectionChildren { name: String },
    CollectionObjects { name: String },
    SceneRootChildren { scene: String },
    SceneRootObjects { scene: String },
    PurgeOrphans,
    RemoveBlock { category: Category, name: String },
    ClearFakeUser { category: Category, name: String },
    LinkCollection { parent: LinkParent, child: String },
    LinkObject { parent: LinkParent, object: String },
    UnlinkCollection { parent: LinkParent, child: String },
    UnlinkObject { parent: LinkParent, object: String },
    SaveAs { path: PathBuf, compress: bool },
    ResetEmpty { placeholder: String },
    LoadByReference { path: PathBuf, request: ReloadRequest },
    Quit,
}

impl Request {
    /// Operation name, for logs and errors
    pub fn op(&self) -> &'static str {
        match self {
            Request::Blocks { .. } => "blocks",
            Request::ActiveScene => "active_scene",
            Request::CollectionChildren { .. } => "collection_children",
            Request::CollectionObjects { .. } => "collection_objects",
            Request::SceneRootChildren { .. } => "scene_root_children",
            Request::SceneRootObjects { .. } => "scene_root_objects",
            Request::PurgeOrphans => "purge_orphans",
            Request::RemoveBlock { .. } => "remove_block",
            Request::ClearFakeUser { .. } => "clear_fake_user",
            Request::LinkCollection { .. } => "link_collection",
            Request::LinkObject { .. } => "link_object",
            Request::UnlinkCollection { .. } => "unlink_collection",
            Request::UnlinkObject { .. } => "unlink_object",
            Request::SaveAs { .. } => "save_as",
            Request::ResetEmpty { .. } => "reset_empty",
            Request::LoadByReference { .. } => "load_by_reference",
            Request::Quit => "quit",
        }
    }
}

/// A request with its correlation id, as written to the wire
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub request: &'a Request,
}

impl Envelope<'_> {
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Failure classes the bridge reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AlreadyLinked,
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub kind: Option<ErrorKind>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
}

impl Response {
    /// Parse a stdout line; `None` for lines that are not responses
    pub fn parse_line(line: &str) -> Option<Result<Response>> {
        let payload = line.trim_end().strip_prefix(RESPONSE_MARKER)?;
        Some(serde_json::from_str(payload).map_err(FeatherError::from))
    }

    /// Turn the response into the operation's value or its error
    pub fn into_result<T: DeserializeOwned>(self, op: &str) -> Result<T> {
        if self.ok {
            return serde_json::from_value(self.value)
                .map_err(|e| crate::map_host_err!(op, format!("unexpected reply: {e}")));
        }

        let message = self.message.unwrap_or_else(|| "no message".to_string());
        Err(match self.kind.unwrap_or(ErrorKind::Error) {
            ErrorKind::AlreadyLinked => FeatherError::already_linked(
                self.parent.unwrap_or_default(),
                self.item.unwrap_or_default(),
            ),
            ErrorKind::NotFound => FeatherError::not_found(op, message),
            ErrorKind::Error => crate::map_host_err!(op, message),
        })
    }
}

/// What the bridge announces when it starts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Hello {
    pub protocol: u32,
    /// Blender's own version string, e.g. "4.5.1 LTS"
    pub blender: String,
    /// Version the loaded file was saved with, e.g. "4.2"
    pub file_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BlockInfo;

    #[test]
    fn test_request_wire_shape() {
        let request = Request::LinkCollection {
            parent: LinkParent::SceneRoot("Main".to_string()),
            child: "Root".to_string(),
        };
        let line = Envelope {
            id: 3,
            request: &request,
        }
        .to_line()
        .unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 3,
                "op": "link_collection",
                "parent": {"kind": "scene_root", "name": "Main"},
                "child": "Root"
            })
        );
    }

    #[test]
    fn test_unit_request_wire_shape() {
        let line = Envelope {
            id: 1,
            request: &Request::PurgeOrphans,
        }
        .to_line()
        .unwrap();
        assert_eq!(line, "{\"id\":1,\"op\":\"purge_orphans\"}\n");
    }

    #[test]
    fn test_parse_line_ignores_blender_chatter() {
        assert!(Response::parse_line("Read blend: /tmp/scene.blend").is_none());
        assert!(Response::parse_line("Blender 4.5.1 LTS").is_none());
    }

    #[test]
    fn test_ok_response_value() {
        let line = r#"@feather {"id": 2, "ok": true, "value": [{"name": "Cube", "users": 1, "fake_user": false}]}"#;
        let response = Response::parse_line(line).unwrap().unwrap();
        let blocks: Vec<BlockInfo> = response.into_result("blocks").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "Cube");
    }

    #[test]
    fn test_already_linked_response() {
        let line = r#"@feather {"id": 4, "ok": false, "kind": "already_linked", "message": "Root already in collection", "parent": "Scene Collection", "item": "Root"}"#;
        let response = Response::parse_line(line).unwrap().unwrap();
        let err = response.into_result::<()>("link_collection").unwrap_err();
        assert!(err.is_already_linked());
    }

    #[test]
    fn test_generic_error_response() {
        let line = r#"@feather {"id": 5, "ok": false, "kind": "error", "message": "boom"}"#;
        let response = Response::parse_line(line).unwrap().unwrap();
        let err = response.into_result::<()>("save_as").unwrap_err();
        assert!(matches!(err, FeatherError::Host { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_malformed_response_is_error() {
        let parsed = Response::parse_line("@feather {not json").unwrap();
        assert!(parsed.is_err());
    }
}
