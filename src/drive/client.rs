use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::auth::{truncate, ServiceAccountAuth, ServiceAccountKey};
use super::{AccessTokenSource, FolderRef, ItemKind, NameMatch, RemoteError, RemoteOperation, RemoteTree, FOLDER_MIME_TYPE};

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

impl DriveFile {
    fn into_ref(self) -> FolderRef {
        let kind = if self.mime_type == FOLDER_MIME_TYPE {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        FolderRef {
            id: self.id,
            name: self.name,
            kind,
        }
    }
}

/// Drive v3 REST client.
///
/// One instance is built at startup and shared; it holds no per-call state.
pub struct DriveClient {
    http: Client,
    base_url: Url,
    auth: Arc<dyn AccessTokenSource>,
    name_match: NameMatch,
    page_size: u32,
}

impl DriveClient {
    pub fn new(
        http: Client,
        base_url: &str,
        auth: Arc<dyn AccessTokenSource>,
        name_match: NameMatch,
        page_size: u32,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            auth,
            name_match,
            page_size: page_size.clamp(1, 1000),
        })
    }

    /// Builds the client from `config::drive`, authenticating as the
    /// configured service account.
    pub fn from_config() -> anyhow::Result<Self> {
        use crate::core::config::drive;
        use anyhow::Context;

        let credentials = drive::SERVICE_ACCOUNT
            .as_deref()
            .context("SERVICE_ACCOUNT_JSON is not set")?;
        let key = ServiceAccountKey::from_config_value(credentials)?;
        log::info!("Authenticating to Drive as {}", key.client_email);

        let http = Client::builder().timeout(drive::request_timeout()).build()?;
        let auth = ServiceAccountAuth::new(key, http.clone())?;
        Ok(Self::new(
            http,
            &drive::API_URL,
            Arc::new(auth),
            *drive::NAME_MATCH,
            *drive::PAGE_SIZE,
        )?)
    }

    fn files_endpoint(&self, file_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["drive", "v3", "files"]);
            if let Some(id) = file_id {
                segments.push(id);
            }
        }
        url
    }

    async fn authorized(&self, request: RequestBuilder, operation: RemoteOperation, target: &str) -> Result<Response, RemoteError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| RemoteError::new(operation, target, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::new(
            operation,
            target,
            format!("HTTP {}: {}", status, truncate(&body, 200)),
        ))
    }

    /// Fetches every page of a files.list query.
    async fn list_query(&self, query: &str, operation: RemoteOperation, target: &str) -> Result<Vec<FolderRef>, RemoteError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = self.page_size.to_string();

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("q", query),
                ("pageSize", page_size.as_str()),
                ("fields", LIST_FIELDS),
                ("spaces", "drive"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let request = self.http.get(self.files_endpoint(None)).query(&params);
            let page: FileList = self
                .authorized(request, operation, target)
                .await?
                .json()
                .await
                .map_err(|e| RemoteError::new(operation, target, e))?;

            items.extend(page.files.into_iter().map(DriveFile::into_ref));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        log::debug!("Drive {} ({}) returned {} items", operation, target, items.len());
        Ok(items)
    }
}

/// Escapes a value for use inside a single-quoted Drive query literal.
fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds the `q` parameter selecting direct, non-trashed children of one kind.
pub(crate) fn children_query(parent_id: &str, kind: ItemKind) -> String {
    let op = match kind {
        ItemKind::Folder => "=",
        ItemKind::File => "!=",
    };
    format!(
        "'{}' in parents and mimeType {} '{}' and trashed = false",
        quote_literal(parent_id),
        op,
        FOLDER_MIME_TYPE
    )
}

#[async_trait]
impl RemoteTree for DriveClient {
    async fn find_child(&self, parent_id: &str, name: &str, kind: ItemKind) -> Result<Option<FolderRef>, RemoteError> {
        let mut query = children_query(parent_id, kind);
        // Drive's name operator is case-sensitive, so it can only narrow exact lookups
        if self.name_match == NameMatch::Exact {
            query.push_str(&format!(" and name = '{}'", quote_literal(name)));
        }

        let target = format!("parent={} name={}", parent_id, name);
        let candidates = self.list_query(&query, RemoteOperation::FindChild, &target).await?;

        Ok(candidates.into_iter().find(|item| self.name_match.matches(&item.name, name)))
    }

    async fn list_children(&self, parent_id: &str, kind: ItemKind) -> Result<Vec<FolderRef>, RemoteError> {
        let target = format!("parent={} kind={}", parent_id, kind);
        self.list_query(&children_query(parent_id, kind), RemoteOperation::ListChildren, &target)
            .await
    }

    async fn fetch_content(&self, file_id: &str) -> Result<Bytes, RemoteError> {
        let request = self
            .http
            .get(self.files_endpoint(Some(file_id)))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let target = format!("file={}", file_id);

        let bytes = self
            .authorized(request, RemoteOperation::FetchContent, &target)
            .await?
            .bytes()
            .await
            .map_err(|e| RemoteError::new(RemoteOperation::FetchContent, &target, e))?;

        log::info!("Fetched {} bytes for Drive file {}", bytes.len(), file_id);
        Ok(bytes)
    }

    fn name_match(&self) -> NameMatch {
        self.name_match
    }
}
