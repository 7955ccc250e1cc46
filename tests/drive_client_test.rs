//! Drive REST client tests against a wiremock server
//!
//! Run with: cargo test --test drive_client_test

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campusdrive::drive::{
    AccessTokenSource, DriveClient, FolderRef, ItemKind, NameMatch, RemoteOperation, RemoteTree, ServiceAccountAuth,
    ServiceAccountKey, StaticToken,
};
use secrecy::ExposeSecret;

const FOLDER: &str = "application/vnd.google-apps.folder";

fn client(server: &MockServer, name_match: NameMatch, page_size: u32) -> DriveClient {
    DriveClient::new(
        reqwest::Client::new(),
        &server.uri(),
        Arc::new(StaticToken::new("test-token")),
        name_match,
        page_size,
    )
    .unwrap()
}

fn folder_query(parent: &str) -> String {
    format!("'{}' in parents and mimeType = '{}' and trashed = false", parent, FOLDER)
}

#[tokio::test]
async fn test_list_children_follows_pagination() {
    let server = MockServer::start().await;

    // More specific mock first: wiremock picks the earliest mounted match
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "os", "name": "OS", "mimeType": FOLDER }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("cse").as_str()))
        .and(query_param("pageSize", "2"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": [
                { "id": "dsa", "name": "DSA", "mimeType": FOLDER },
                { "id": "maths", "name": "Maths", "mimeType": FOLDER }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let children = client(&server, NameMatch::CaseInsensitive, 2)
        .list_children("cse", ItemKind::Folder)
        .await
        .unwrap();

    assert_eq!(
        children,
        vec![
            FolderRef::folder("dsa", "DSA"),
            FolderRef::folder("maths", "Maths"),
            FolderRef::folder("os", "OS"),
        ]
    );
}

#[tokio::test]
async fn test_exact_find_narrows_query_by_name() {
    let server = MockServer::start().await;
    let query = format!("{} and name = 'Notes'", folder_query("dsa"));

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", query.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "dsa-notes", "name": "Notes", "mimeType": FOLDER }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = client(&server, NameMatch::Exact, 100)
        .find_child("dsa", "Notes", ItemKind::Folder)
        .await
        .unwrap();
    assert_eq!(found, Some(FolderRef::folder("dsa-notes", "Notes")));
}

#[tokio::test]
async fn test_case_insensitive_find_filters_locally() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("root").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "id": "y1", "name": "1st_Year", "mimeType": FOLDER },
                { "id": "y2", "name": "2ND_YEAR", "mimeType": FOLDER }
            ]
        })))
        .mount(&server)
        .await;

    let drive = client(&server, NameMatch::CaseInsensitive, 100);
    let found = drive.find_child("root", "2nd_Year", ItemKind::Folder).await.unwrap();
    assert_eq!(found.map(|f| f.id), Some("y2".to_string()));

    let missing = drive.find_child("root", "5th_Year", ItemKind::Folder).await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_fetch_content_downloads_media() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F123"))
        .and(query_param("alt", "media"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let content = client(&server, NameMatch::CaseInsensitive, 100)
        .fetch_content("F123")
        .await
        .unwrap();
    assert_eq!(&content[..], b"%PDF-1.4");
}

#[tokio::test]
async fn test_http_error_becomes_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("rate limit exceeded"))
        .mount(&server)
        .await;

    let err = client(&server, NameMatch::CaseInsensitive, 100)
        .list_children("cse", ItemKind::File)
        .await
        .unwrap_err();

    assert_eq!(err.operation, RemoteOperation::ListChildren);
    assert!(err.target.contains("cse"));
    assert!(err.cause.contains("403"), "cause was {}", err.cause);
    assert!(err.cause.contains("rate limit exceeded"));
}

#[tokio::test]
async fn test_service_account_token_is_exchanged_once_and_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type="))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key_json = json!({
        "type": "service_account",
        "client_email": "notes-bot@example.iam.gserviceaccount.com",
        "private_key": include_str!("fixtures/test_service_account.pem"),
        "token_uri": format!("{}/token", server.uri()),
    });
    let key = ServiceAccountKey::from_json(&key_json.to_string()).unwrap();
    let auth = ServiceAccountAuth::new(key, reqwest::Client::new()).unwrap();

    let first = auth.access_token().await.unwrap();
    let second = auth.access_token().await.unwrap();
    assert_eq!(first.expose_secret(), "ya29.fresh");
    assert_eq!(second.expose_secret(), "ya29.fresh");
}

#[tokio::test]
async fn test_rejected_grant_is_authenticate_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let key_json = json!({
        "client_email": "notes-bot@example.iam.gserviceaccount.com",
        "private_key": include_str!("fixtures/test_service_account.pem"),
        "token_uri": format!("{}/token", server.uri()),
    });
    let key = ServiceAccountKey::from_json(&key_json.to_string()).unwrap();
    let auth = ServiceAccountAuth::new(key, reqwest::Client::new()).unwrap();

    let err = auth.access_token().await.unwrap_err();
    assert_eq!(err.operation, RemoteOperation::Authenticate);
    assert!(err.cause.contains("invalid_grant"));
    assert!(!err.to_string().contains("PRIVATE KEY"));
}
