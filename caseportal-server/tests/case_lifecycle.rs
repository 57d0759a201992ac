//! End-to-end case flows against a real database
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p caseportal-server -- --ignored

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use caseportal_server::live::{ChangeKind, Notice, Table, Topic};
use caseportal_server::models::StatusPolicy;
use common::{harness, harness_with_policy, PUBLIC_ORIGIN};

const MB: usize = 1024 * 1024;

#[tokio::test]
#[ignore = "requires database"]
async fn submitted_case_moves_through_admin_updates() {
    let h = harness().await;
    let client = h.client("owner").await;
    let admin = h.admin("agent").await;

    let (status, case) = h
        .send(
            Method::POST,
            "/cases",
            Some(client.token),
            Some(json!({
                "title": "Lost wallet",
                "description": "Left it on the 8:15 train",
                "priority": "high",
                "status": "closed",
                "assigned_to": admin.id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(case["status"], "pending");
    assert_eq!(case["priority"], "high");
    assert!(case["assigned_to"].is_null());
    let id = case["id"].as_str().unwrap().to_owned();

    let (status, _) = h
        .send(
            Method::PATCH,
            &format!("/cases/{}", id),
            Some(admin.token),
            Some(json!({"field": "status", "value": "in_progress"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, fetched) = h
        .send(Method::GET, &format!("/cases/{}", id), Some(client.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "in_progress");
    assert_eq!(fetched["client_name"], client.full_name.as_str());

    let (status, _) = h
        .send(
            Method::PATCH,
            &format!("/cases/{}", id),
            Some(admin.token),
            Some(json!({"field": "assigned_to", "value": admin.id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, all) = h
        .send(Method::GET, "/admin/cases", Some(admin.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let listed = all
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == id.as_str())
        .expect("case listed for admin");
    assert_eq!(listed["assignee_name"], admin.full_name.as_str());

    let (_, mine) = h.send(Method::GET, "/cases", Some(client.token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn status_filter_and_unassign() {
    let h = harness().await;
    let client = h.client("filter").await;
    let admin = h.admin("filter-admin").await;
    let case_id = h.submit_case(&client, "Card declined").await;

    for (field, value) in [
        ("status", json!("resolved")),
        ("assigned_to", json!(admin.id)),
        ("assigned_to", json!("unassigned")),
    ] {
        let (status, _) = h
            .send(
                Method::PATCH,
                &format!("/cases/{}", case_id),
                Some(admin.token),
                Some(json!({"field": field, "value": value})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, resolved) = h
        .send(Method::GET, "/admin/cases?status=resolved", Some(admin.token), None)
        .await;
    let found = resolved
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == case_id.to_string())
        .expect("resolved case listed");
    assert!(found["assigned_to"].is_null());
    assert!(resolved
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["status"] == "resolved"));

    let (status, _) = h
        .send(Method::GET, "/admin/cases?status=archived", Some(admin.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires database"]
async fn clients_cannot_reach_other_cases_or_admin_actions() {
    let h = harness().await;
    let owner = h.client("alice").await;
    let other = h.client("mallory").await;
    let case_id = h.submit_case(&owner, "Stolen phone").await;

    let (status, _) = h
        .send(Method::GET, &format!("/cases/{}", case_id), Some(other.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .send(
            Method::PATCH,
            &format!("/cases/{}", case_id),
            Some(owner.token),
            Some(json!({"field": "status", "value": "closed"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h.send(Method::GET, "/admin/stats", Some(owner.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .send(Method::GET, &format!("/cases/{}", case_id), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires database"]
async fn only_admins_can_be_assigned() {
    let h = harness().await;
    let client = h.client("assign").await;
    let admin = h.admin("assign-admin").await;
    let case_id = h.submit_case(&client, "Wrong charge").await;

    let (status, body) = h
        .send(
            Method::PATCH,
            &format!("/cases/{}", case_id),
            Some(admin.token),
            Some(json!({"field": "assigned_to", "value": client.id})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, admins) = h
        .send(Method::GET, "/admin/admins", Some(admin.token), None)
        .await;
    assert!(admins
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a["id"] == admin.id.to_string()));
}

#[tokio::test]
#[ignore = "requires database"]
async fn later_update_wins() {
    let h = harness().await;
    let client = h.client("lww").await;
    let admin = h.admin("lww-admin").await;
    let case_id = h.submit_case(&client, "Duplicate order").await;

    for priority in ["low", "urgent", "medium"] {
        let (status, _) = h
            .send(
                Method::PATCH,
                &format!("/cases/{}", case_id),
                Some(admin.token),
                Some(json!({"field": "priority", "value": priority})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, case) = h
        .send(Method::GET, &format!("/cases/{}", case_id), Some(admin.token), None)
        .await;
    assert_eq!(case["priority"], "medium");
}

#[tokio::test]
#[ignore = "requires database"]
async fn forward_only_policy_rejects_reverts() {
    let h = harness_with_policy(StatusPolicy::ForwardOnly).await;
    let client = h.client("fwd").await;
    let admin = h.admin("fwd-admin").await;
    let case_id = h.submit_case(&client, "Account locked").await;
    let uri = format!("/cases/{}", case_id);

    let (status, _) = h
        .send(
            Method::PATCH,
            &uri,
            Some(admin.token),
            Some(json!({"field": "status", "value": "resolved"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .send(
            Method::PATCH,
            &uri,
            Some(admin.token),
            Some(json!({"field": "status", "value": "pending"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "status cannot move from resolved to pending");
}

#[tokio::test]
#[ignore = "requires database"]
async fn oversized_pdf_leaves_no_trace() {
    let h = harness().await;
    let client = h.client("big").await;
    let case_id = h.submit_case(&client, "Scanned statements").await;

    let (status, report) = h
        .upload(
            client.token,
            case_id,
            &[("statements.pdf", "application/pdf", vec![0u8; 15 * MB])],
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(report["uploaded"], json!([]));
    assert!(report["rejected"][0]["reason"]
        .as_str()
        .unwrap()
        .contains("10 MB"));

    let (_, listed) = h
        .send(
            Method::GET,
            &format!("/cases/{}/attachments", case_id),
            Some(client.token),
            None,
        )
        .await;
    assert_eq!(listed, json!([]));
    assert_eq!(h.blob_count(), 0);
}

#[tokio::test]
#[ignore = "requires database"]
async fn rejected_files_do_not_block_siblings() {
    let h = harness().await;
    let client = h.client("batch").await;
    let case_id = h.submit_case(&client, "Receipts").await;

    let (status, report) = h
        .upload(
            client.token,
            case_id,
            &[
                ("huge.zip", "application/zip", vec![1u8; 11 * MB]),
                ("setup.exe", "application/x-msdownload", b"MZ".to_vec()),
                ("receipt.png", "image/png", b"\x89PNG\r\n".to_vec()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["uploaded"].as_array().unwrap().len(), 1);
    assert_eq!(report["uploaded"][0]["file_name"], "receipt.png");
    assert_eq!(report["rejected"].as_array().unwrap().len(), 2);
    assert_eq!(h.blob_count(), 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn very_large_file_is_rejected_alone() {
    let h = harness().await;
    let client = h.client("video").await;
    let case_id = h.submit_case(&client, "Screen recording").await;

    let (status, report) = h
        .upload(
            client.token,
            case_id,
            &[
                ("video.zip", "application/zip", vec![7u8; 70 * MB]),
                ("receipt.png", "image/png", b"\x89PNG".to_vec()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "report: {}", report);
    assert_eq!(report["uploaded"].as_array().unwrap().len(), 1);
    assert_eq!(report["uploaded"][0]["file_name"], "receipt.png");
    assert_eq!(report["rejected"][0]["file_name"], "video.zip");
    assert!(report["rejected"][0]["reason"]
        .as_str()
        .unwrap()
        .contains("10 MB"));
    assert_eq!(h.blob_count(), 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn signed_download_returns_uploaded_bytes() {
    let h = harness().await;
    let client = h.client("dl").await;
    let case_id = h.submit_case(&client, "Contract").await;
    let content = b"%PDF-1.7\nsigned contract body".to_vec();

    let (_, report) = h
        .upload(
            client.token,
            case_id,
            &[("contract.pdf", "application/pdf", content.clone())],
        )
        .await;
    let attachment_id = report["uploaded"][0]["id"].as_str().unwrap().to_owned();

    let (status, signed) = h
        .send(
            Method::GET,
            &format!("/attachments/{}/download", attachment_id),
            Some(client.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let url = signed["url"].as_str().unwrap();
    let path_and_query = url.strip_prefix(PUBLIC_ORIGIN).unwrap();

    let (status, bytes) = h
        .raw(Request::get(path_and_query).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, content);

    let tampered = path_and_query.replace("contract.pdf", "other.pdf");
    let (status, _) = h
        .raw(Request::get(tampered).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires database"]
async fn admin_deletes_attachment_and_blob() {
    let h = harness().await;
    let client = h.client("del").await;
    let admin = h.admin("del-admin").await;
    let case_id = h.submit_case(&client, "Photo evidence").await;

    let (_, report) = h
        .upload(client.token, case_id, &[("photo.jpg", "image/jpeg", vec![7u8; 64])])
        .await;
    let attachment_id = report["uploaded"][0]["id"].as_str().unwrap().to_owned();
    let uri = format!("/attachments/{}", attachment_id);

    let (status, _) = h.send(Method::DELETE, &uri, Some(client.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.blob_count(), 1);

    let (status, _) = h.send(Method::DELETE, &uri, Some(admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(h.blob_count(), 0);

    let (status, _) = h.send(Method::DELETE, &uri, Some(admin.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires database"]
async fn comments_and_chat_are_append_only() {
    let h = harness().await;
    let client = h.client("chat").await;
    let admin = h.admin("chat-admin").await;
    let case_id = h.submit_case(&client, "Missing refund").await;
    let comments = format!("/cases/{}/comments", case_id);
    let messages = format!("/cases/{}/messages", case_id);

    let (status, _) = h
        .send(Method::POST, &comments, Some(client.token), Some(json!({"content": "   "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for text in ["first", "second"] {
        let (status, _) = h
            .send(Method::POST, &comments, Some(client.token), Some(json!({"content": text})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, before) = h.send(Method::GET, &comments, Some(admin.token), None).await;
    let (_, _) = h
        .send(Method::POST, &comments, Some(admin.token), Some(json!({"content": "third"})))
        .await;
    let (_, after) = h.send(Method::GET, &comments, Some(client.token), None).await;

    let before = before.as_array().unwrap();
    let after = after.as_array().unwrap();
    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after[2]["content"], "third");
    assert_eq!(after[2]["author_name"], admin.full_name.as_str());

    let (status, body) = h
        .send(Method::POST, &messages, Some(client.token), Some(json!({"content": " \n "})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, sent) = h
        .send(Method::POST, &messages, Some(admin.token), Some(json!({"content": "We are on it"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["read"], false);

    let unread_uri = format!("/cases/{}/messages/unread", case_id);
    let (_, unread) = h.send(Method::GET, &unread_uri, Some(client.token), None).await;
    assert_eq!(unread["unread"], 1);
    let (_, unread) = h.send(Method::GET, &unread_uri, Some(admin.token), None).await;
    assert_eq!(unread["unread"], 0);

    let (status, marked) = h
        .send(
            Method::POST,
            "/messages/read",
            Some(client.token),
            Some(json!({"ids": [sent["id"]]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["updated"], 1);

    let (_, listed) = h.send(Method::GET, &messages, Some(client.token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["read"], true);
    assert_eq!(listed[0]["sender_name"], admin.full_name.as_str());
}

#[tokio::test]
#[ignore = "requires database"]
async fn mark_read_checks_case_access() {
    let h = harness().await;
    let owner = h.client("reader").await;
    let stranger = h.client("stranger").await;
    let case_id = h.submit_case(&owner, "Private").await;

    let (_, sent) = h
        .send(
            Method::POST,
            &format!("/cases/{}/messages", case_id),
            Some(owner.token),
            Some(json!({"content": "hello"})),
        )
        .await;

    let (status, _) = h
        .send(
            Method::POST,
            "/messages/read",
            Some(stranger.token),
            Some(json!({"ids": [sent["id"]]})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires database"]
async fn priority_change_reaches_both_watchers() {
    let h = harness().await;
    let client = h.client("watch").await;
    let admin = h.admin("watch-admin").await;
    let case_id = h.submit_case(&client, "Fraud alert").await;

    let mut first = h.state.live.subscribe(Topic::Case(case_id));
    let mut second = h.state.live.subscribe(Topic::Case(case_id));

    let (status, _) = h
        .send(
            Method::PATCH,
            &format!("/cases/{}", case_id),
            Some(admin.token),
            Some(json!({"field": "priority", "value": "urgent"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for sub in [&mut first, &mut second] {
        let notice = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("notified in time");
        match notice {
            Some(Notice::Changed(change)) => {
                assert_eq!(change.case_id, case_id);
                assert_eq!(change.table, Table::Cases);
                assert_eq!(change.kind, ChangeKind::Update);
            }
            other => panic!("unexpected notice {:?}", other),
        }
    }

    drop(first);
    drop(second);
    assert_eq!(h.state.live.subscriber_count(Topic::Case(case_id)), 0);
}

#[tokio::test]
#[ignore = "requires database"]
async fn identity_lifecycle() {
    let h = harness().await;
    let user = h.client("ident").await;

    let (status, me) = h.send(Method::GET, "/auth/me", Some(user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["roles"]["state"], "resolved");
    assert_eq!(me["roles"]["roles"], json!(["client"]));

    let email = me["user"]["email"].as_str().unwrap().to_owned();
    let (status, _) = h
        .send(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({"email": email, "password": "another password", "full_name": "Dup"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = h
        .send(
            Method::POST,
            "/auth/signin",
            None,
            Some(json!({"email": email, "password": "wrong password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h.send(Method::POST, "/auth/signout", Some(user.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = h.send(Method::GET, "/auth/me", Some(user.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires database"]
async fn stats_count_new_cases() {
    let h = harness().await;
    let client = h.client("stats").await;
    let admin = h.admin("stats-admin").await;

    let (_, before) = h.send(Method::GET, "/admin/stats", Some(admin.token), None).await;
    h.submit_case(&client, "One").await;
    h.submit_case(&client, "Two").await;
    let (_, after) = h.send(Method::GET, "/admin/stats", Some(admin.token), None).await;

    let total = |v: &serde_json::Value| v["total_cases"].as_i64().unwrap();
    assert!(total(&after) >= total(&before) + 2);
    assert!(after["cases_by_status"]["pending"].as_i64().unwrap() >= 2);
    assert!(after["total_users"].as_i64().unwrap() >= 2);
}
