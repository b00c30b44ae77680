//! End-to-end tests against a running service instance.

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_rejects_missing_and_wrong_tokens() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/approvals/pending"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/approvals/pending", "not-a-real-key").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_approval_workflow() {
    let app = TestApp::spawn().await;
    let order_id = app.seed_order(TENANT_A, "ORD-100");

    // Pending queue shows the seeded order.
    let body: Value = app
        .get("/approvals/pending", TENANT_A_KEY)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["approvals"][0]["order_number"], "ORD-100");

    // Approve.
    let response = app
        .post(
            &format!("/approvals/{order_id}/approve"),
            TENANT_A_KEY,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "approved");
    assert_eq!(body["order"]["decided_by"], TENANT_A);

    // Execute.
    let response = app
        .post_empty(&format!("/approvals/{order_id}/execute"), TENANT_A_KEY)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "executed");
    assert_eq!(body["actions"]["statusChanged"], true);
    assert_eq!(body["actions"]["tenantMarketplaceAutoEnabled"], true);
    let cert_number = body["certificate"]["number"].as_str().unwrap().to_string();
    let tx_hash = body["certificate"]["blockchain_tx_hash"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(cert_number.starts_with("CERT-"));
    assert!(tx_hash.starts_with("0x"));
    // Dual signature is off, so no co-signature section.
    assert!(body.get("dualSignature").is_none());

    // Pending queue is empty again.
    let body: Value = app
        .get("/approvals/pending", TENANT_A_KEY)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 0);

    // Public verification by certificate number, no credentials.
    let response = app
        .client
        .get(app.url(&format!("/marketplace/verify/{cert_number}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["certificate"]["number"], cert_number.as_str());
    assert_eq!(body["revoked"], false);
    assert_eq!(body["hash_valid"], true);
    assert_eq!(body["blockchain"]["state"], "confirmed");
    assert_eq!(body["blockchain"]["payload_matches"], true);

    // And by anchor transaction hash.
    let response = app
        .client
        .get(app.url(&format!("/marketplace/verify-tx/{tx_hash}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["certificate"]["number"], cert_number.as_str());

    // Both transitions were audited.
    let body: Value = app
        .get("/approvals/audit", TENANT_A_KEY)
        .await
        .json()
        .await
        .unwrap();
    let actions: Vec<&str> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"order_approved"));
    assert!(actions.contains(&"order_executed"));
    assert!(actions.contains(&"marketplace_auto_enabled"));
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let app = TestApp::spawn().await;
    let order_id = app.seed_order(TENANT_A, "ORD-101");

    let response = app
        .post(
            &format!("/approvals/{order_id}/reject"),
            TENANT_A_KEY,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing_reason");

    let response = app
        .post(
            &format!("/approvals/{order_id}/reject"),
            TENANT_A_KEY,
            json!({"reason": "KYC check failed"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "rejected");
    assert_eq!(body["order"]["rejection_reason"], "KYC check failed");

    // Rejected is terminal.
    let response = app
        .post(
            &format!("/approvals/{order_id}/approve"),
            TENANT_A_KEY,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_state");
    assert_eq!(body["currentStatus"], "rejected");
}

#[tokio::test]
async fn test_cross_tenant_orders_are_invisible() {
    let app = TestApp::spawn().await;
    let order_id = app.seed_order(TENANT_A, "ORD-102");

    // Tenant B cannot see or act on tenant A's order; both read as 404.
    let body: Value = app
        .get("/approvals/pending", TENANT_B_KEY)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 0);

    let response = app
        .post(
            &format!("/approvals/{order_id}/approve"),
            TENANT_B_KEY,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            &format!("/approvals/{}/approve", uuid::Uuid::new_v4()),
            TENANT_A_KEY,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post("/approvals/not-a-uuid/approve", TENANT_A_KEY, json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_denial_reports_quota() {
    let mut config = test_config();
    config.rate_limit.max_operations = 1;
    let app = TestApp::spawn_with(config).await;

    let first = app.seed_order(TENANT_A, "ORD-103");
    let second = app.seed_order(TENANT_A, "ORD-104");

    let response = app
        .post(&format!("/approvals/{first}/approve"), TENANT_A_KEY, json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post(
            &format!("/approvals/{second}/approve"),
            TENANT_A_KEY,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["operationsRemaining"], 0);
    assert!(body["resetAt"].is_string());

    // The denied approve left the order untouched.
    let order = app.state.orders.get(second).unwrap();
    assert_eq!(order.status.as_str(), "pending_approval");

    // Status endpoint agrees.
    let body: Value = app
        .get("/approvals/rate-limit-status", TENANT_A_KEY)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["maxOperations"], 1);
    assert_eq!(body["operationsUsed"], 1);
}

#[tokio::test]
async fn test_anchor_failure_leaves_order_approved() {
    let app = TestApp::spawn().await;
    let order_id = app.seed_order(TENANT_A, "ORD-105");

    app.post(
        &format!("/approvals/{order_id}/approve"),
        TENANT_A_KEY,
        json!({}),
    )
    .await;

    app.chain.set_fail_anchors(true);
    let response = app
        .post_empty(&format!("/approvals/{order_id}/execute"), TENANT_A_KEY)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "execution_failed");

    let order = app.state.orders.get(order_id).unwrap();
    assert_eq!(order.status.as_str(), "approved");
    assert!(app.state.certificates.find_by_order(order_id).is_none());

    // Chain recovers; the retry succeeds.
    app.chain.set_fail_anchors(false);
    let response = app
        .post_empty(&format!("/approvals/{order_id}/execute"), TENANT_A_KEY)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wallet_config_never_returns_key_material() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/approvals/wallet-config",
            TENANT_A_KEY,
            json!({
                "walletAddress": TENANT_WALLET_ADDRESS,
                "privateKey": TENANT_PRIVATE_KEY,
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    assert!(!text.contains(TENANT_PRIVATE_KEY));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["walletConfig"]["has_private_key"], true);
    assert_eq!(
        body["walletConfig"]["walletAddress"],
        TENANT_WALLET_ADDRESS
    );

    let response = app.get("/approvals/wallet-config", TENANT_A_KEY).await;
    let text = response.text().await.unwrap();
    assert!(!text.contains(TENANT_PRIVATE_KEY));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["has_private_key"], true);
    assert_eq!(body["dual_signature_enabled"], false);
}

#[tokio::test]
async fn test_invalid_wallet_address_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/approvals/wallet-config",
            TENANT_A_KEY,
            json!({"walletAddress": "not-an-address"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_address");
}

#[tokio::test]
async fn test_toggle_requires_configured_wallet() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/approvals/toggle-dual-signature",
            TENANT_A_KEY,
            json!({"enabled": true}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "wallet_not_configured");
}

#[tokio::test]
async fn test_dual_signature_execution_carries_both_signers() {
    let app = TestApp::spawn().await;

    app.post(
        "/approvals/wallet-config",
        TENANT_A_KEY,
        json!({
            "walletAddress": TENANT_WALLET_ADDRESS,
            "privateKey": TENANT_PRIVATE_KEY,
        }),
    )
    .await;
    let response = app
        .post(
            "/approvals/toggle-dual-signature",
            TENANT_A_KEY,
            json!({"enabled": true}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["dual_signature_enabled"], true);

    let order_id = app.seed_order(TENANT_A, "ORD-106");
    app.post(
        &format!("/approvals/{order_id}/approve"),
        TENANT_A_KEY,
        json!({}),
    )
    .await;

    let response = app
        .post_empty(&format!("/approvals/{order_id}/execute"), TENANT_A_KEY)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    assert!(!text.contains(TENANT_PRIVATE_KEY));
    let body: Value = serde_json::from_str(&text).unwrap();

    let signers = body["dualSignature"]["signers"].as_array().unwrap();
    assert_eq!(signers.len(), 2);
    let addresses: Vec<&str> = signers
        .iter()
        .filter_map(|s| s["address"].as_str())
        .collect();
    assert!(addresses.contains(&TENANT_WALLET_ADDRESS));

    // The certificate records both signer addresses.
    let cert_signers = body["certificate"]["signer_addresses"].as_array().unwrap();
    assert_eq!(cert_signers.len(), 2);
}

#[tokio::test]
async fn test_verify_distinguishes_revoked_and_missing() {
    let app = TestApp::spawn().await;
    let order_id = app.seed_order(TENANT_A, "ORD-107");

    app.post(
        &format!("/approvals/{order_id}/approve"),
        TENANT_A_KEY,
        json!({}),
    )
    .await;
    let response = app
        .post_empty(&format!("/approvals/{order_id}/execute"), TENANT_A_KEY)
        .await;
    let body: Value = response.json().await.unwrap();
    let cert_number = body["certificate"]["number"].as_str().unwrap().to_string();

    // Unknown certificate: 404.
    let response = app
        .client
        .get(app.url("/marketplace/verify/CERT-2026-99999"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Revoked certificate: still found, flagged.
    app.state.certificates.revoke(&cert_number).unwrap();
    let response = app
        .client
        .get(app.url(&format!("/marketplace/verify/{cert_number}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["revoked"], true);
    assert_eq!(body["certificate"]["status"], "revoked");
}

#[tokio::test]
async fn test_audit_limit_is_capped() {
    let mut config = test_config();
    config.rate_limit.max_operations = 100;
    let app = TestApp::spawn_with(config).await;

    // Seed a handful of audited events.
    for i in 0..5 {
        let order_id = app.seed_order(TENANT_A, &format!("ORD-2{i:02}"));
        app.post(
            &format!("/approvals/{order_id}/approve"),
            TENANT_A_KEY,
            json!({}),
        )
        .await;
    }

    let body: Value = app
        .get("/approvals/audit?limit=2", TENANT_A_KEY)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["history"].as_array().unwrap().len(), 2);

    // Oversized limits are clamped rather than rejected.
    let response = app.get("/approvals/audit?limit=100000", TENANT_A_KEY).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_chain_state() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chain"]["reachable"], true);

    app.chain.set_fail_anchors(true);
    let body: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["chain"]["reachable"], false);
}
