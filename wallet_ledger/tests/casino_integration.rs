//! Casino one-wallet protocol, end to end over the in-memory store.

mod common;

use common::{CURRENCY, PLAYER, fields, harness};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use wallet_ledger::casino::CasinoOutcome;
use wallet_ledger::ledger::LedgerStore;

fn debit(tid: &str, action: &str, amount: &str) -> Value {
    json!({
        "type": "debit",
        "userid": PLAYER,
        "amount": amount,
        "currency": CURRENCY,
        "tid": tid,
        "i_gameid": "G-100",
        "i_actionid": action,
        "i_gamedesc": "Roulette",
    })
}

#[tokio::test]
async fn test_ping_is_signed() {
    let h = harness(0).await;
    let reply = h.casino.handle(&h.signed(json!({ "type": "ping" }))).await;

    assert_eq!(reply.body["status"], json!("OK"));
    assert!(h.signer.verify(fields(&reply.body)).is_ok());
}

#[tokio::test]
async fn test_bad_signature_short_circuits() {
    let h = harness(500).await;
    let mut body = h.signed(debit("T1", "A1", "50"));
    body["amount"] = json!("5000");

    let reply = h.casino.handle(&body).await;
    assert_eq!(reply.body["error"], json!("Authentication failed"));
    assert_eq!(reply.request_type, None);
    assert!(matches!(reply.outcome, CasinoOutcome::Failed(_)));
    assert!(h.signer.verify(fields(&reply.body)).is_ok());
    assert_eq!(h.wallet().await.balance, Decimal::from(500));
}

#[tokio::test]
async fn test_balance_rejects_other_currency() {
    let h = harness(500).await;

    let reply = h
        .casino
        .handle(&h.signed(json!({ "type": "balance", "userid": PLAYER, "currency": CURRENCY })))
        .await;
    assert_eq!(reply.body["balance"], json!("500.00"));

    let reply = h
        .casino
        .handle(&h.signed(json!({ "type": "balance", "userid": PLAYER, "currency": "USD" })))
        .await;
    assert_eq!(reply.body["error"], json!("Unsupported currency"));
}

#[tokio::test]
async fn test_debit_replay_is_idempotent() {
    let h = harness(500).await;
    let request = h.signed(debit("T1", "A1", "50"));

    let first = h.casino.handle(&request).await;
    assert_eq!(first.body["status"], json!("OK"));
    assert_eq!(first.body["tid"], json!("T1"));
    assert_eq!(first.body["balance"], json!("450.00"));
    let rows = h.row_count().await;

    let second = h.casino.handle(&request).await;
    assert_eq!(second.outcome, CasinoOutcome::ExactReplay);
    assert_eq!(second.body, first.body);
    assert_eq!(h.row_count().await, rows);
    assert_eq!(h.wallet().await.balance, Decimal::from(450));
}

#[tokio::test]
async fn test_semantic_replay_under_new_tid() {
    let h = harness(500).await;
    h.casino.handle(&h.signed(debit("T1", "A1", "50"))).await;

    let reply = h.casino.handle(&h.signed(debit("T2", "A1", "50"))).await;
    assert_eq!(reply.outcome, CasinoOutcome::SemanticReplay);
    assert_eq!(reply.body["tid"], json!("T2"));
    assert_eq!(reply.body["balance"], json!("450.00"));
    assert_eq!(h.wallet().await.balance, Decimal::from(450));
}

#[tokio::test]
async fn test_semantic_replay_with_different_amount_is_rejected() {
    let h = harness(500).await;
    h.casino.handle(&h.signed(debit("T1", "A1", "50"))).await;
    let rows = h.row_count().await;

    let reply = h.casino.handle(&h.signed(debit("T2", "A1", "75"))).await;
    assert_eq!(reply.body["error"], json!("Transaction parameter mismatch"));
    assert_eq!(reply.body["balance"], json!("450.00"));
    assert_eq!(h.row_count().await, rows);
}

#[tokio::test]
async fn test_debit_cannot_overdraw() {
    let h = harness(30).await;

    let reply = h.casino.handle(&h.signed(debit("T1", "A1", "50"))).await;
    assert_eq!(reply.body["error"], json!("Insufficient funds"));
    assert_eq!(reply.body["balance"], json!("30.00"));
    assert_eq!(h.wallet().await.balance, Decimal::from(30));
}

#[tokio::test]
async fn test_zero_debit_needs_funded_wallet() {
    let h = harness(0).await;

    let reply = h.casino.handle(&h.signed(debit("Z1", "A1", "0.00"))).await;
    assert_eq!(reply.body["error"], json!("Insufficient funds"));
    assert_eq!(reply.body["balance"], json!("0.00"));
    assert_eq!(h.row_count().await, 0);

    let mut credit = debit("Z2", "A2", "0.00");
    credit["type"] = json!("credit");
    let reply = h.casino.handle(&h.signed(credit)).await;
    assert_eq!(reply.body["status"], json!("OK"));
    assert_eq!(reply.body["balance"], json!("0.00"));
}

#[tokio::test]
async fn test_plain_credit_matches_recorded_cancel() {
    let h = harness(100).await;
    let mut cancel = debit("T1", "A1", "40");
    cancel["subtype"] = json!("cancel");
    let reply = h.casino.handle(&h.signed(cancel)).await;
    assert_eq!(reply.body["balance"], json!("60.00"));
    let rows = h.row_count().await;

    let mut credit = debit("T9", "A1", "40");
    credit["type"] = json!("credit");
    let reply = h.casino.handle(&h.signed(credit)).await;
    assert_eq!(reply.body["error"], json!("Transaction parameter mismatch"));
    assert_eq!(h.row_count().await, rows);
    assert_eq!(h.wallet().await.balance, Decimal::from(60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_deliveries_apply_once() {
    let h = harness(500).await;
    let rows = h.row_count().await;
    let request = h.signed(debit("T1", "A1", "50"));

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let casino = h.casino.clone();
            let request = request.clone();
            tokio::spawn(async move { casino.handle(&request).await })
        })
        .collect();
    let mut replies = Vec::new();
    for task in tasks {
        replies.push(task.await.unwrap());
    }

    assert_eq!(replies[0].body, replies[1].body);
    assert_eq!(replies[0].body["balance"], json!("450.00"));
    assert_eq!(h.row_count().await, rows + 1);
    assert_eq!(h.wallet().await.balance, Decimal::from(450));
}

#[tokio::test]
async fn test_credit_and_cancel() {
    let h = harness(100).await;
    h.casino.handle(&h.signed(debit("T1", "A1", "40"))).await;

    let mut win = debit("T2", "A2", "25.50");
    win["type"] = json!("credit");
    let reply = h.casino.handle(&h.signed(win)).await;
    assert_eq!(reply.body["balance"], json!("85.50"));

    // The cancel refunds the original action under its own subtype.
    let mut cancel = debit("T3", "A1", "40");
    cancel["type"] = json!("credit");
    cancel["subtype"] = json!("cancel");
    let reply = h.casino.handle(&h.signed(cancel)).await;
    assert_eq!(reply.body["status"], json!("OK"));
    assert_eq!(h.wallet().await.balance, Decimal::new(12550, 2));
}

#[tokio::test]
async fn test_unknown_user() {
    let h = harness(0).await;
    let mut request = debit("T1", "A1", "10");
    request["userid"] = json!("ghost");

    let reply = h.casino.handle(&h.signed(request)).await;
    assert_eq!(reply.body["error"], json!("User not found"));
}

#[tokio::test]
async fn test_roundinfo_always_ok() {
    let h = harness(0).await;
    let request = json!({
        "type": "roundinfo",
        "gameid": "G-100",
        "userid": PLAYER,
        "i_gamedesc": "Roulette",
        "actions": [{ "id": "A1", "amount": "50", "timestamp": "2025-01-01T00:00:00Z" }],
    });

    let first = h.casino.handle(&h.signed(request.clone())).await;
    let second = h.casino.handle(&h.signed(request)).await;
    assert_eq!(first.body["status"], json!("OK"));
    assert_eq!(second.body["status"], json!("OK"));

    let round = h.store.round("G-100", PLAYER).await.unwrap().unwrap();
    assert_eq!(round.game_desc.as_deref(), Some("Roulette"));
}

#[tokio::test]
async fn test_malformed_body_gets_signed_error() {
    let h = harness(0).await;
    let reply = h.casino.handle_bytes(b"{not json").await;

    assert_eq!(reply.body["error"], json!("Invalid request"));
    assert!(h.signer.verify(fields(&reply.body)).is_ok());
}
