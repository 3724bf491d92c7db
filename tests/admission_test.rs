//! Integration tests for the meeting admission workflow: waiting queue,
//! host decisions, entry tokens, and room lifecycle.

mod common;

use common::*;
use huddle_server::meeting::token::verify_entry_token;
use serde_json::json;

async fn open_meeting(server: &TestServer, host_id: &str, host_name: &str) -> String {
    let token = token_for(server, host_id, host_name);
    let resp = reqwest::Client::new()
        .post(api_url(server, "/api/meetings"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({}))
        .send()
        .await
        .expect("open meeting request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["meeting_id"].as_str().unwrap().to_string()
}

async fn waiting_list(
    server: &TestServer,
    meeting_id: &str,
    caller_id: &str,
) -> reqwest::Response {
    let token = token_for(server, caller_id, caller_id);
    reqwest::Client::new()
        .get(api_url(
            server,
            &format!("/api/meetings/{}/waiting", meeting_id),
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("waiting list request failed")
}

fn request_to_join(meeting_id: &str) -> serde_json::Value {
    json!({"type": "requestToJoin", "meetingId": meeting_id})
}

#[tokio::test]
async fn guest_waits_and_admit_hands_over_an_entry_token() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut host = connect_ws(&server, "host", "Hana").await;
    let mut guest = connect_ws(&server, "guest", "Gus").await;

    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "waiting-for-host").await;

    let event = recv_event(&mut host, "new-join-request").await;
    assert_eq!(event["guest"]["userId"], "guest");
    assert_eq!(event["guest"]["name"], "Gus");

    send_json(
        &mut host,
        json!({"type": "admitGuest", "guest": "guest", "meetingId": meeting_id}),
    )
    .await;

    let event = recv_event(&mut guest, "join-request-approved").await;
    let entry_token = event["token"].as_str().unwrap();
    let (token_meeting, token_guest) =
        verify_entry_token(&server.state.meeting_token_secret, entry_token)
            .expect("entry token must verify");
    assert_eq!(token_meeting, meeting_id);
    assert_eq!(token_guest, "guest");

    // Queue is empty again
    let resp = waiting_list(&server, &meeting_id, "host").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn second_admit_after_resolution_is_a_noop() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut host = connect_ws(&server, "host", "Hana").await;
    let mut guest = connect_ws(&server, "guest", "Gus").await;

    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut host, "new-join-request").await;

    let admit = json!({"type": "admitGuest", "guest": "guest", "meetingId": meeting_id});
    send_json(&mut host, admit.clone()).await;
    recv_event(&mut guest, "join-request-approved").await;

    // Replay: no state change and no second authorization
    send_json(&mut host, admit).await;
    let event = recv_event(&mut host, "error").await;
    assert_eq!(event["code"], 404);
    assert_no_event(&mut guest, "join-request-approved", 300).await;
}

#[tokio::test]
async fn deny_notifies_the_guest_who_may_ask_again() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut host = connect_ws(&server, "host", "Hana").await;
    let mut guest = connect_ws(&server, "guest", "Gus").await;

    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut host, "new-join-request").await;

    send_json(
        &mut host,
        json!({"type": "denyGuest", "guest": "guest", "meetingId": meeting_id}),
    )
    .await;
    let event = recv_event(&mut guest, "join-request-denied").await;
    assert_eq!(event["meetingId"], meeting_id.as_str());

    // Denial is not a ban: a fresh request queues again
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "waiting-for-host").await;
    recv_event(&mut host, "new-join-request").await;
}

#[tokio::test]
async fn re_request_supersedes_the_pending_entry() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut guest = connect_ws(&server, "guest", "Gus").await;
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "waiting-for-host").await;
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "waiting-for-host").await;

    let resp = waiting_list(&server, &meeting_id, "host").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1, "host sees exactly one pending entry");
    assert_eq!(entries[0]["userId"], "guest");
}

#[tokio::test]
async fn non_host_decisions_are_rejected_without_side_effects() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut guest = connect_ws(&server, "guest", "Gus").await;
    let mut intruder = connect_ws(&server, "intruder", "Ivy").await;

    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "waiting-for-host").await;

    send_json(
        &mut intruder,
        json!({"type": "admitGuest", "guest": "guest", "meetingId": meeting_id}),
    )
    .await;
    let event = recv_event(&mut intruder, "error").await;
    assert_eq!(event["code"], 403);
    assert_no_event(&mut guest, "join-request-approved", 300).await;

    // The entry is still pending and the waiting list is host-only
    let resp = waiting_list(&server, &meeting_id, "intruder").await;
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    let resp = waiting_list(&server, &meeting_id, "host").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn host_and_admitted_guests_bypass_the_queue() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut host = connect_ws(&server, "host", "Hana").await;
    send_json(&mut host, request_to_join(&meeting_id)).await;
    recv_event(&mut host, "join-request-approved").await;

    let mut guest = connect_ws(&server, "guest", "Gus").await;
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut host, "new-join-request").await;
    send_json(
        &mut host,
        json!({"type": "admitGuest", "guest": "guest", "meetingId": meeting_id}),
    )
    .await;
    recv_event(&mut guest, "join-request-approved").await;

    // Page reload: the admitted guest re-asks and is authorized immediately
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "join-request-approved").await;
}

#[tokio::test]
async fn closing_a_room_denies_everyone_still_waiting() {
    let server = start_test_server().await;
    let meeting_id = open_meeting(&server, "host", "Hana").await;

    let mut guest = connect_ws(&server, "guest", "Gus").await;
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    recv_event(&mut guest, "waiting-for-host").await;

    // Non-host cannot close the room
    let intruder_token = token_for(&server, "intruder", "Ivy");
    let resp = reqwest::Client::new()
        .delete(api_url(&server, &format!("/api/meetings/{}", meeting_id)))
        .header("Authorization", format!("Bearer {}", intruder_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

    let host_token = token_for(&server, "host", "Hana");
    let resp = reqwest::Client::new()
        .delete(api_url(&server, &format!("/api/meetings/{}", meeting_id)))
        .header("Authorization", format!("Bearer {}", host_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let event = recv_event(&mut guest, "join-request-denied").await;
    assert_eq!(event["meetingId"], meeting_id.as_str());

    // Requests to a closed room fail cleanly
    send_json(&mut guest, request_to_join(&meeting_id)).await;
    let event = recv_event(&mut guest, "error").await;
    assert_eq!(event["code"], 404);
}
