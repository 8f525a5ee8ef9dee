//! Posting, reading, moderating and paging messages over HTTP.

use axum::http::header::REFERER;
use axum::http::{Request, StatusCode};
use domains::Role;
use integration_tests::TestApp;

#[tokio::test]
async fn guests_post_anonymously_and_markup_is_escaped() {
    let app = TestApp::new();
    let res = app
        .post("/messages", "markup=%3Cb%3Ehello%3C%2Fb%3E", None, "10.1.0.1")
        .await;

    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/"));
    assert_eq!(res.flash_text().as_deref(), Some("Message created!"));

    let stored = app.message(1).await.unwrap();
    assert_eq!(stored.user_id, None);
    assert_eq!(stored.ip_address, "10.1.0.1");

    let home = app.get("/", None).await;
    assert!(home.body.contains("&lt;b&gt;hello"));
    assert!(!home.body.contains("<b>hello"));
    assert!(home.body.contains("Anonymous"));
}

#[tokio::test]
async fn members_post_under_their_name() {
    let app = TestApp::new();
    let alice = app.register("alice").await;

    let res = app.post("/messages", "markup=hello+there", Some(&alice), "10.1.0.1").await;
    assert_eq!(res.flash_text().as_deref(), Some("Message created!"));

    let page = app.get("/messages/1", None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("<strong>alice</strong>"));
    assert!(page.body.contains("hello there"));

    let profile = app.get("/users/alice", None).await;
    assert!(profile.body.contains("hello there"));
}

#[tokio::test]
async fn invalid_markup_returns_to_the_referring_page() {
    let app = TestApp::new();
    let res = app
        .form(
            Request::post("/messages").header(REFERER, "http://localhost/messages?page=2"),
            "markup=hi",
            None,
            "10.1.0.1",
        )
        .await;

    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/messages?page=2"));
    let flash = res.flash().unwrap();
    assert_eq!(flash.message.as_ref().unwrap().text, "Message must be 3-300 chars");
    assert_eq!(flash.param("markup"), "hi");
    assert!(app.message(1).await.is_none());
}

#[tokio::test]
async fn posting_is_ratelimited_per_address_root() {
    let app = TestApp::new();
    let first = app.post("/messages", "markup=first+post", None, "10.2.0.1").await;
    assert_eq!(first.flash_text().as_deref(), Some("Message created!"));

    let second = app.post("/messages", "markup=second+post", None, "10.2.0.99").await;
    assert_eq!(second.status, StatusCode::SEE_OTHER);
    let text = second.flash_text().unwrap();
    assert!(text.starts_with("Ratelimited! You must wait "), "{text}");
    assert!(text.ends_with(" longer before posting."), "{text}");

    let elsewhere = app.post("/messages", "markup=third+post", None, "10.3.0.1").await;
    assert_eq!(elsewhere.flash_text().as_deref(), Some("Message created!"));
    assert!(app.message(3).await.is_none());
}

#[tokio::test]
async fn banned_users_cannot_post() {
    let app = TestApp::new();
    let troll = app.register_as("troll", Role::Banned).await;

    let res = app.post("/messages", "markup=spam+spam", Some(&troll), "10.1.0.1").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(app.message(1).await.is_none());
}

#[tokio::test]
async fn hidden_messages_are_visible_to_staff_only() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let moderator = app.register_as("moddy", Role::Mod).await;
    let author = app.find_user("alice").await;
    app.seed_message(Some(author.id), "soon to be hidden").await;

    let res = app
        .post("/messages/1", "is_hidden=true&redirectTo=/messages/1", Some(&moderator), "10.1.0.1")
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/messages/1"));
    assert_eq!(res.flash_text().as_deref(), Some("Message updated"));
    assert!(app.message(1).await.unwrap().is_hidden);

    assert_eq!(app.get("/messages/1", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/messages/1", Some(&alice)).await.status, StatusCode::NOT_FOUND);
    let staff_view = app.get("/messages/1", Some(&moderator)).await;
    assert_eq!(staff_view.status, StatusCode::OK);
    assert!(staff_view.body.contains("[hidden]"));
    assert!(staff_view.body.contains("Unhide"));

    assert!(!app.get("/messages", None).await.body.contains("soon to be hidden"));
    assert!(app.get("/messages", Some(&moderator)).await.body.contains("soon to be hidden"));
    assert!(!app.get("/", Some(&moderator)).await.body.contains("soon to be hidden"));
}

#[tokio::test]
async fn owners_delete_their_own_messages() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let author = app.find_user("alice").await;
    app.seed_message(Some(author.id), "mine to delete").await;

    let stranger = app
        .post("/messages/1/delete", "redirectTo=/", Some(&bob), "10.1.0.1")
        .await;
    assert_eq!(stranger.status, StatusCode::NOT_FOUND);
    assert!(!app.message(1).await.unwrap().is_hidden);

    let owner = app
        .post("/messages/1/delete", "redirectTo=/users/alice", Some(&alice), "10.1.0.1")
        .await;
    assert_eq!(owner.status, StatusCode::SEE_OTHER);
    assert_eq!(owner.location(), Some("/users/alice"));
    assert_eq!(owner.flash_text().as_deref(), Some("Message deleted"));

    // soft delete
    assert!(app.message(1).await.unwrap().is_hidden);
    assert_eq!(app.get("/messages/1", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_verb_is_routed_too() {
    let app = TestApp::new();
    let moderator = app.register_as("moddy", Role::Mod).await;
    app.seed_message(None, "anonymous noise").await;

    let res = app
        .form(Request::delete("/messages/1"), "", Some(&moderator), "10.1.0.1")
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/"));
    assert!(app.message(1).await.unwrap().is_hidden);
}

#[tokio::test]
async fn members_edit_markup_but_not_state() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let author = app.find_user("alice").await;
    app.seed_message(Some(author.id), "first draft").await;

    let state = app.post("/messages/1", "is_hidden=true", Some(&alice), "10.1.0.1").await;
    assert_eq!(state.status, StatusCode::NOT_FOUND);
    assert!(!app.message(1).await.unwrap().is_hidden);

    let markup = app
        .form(Request::put("/messages/1"), "markup=second+draft", Some(&alice), "10.1.0.1")
        .await;
    assert_eq!(markup.status, StatusCode::SEE_OTHER);
    assert_eq!(app.message(1).await.unwrap().markup, "second draft");
}

#[tokio::test]
async fn offsite_redirects_are_rejected_before_writing() {
    let app = TestApp::new();
    let moderator = app.register_as("moddy", Role::Mod).await;
    app.seed_message(None, "stays visible").await;

    let res = app
        .post(
            "/messages/1",
            "is_hidden=true&redirectTo=https://evil.example/",
            Some(&moderator),
            "10.1.0.1",
        )
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/"));
    assert_eq!(res.flash_text().as_deref(), Some("Invalid redirect"));
    assert!(!app.message(1).await.unwrap().is_hidden);
}

#[tokio::test]
async fn unknown_message_ids_are_not_found() {
    let app = TestApp::new();
    for uri in ["/messages/42", "/messages/abc", "/messages/-1"] {
        assert_eq!(app.get(uri, None).await.status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn message_list_is_paginated_newest_first() {
    let app = TestApp::new();
    for n in 1..=25 {
        app.seed_message(None, &format!("msg-{n:03}")).await;
    }
    app.refresh_counts().await;

    let first = app.get("/messages", None).await;
    assert!(first.body.contains("(25)"));
    assert!(first.body.contains("msg-025"));
    assert!(!first.body.contains("msg-015"));
    assert!(first.body.contains("href=\"?page=2\""));
    assert!(first.body.contains(">Next<"));

    let last = app.get("/messages?page=3", None).await;
    assert!(last.body.contains("msg-005"));
    assert!(last.body.contains("msg-001"));
    assert!(!last.body.contains("msg-006"));
    assert!(last.body.contains(">Prev<"));

    let junk = app.get("/messages?page=banana", None).await;
    assert_eq!(junk.status, StatusCode::OK);
    assert!(junk.body.contains("msg-025"));
}

#[tokio::test]
async fn trailing_slashes_redirect_keeping_the_query() {
    let app = TestApp::new();
    let res = app.get("/messages/?page=2", None).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/messages?page=2"));

    assert_eq!(app.get("/no/such/page", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trailing_slash_redirects_stay_on_site() {
    let app = TestApp::new();
    let res = app.get("//evil.com/", None).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/evil.com"));

    let res = app.get("///", None).await;
    assert_eq!(res.location(), Some("/"));
}

#[tokio::test]
async fn huge_page_numbers_render_an_empty_page() {
    let app = TestApp::new();
    app.seed_message(None, "only one").await;
    app.refresh_counts().await;

    for path in ["/messages?page=9223372036854775807", "/users?page=9223372036854775807"] {
        let res = app.get(path, None).await;
        assert_eq!(res.status, StatusCode::OK, "{path}");
    }
    let res = app.get("/messages?page=9223372036854775807", None).await;
    assert!(!res.body.contains("only one"));
}

#[tokio::test]
async fn flash_survives_redirects_and_clears_on_display() {
    let app = TestApp::new();
    let created = app.post("/messages", "markup=hello+world", None, "10.1.0.1").await;
    let flash = created.cookie("flash").unwrap();

    let redirected = app.get("/messages/", Some(&flash)).await;
    assert_eq!(redirected.status, StatusCode::SEE_OTHER);
    assert!(redirected.cookie("flash").is_none());

    let shown = app.get("/", Some(&flash)).await;
    assert_eq!(shown.status, StatusCode::OK);
    assert!(shown.body.contains("Message created!"));
    assert!(shown.body.contains("class=\"alert alert-success\""));
    assert_eq!(shown.cookie("flash").as_deref(), Some("flash="));
}

#[tokio::test]
async fn malformed_flash_cookies_are_dropped() {
    let app = TestApp::new();
    let res = app.get("/", Some("flash=%%%not-base64")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(!res.body.contains("class=\"alert "));
    assert_eq!(res.cookie("flash").as_deref(), Some("flash="));
}
