//! User listing, profiles, settings and role management.

use axum::http::{Request, StatusCode};
use domains::Role;
use integration_tests::TestApp;

#[tokio::test]
async fn users_are_listed_with_their_totals() {
    let app = TestApp::new();
    app.register("alice").await;
    app.register("bob").await;
    app.refresh_counts().await;

    let res = app.get("/users", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("(2)"));
    assert!(res.body.contains("href=\"/users/alice\""));
    assert!(res.body.contains("href=\"/users/bob\""));
}

#[tokio::test]
async fn profiles_resolve_unames_ignoring_case() {
    let app = TestApp::new();
    app.register("alice").await;

    assert_eq!(app.get("/users/alice", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/users/ALICE", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/users/nobody", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_page_shows_only_permitted_forms() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let admin = app.register_as("boss", Role::Admin).await;

    assert_eq!(app.get("/users/alice/edit", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/users/alice/edit", Some(&bob)).await.status, StatusCode::NOT_FOUND);

    let own = app.get("/users/alice/edit", Some(&alice)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert!(own.body.contains("<h3>Settings</h3>"));
    assert!(!own.body.contains("<h3>Role</h3>"));

    let as_admin = app.get("/users/alice/edit", Some(&admin)).await;
    assert!(as_admin.body.contains("<h3>Settings</h3>"));
    assert!(as_admin.body.contains("<h3>Role</h3>"));
    assert!(as_admin.body.contains("<option value=\"MEMBER\" selected>"));
}

#[tokio::test]
async fn members_update_their_email() {
    let app = TestApp::new();
    let alice = app.register("alice").await;

    let res = app
        .post("/users/alice", "email=alice%40example.com", Some(&alice), "10.1.0.1")
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/users/alice/edit"));
    assert_eq!(res.flash_text().as_deref(), Some("User updated"));
    assert_eq!(
        app.find_user("alice").await.email.as_deref(),
        Some("alice@example.com")
    );

    let bad = app
        .form(Request::put("/users/alice"), "email=not-an-email", Some(&alice), "10.1.0.1")
        .await;
    let flash = bad.flash().unwrap();
    assert_eq!(flash.message.as_ref().unwrap().text, "Invalid email address");
    assert_eq!(flash.param("email"), "not-an-email");
}

#[tokio::test]
async fn members_cannot_promote_themselves() {
    let app = TestApp::new();
    let alice = app.register("alice").await;

    let via_settings = app.post("/users/alice", "role=ADMIN", Some(&alice), "10.1.0.1").await;
    assert_eq!(via_settings.status, StatusCode::NOT_FOUND);

    let via_role = app.post("/users/alice/role", "role=ADMIN", Some(&alice), "10.1.0.1").await;
    assert_eq!(via_role.status, StatusCode::NOT_FOUND);

    assert_eq!(app.find_user("alice").await.role, Role::Member);
}

#[tokio::test]
async fn mods_manage_members_but_not_admins() {
    let app = TestApp::new();
    app.register("alice").await;
    app.register_as("boss", Role::Admin).await;
    let moderator = app.register_as("moddy", Role::Mod).await;

    assert_eq!(app.get("/users/alice/edit", Some(&moderator)).await.status, StatusCode::OK);
    assert_eq!(app.get("/users/boss/edit", Some(&moderator)).await.status, StatusCode::NOT_FOUND);

    let res = app
        .post("/users/boss", "email=boss%40example.com", Some(&moderator), "10.1.0.1")
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.find_user("boss").await.email, None);

    let role = app.post("/users/alice/role", "role=BANNED", Some(&moderator), "10.1.0.1").await;
    assert_eq!(role.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_change_roles() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let admin = app.register_as("boss", Role::Admin).await;

    let res = app.post("/users/alice/role", "role=MOD", Some(&admin), "10.1.0.1").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/users/alice/edit"));
    assert_eq!(res.flash_text().as_deref(), Some("Role updated"));
    assert_eq!(app.find_user("alice").await.role, Role::Mod);

    let res = app
        .form(
            Request::put("/users/alice/role"),
            "role=BANNED&redirectTo=/users",
            Some(&admin),
            "10.1.0.1",
        )
        .await;
    assert_eq!(res.location(), Some("/users"));
    assert_eq!(app.find_user("alice").await.role, Role::Banned);

    // a banned user keeps browsing but can no longer post
    let post = app.post("/messages", "markup=let+me+in", Some(&alice), "10.2.0.1").await;
    assert_eq!(post.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_changes_are_validated() {
    let app = TestApp::new();
    app.register("alice").await;
    let admin = app.register_as("boss", Role::Admin).await;

    let unknown = app.post("/users/alice/role", "role=GOD", Some(&admin), "10.1.0.1").await;
    assert_eq!(unknown.status, StatusCode::SEE_OTHER);
    assert_eq!(unknown.flash_text().as_deref(), Some("Invalid role"));

    let offsite = app
        .post(
            "/users/alice/role",
            "role=MOD&redirectTo=//evil.example",
            Some(&admin),
            "10.1.0.1",
        )
        .await;
    assert_eq!(offsite.flash_text().as_deref(), Some("Invalid redirect"));

    assert_eq!(app.find_user("alice").await.role, Role::Member);
}
