//! HTTP tests driving the full router

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use super::*;
use crate::config::Config;
use crate::db::repositories::{
    SqlxJournalRepository, SqlxQuestionRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::{create_test_pool, migrations};
use crate::models::{CreateJournalInput, CreateQuestionInput, User};
use crate::services::{EntryService, LoginInput, SignupInput, UserService};
use crate::theme::PageRenderer;

const PASSWORD: &str = "correct horse battery";

struct TestApp {
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let config = Config::default();
        let user_service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        let entry_service = EntryService::new(
            SqlxJournalRepository::boxed(pool.clone()),
            SqlxQuestionRepository::boxed(pool.clone()),
        );
        let renderer = PageRenderer::new(config.site.clone()).expect("templates should load");

        Self {
            state: AppState {
                pool,
                config: Arc::new(config),
                user_service: Arc::new(user_service),
                entry_service: Arc::new(entry_service),
                renderer: Arc::new(renderer),
            },
        }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Register and log in `username`; returns the user and its session token.
    async fn user(&self, username: &str, accepted: bool) -> (User, String) {
        let service = &self.state.user_service;
        service
            .register(SignupInput::new(username, "", PASSWORD))
            .await
            .unwrap();
        if accepted {
            service
                .set_registration_accepted(username, true)
                .await
                .unwrap();
        }
        let (session, user) = service
            .login(LoginInput::new(username, PASSWORD))
            .await
            .unwrap();
        (user, session.id)
    }

    async fn journal(&self, owner: i64, title: &str) -> i64 {
        self.state
            .entry_service
            .create_journal(
                owner,
                CreateJournalInput {
                    title: Some(title.to_string()),
                    body: "Body text".to_string(),
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session={}", token));
        }
        self.router()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, token: Option<&str>, form: &str) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session={}", token));
        }
        self.router()
            .oneshot(builder.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

// ============================================================================
// Public pages
// ============================================================================

#[tokio::test]
async fn test_rodbt_index_greeting() {
    let app = TestApp::new().await;
    let response = app.get("/rodbt/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Hello, world. You're at the RO-DBT index!"
    );
}

#[tokio::test]
async fn test_home_page_renders_for_anonymous() {
    let app = TestApp::new().await;
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<title>Home | RO-DBT</title>"));
}

#[tokio::test]
async fn test_unknown_route_renders_not_found() {
    let app = TestApp::new().await;
    let response = app.get("/nowhere/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Not Found"));
}

// ============================================================================
// Access policy over HTTP
// ============================================================================

#[tokio::test]
async fn test_anonymous_redirected_to_login_with_next() {
    let app = TestApp::new().await;

    for path in [
        "/accounts/dashboard/",
        "/accounts/1/edit/",
        "/rodbt/journals/",
        "/rodbt/journals/create/",
        "/rodbt/journals/1/",
        "/rodbt/questions/",
        "/rodbt/question/create/",
        "/rodbt/questions/1/",
    ] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{}", path);
        assert_eq!(
            location(&response),
            format!("/accounts/login/?next={}", path),
            "{}",
            path
        );
    }
}

#[tokio::test]
async fn test_unaccepted_user_forbidden() {
    let app = TestApp::new().await;
    let (_, token) = app.user("pending", false).await;

    for path in [
        "/rodbt/journals/",
        "/rodbt/questions/",
        "/accounts/dashboard/",
        "/rodbt/journals/create/",
        "/rodbt/question/create/",
        "/rodbt/journals/1/",
    ] {
        let response = app.get(path, Some(&token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", path);
        assert!(body_text(response).await.contains("Forbidden"));
    }
}

#[tokio::test]
async fn test_unaccepted_user_can_edit_own_profile() {
    let app = TestApp::new().await;
    let (user, token) = app.user("pending", false).await;

    let response = app
        .get(&format!("/accounts/{}/edit/", user.id), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_eleven_journals_listed() {
    let app = TestApp::new().await;
    let (alice, token) = app.user("alice", true).await;
    let (bob, _) = app.user("bob", true).await;

    for i in 0..11 {
        app.journal(alice.id, &format!("Entry {}", i)).await;
    }
    app.journal(bob.id, "Not yours").await;

    let response = app.get("/rodbt/journals/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert_eq!(html.matches("data-journal-id=").count(), 11);
    assert!(!html.contains("Not yours"));
    assert!(html.contains("<title>My Journals | RO-DBT</title>"));
}

#[tokio::test]
async fn test_foreign_question_forbidden_author_allowed() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.user("alice", true).await;
    let (_, bob_token) = app.user("bob", true).await;

    let question = app
        .state
        .entry_service
        .create_question(
            alice.id,
            CreateQuestionInput {
                body: "What helped today?".into(),
                journal_ids: vec![],
            },
        )
        .await
        .unwrap();
    let path = format!("/rodbt/questions/{}/", question.id);

    let response = app.get(&path, Some(&bob_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get(&path, Some(&alice_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("What helped today?"));
}

#[tokio::test]
async fn test_missing_entries_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice", true).await;

    assert_eq!(
        app.get("/rodbt/journals/999/", Some(&token)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/rodbt/questions/999/", Some(&token)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_journal_detail_readable_by_other_accepted_user() {
    let app = TestApp::new().await;
    let (alice, _) = app.user("alice", true).await;
    let (_, bob_token) = app.user("bob", true).await;
    let id = app.journal(alice.id, "Alice's day").await;

    let response = app
        .get(&format!("/rodbt/journals/{}/", id), Some(&bob_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_profile_edit_of_other_user_forbidden() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice", true).await;
    let (bob, _) = app.user("bob", true).await;
    let path = format!("/accounts/{}/edit/", bob.id);

    assert_eq!(app.get(&path, Some(&token)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        app.post(&path, Some(&token), "username=hijacked&email=")
            .await
            .status(),
        StatusCode::FORBIDDEN
    );
    let bob = app.state.user_service.get_by_id(bob.id).await.unwrap().unwrap();
    assert_eq!(bob.username, "bob");
}

// ============================================================================
// Entry creation
// ============================================================================

#[tokio::test]
async fn test_create_journal_ignores_author_field() {
    let app = TestApp::new().await;
    let (alice, token) = app.user("alice", true).await;
    let (bob, _) = app.user("bob", true).await;

    let response = app
        .post(
            "/rodbt/journals/create/",
            Some(&token),
            &format!("title=Mine&body=Some+text&author={}", bob.id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let journals = app.state.entry_service.list_journals(alice.id).await.unwrap();
    assert_eq!(journals.len(), 1);
    assert_eq!(location(&response), journals[0].absolute_url());
    assert!(app
        .state
        .entry_service
        .list_journals(bob.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_create_journal_validation_rerenders_form() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice", true).await;

    let response = app
        .post("/rodbt/journals/create/", Some(&token), "title=Kept&body=")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("This field is required."));
    assert!(html.contains(r#"value="Kept""#));
}

#[tokio::test]
async fn test_create_question_ignores_author_field() {
    let app = TestApp::new().await;
    let (alice, token) = app.user("alice", true).await;
    let (bob, _) = app.user("bob", true).await;

    let response = app
        .post(
            "/rodbt/question/create/",
            Some(&token),
            &format!("body=Whose%3F&author={}", bob.id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let questions = app.state.entry_service.list_questions(alice.id).await.unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].author_id, alice.id);
    assert_eq!(location(&response), questions[0].absolute_url());
    assert!(app
        .state
        .entry_service
        .list_questions(bob.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unaccepted_user_cannot_create_entries() {
    let app = TestApp::new().await;
    let (pending, token) = app.user("pending", false).await;

    let response = app
        .post("/rodbt/journals/create/", Some(&token), "title=Nope&body=text")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post("/rodbt/question/create/", Some(&token), "body=Nope")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let entries = &app.state.entry_service;
    assert!(entries.list_journals(pending.id).await.unwrap().is_empty());
    assert!(entries.list_questions(pending.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_question_with_repeated_journals() {
    let app = TestApp::new().await;
    let (alice, token) = app.user("alice", true).await;
    let first = app.journal(alice.id, "First").await;
    let second = app.journal(alice.id, "Second").await;

    let response = app
        .post(
            "/rodbt/question/create/",
            Some(&token),
            &format!("body=Why%3F&journal={}&journal={}", first, second),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let questions = app.state.entry_service.list_questions(alice.id).await.unwrap();
    assert_eq!(questions.len(), 1);
    let question = app
        .state
        .entry_service
        .get_question(questions[0].id)
        .await
        .unwrap();
    let mut expected = vec![first, second];
    expected.sort_unstable();
    assert_eq!(question.journal_ids, expected);
}

#[tokio::test]
async fn test_create_question_rejects_foreign_journal() {
    let app = TestApp::new().await;
    let (alice, token) = app.user("alice", true).await;
    let (bob, _) = app.user("bob", true).await;
    let bobs = app.journal(bob.id, "Bob's").await;

    let response = app
        .post(
            "/rodbt/question/create/",
            Some(&token),
            &format!("body=Sneaky&journal={}", bobs),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("is not one of the available choices."));
    assert!(app
        .state
        .entry_service
        .list_questions(alice.id)
        .await
        .unwrap()
        .is_empty());
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_signup_redirects_to_login() {
    let app = TestApp::new().await;
    let response = app
        .post(
            "/accounts/signup/",
            None,
            "username=newbie&email=&password1=longenough1&password2=longenough1",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/accounts/login/");

    let user = app
        .state
        .user_service
        .get_by_username("newbie")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.registration_accepted);
}

#[tokio::test]
async fn test_signup_mismatched_passwords_rerenders() {
    let app = TestApp::new().await;
    let response = app
        .post(
            "/accounts/signup/",
            None,
            "username=newbie&password1=longenough1&password2=different22",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("errorlist"));
}

#[tokio::test]
async fn test_login_sets_cookie_and_follows_next() {
    let app = TestApp::new().await;
    app.user("pending", false).await;

    let response = app
        .post(
            "/accounts/login/",
            None,
            "username=pending&password=correct+horse+battery&next=%2Frodbt%2Fjournals%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/rodbt/journals/");
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let app = TestApp::new().await;
    app.user("alice", true).await;

    let response = app
        .post(
            "/accounts/login/",
            None,
            "username=alice&password=correct+horse+battery&next=https%3A%2F%2Fevil.example%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_login_ignores_next_with_control_characters() {
    let app = TestApp::new().await;
    app.user("alice", true).await;

    for next in ["%2F%09%2Fevil.example%2F", "%2F%0D%0A%2Fevil.example%2F"] {
        let response = app
            .post(
                "/accounts/login/",
                None,
                &format!("username=alice&password=correct+horse+battery&next={}", next),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/", "{}", next);
    }
}

#[tokio::test]
async fn test_login_failure_rerenders_form() {
    let app = TestApp::new().await;
    app.user("alice", true).await;

    let response = app
        .post("/accounts/login/", None, "username=alice&password=wrong")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Please enter a correct username and password."));
    assert!(html.contains(r#"value="alice""#));
}

#[tokio::test]
async fn test_login_page_redirects_authenticated_visitor() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice", true).await;

    let response = app.get("/accounts/login/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice", true).await;

    let response = app.post("/accounts/logout/", Some(&token), "").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let response = app.get("/rodbt/journals/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_profile_update_redirects_home() {
    let app = TestApp::new().await;
    let (user, token) = app.user("alice", false).await;

    let response = app
        .post(
            &format!("/accounts/{}/edit/", user.id),
            Some(&token),
            "username=alice2&email=alice%40example.com",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let updated = app.state.user_service.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(updated.username, "alice2");
    assert_eq!(updated.email, "alice@example.com");
}

#[tokio::test]
async fn test_dashboard_counts_entries() {
    let app = TestApp::new().await;
    let (alice, token) = app.user("alice", true).await;
    app.journal(alice.id, "One").await;
    app.journal(alice.id, "Two").await;

    let response = app.get("/accounts/dashboard/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("you have 2 journals and 0 questions"));
}
