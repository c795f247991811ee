//! Journal and question pages under `/rodbt/`

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tera::Context as TeraContext;

use crate::api::middleware::{found, AppState, CurrentUser, PageError};
use crate::models::{CreateJournalInput, CreateQuestionInput, Journal, Question, User};
use crate::policy::Action;
use crate::services::EntryServiceError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rodbt/", get(index))
        .route("/rodbt/journals/", get(journal_list))
        .route("/rodbt/journals/create/", get(journal_form).post(create_journal))
        .route("/rodbt/journals/{id}/", get(journal_detail))
        .route("/rodbt/questions/", get(question_list))
        .route("/rodbt/question/create/", get(question_form).post(create_question))
        .route("/rodbt/questions/{id}/", get(question_detail))
}

/// GET /rodbt/
async fn index() -> &'static str {
    "Hello, world. You're at the RO-DBT index!"
}

// ============================================================================
// Template rows
// ============================================================================

/// A journal as listed in templates
#[derive(Debug, Serialize)]
pub struct JournalSummary {
    pub id: i64,
    pub display: String,
    pub date: String,
}

impl From<&Journal> for JournalSummary {
    fn from(journal: &Journal) -> Self {
        Self {
            id: journal.id,
            display: journal.to_string(),
            date: journal.date.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct QuestionSummary {
    id: i64,
    display: String,
    journal_count: usize,
}

impl From<&Question> for QuestionSummary {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            display: question.to_string(),
            journal_count: question.journal_ids.len(),
        }
    }
}

/// Field errors keyed by form field name
type FieldErrors = HashMap<&'static str, String>;

// ============================================================================
// Journals
// ============================================================================

/// GET /rodbt/journals/
async fn journal_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, PageError> {
    let user = current.require(Action::ListJournals)?;

    let journals = state.entry_service.list_journals(user.id).await?;
    let rows: Vec<JournalSummary> = journals.iter().map(JournalSummary::from).collect();

    let mut context = TeraContext::new();
    context.insert("journals", &rows);
    Ok(state
        .page("rodbt/journal_list.html", "My Journals", Some(user), context)?
        .into_response())
}

/// GET /rodbt/journals/{id}/
///
/// Any accepted user may read any journal by id.
async fn journal_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    let user = current.require(Action::ViewJournal)?;
    let journal = state.entry_service.get_journal(id).await?;

    let mut context = TeraContext::new();
    context.insert("journal", &journal);
    Ok(state
        .page("rodbt/journal_detail.html", "Journal Detail", Some(user), context)?
        .into_response())
}

/// Submitted journal form. An `author` field, if sent, is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct JournalForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

fn render_journal_form(
    state: &AppState,
    user: &User,
    form: &JournalForm,
    errors: &FieldErrors,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert(
        "form",
        &serde_json::json!({ "title": form.title, "body": form.body }),
    );
    context.insert("errors", errors);
    Ok(state
        .page("rodbt/journal_form.html", "New Journal", Some(user), context)?
        .into_response())
}

/// GET /rodbt/journals/create/
async fn journal_form(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, PageError> {
    let user = current.require(Action::CreateJournal)?;
    render_journal_form(&state, user, &JournalForm::default(), &FieldErrors::new())
}

/// POST /rodbt/journals/create/
async fn create_journal(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<JournalForm>,
) -> Result<Response, PageError> {
    let user = current.require(Action::CreateJournal)?;

    let input = CreateJournalInput {
        title: Some(form.title.clone()),
        body: form.body.clone(),
    };

    match state.entry_service.create_journal(user.id, input).await {
        Ok(journal) => Ok(found(&journal.absolute_url())),
        Err(EntryServiceError::ValidationError { field, message }) => {
            let errors = FieldErrors::from([(field, message)]);
            render_journal_form(&state, user, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Questions
// ============================================================================

/// GET /rodbt/questions/
async fn question_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, PageError> {
    let user = current.require(Action::ListQuestions)?;

    let questions = state.entry_service.list_questions(user.id).await?;
    let rows: Vec<QuestionSummary> = questions.iter().map(QuestionSummary::from).collect();

    let mut context = TeraContext::new();
    context.insert("questions", &rows);
    Ok(state
        .page("rodbt/question_list.html", "My Questions", Some(user), context)?
        .into_response())
}

/// GET /rodbt/questions/{id}/
///
/// Only the author may see a question.
async fn question_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    current.require(Action::ViewQuestion)?;
    let question = state.entry_service.get_question(id).await?;
    let user = current.require_owner(Action::ViewQuestion, question.author_id)?;

    let journals = state.entry_service.list_journals_for_question(id).await?;
    let rows: Vec<JournalSummary> = journals.iter().map(JournalSummary::from).collect();

    let mut context = TeraContext::new();
    context.insert("question", &question);
    context.insert("journals", &rows);
    Ok(state
        .page("rodbt/question_detail.html", "Question Detail", Some(user), context)?
        .into_response())
}

/// Submitted question form.
///
/// `journal` may repeat; values stay raw so bad ids can be reported inline.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionForm {
    #[serde(default)]
    body: String,
    #[serde(default)]
    journal: Vec<String>,
}

async fn render_question_form(
    state: &AppState,
    user: &User,
    body: &str,
    selected: &[i64],
    errors: &FieldErrors,
) -> Result<Response, PageError> {
    let choices: Vec<JournalSummary> = state
        .entry_service
        .list_journals(user.id)
        .await?
        .iter()
        .map(JournalSummary::from)
        .collect();

    let mut context = TeraContext::new();
    context.insert("form", &serde_json::json!({ "body": body, "journal": selected }));
    context.insert("errors", errors);
    context.insert("journal_choices", &choices);
    Ok(state
        .page("rodbt/question_form.html", "New Question", Some(user), context)?
        .into_response())
}

/// GET /rodbt/question/create/
async fn question_form(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, PageError> {
    let user = current.require(Action::CreateQuestion)?;
    render_question_form(&state, user, "", &[], &FieldErrors::new()).await
}

/// POST /rodbt/question/create/
async fn create_question(
    State(state): State<AppState>,
    current: CurrentUser,
    axum_extra::extract::Form(form): axum_extra::extract::Form<QuestionForm>,
) -> Result<Response, PageError> {
    let user = current.require(Action::CreateQuestion)?;

    let mut journal_ids = Vec::with_capacity(form.journal.len());
    for raw in form.journal.iter().filter(|raw| !raw.trim().is_empty()) {
        match raw.trim().parse::<i64>() {
            Ok(id) => journal_ids.push(id),
            Err(_) => {
                let errors = FieldErrors::from([(
                    "journal",
                    format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        raw
                    ),
                )]);
                return render_question_form(&state, user, &form.body, &journal_ids, &errors)
                    .await;
            }
        }
    }

    let input = CreateQuestionInput {
        body: form.body.clone(),
        journal_ids: journal_ids.clone(),
    };

    match state.entry_service.create_question(user.id, input).await {
        Ok(question) => Ok(found(&question.absolute_url())),
        Err(EntryServiceError::ValidationError { field, message }) => {
            let errors = FieldErrors::from([(field, message)]);
            render_question_form(&state, user, &form.body, &journal_ids, &errors).await
        }
        Err(e) => Err(e.into()),
    }
}
