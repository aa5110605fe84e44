//! Question echo endpoint
//!
//! No inference happens here: the question is validated and echoed back
//! inside a fixed template.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form, Json,
};
use serde::{Deserialize, Serialize};

const EMPTY_QUESTION_MESSAGE: &str = "Question must not be empty!";

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Answer {
    pub parts: Vec<AnswerPart>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub success: bool,
    pub answer: Answer,
}

#[derive(Debug, Serialize)]
pub struct AskErrorResponse {
    pub success: bool,
    pub message: String,
}

type AskFailure = (StatusCode, Json<AskErrorResponse>);

fn rejected(message: impl Into<String>) -> AskFailure {
    (
        StatusCode::BAD_REQUEST,
        Json(AskErrorResponse {
            success: false,
            message: message.into(),
        }),
    )
}

/// Templated reply for a question
pub fn answer_text(question: &str) -> String {
    format!("This is the answer to the question: \"{}\"", question)
}

/// `AskRequest` from either a JSON or a URL-encoded form body
pub struct AskPayload(pub AskRequest);

#[async_trait]
impl<S> FromRequest<S> for AskPayload
where
    S: Send + Sync,
{
    type Rejection = AskFailure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(body) = Form::<AskRequest>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.body_text()))?;
            Ok(AskPayload(body))
        } else {
            let Json(body) = Json::<AskRequest>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.body_text()))?;
            Ok(AskPayload(body))
        }
    }
}

/// POST /ask - Echo a question into the answer template
pub async fn ask(AskPayload(request): AskPayload) -> Result<Json<AskResponse>, AskFailure> {
    let question = request.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(rejected(EMPTY_QUESTION_MESSAGE));
    }

    Ok(Json(AskResponse {
        success: true,
        answer: Answer {
            parts: vec![AnswerPart {
                text: answer_text(&question),
            }],
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_text_embeds_question() {
        assert_eq!(
            answer_text("why?"),
            "This is the answer to the question: \"why?\""
        );
    }

    #[tokio::test]
    async fn test_blank_questions_are_rejected() {
        for question in [None, Some(String::new()), Some("   \t\n".to_string())] {
            let (status, Json(body)) = ask(AskPayload(AskRequest { question }))
                .await
                .unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(!body.success);
            assert_eq!(body.message, EMPTY_QUESTION_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_question_is_echoed_verbatim() {
        let Json(body) = ask(AskPayload(AskRequest {
            question: Some(" why? ".to_string()),
        }))
        .await
        .unwrap();

        assert!(body.success);
        assert_eq!(body.answer.parts.len(), 1);
        assert_eq!(body.answer.parts[0].text, answer_text(" why? "));
    }
}
