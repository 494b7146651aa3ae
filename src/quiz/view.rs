use super::session::{Session, Transition};
use super::{QuizBook, CONGRATULATIONS_MESSAGE};

const EMPTY_DRAFT: &str = "(type your answer here)";

pub fn render_session(book: &QuizBook, session: &Session) -> String {
    let Some(stage) = session.current_stage(book) else {
        return CONGRATULATIONS_MESSAGE.to_string();
    };

    let mut text = format!("{}\n", stage.title);
    for (i, question) in stage.questions.iter().enumerate() {
        let draft = session
            .draft_answers
            .get(i)
            .filter(|d| !d.is_empty())
            .map(String::as_str)
            .unwrap_or(EMPTY_DRAFT);
        text.push_str(&format!("\n{}. {}\n   ➜ {}\n", i + 1, question.prompt, draft));
    }

    if !session.feedback_message.is_empty() {
        text.push_str(&format!("\n{}", session.feedback_message));
    }
    text
}

/// Text sent once a delayed advance has been applied.
pub fn render_transition(book: &QuizBook, session: &Session, transition: Transition) -> String {
    match transition {
        Transition::Advanced(_) => render_session(book, session),
        Transition::Wrapped => format!(
            "{}\n\n{}",
            CONGRATULATIONS_MESSAGE,
            render_session(book, session)
        ),
    }
}
