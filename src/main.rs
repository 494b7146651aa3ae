mod config;
mod quiz;
mod session_store;

use std::sync::Arc;

use config::Config;
use dotenv::dotenv;
use log::{debug, error, info};
use quiz::{
    session::{AdvanceTicket, Outcome, Session, SessionError},
    view, QuizBook,
};
use session_store::{replace_session, with_session, ChatLocks};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SessionStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Playing {
        session: Session,
    },
}

#[tokio::main]
async fn main() {
    // A missing .env is fine, the variables may come from the real environment
    let dotenv_loaded = dotenv().is_ok();

    pretty_env_logger::init();
    info!("Starting stage quiz bot...");
    if !dotenv_loaded {
        debug!("No .env file found, using the process environment only");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    let book = match config.load_book() {
        Ok(book) => Arc::new(book),
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    info!(
        "Quiz book ready: {} stages, {} questions each, advance delay {:?}",
        book.stages.len(),
        book.questions_per_stage(),
        config.advance_delay
    );

    let bot = Bot::from_env();

    // Sessions are per chat and in memory only, a restart starts everyone over
    let storage: SessionStorage = InMemStorage::<State>::new().erase();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::Playing { session }].endpoint(play)),
    )
    .dependencies(dptree::deps![storage, book, config, ChatLocks::default()])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "Hi! Three stages, three questions each. Send your answers one message at a time, or target a question with \"2: your answer\". Press Submit when you're ready.";
const SUBMIT_BUTTON: &str = "Submit";
const CLEAR_BUTTON: &str = "Clear";
const RESTART_BUTTON: &str = "Restart";

fn quiz_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(SUBMIT_BUTTON),
        KeyboardButton::new(CLEAR_BUTTON),
        KeyboardButton::new(RESTART_BUTTON),
    ]])
}

async fn start(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    book: Arc<QuizBook>,
    locks: ChatLocks,
) -> HandlerResult {
    let session = Session::new(&book);
    replace_session(&dialogue, &locks, session.clone()).await?;
    info!("New quiz session for chat {}", msg.chat.id.0);

    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    bot.send_message(msg.chat.id, view::render_session(&book, &session))
        .reply_markup(quiz_keyboard())
        .await?;
    Ok(())
}

async fn play(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    book: Arc<QuizBook>,
    config: Config,
    locks: ChatLocks,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please answer with text")
            .await?;
        return Ok(());
    };

    match text.trim() {
        SUBMIT_BUTTON => submit(bot, dialogue, msg.chat.id, book, config, locks).await,
        CLEAR_BUTTON => {
            let Some((session, ())) = with_session(&dialogue, &locks, Session::clear_drafts).await?
            else {
                return start(bot, dialogue, msg, book, locks).await;
            };
            bot.send_message(msg.chat.id, view::render_session(&book, &session))
                .reply_markup(quiz_keyboard())
                .await?;
            Ok(())
        }
        RESTART_BUTTON | "/start" => start(bot, dialogue, msg, book, locks).await,
        answer => record_draft(bot, dialogue, msg.chat.id, answer, book, locks).await,
    }
}

enum DraftUpdate {
    Saved,
    AllFilled,
    Rejected(SessionError),
}

async fn record_draft(
    bot: Bot,
    dialogue: QuizDialogue,
    chat_id: ChatId,
    text: &str,
    book: Arc<QuizBook>,
    locks: ChatLocks,
) -> HandlerResult {
    let updated = with_session(&dialogue, &locks, |session| {
        let target = parse_targeted_draft(text)
            .or_else(|| session.next_empty_draft().map(|index| (index, text)));
        match target {
            Some((index, answer)) => match session.update_draft_answer(index, answer) {
                Ok(()) => DraftUpdate::Saved,
                Err(err) => DraftUpdate::Rejected(err),
            },
            None => DraftUpdate::AllFilled,
        }
    })
    .await?;
    let Some((session, update)) = updated else {
        return Ok(());
    };

    match update {
        DraftUpdate::Saved => {
            bot.send_message(chat_id, view::render_session(&book, &session))
                .reply_markup(quiz_keyboard())
                .await?;
        }
        DraftUpdate::AllFilled => {
            bot.send_message(
                chat_id,
                "All answers are filled in. Press Submit, Clear, or change one with \"2: your answer\"",
            )
            .await?;
        }
        DraftUpdate::Rejected(err) => {
            bot.send_message(chat_id, format!("Hmm, {}", err)).await?;
        }
    }
    Ok(())
}

async fn submit(
    bot: Bot,
    dialogue: QuizDialogue,
    chat_id: ChatId,
    book: Arc<QuizBook>,
    config: Config,
    locks: ChatLocks,
) -> HandlerResult {
    let submitted = with_session(&dialogue, &locks, |session| {
        session.submit_answers(&book, &mut rand::thread_rng())
    })
    .await?;
    let Some((session, submission)) = submitted else {
        return Ok(());
    };

    match &submission.outcome {
        Outcome::Correct => info!(
            "Chat {} solved stage {}",
            chat_id.0,
            session.current_stage_index + 1
        ),
        Outcome::Incorrect { .. } => debug!(
            "Chat {} missed stage {}",
            chat_id.0,
            session.current_stage_index + 1
        ),
        Outcome::StillAdvancing => {
            debug!("Chat {} submitted blank answers while advancing", chat_id.0);
            bot.send_message(chat_id, "Hang on, the next stage is on its way!")
                .await?;
            return Ok(());
        }
    }

    bot.send_message(chat_id, view::render_session(&book, &session))
        .reply_markup(quiz_keyboard())
        .await?;

    if let Some(ticket) = submission.ticket {
        schedule_advance(bot, dialogue, book, locks, ticket, config.advance_delay);
    }
    Ok(())
}

/// Fires once after `delay`. Only the ticket of the latest submission can
/// still move the session forward by then.
fn schedule_advance(
    bot: Bot,
    dialogue: QuizDialogue,
    book: Arc<QuizBook>,
    locks: ChatLocks,
    ticket: AdvanceTicket,
    delay: std::time::Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let chat_id = dialogue.chat_id();
        if let Err(err) = apply_advance(bot, dialogue, book, locks, ticket).await {
            error!("Failed to advance chat {}: {}", chat_id.0, err);
        }
    });
}

async fn apply_advance(
    bot: Bot,
    dialogue: QuizDialogue,
    book: Arc<QuizBook>,
    locks: ChatLocks,
    ticket: AdvanceTicket,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let advanced = with_session(&dialogue, &locks, |session| {
        session.apply_advance(&book, ticket)
    })
    .await?;

    let Some((session, transition)) = advanced else {
        debug!("Chat {} left the quiz before its advance fired", chat_id.0);
        return Ok(());
    };
    let Some(transition) = transition else {
        debug!(
            "Dropping stale advance {:?} for chat {}, session is {:?}",
            ticket,
            chat_id.0,
            session.phase(&book)
        );
        return Ok(());
    };
    info!("Chat {} moved on: {:?}", chat_id.0, transition);

    bot.send_message(chat_id, view::render_transition(&book, &session, transition))
        .reply_markup(quiz_keyboard())
        .await?;
    Ok(())
}

/// Parses `"N: answer"` (1-based) into a draft slot and its text.
fn parse_targeted_draft(text: &str) -> Option<(usize, &str)> {
    let (number, answer) = text.split_once(':')?;
    let number: usize = number.trim().parse().ok()?;
    if number == 0 {
        return None;
    }
    Some((number - 1, answer.trim()))
}
