use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use teloxide::types::ChatId;

use crate::quiz::session::Session;
use crate::{QuizDialogue, State};

type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// One async lock per chat. Chat handlers and delayed advances both take it
/// around their read-modify-write of the stored session.
#[derive(Clone, Default)]
pub struct ChatLocks {
    locks: Arc<Mutex<HashMap<ChatId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ChatLocks {
    pub fn for_chat(&self, chat_id: ChatId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(chat_id).or_default().clone()
    }
}

/// Reads the stored session under the chat lock, applies `f` and writes the
/// result back. Returns `None` when the chat has no session.
pub async fn with_session<T, F>(
    dialogue: &QuizDialogue,
    locks: &ChatLocks,
    f: F,
) -> Result<Option<(Session, T)>, StorageError>
where
    F: FnOnce(&mut Session) -> T + Send,
    T: Send,
{
    let lock = locks.for_chat(dialogue.chat_id());
    let _guard = lock.lock().await;

    let Some(State::Playing { mut session }) = dialogue.get().await? else {
        return Ok(None);
    };
    let out = f(&mut session);
    dialogue
        .update(State::Playing {
            session: session.clone(),
        })
        .await?;
    Ok(Some((session, out)))
}

/// Stores `session` as the chat's session, replacing whatever was there.
pub async fn replace_session(
    dialogue: &QuizDialogue,
    locks: &ChatLocks,
    session: Session,
) -> Result<(), StorageError> {
    let lock = locks.for_chat(dialogue.chat_id());
    let _guard = lock.lock().await;
    dialogue.update(State::Playing { session }).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::session::{Outcome, Phase, Transition};
    use crate::quiz::QuizBook;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use teloxide::dispatching::dialogue::{Dialogue, InMemStorage, Storage};

    fn dialogue(chat: i64) -> QuizDialogue {
        Dialogue::new(InMemStorage::<State>::new().erase(), ChatId(chat))
    }

    #[tokio::test]
    async fn chat_without_session_is_left_alone() {
        let dialogue = dialogue(1);
        let locks = ChatLocks::default();

        let result = with_session(&dialogue, &locks, |s| s.clear_drafts()).await.unwrap();

        assert!(result.is_none());
        assert!(dialogue.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn draft_written_after_the_advance_keeps_the_new_stage() {
        let book = QuizBook::builtin();
        let dialogue = dialogue(2);
        let locks = ChatLocks::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut session = Session::new(&book);
        for (i, answer) in ["blue", "bark", "paris"].iter().enumerate() {
            session.update_draft_answer(i, answer).unwrap();
        }
        let submission = session.submit_answers(&book, &mut rng);
        assert_eq!(submission.outcome, Outcome::Correct);
        let ticket = submission.ticket.unwrap();
        replace_session(&dialogue, &locks, session).await.unwrap();

        // The timer wins the race, then a draft arrives from the chat.
        let (_, transition) = with_session(&dialogue, &locks, |s| s.apply_advance(&book, ticket))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transition, Some(Transition::Advanced(1)));
        with_session(&dialogue, &locks, |s| s.update_draft_answer(0, "4"))
            .await
            .unwrap()
            .unwrap()
            .1
            .unwrap();

        let Some(State::Playing { session }) = dialogue.get().await.unwrap() else {
            panic!("session vanished");
        };
        assert_eq!(session.phase(&book), Phase::Answering(1));
        assert_eq!(session.draft_answers[0], "4");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_not_lost() {
        let book = QuizBook::builtin();
        let dialogue = dialogue(3);
        let locks = ChatLocks::default();
        replace_session(&dialogue, &locks, Session::new(&book)).await.unwrap();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let dialogue = dialogue.clone();
                let locks = locks.clone();
                tokio::spawn(async move {
                    with_session(&dialogue, &locks, |s| s.draft_answers[0].push('x'))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let Some(State::Playing { session }) = dialogue.get().await.unwrap() else {
            panic!("session vanished");
        };
        assert_eq!(session.draft_answers[0].len(), 64);
    }

    #[test]
    fn each_chat_gets_its_own_lock() {
        let locks = ChatLocks::default();
        assert!(Arc::ptr_eq(&locks.for_chat(ChatId(1)), &locks.for_chat(ChatId(1))));
        assert!(!Arc::ptr_eq(&locks.for_chat(ChatId(1)), &locks.for_chat(ChatId(2))));
    }
}
