/*!
 * Tests for repository operations that need more than one collection
 */

use anyhow::Result;
use minasbate::database::models::{Category, QuizQuestion, StoreSnapshot, UserProfile};
use minasbate::Repository;

use crate::common::{sample_question, sample_word};

fn install_failing_trigger(repo: &Repository, table: &str, id: i64) -> Result<()> {
    let sql = format!(
        "CREATE TRIGGER fail_insert BEFORE INSERT ON {} WHEN NEW.id = {} \
         BEGIN SELECT RAISE(ABORT, 'quota exceeded'); END;",
        table, id
    );
    repo.connection().execute(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
    })
}

#[tokio::test]
async fn test_bulkAddWords_withFailingRecord_shouldLeaveStoreUnchanged() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    repo.bulk_add_words(&[sample_word(1, "Maayo", "Good", Category::Greetings)])
        .await?;
    install_failing_trigger(&repo, "words", 3)?;

    let batch = vec![
        sample_word(2, "Iro", "Dog", Category::Animals),
        sample_word(3, "Iring", "Cat", Category::Animals),
        sample_word(4, "Kaon", "Eat", Category::Actions),
    ];
    let result = repo.bulk_add_words(&batch).await;

    assert!(result.is_err());
    let ids: Vec<i64> = repo.get_all_words().await?.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![1]);
    Ok(())
}

#[tokio::test]
async fn test_bulkAddQuizQuestions_withFailingRecord_shouldLeaveStoreUnchanged() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    let first = repo
        .add_quiz_question(sample_question(Category::Animals, "Unsa ni?", "Iro"))
        .await?;

    let base = first.id + 1_000;
    install_failing_trigger(&repo, "quiz_questions", base + 1)?;

    let batch: Vec<_> = (0..3)
        .map(|i| {
            QuizQuestion::from_input(
                base + i,
                sample_question(Category::Values, "Unsa ang maayo?", "Tinud-anay"),
            )
        })
        .collect();

    assert!(repo.bulk_add_quiz_questions(&batch).await.is_err());
    assert_eq!(repo.get_all_quiz_questions().await?, vec![first]);
    Ok(())
}

#[tokio::test]
async fn test_saveProfile_twice_shouldKeepSingleRecord() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    repo.save_profile(&UserProfile::new("Maria")).await?;
    repo.save_profile(&UserProfile {
        nickname: "Maria".to_string(),
        photo: Some("data:image/png;base64,AAAA".to_string()),
    })
    .await?;

    let profile = repo.get_profile().await?.unwrap();
    assert_eq!(profile.photo.as_deref(), Some("data:image/png;base64,AAAA"));
    assert!(repo.stats()?.has_profile);
    Ok(())
}

#[tokio::test]
async fn test_restoreSnapshot_withFailingRecord_shouldKeepPreviousContents() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    repo.bulk_add_words(&[sample_word(1, "Maayo", "Good", Category::Greetings)])
        .await?;
    repo.save_profile(&UserProfile::new("Maria")).await?;
    let before = repo.snapshot().await?;
    install_failing_trigger(&repo, "archived_words", 8)?;

    let replacement = StoreSnapshot {
        profile: None,
        words: vec![sample_word(7, "Iro", "Dog", Category::Animals)],
        archived_words: vec![sample_word(8, "Iring", "Cat", Category::Animals)],
        quiz_questions: Vec::new(),
    };

    assert!(repo.restore_snapshot(replacement).await.is_err());
    assert_eq!(repo.snapshot().await?, before);
    Ok(())
}
