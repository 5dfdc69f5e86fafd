/*!
 * Integration tests for backup, restore and clear workflows
 */

use anyhow::Result;
use serde_json::json;

use minasbate::database::models::{Category, UserProfile, WordInput};
use minasbate::errors::StoreError;
use minasbate::Controller;

use crate::common;

async fn populated_controller(dir: &std::path::Path) -> Result<Controller> {
    let mut controller = Controller::with_config(common::config_in(dir)).await?;
    let sync = controller.synchronizer_mut();

    let maayo = sync
        .add_word(WordInput::new("Maayo", "Good", Category::Greetings))
        .await?;
    sync.add_word(WordInput::new("Iro", "Dog", Category::Animals))
        .await?;
    sync.archive_words(&[maayo.id]).await?;
    sync.add_quiz_question(
        Category::Animals,
        common::sample_question(Category::Animals, "Unsa ni?", "Iro"),
    )
    .await?;
    sync.save_profile(UserProfile::new("Maria")).await?;
    sync.record_correct_answer(Category::Animals)?;

    Ok(controller)
}

#[tokio::test]
async fn test_backupThenRestore_shouldLeaveStoreUnchanged() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut controller = populated_controller(temp_dir.path()).await?;
    let before = controller.synchronizer().repository().snapshot().await?;
    let state_before = controller.synchronizer().state().clone();

    let path = controller.backup(None).await?;
    assert!(path.starts_with(temp_dir.path().join("backups")));
    let file_name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("minasbate-backup-"));
    assert!(file_name.ends_with(".json"));

    controller.restore_file(&path).await?;

    assert_eq!(controller.synchronizer().repository().snapshot().await?, before);
    assert_eq!(controller.synchronizer().state(), &state_before);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_restore_withEmptyData_shouldEmptyEverything() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut controller = populated_controller(temp_dir.path()).await?;
    let path = common::create_test_file(temp_dir.path(), "empty.json", r#"{"data": {}}"#)?;

    controller.restore_file(&path).await?;

    let state = controller.synchronizer().state();
    assert!(state.words.is_empty());
    assert!(state.archived_words.is_empty());
    assert!(state.quiz_questions.values().all(Vec::is_empty));
    assert_eq!(state.profile, UserProfile::new("Juan"));
    assert!(state.activities.iter().all(|a| a.progress == 0));
    assert!(controller.synchronizer().sidecar().progress().is_empty());
    assert!(controller.synchronizer().sidecar().is_initialized());

    let stats = controller.stats()?;
    assert_eq!(stats.word_count + stats.archived_word_count + stats.quiz_question_count, 0);
    assert!(!stats.has_profile);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_restore_withoutData_shouldFailAndChangeNothing() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let mut controller = populated_controller(temp_dir.path()).await?;
    let before = controller.synchronizer().repository().snapshot().await?;
    let state_before = controller.synchronizer().state().clone();
    let progress_before = controller.synchronizer().sidecar().progress();
    let path = common::create_test_file(temp_dir.path(), "bad.json", "{}")?;

    let err = controller.restore_file(&path).await.unwrap_err();

    assert!(matches!(StoreError::find(&err), Some(StoreError::CorruptBackup(_))));
    assert_eq!(controller.synchronizer().repository().snapshot().await?, before);
    assert_eq!(controller.synchronizer().state(), &state_before);
    assert_eq!(controller.synchronizer().sidecar().progress(), progress_before);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_restore_withForeignBackup_shouldReplaceContents() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut controller = populated_controller(temp_dir.path()).await?;
    let content = json!({
        "version": 1,
        "createdAt": "2024-05-01T08:30:00.000Z",
        "data": {
            "profile": { "nickname": "Pedro", "photo": null },
            "words": [
                { "id": 100, "word": "Kaon", "meaning": "Eat", "audio_path": "", "image_path": "", "category": "Actions" }
            ],
            "archivedWords": [
                { "id": 100, "word": "Kaon", "meaning": "Eat", "category": "Actions" },
                { "id": 101, "word": "Inom", "meaning": "Drink", "category": "Actions" }
            ],
            "quizQuestions": [],
            "progress": { "Actions": 50 }
        }
    });
    let path = common::create_test_file(temp_dir.path(), "foreign.json", &content.to_string())?;

    controller.restore_file(&path).await?;

    let state = controller.synchronizer().state();
    assert_eq!(state.profile.nickname, "Pedro");
    assert_eq!(state.words.iter().map(|w| w.id).collect::<Vec<_>>(), vec![100]);
    assert_eq!(state.archived_words.iter().map(|w| w.id).collect::<Vec<_>>(), vec![101]);
    assert_eq!(state.activity(Category::Actions).unwrap().progress, 50);
    assert_eq!(state.activity(Category::Animals).unwrap().progress, 0);

    // Ids issued after a restore stay above the restored ones
    let word = controller
        .synchronizer_mut()
        .add_word(WordInput::new("Dula", "Play", Category::Actions))
        .await?;
    assert!(word.id > 101);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_clearAllData_shouldEmptyStoreAndProgressButNotReseed() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let seed_path = common::create_test_file(
        temp_dir.path(),
        "Masterdatalist.json",
        &common::seed_document().to_string(),
    )?;
    let mut config = common::config_in(temp_dir.path());
    config.seed.path = Some(seed_path);

    let mut controller = Controller::with_config(config.clone()).await?;
    assert_eq!(controller.synchronizer().state().words.len(), 3);
    controller.synchronizer_mut().record_correct_answer(Category::Animals)?;

    controller.synchronizer_mut().clear_all_data().await?;

    assert!(controller.synchronizer().state().words.is_empty());
    assert!(controller.synchronizer().sidecar().progress().is_empty());
    controller.shutdown()?;

    let controller = Controller::with_config(config).await?;
    assert!(!controller.seed_report().performed);
    assert_eq!(controller.stats()?.word_count, 0);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_addWord_afterRestoringMaxId_shouldFailWithIdsExhausted() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut controller = populated_controller(temp_dir.path()).await?;
    let content = json!({
        "data": {
            "words": [
                { "id": i64::MAX, "word": "Katapusan", "meaning": "End", "category": "Phrases" }
            ]
        }
    });
    let path = common::create_test_file(temp_dir.path(), "max.json", &content.to_string())?;
    controller.restore_file(&path).await?;

    let err = controller
        .synchronizer_mut()
        .add_word(WordInput::new("Dula", "Play", Category::Actions))
        .await
        .unwrap_err();

    assert!(matches!(
        StoreError::find(&err),
        Some(StoreError::IdsExhausted { last: i64::MAX })
    ));
    let state = controller.synchronizer().state();
    assert_eq!(state.words.iter().map(|w| w.id).collect::<Vec<_>>(), vec![i64::MAX]);
    assert_eq!(controller.stats()?.word_count, 1);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_restore_withUnwritableSidecar_shouldFailButMirrorStore() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let mut controller = populated_controller(temp_dir.path()).await?;
    let progress_before = controller.synchronizer().sidecar().progress();
    let sidecar_path = controller
        .synchronizer()
        .sidecar()
        .path()
        .expect("sidecar is backed by a file")
        .to_path_buf();

    // A directory in place of the sidecar file makes every write fail
    std::fs::remove_file(&sidecar_path)?;
    std::fs::create_dir(&sidecar_path)?;
    std::fs::write(sidecar_path.join("blocker"), "x")?;

    let content = json!({
        "data": {
            "profile": { "nickname": "Pedro", "photo": null },
            "words": [
                { "id": 100, "word": "Kaon", "meaning": "Eat", "category": "Actions" }
            ],
            "progress": { "Actions": 50 }
        }
    });
    let path = common::create_test_file(temp_dir.path(), "foreign.json", &content.to_string())?;

    assert!(controller.restore_file(&path).await.is_err());

    let snapshot = controller.synchronizer().repository().snapshot().await?;
    let state = controller.synchronizer().state();
    assert_eq!(state.words, snapshot.words);
    assert_eq!(state.words.iter().map(|w| w.id).collect::<Vec<_>>(), vec![100]);
    assert!(state.archived_words.is_empty());
    assert_eq!(state.profile.nickname, "Pedro");

    // Progress stays at what the sidecar still holds
    assert_eq!(controller.synchronizer().sidecar().progress(), progress_before);
    assert_eq!(state.activity(Category::Actions).unwrap().progress, 0);
    assert_eq!(
        state.activity(Category::Animals).unwrap().progress,
        progress_before.get(&Category::Animals).copied().unwrap_or(0)
    );
    controller.shutdown()?;
    Ok(())
}
