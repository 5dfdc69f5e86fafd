/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use std::path::Path;

use minasbate::database::models::{Category, WordInput};
use minasbate::errors::StoreError;
use minasbate::seed::Bootstrapper;
use minasbate::{Controller, DatabaseConnection, Repository, Sidecar, Synchronizer};

use crate::common::{self, FakeSeedSource};

fn open_synchronizer(dir: &Path, source: &FakeSeedSource) -> Result<Synchronizer> {
    let repo = Repository::new(DatabaseConnection::new(dir.join("minasbate-app.db"))?)?;
    let sidecar = Sidecar::open(dir.join("minasbate-app-storage.json"))?;
    Ok(Synchronizer::new(
        repo,
        sidecar,
        Bootstrapper::new(Some(Box::new(source.clone()))),
    ))
}

/// Test the controller against a seed file on disk
#[tokio::test]
async fn test_controller_withSeedFile_shouldSeedOnceAcrossReopen() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let seed_path = common::create_test_file(
        temp_dir.path(),
        "Masterdatalist.json",
        &common::seed_document().to_string(),
    )?;
    let mut config = common::config_in(temp_dir.path());
    config.seed.path = Some(seed_path.clone());

    let controller = Controller::with_config(config.clone()).await?;
    let report = controller.seed_report().clone();
    assert!(report.performed);
    assert_eq!(report.words_added, 3);
    assert!(report.fetch_failure.is_none());
    assert_eq!(controller.synchronizer().state().words.len(), 3);
    controller.shutdown()?;

    // A changed seed file must not be imported again
    std::fs::write(&seed_path, r#"{"words": []}"#)?;
    let controller = Controller::with_config(config).await?;
    assert!(!controller.seed_report().performed);
    assert_eq!(controller.stats()?.word_count, 3);
    assert_eq!(controller.synchronizer().state().words.len(), 3);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_controller_withMissingSeedFile_shouldStartEmptyAndMarkInitialized() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::config_in(temp_dir.path());
    config.seed.path = Some(temp_dir.path().join("absent.json"));

    let controller = Controller::with_config(config.clone()).await?;
    assert!(controller.seed_report().performed);
    assert!(controller.seed_report().fetch_failure.is_some());
    assert!(controller.synchronizer().state().words.is_empty());
    assert!(controller.synchronizer().sidecar().is_initialized());
    controller.shutdown()?;

    let controller = Controller::with_config(config).await?;
    assert!(!controller.seed_report().performed);
    controller.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn test_controller_withInvalidConfig_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::config_in(temp_dir.path());
    config.seed.timeout_secs = 0;

    assert!(Controller::with_config(config).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_loadAppData_withFakeSource_shouldFetchOnlyOnFirstRun() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = FakeSeedSource::serving(common::seed_document());

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;
    sync.close()?;

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    let report = sync.load_app_data().await?;

    assert_eq!(source.call_count(), 1);
    assert!(!report.performed);
    assert_eq!(sync.state().words.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_loadAppData_withFailingSource_shouldNotRetryAfterFirstRun() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let source = FakeSeedSource::failing();

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    let report = sync.load_app_data().await?;
    assert!(report.performed);
    assert!(report.fetch_failure.is_some());
    sync.close()?;

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;

    assert_eq!(source.call_count(), 1);
    assert!(sync.state().words.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_reopen_shouldIssueIdsAboveStoredRecords() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = FakeSeedSource::failing();
    let far_future = 9_000_000_000_000;

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;
    sync.repository()
        .bulk_add_words(&[common::sample_word(far_future, "Ugma", "Tomorrow", Category::Phrases)])
        .await?;
    sync.close()?;

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;
    let word = sync
        .add_word(WordInput::new("Karon", "Now", Category::Phrases))
        .await?;

    assert!(word.id > far_future);
    Ok(())
}

#[tokio::test]
async fn test_progress_shouldSurviveReopen() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = FakeSeedSource::failing();

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;
    for prompt in ["Unsa ni?", "Kinsa ni?", "Asa ni?"] {
        sync.add_quiz_question(Category::Animals, common::sample_question(Category::Animals, prompt, "Iro"))
            .await?;
    }
    let question_id = sync.state().questions_in(Category::Animals)[0].id;

    assert!(!sync.answer_question(Category::Animals, question_id, "Wala")?);
    assert!(sync.answer_question(Category::Animals, question_id, "Iro")?);
    sync.close()?;

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;

    let activity = sync.state().activity(Category::Animals).unwrap();
    assert_eq!(activity.progress, 33);
    Ok(())
}

#[tokio::test]
async fn test_operations_afterClose_shouldFailWithStoreUnavailable() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = FakeSeedSource::failing();

    let mut sync = open_synchronizer(temp_dir.path(), &source)?;
    sync.load_app_data().await?;
    sync.close()?;

    let err = sync
        .add_word(WordInput::new("Maayo", "Good", Category::Greetings))
        .await
        .unwrap_err();

    assert!(matches!(
        StoreError::find(&err),
        Some(StoreError::StoreUnavailable(_))
    ));
    assert!(sync.state().words.is_empty());
    Ok(())
}
