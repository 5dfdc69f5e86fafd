/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use std::path::PathBuf;

use minasbate::app_config::{Config, LogLevel};

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert!(config.data_dir.is_none());
    assert!(config.backup_dir.is_none());
    assert!(config.seed.url.is_none());
    assert!(config.seed.path.is_none());
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.default_profile().nickname, "Juan");
    assert_eq!(config.resolved_backup_dir(), PathBuf::from("."));
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.database_file = "  ".to_string();
    assert!(config.validate().is_err());
    config.database_file = "store.db".to_string();

    config.sidecar_file = "store.db".to_string();
    assert!(config.validate().is_err());
    config.sidecar_file = "store.json".to_string();

    config.default_nickname = String::new();
    assert!(config.validate().is_err());
    config.default_nickname = "Maria".to_string();

    assert!(config.validate().is_ok());
}

/// Test loading a hand-written config file
#[test]
fn test_fromFile_withPartialConfig_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{
            "data_dir": "/var/lib/minasbate",
            "seed": { "url": "https://example.com/Masterdatalist.json" },
            "log_level": "warn"
        }"#,
    )?;

    let config = Config::from_file(&path)?;

    assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/minasbate")));
    assert_eq!(config.seed.timeout_secs, 10);
    assert_eq!(config.log_level, LogLevel::Warn);
    assert_eq!(
        config.database_path()?,
        PathBuf::from("/var/lib/minasbate/minasbate-app.db")
    );
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_fromFile_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::from_file(&path).is_err());
    Ok(())
}

#[test]
fn test_seedSource_shouldPreferUrlOverPath() -> Result<()> {
    let mut config = Config::default();
    assert!(config.seed.source()?.is_none());

    config.seed.path = Some(PathBuf::from("Masterdatalist.json"));
    let source = config.seed.source()?.expect("file source");
    assert_eq!(source.describe(), "Masterdatalist.json");

    config.seed.url = Some("https://example.com/Masterdatalist.json".to_string());
    let source = config.seed.source()?.expect("http source");
    assert_eq!(source.describe(), "https://example.com/Masterdatalist.json");
    Ok(())
}

#[test]
fn test_logLevel_fromStr_shouldBeCaseInsensitive() {
    assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    assert_eq!(
        "trace".parse::<LogLevel>().unwrap().to_level_filter(),
        log::LevelFilter::Trace
    );
    assert!("verbose".parse::<LogLevel>().is_err());
}
