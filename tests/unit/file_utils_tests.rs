/*!
 * Tests for file and folder utilities
 */

use std::path::{Path, PathBuf};

use anyhow::Result;
use subtide::file_utils::FileManager;
use crate::common;

#[test]
fn test_generateOutputPath_shouldAppendLanguageCode() {
    let output = FileManager::generate_output_path("/videos/movie.srt", "/out", "fr");
    assert_eq!(output, PathBuf::from("/out/movie.fr.srt"));
}

#[test]
fn test_isTranslationOutput_shouldMatchLanguageSuffix() {
    assert!(FileManager::is_translation_output(Path::new("movie.es.srt"), "es"));
    assert!(FileManager::is_translation_output(Path::new("movie.ES.srt"), "es"));
    assert!(!FileManager::is_translation_output(Path::new("movie.srt"), "es"));
    assert!(!FileManager::is_translation_output(Path::new("movie.fr.srt"), "es"));
}

#[test]
fn test_findFiles_shouldReturnSortedMatchesRecursively() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("season1");
    FileManager::ensure_dir(&nested)?;

    common::create_test_file(temp_dir.path(), "b.srt", "x")?;
    common::create_test_file(temp_dir.path(), "a.SRT", "x")?;
    common::create_test_file(temp_dir.path(), "notes.txt", "x")?;
    common::create_test_file(&nested, "c.srt", "x")?;

    let files = FileManager::find_files(temp_dir.path(), ".srt")?;
    let names: Vec<String> = files
        .iter()
        .map(|f| f.strip_prefix(temp_dir.path()).unwrap().to_string_lossy().to_string())
        .collect();

    assert_eq!(names.len(), 3);
    assert_eq!(names[0], "a.SRT");
    assert_eq!(names[1], "b.srt");
    assert!(names[2].ends_with("c.srt"));
    Ok(())
}

#[test]
fn test_writeToFile_shouldCreateParentDirectories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("deep").join("dir").join("file.srt");

    FileManager::write_to_file(&path, "content")?;

    assert!(FileManager::file_exists(&path));
    assert!(FileManager::dir_exists(path.parent().unwrap()));
    assert_eq!(std::fs::read_to_string(&path)?, "content");
    Ok(())
}

#[test]
fn test_fileExists_withDirectory_shouldReturnFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    assert!(!FileManager::file_exists(temp_dir.path()));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.srt")));
    Ok(())
}
