/*!
 * Tests for subtitle processing functionality
 */

use std::fmt::Write;
use std::path::PathBuf;

use anyhow::Result;
use subtide::errors::SubtitleError;
use subtide::subtitle_processor::{SubtitleBlock, SubtitleCollection};
use crate::common;

/// Test timestamp formatting
#[test]
fn test_formatTimestamp_withValidValue_shouldFormatSrtTime() {
    assert_eq!(SubtitleBlock::format_timestamp(5_025_678), "01:23:45,678");
    assert_eq!(SubtitleBlock::format_timestamp(0), "00:00:00,000");
}

/// Test subtitle block display formatting
#[test]
fn test_subtitleBlock_display_withTranslation_shouldUseTranslatedText() {
    let mut block = SubtitleBlock::new(1, 5000, 10000, "Test subtitle");
    assert!(block.set_translation(&["Sous-titre".to_string(), "de test".to_string()]));

    let mut output = String::new();
    write!(output, "{}", block).unwrap();

    assert_eq!(output, "1\n00:00:05,000 --> 00:00:10,000\nSous-titre\nde test\n\n");
}

#[test]
fn test_setTranslation_calledTwice_shouldKeepFirstTranslation() {
    let mut block = SubtitleBlock::new(1, 0, 1000, "Hello");
    assert!(block.set_translation(&["Hola".to_string()]));
    assert!(!block.set_translation(&["Bonjour".to_string()]));
    assert_eq!(block.output_text(), "Hola");
}

#[test]
fn test_outputText_withoutTranslation_shouldFallBackToSource() {
    let block = SubtitleBlock::new(3, 0, 1000, "Hello");
    assert!(!block.is_translated());
    assert_eq!(block.output_text(), "Hello");
}

/// Test parsing of well-formed SRT content
#[test]
fn test_parseSrtString_withValidContent_shouldParseBlocks() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:04,000\nHello there.\n\n2\n00:00:05,500 --> 00:00:09,000\nTwo\nlines\n";

    let blocks = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].index, 1);
    assert_eq!(blocks[0].start_ms, 1000);
    assert_eq!(blocks[0].end_ms, 4000);
    assert_eq!(blocks[1].start_ms, 5500);
    assert_eq!(blocks[1].content, "Two\nlines");
    Ok(())
}

#[test]
fn test_parseSrtString_withCrlfAndBom_shouldParseBlocks() -> Result<()> {
    let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nFirst\r\n\r\n2\r\n00:00:03.000 --> 00:00:04.000\r\nSecond\r\n";

    let blocks = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].content, "First");
    assert_eq!(blocks[1].start_ms, 3000);
    Ok(())
}

#[test]
fn test_parseSrtString_withMalformedBlock_shouldSkipIt() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nKept\n\n2\nnot a timestamp\nDropped\n\n3\n00:00:05,000 --> 00:00:06,000\nAlso kept\n";

    let blocks = SubtitleCollection::parse_srt_string(content)?;

    let indices: Vec<usize> = blocks.iter().map(|b| b.index).collect();
    assert_eq!(indices, vec![1, 3]);
    Ok(())
}

#[test]
fn test_parseSrtString_withDuplicateIndices_shouldRenumber() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nA\n\n1\n00:00:03,000 --> 00:00:04,000\nB\n";

    let blocks = SubtitleCollection::parse_srt_string(content)?;

    let indices: Vec<usize> = blocks.iter().map(|b| b.index).collect();
    assert_eq!(indices, vec![1, 2]);
    Ok(())
}

#[test]
fn test_parseSrtString_withTextlessBlock_shouldKeepItsTiming() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\n\n2\n00:00:03,000 --> 00:00:04,000\nSpoken\n";

    let blocks = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].is_blank());
    assert_eq!(blocks[0].end_ms, 2000);
    assert_eq!(blocks[1].content, "Spoken");

    // Written back out, the timed entry survives another parse
    let collection = SubtitleCollection::new(PathBuf::from("in.srt"), blocks);
    let reparsed = SubtitleCollection::parse_srt_string(&collection.to_srt_string())?;
    assert_eq!(reparsed, collection.blocks);
    Ok(())
}

#[test]
fn test_parseSrtString_withWhitespaceSeparator_shouldSplitBlocks() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n \t\n2\n00:00:03,000 --> 00:00:04,000\nSecond\n";

    let blocks = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].content, "First");
    assert_eq!(blocks[1].index, 2);
    assert_eq!(blocks[1].content, "Second");
    Ok(())
}

#[test]
fn test_parseSrtString_withBlankContent_shouldGiveNoBlocks() -> Result<()> {
    assert!(SubtitleCollection::parse_srt_string("  \n\n \n")?.is_empty());
    Ok(())
}

#[test]
fn test_parseSrtString_withGarbage_shouldFail() {
    let result = SubtitleCollection::parse_srt_string("this is not\na subtitle file");
    assert!(matches!(result, Err(SubtitleError::Parse(_))));
}

#[test]
fn test_toSrtString_shouldKeepOrderAndTiming() -> Result<()> {
    let content = common::generate_srt(3);
    let blocks = SubtitleCollection::parse_srt_string(&content)?;
    let collection = SubtitleCollection::new(PathBuf::from("in.srt"), blocks);

    assert_eq!(collection.to_srt_string(), content);
    assert_eq!(collection.translated_count(), 0);
    Ok(())
}

#[test]
fn test_validateInputFile_withWrongExtension_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "movie.txt", "1\n")?;

    let result = SubtitleCollection::validate_input_file(&path, 1024);
    assert!(matches!(result, Err(SubtitleError::InvalidFileType(_))));
    Ok(())
}

#[test]
fn test_validateInputFile_withSizeChecks_shouldEnforceLimits() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let empty = common::create_test_file(temp_dir.path(), "empty.srt", "")?;
    let large = common::create_test_file(temp_dir.path(), "large.srt", &"x".repeat(2048))?;
    let ok = common::create_test_subtitle(temp_dir.path(), "ok.SRT")?;

    assert!(matches!(
        SubtitleCollection::validate_input_file(&empty, 1024),
        Err(SubtitleError::EmptyFile(_))
    ));
    assert!(matches!(
        SubtitleCollection::validate_input_file(&large, 1024),
        Err(SubtitleError::FileTooLarge { size: 2048, limit: 1024 })
    ));
    assert!(SubtitleCollection::validate_input_file(&ok, 1024)? > 0);
    Ok(())
}

#[test]
fn test_fromFile_andWriteToSrt_shouldPreserveBlocks() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let mut collection = SubtitleCollection::from_file(&input)?;
    assert_eq!(collection.blocks.len(), 3);
    assert_eq!(collection.blocks[1].content, "It contains multiple entries\nacross two lines.");

    collection.blocks[0].set_translation(&["Translated".to_string()]);
    let output = temp_dir.path().join("out").join("movie.es.srt");
    collection.write_to_srt(&output)?;

    let written = SubtitleCollection::from_file(&output)?;
    assert_eq!(written.blocks.len(), 3);
    assert_eq!(written.blocks[0].content, "Translated");
    assert_eq!(written.blocks[2].start_ms, 10_000);
    Ok(())
}
