use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: SRT parsing, block sequence and output writing

// @const: SRT timestamp regex, tolerant of '.' as millisecond separator
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})")
        .unwrap()
});

// @struct: Single subtitle block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleBlock {
    // @field: Sequence number, unique within a file
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Source text, lines joined with '\n'
    pub content: String,

    // @field: Translated text, written once by reassembly
    pub translated_content: Option<String>,
}

impl SubtitleBlock {
    pub fn new(index: usize, start_ms: u64, end_ms: u64, content: impl Into<String>) -> Self {
        SubtitleBlock {
            index,
            start_ms,
            end_ms,
            content: content.into(),
            translated_content: None,
        }
    }

    /// Store a translation given as ordered lines.
    ///
    /// Returns `false` and leaves the block untouched if a translation was
    /// already written.
    pub fn set_translation(&mut self, lines: &[String]) -> bool {
        if self.translated_content.is_some() {
            return false;
        }
        self.translated_content = Some(lines.join("\n"));
        true
    }

    /// Whether the block has no text to translate
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn is_translated(&self) -> bool {
        self.translated_content.is_some()
    }

    /// Text written to the output file, falling back to the source text
    pub fn output_text(&self) -> &str {
        self.translated_content.as_deref().unwrap_or(&self.content)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms)
        )?;
        writeln!(f, "{}", self.output_text())?;
        writeln!(f)
    }
}

/// Subtitle file contents with its origin
#[derive(Debug, Clone)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// Blocks in source order
    pub blocks: Vec<SubtitleBlock>,
}

impl SubtitleCollection {
    pub fn new(source_file: PathBuf, blocks: Vec<SubtitleBlock>) -> Self {
        SubtitleCollection { source_file, blocks }
    }

    /// Check that a path is an acceptable input file and return its size.
    ///
    /// Accepts only `.srt` files that are non-empty and no larger than `max_bytes`.
    pub fn validate_input_file<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<u64, SubtitleError> {
        let path = path.as_ref();

        let is_srt = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("srt"))
            .unwrap_or(false);
        if !is_srt {
            return Err(SubtitleError::InvalidFileType(path.to_path_buf()));
        }

        let size = fs::metadata(path)?.len();
        if size > max_bytes {
            return Err(SubtitleError::FileTooLarge { size, limit: max_bytes });
        }
        if size == 0 {
            return Err(SubtitleError::EmptyFile(path.to_path_buf()));
        }

        Ok(size)
    }

    /// Read and parse an SRT file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SubtitleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let blocks = Self::parse_srt_string(&content)?;
        debug!("Parsed {} blocks from {}", blocks.len(), path.display());
        Ok(SubtitleCollection::new(path.to_path_buf(), blocks))
    }

    /// Parse SRT content into blocks, keeping source order.
    ///
    /// Whitespace-only content yields no blocks. Content that is not blank
    /// but holds no valid block is a parse error. Blocks without text keep
    /// their timing and are carried through untranslated.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleBlock>, SubtitleError> {
        let content = content.trim_start_matches('\u{feff}');
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut blocks: Vec<SubtitleBlock> = Vec::new();
        // Whitespace-only lines separate blocks like empty ones
        let normalized: String = content
            .lines()
            .map(|line| if line.trim().is_empty() { "" } else { line })
            .collect::<Vec<_>>()
            .join("\n");

        for (group_no, group) in normalized.split("\n\n").enumerate() {
            let mut lines = group.lines().map(str::trim).skip_while(|l| l.is_empty());

            let Some(first) = lines.next() else {
                continue;
            };

            let (index, timing_line) = match first.parse::<usize>() {
                Ok(num) => (Some(num), lines.next()),
                Err(_) => (None, Some(first)),
            };

            let Some(caps) = timing_line.and_then(|l| TIMESTAMP_REGEX.captures(l)) else {
                warn!("Skipping malformed subtitle block #{}: {:?}", group_no + 1, first);
                continue;
            };

            let start_ms = parse_timestamp_to_ms(&caps, 1);
            let end_ms = parse_timestamp_to_ms(&caps, 5);

            let text: Vec<&str> = lines.filter(|l| !l.is_empty()).collect();
            let index = index.unwrap_or(blocks.len() + 1);
            if end_ms < start_ms {
                warn!("Subtitle {} ends before it starts", index);
            }
            if text.is_empty() {
                debug!("Subtitle {} has no text", index);
            }
            blocks.push(SubtitleBlock::new(index, start_ms, end_ms, text.join("\n")));
        }

        if blocks.is_empty() {
            return Err(SubtitleError::Parse(
                "No valid subtitle entries were found in the SRT content".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(blocks.len());
        if !blocks.iter().all(|b| seen.insert(b.index)) {
            warn!("Duplicate subtitle indices found, renumbering {} blocks", blocks.len());
            for (i, block) in blocks.iter_mut().enumerate() {
                block.index = i + 1;
            }
        }

        Ok(blocks)
    }

    /// Render the blocks as SRT text, using translations where present
    pub fn to_srt_string(&self) -> String {
        self.blocks.iter().map(|b| b.to_string()).collect()
    }

    /// Write subtitles to an SRT file
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        FileManager::write_to_file(path, &self.to_srt_string())
    }

    pub fn translated_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_translated()).count()
    }
}

fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let part = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    (part(0) * 3600 + part(1) * 60 + part(2)) * 1000 + part(3)
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Blocks: {}", self.blocks.len())?;
        Ok(())
    }
}
