use anyhow::{Context, Result, anyhow};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::subtitle_processor::SubtitleCollection;
use crate::translation::coordinator::ProgressCallback;
use crate::translation::{CancelSignal, RequestId, RunOptions, RunStatus, TranslationService};

// @module: Application controller for subtitle processing

/// Summary of one processed file
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    /// Written file, if any
    pub output: Option<PathBuf>,
    pub request_id: RequestId,
    pub status: RunStatus,
    pub total_blocks: usize,
    pub translated_blocks: usize,
    pub total_chunks: usize,
    pub failed_attempts: u64,
    pub chunks_with_failures: u64,
    pub duration_ms: u128,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Summary of a folder run
#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderReport {
    pub reports: Vec<RunReport>,
    pub skipped: usize,
    pub errors: usize,
}

impl FolderReport {
    pub fn is_success(&self) -> bool {
        self.errors == 0 && self.reports.iter().all(RunReport::is_success)
    }
}

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Shared pipeline, cloned for every file
    service: TranslationService,
    // @field: Abort signal for all runs
    cancel: CancelSignal,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let service = TranslationService::new(&config.translation)?;
        Ok(Self::with_service(config, service))
    }

    // @method: Create a controller around an existing service
    pub fn with_service(config: Config, service: TranslationService) -> Self {
        Self {
            config,
            service,
            cancel: CancelSignal::never(),
        }
    }

    /// Abort in-flight runs when the signal fires
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    /// Short language code used in output file names
    fn target_code(&self) -> String {
        language_utils::normalize_to_part1_or_part2t(&self.config.target_language)
            .unwrap_or_else(|_| self.config.target_language.clone())
    }

    /// Run the main workflow on a single subtitle file.
    ///
    /// Returns `None` when the file was skipped because its translation exists.
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<Option<RunReport>> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(input_file, output_dir, &multi_progress, force_overwrite)
            .await
    }

    async fn run_with_progress(
        &self,
        input_file: PathBuf,
        output_dir: PathBuf,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<Option<RunReport>> {
        let start_time = Instant::now();

        let size = SubtitleCollection::validate_input_file(&input_file, self.config.output.max_file_size_bytes)
            .with_context(|| format!("Rejected input file {}", input_file.display()))?;

        let output_path = FileManager::generate_output_path(&input_file, &output_dir, &self.target_code());
        if FileManager::file_exists(&output_path) && !force_overwrite {
            warn!(
                "Skipping {}, translation already exists (use -f to force overwrite)",
                input_file.display()
            );
            return Ok(None);
        }

        let subtitles = SubtitleCollection::from_file(&input_file)
            .with_context(|| format!("Failed to parse subtitle file {}", input_file.display()))?;

        let file_name = input_file
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let tracker = self.service.stats();
        let request_id = tracker.create(&file_name, size, self.config.speed_mode);

        let progress_bar = multi_progress.add(ProgressBar::new(0));
        progress_bar.set_style(Self::progress_style("chunks"));
        progress_bar.set_message(file_name.clone());

        let pb = progress_bar.clone();
        let progress: ProgressCallback = Arc::new(move |completed: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(completed as u64);
        });

        info!(
            "{}: {} blocks, {} with {}",
            file_name,
            subtitles.blocks.len(),
            self.config.translation.provider.display_name(),
            self.config
                .translation
                .active_provider_or_default()
                .model_for(self.config.speed_mode)
        );

        let run_options = RunOptions {
            request_id: Some(request_id),
            cancel: self.cancel.clone(),
            progress: Some(progress),
        };
        let translation = self.service.translate_with_options(
            subtitles.blocks,
            &self.config.target_language,
            self.config.speed_mode,
            run_options,
        );

        let result = match self.config.translation.common.run_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), translation).await {
                Ok(result) => result,
                Err(_) => {
                    progress_bar.finish_and_clear();
                    if let Err(e) = tracker.finalize(request_id, RunStatus::Failed) {
                        warn!("Could not finalize {}: {}", request_id, e);
                    }
                    return Err(anyhow!("Translation of {} timed out after {}s", file_name, secs));
                }
            },
            None => translation.await,
        };
        progress_bar.finish_and_clear();

        let outcome = result.with_context(|| format!("Translation of {} failed", file_name))?;

        let write_output = outcome.is_complete() || self.config.output.emit_partial_output;
        let output = if write_output {
            let translated = SubtitleCollection::new(input_file.clone(), outcome.blocks.clone());
            translated.write_to_srt(&output_path)?;
            if outcome.is_complete() {
                info!("Success: {}", output_path.display());
            } else {
                warn!(
                    "Partial translation written to {} ({}/{} blocks translated)",
                    output_path.display(),
                    outcome.translated_blocks(),
                    outcome.blocks.len()
                );
            }
            Some(output_path)
        } else {
            error!(
                "No output written for {}: {} of {} chunks failed",
                file_name, outcome.chunks_with_failures, outcome.total_chunks
            );
            None
        };

        let duration = start_time.elapsed();
        info!("{} finished in {}", file_name, Self::format_duration(duration));

        Ok(Some(RunReport {
            input: input_file,
            output,
            request_id,
            status: outcome.status,
            total_blocks: outcome.blocks.len(),
            translated_blocks: outcome.translated_blocks(),
            total_chunks: outcome.total_chunks,
            failed_attempts: outcome.failed_attempts,
            chunks_with_failures: outcome.chunks_with_failures,
            duration_ms: duration.as_millis(),
        }))
    }

    /// Run the workflow in folder mode.
    ///
    /// Every `.srt` file in the directory is translated concurrently; all
    /// files share the service's concurrency cap. Existing translations are
    /// skipped unless `force_overwrite` is set.
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<FolderReport> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let target_code = self.target_code();
        let files: Vec<PathBuf> = FileManager::find_files(&input_dir, "srt")?
            .into_iter()
            .filter(|f| !FileManager::is_translation_output(f, &target_code))
            .collect();

        if files.is_empty() {
            return Err(anyhow!("No subtitle files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
        folder_pb.set_style(Self::progress_style("files"));
        folder_pb.set_message("Processing files");

        let runs = files.iter().map(|file| {
            let output_dir = file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input_dir.clone());
            let folder_pb = folder_pb.clone();
            let multi_progress = &multi_progress;
            async move {
                let result = self
                    .run_with_progress(file.clone(), output_dir, multi_progress, force_overwrite)
                    .await;
                folder_pb.inc(1);
                (file, result)
            }
        });

        let mut report = FolderReport::default();
        for (file, result) in join_all(runs).await {
            match result {
                Ok(Some(run)) => report.reports.push(run),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file.display(), e);
                    report.errors += 1;
                }
            }
        }

        folder_pb.finish_with_message("Folder processing complete");

        let failed = report.reports.iter().filter(|r| !r.is_success()).count();
        info!(
            "Folder processing completed in {}: {} processed, {} with failed chunks, {} skipped, {} errors",
            Self::format_duration(start_time.elapsed()),
            report.reports.len(),
            failed,
            report.skipped,
            report.errors
        );

        Ok(report)
    }

    fn progress_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}}",
                unit
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
