/*!
 * Common test utilities for the capsync test suite
 */

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use capsync::app_config::Config;
use capsync::transcript::TimedWord;
use tempfile::TempDir;


pub use fake_transcoder::FakeTranscoder;

/// Route library logs to the test output when RUST_LOG is set
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Default config with its work directory inside `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.render.work_dir = Some(dir.join("work"));
    config.render.eager_cleanup = true;
    config
}

/// Timed words from `(text, start, end)` triples
pub fn words(list: &[(&str, f64, f64)]) -> Vec<TimedWord> {
    list.iter().map(|(w, s, e)| TimedWord::new(*w, *s, *e)).collect()
}

/// Evenly spaced words, `step` seconds each, starting at `offset`
pub fn spaced_words(texts: &[&str], offset: f64, step: f64) -> Vec<(String, f64, f64)> {
    texts
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let start = offset + i as f64 * step;
            (w.to_string(), start, start + step)
        })
        .collect()
}
