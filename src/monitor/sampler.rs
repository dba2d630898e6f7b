// Error-rate sampling over a log file

use regex::Regex;
use std::io::ErrorKind;
use std::path::Path;

use crate::errors::Result;

/// Line counts from one pass over the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSample {
    pub total_lines: usize,
    pub error_lines: usize,
}

impl ErrorSample {
    pub fn error_rate(&self) -> f64 {
        if self.total_lines == 0 {
            0.0
        } else {
            self.error_lines as f64 / self.total_lines as f64
        }
    }
}

/// Count error lines in `text`
pub fn count_errors(text: &str, pattern: &Regex) -> ErrorSample {
    let mut sample = ErrorSample {
        total_lines: 0,
        error_lines: 0,
    };
    for line in text.lines() {
        sample.total_lines += 1;
        if pattern.is_match(line) {
            sample.error_lines += 1;
        }
    }
    sample
}

/// Sample the whole file (cumulative, not windowed).
///
/// A missing or empty file is "no signal yet" and yields `None`.
pub async fn sample_log(path: &Path, pattern: &Regex) -> Result<Option<ErrorSample>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let sample = count_errors(&String::from_utf8_lossy(&bytes), pattern);
    if sample.total_lines == 0 {
        return Ok(None);
    }
    Ok(Some(sample))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Regex {
        Regex::new(r"\bERROR\b").unwrap()
    }

    #[test]
    fn test_count_errors() {
        let text = "2026-01-01T00:00:00Z  INFO predict ok\n\
                    2026-01-01T00:00:01Z ERROR housing_predictor::server: Request failed\n\
                    2026-01-01T00:00:02Z  INFO predict ok\n\
                    ERRORS are not errors\n";
        let sample = count_errors(text, &pattern());
        assert_eq!(sample.total_lines, 4);
        assert_eq!(sample.error_lines, 1);
        assert!((sample.error_rate() - 0.25).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_missing_and_empty_file_are_no_signal() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs.txt");
        assert_eq!(sample_log(&path, &pattern()).await.unwrap(), None);

        std::fs::write(&path, "").unwrap();
        assert_eq!(sample_log(&path, &pattern()).await.unwrap(), None);
    }
}
