//! Append-only CSV log of generation runs.

use std::io::Write;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, instrument};

pub const LOG_HEADER: &str = "commit_hash,dirty,post_count,word_count,llm_model,tts_model,render_seconds,longform,duration_seconds";

/// Placeholder kept in the `word_count` column.
const WORD_COUNT_UNUSED: i64 = -1;

/// One row of the generation log.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub commit_hash: String,
    pub dirty: bool,
    pub post_count: usize,
    pub llm_model: String,
    pub tts_model: String,
    pub render_seconds: f64,
    pub longform: bool,
    pub duration_seconds: Option<f64>,
}

impl GenerationRecord {
    fn to_csv_row(&self) -> String {
        let duration = self
            .duration_seconds
            .filter(|seconds| *seconds > 0.0)
            .map(|seconds| format!("{seconds:.1}"))
            .unwrap_or_default();
        [
            escape(&self.commit_hash),
            bool_field(self.dirty).to_string(),
            self.post_count.to_string(),
            WORD_COUNT_UNUSED.to_string(),
            escape(&self.llm_model),
            escape(&self.tts_model),
            format!("{:.1}", self.render_seconds),
            bool_field(self.longform).to_string(),
            duration,
        ]
        .join(",")
    }
}

fn bool_field(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Appends `record` to the CSV at `path`, writing the header first when the
/// file does not exist yet.
///
/// # Errors
///
/// Returns the IO error if the file cannot be created or written.
#[instrument(skip(record), fields(path = %path.display()))]
pub fn append_generation_log(path: &Path, record: &GenerationRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if is_new {
        writeln!(file, "{LOG_HEADER}")?;
    }
    writeln!(file, "{}", record.to_csv_row())?;
    debug!("Generation logged");
    Ok(())
}

/// Short commit hash and dirty flag of the working tree, or `("unknown", false)`
/// outside a git checkout.
pub async fn git_info() -> (String, bool) {
    let commit = match Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => return ("unknown".to_string(), false),
    };
    let dirty = match Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .await
    {
        Ok(output) if output.status.success() => !output.stdout.trim_ascii().is_empty(),
        _ => return ("unknown".to_string(), false),
    };
    (commit, dirty)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record() -> GenerationRecord {
        GenerationRecord {
            commit_hash: "abc1234".to_string(),
            dirty: true,
            post_count: 5,
            llm_model: "gemini/gemini-2.5-flash".to_string(),
            tts_model: "macos_say".to_string(),
            render_seconds: 12.345,
            longform: true,
            duration_seconds: Some(599.26),
        }
    }

    #[test]
    fn test_row_format() {
        assert_eq!(
            record().to_csv_row(),
            "abc1234,True,5,-1,gemini/gemini-2.5-flash,macos_say,12.3,True,599.3"
        );
    }

    #[test]
    fn test_row_without_duration() {
        let row = GenerationRecord {
            duration_seconds: None,
            ..record()
        }
        .to_csv_row();
        assert!(row.ends_with(",True,"));
    }

    #[test]
    fn test_escape_quotes_commas() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/generation_log.csv");

        append_generation_log(&path, &record()).unwrap();
        append_generation_log(&path, &record()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], LOG_HEADER);
        assert_eq!(lines[1], lines[2]);
    }
}
