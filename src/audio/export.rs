use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{AudioClip, AudioError};

/// Container format for rendered episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            other => Err(format!("unsupported audio format '{other}' (expected mp3 or wav)")),
        }
    }
}

/// Writes `clip` to `path` in `format`, creating parent directories.
///
/// MP3 output is encoded by `ffmpeg` from a temporary WAV file.
///
/// # Errors
///
/// Returns [`AudioError::FfmpegMissing`] when MP3 is requested and `ffmpeg`
/// is not on `PATH`, [`AudioError::Ffmpeg`] when encoding fails, and IO or
/// WAV errors when files cannot be written.
#[instrument(skip(clip), fields(seconds = clip.duration_secs()))]
pub async fn export(clip: &AudioClip, path: &Path, format: AudioFormat) -> Result<PathBuf, AudioError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AudioError::io(parent, e))?;
    }

    match format {
        AudioFormat::Wav => {
            clip.write_wav(path)?;
        }
        AudioFormat::Mp3 => {
            let ffmpeg = which::which("ffmpeg").map_err(|_| AudioError::FfmpegMissing)?;
            let staging = tempfile::Builder::new()
                .prefix("threadcast-")
                .suffix(".wav")
                .tempfile()
                .map_err(|e| AudioError::io(std::env::temp_dir(), e))?;
            clip.write_wav(staging.path())?;
            debug!(ffmpeg = %ffmpeg.display(), "Encoding MP3");

            let output = Command::new(&ffmpeg)
                .args(["-y", "-loglevel", "error", "-i"])
                .arg(staging.path())
                .args(["-codec:a", "libmp3lame", "-b:a", "128k"])
                .arg(path)
                .output()
                .await
                .map_err(|e| AudioError::io(&ffmpeg, e))?;

            if !output.status.success() {
                return Err(AudioError::Ffmpeg {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }
    }

    info!(path = %path.display(), "Audio exported");
    Ok(path.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_parse() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("wav".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("ogg".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Wav.extension(), "wav");
    }

    #[tokio::test]
    async fn test_export_wav_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/episode.wav");
        let clip = AudioClip::new(24_000, vec![0; 2400]);

        let written = export(&clip, &path, AudioFormat::Wav).await.unwrap();

        assert_eq!(written, path);
        let decoded = AudioClip::read_wav(&path).unwrap();
        assert_eq!(decoded.sample_rate(), 24_000);
        assert_eq!(decoded.len(), 2400);
    }
}
