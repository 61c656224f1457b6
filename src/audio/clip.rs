use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::AudioError;

/// 16-bit mono PCM audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl AudioClip {
    #[must_use]
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            samples,
        }
    }

    #[must_use]
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(sample_rate, Vec::new())
    }

    /// Digital silence lasting `duration`.
    #[must_use]
    pub fn silence(sample_rate: u32, duration: Duration) -> Self {
        let count = u128::from(sample_rate) * duration.as_micros() / 1_000_000;
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        Self::new(sample_rate, vec![0; count])
    }

    /// Decodes raw little-endian signed 16-bit mono PCM.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::InvalidPcm`] for an odd byte count.
    pub fn from_pcm_s16le(bytes: &[u8], sample_rate: u32) -> Result<Self, AudioError> {
        if bytes.len() % 2 != 0 {
            return Err(AudioError::InvalidPcm(format!(
                "{} bytes is not a whole number of 16-bit samples",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(sample_rate, samples))
    }

    /// Decodes a WAV file held in memory, downmixing to mono.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::Wav`] when the data is not a readable WAV stream.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, AudioError> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        Self::from_reader(reader)
    }

    /// Reads a WAV file from disk, downmixing to mono.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::Wav`] when the file cannot be opened or decoded.
    pub fn read_wav(path: &Path) -> Result<Self, AudioError> {
        let reader = WavReader::open(path)?;
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: WavReader<R>) -> Result<Self, AudioError> {
        let spec = reader.spec();
        let interleaved: Vec<i16> = match spec.sample_format {
            SampleFormat::Int if spec.bits_per_sample <= 16 => {
                reader.samples::<i16>().collect::<Result<_, _>>()?
            }
            SampleFormat::Int => {
                let shift = u32::from(spec.bits_per_sample - 16);
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| narrow(value >> shift)))
                    .collect::<Result<_, _>>()?
            }
            SampleFormat::Float => reader
                .samples::<f32>()
                .map(|sample| sample.map(float_to_i16))
                .collect::<Result<_, _>>()?,
        };

        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                    narrow(sum / i32::try_from(frame.len()).unwrap_or(1))
                })
                .collect()
        };

        Ok(Self::new(spec.sample_rate, samples))
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Appends `other`, which must share this clip's sample rate.
    pub fn append(&mut self, other: &AudioClip) {
        debug_assert_eq!(self.sample_rate, other.sample_rate);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Linear-interpolation resample to `target_rate`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn resample(&self, target_rate: u32) -> AudioClip {
        let target_rate = target_rate.max(1);
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return AudioClip::new(target_rate, self.samples.clone());
        }

        let ratio = f64::from(self.sample_rate) / f64::from(target_rate);
        let out_len = (self.samples.len() as f64 / ratio).round() as usize;
        let last = self.samples.len() - 1;
        let samples = (0..out_len)
            .map(|index| {
                let position = index as f64 * ratio;
                let left = (position.floor() as usize).min(last);
                let right = (left + 1).min(last);
                let fraction = position - position.floor();
                let value = f64::from(self.samples[left]) * (1.0 - fraction)
                    + f64::from(self.samples[right]) * fraction;
                value.round() as i16
            })
            .collect();
        AudioClip::new(target_rate, samples)
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    /// Encodes the clip as a WAV file in memory.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::Wav`] if encoding fails.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.spec())?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Writes the clip as a WAV file.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::Wav`] if the file cannot be created or written.
    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        let mut writer = WavWriter::create(path, self.spec())?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

fn narrow(value: i32) -> i16 {
    i16::try_from(value.clamp(i32::from(i16::MIN), i32::from(i16::MAX))).unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}
