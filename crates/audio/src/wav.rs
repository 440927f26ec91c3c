//! WAV framing for audio windows handed to the STT collaborator, which
//! expects a self-describing container rather than raw PCM.

use crate::error::{AudioError, AudioResult};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

pub fn pcm_to_wav_bytes(pcm: &[i16], sample_rate: u32, channels: u16) -> AudioResult<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| AudioError::Configuration(e.to_string()))?;
        for &sample in pcm {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::Configuration(e.to_string()))?;
        }
        writer.finalize().map_err(|e| AudioError::Configuration(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
