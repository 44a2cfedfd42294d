//! Local stand-ins for the upstream providers
#![allow(dead_code)]

pub mod realtime_mock;

use std::io::Cursor;

/// PCM16 WAV bytes with a ramp payload, written by `hound`.
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..samples {
            writer.write_sample((i % 2000) as i16 - 1000).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
