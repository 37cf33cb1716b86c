//! Loopback audio conversion
//!
//! Converts raw loopback chunks (usually 32-bit float at the device mix
//! rate) to interleaved signed PCM at the recording rate, channel count and
//! bit depth, and queues them as [`AudioSample`]s.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::capture::resample::LinearResampler;
use crate::capture::{AudioChunk, AudioDataHandler, CaptureClock, SampleQueue};
use crate::config::CaptureConfig;
use crate::error::{Result, WincapError};
use crate::types::{AudioSample, BitDepth, SampleEncoding, WaveFormat};

/// Recording PCM format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: BitDepth,
}

impl PcmFormat {
    /// Resolve the recording format from config. Fails on bit depths other
    /// than 16 or 24.
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        Ok(Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bit_depth: BitDepth::try_from(config.bits_per_sample)?,
        })
    }

    pub fn block_align(&self) -> usize {
        self.channels as usize * self.bit_depth.bytes()
    }
}

/// Converts raw chunks, keeping resampler state between calls
pub struct PcmConverter {
    output: PcmFormat,
    resampler: Option<(WaveFormat, LinearResampler)>,
}

impl PcmConverter {
    pub fn new(output: PcmFormat) -> Self {
        Self {
            output,
            resampler: None,
        }
    }

    pub fn output_format(&self) -> PcmFormat {
        self.output
    }

    /// Convert one chunk. An empty chunk yields an empty buffer.
    pub fn convert(&mut self, data: &[u8], input: WaveFormat) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if input.channels == 0 || input.sample_rate == 0 {
            return Err(WincapError::capture(format!(
                "Invalid loopback format: {:?}",
                input
            )));
        }

        let block = input.block_align();
        let usable = data.len() - data.len() % block;
        if usable != data.len() {
            trace!("Dropping {} trailing bytes of a partial frame", data.len() - usable);
        }

        let samples = decode(&data[..usable], input.encoding);
        let mapped = remap_channels(&samples, input.channels as usize, self.output.channels as usize);
        let resampled = self.resampler_for(input).process(&mapped);
        Ok(quantize(&resampled, self.output.bit_depth))
    }

    fn resampler_for(&mut self, input: WaveFormat) -> &mut LinearResampler {
        if matches!(&self.resampler, Some((format, _)) if *format != input) {
            self.resampler = None;
        }
        let output = self.output;
        let (_, resampler) = self.resampler.get_or_insert_with(|| {
            debug!(
                "Loopback format {:?}, resampling {} Hz -> {} Hz",
                input, input.sample_rate, output.sample_rate
            );
            (
                input,
                LinearResampler::new(input.sample_rate, output.sample_rate, output.channels as usize),
            )
        });
        resampler
    }
}

fn decode(bytes: &[u8], encoding: SampleEncoding) -> Vec<f32> {
    match encoding {
        SampleEncoding::Float32 => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        SampleEncoding::Pcm16 => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        SampleEncoding::Pcm24 => bytes
            .chunks_exact(3)
            .map(|b| {
                // Sign-extend by placing the 24 bits in the top of an i32
                let v = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                v as f32 / 8_388_608.0
            })
            .collect(),
        SampleEncoding::Pcm32 => bytes
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0)
            .collect(),
    }
}

/// Map interleaved frames from `from` channels to `to` channels.
/// Mono is duplicated; extra channels are dropped; missing ones repeat the
/// last input channel.
fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            out.push(frame[ch.min(from - 1)]);
        }
    }
    out
}

fn quantize(samples: &[f32], depth: BitDepth) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * depth.bytes());
    match depth {
        BitDepth::Sixteen => {
            for s in samples {
                let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        BitDepth::TwentyFour => {
            for s in samples {
                let v = (s.clamp(-1.0, 1.0) * 8_388_607.0).round() as i32;
                out.extend_from_slice(&v.to_le_bytes()[..3]);
            }
        }
    }
    out
}

/// Producer side of the audio queue
pub struct AudioSource {
    converter: Mutex<PcmConverter>,
    clock: Arc<CaptureClock>,
    queue: Arc<SampleQueue<AudioSample>>,
    chunks: AtomicU64,
    failures: AtomicU64,
}

impl AudioSource {
    /// Fails with [`WincapError::UnsupportedBitDepth`] unless the config asks
    /// for 16 or 24 bits.
    pub fn new(
        config: &CaptureConfig,
        clock: Arc<CaptureClock>,
        queue: Arc<SampleQueue<AudioSample>>,
    ) -> Result<Self> {
        let format = PcmFormat::from_config(config)?;
        Ok(Self {
            converter: Mutex::new(PcmConverter::new(format)),
            clock,
            queue,
            chunks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn output_format(&self) -> PcmFormat {
        self.converter.lock().output_format()
    }

    /// Chunks converted and queued
    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    /// Chunks dropped because conversion failed
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl AudioSource {
    /// Convert and queue a chunk that arrived at `arrived` (capture-relative)
    fn accept(&self, chunk: &AudioChunk<'_>, arrived: Duration) {
        let converted = self.converter.lock().convert(chunk.data, chunk.format);
        match converted {
            Ok(pcm) => {
                trace!("Queued {} PCM bytes at {:?}", pcm.len(), arrived);
                self.queue.enqueue(AudioSample::new(pcm, arrived));
                self.chunks.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping loopback chunk: {}", e);
            }
        }
    }
}

impl AudioDataHandler for AudioSource {
    fn on_data_available(&self, chunk: &AudioChunk<'_>) {
        // Stamp on arrival; conversion time must not shift the sample
        let arrived = self.clock.elapsed();
        self.accept(chunk, arrived);
    }
}
