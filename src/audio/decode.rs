use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// An opened audio stream plus the file extension used as a probe hint.
pub struct AudioSource {
    pub source: Box<dyn MediaSource>,
    pub extension: Option<String>,
    /// For log messages only
    pub label: String,
}

pub struct AudioData {
    /// Mono samples (channel mean)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn decode_audio(input: AudioSource) -> Result<AudioData> {
    let AudioSource {
        source,
        extension,
        label,
    } = input;

    let mut hint = Hint::new();
    if let Some(ext) = extension.as_deref() {
        hint.with_extension(ext);
    }

    let stream = MediaSourceStream::new(source, Default::default());
    let mut format = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unrecognized audio container: {}", label))?
        .format;

    let track = format
        .default_track()
        .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .or_else(|| {
            format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        })
        .with_context(|| format!("{} has no decodable track", label))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .with_context(|| format!("{} does not declare a sample rate", label))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("No decoder for {}", label))?;

    let mut mono = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;
    let mut buffer_frames = 0u64;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).with_context(|| format!("Reading {} failed", label)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Decoding {} failed", label)),
        };

        // Reused across packets; grown when a packet exceeds its capacity
        let frames = decoded.capacity() as u64;
        if frames > buffer_frames {
            buffer = Some(SampleBuffer::new(frames, *decoded.spec()));
            buffer_frames = frames;
        }
        if let Some(buf) = buffer.as_mut() {
            buf.copy_interleaved_ref(decoded);
            push_mono(&mut mono, buf.samples(), channels);
        }
    }

    if skipped_packets > 0 {
        log::warn!("{}: skipped {} corrupt packets", label, skipped_packets);
    }
    log::debug!(
        "{}: {} ch @ {} Hz -> {} mono samples",
        label,
        channels,
        sample_rate,
        mono.len()
    );

    Ok(AudioData {
        samples: mono,
        sample_rate,
    })
}

fn push_mono(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
