pub mod decode;
pub mod features;
pub mod fft;
pub mod resample;
pub mod spectrogram;

pub use decode::{decode_audio, AudioData, AudioSource};
pub use features::extract_spectrogram;
pub use spectrogram::Spectrogram;
