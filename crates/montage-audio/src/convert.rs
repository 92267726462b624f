//! Sample format conversion between interleaved byte storage and `f32`.

use montage_core::SampleFormat;

/// Decode interleaved little-endian samples into `out`, replacing its
/// contents.
pub fn to_f32(data: &[u8], format: SampleFormat, out: &mut Vec<f32>) {
    out.clear();
    match format {
        SampleFormat::S16 => out.extend(
            data.chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0),
        ),
        SampleFormat::F32 | SampleFormat::Native => out.extend(
            data.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        ),
    }
}

/// Encode `samples` into `out` in the given format. `out` must hold
/// `samples.len() * format.bytes_per_channel()` bytes.
pub fn from_f32(samples: &[f32], format: SampleFormat, out: &mut [u8]) {
    match format {
        SampleFormat::S16 => {
            for (s, dst) in samples.iter().zip(out.chunks_exact_mut(2)) {
                let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                dst.copy_from_slice(&v.to_le_bytes());
            }
        }
        SampleFormat::F32 | SampleFormat::Native => {
            let n = samples.len() * 4;
            out[..n].copy_from_slice(bytemuck::cast_slice(samples));
        }
    }
}

/// Reverse the order of `bytes_per_sample`-wide samples in place, keeping
/// the bytes of each sample intact.
pub fn reverse_samples(data: &mut [u8], bytes_per_sample: usize) {
    if bytes_per_sample == 0 {
        return;
    }
    let n = data.len() / bytes_per_sample;
    for i in 0..n / 2 {
        let a = i * bytes_per_sample;
        let b = (n - 1 - i) * bytes_per_sample;
        let (head, tail) = data.split_at_mut(b);
        head[a..a + bytes_per_sample].swap_with_slice(&mut tail[..bytes_per_sample]);
    }
}
