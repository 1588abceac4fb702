//! uint8 embedding quantization and cosine helpers.

use ndarray::Array1;

/// An embedding packed as one byte per component: `value ≈ byte * scale + offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
    pub bytes: Vec<u8>,
    pub scale: f32,
    pub offset: f32,
}

impl Quantized {
    /// Map `[min, max]` linearly onto `[0, 255]`.
    pub fn encode(embedding: &Array1<f32>) -> Self {
        let min = embedding.iter().copied().fold(f32::INFINITY, f32::min);
        let max = embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        if !(max - min).is_finite() || max - min < 1e-9 {
            // Constant (or empty) vector.
            let offset = if min.is_finite() { min } else { 0.0 };
            return Self {
                bytes: vec![0u8; embedding.len()],
                scale: 0.0,
                offset,
            };
        }

        let scale = (max - min) / 255.0;
        let bytes = embedding
            .iter()
            .map(|&v| ((v - min) / scale).round().clamp(0.0, 255.0) as u8)
            .collect();
        Self {
            bytes,
            scale,
            offset: min,
        }
    }

    pub fn decode(&self) -> Array1<f32> {
        self.bytes
            .iter()
            .map(|&b| b as f32 * self.scale + self.offset)
            .collect()
    }
}

/// Scale `v` to unit length in place. Returns `false` for a (near) zero vector.
pub fn l2_normalize(v: &mut Array1<f32>) -> bool {
    let norm = v.dot(v).sqrt();
    if norm < 1e-9 || !norm.is_finite() {
        return false;
    }
    *v /= norm;
    true
}

/// Cosine similarity in [-1, 1] mapped to a distance in [0, 1].
pub fn cosine_distance(cosine: f32) -> f64 {
    ((1.0 - cosine as f64) / 2.0).clamp(0.0, 1.0)
}
