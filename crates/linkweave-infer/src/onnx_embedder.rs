//! ONNX sentence embedder (all-MiniLM-L6-v2). Requires the `onnx` feature.
//!
//! Expects `model.onnx` and `tokenizer.json` in the model directory and
//! `ORT_DYLIB_PATH` pointing at libonnxruntime.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::info;

    use crate::embedder::{require_text, EmbedderBackend, EmbeddingResult};
    use linkweave_core::{Error, Result};

    const MAX_SEQ_LEN: usize = 256;
    const MODEL_DIM: usize = 384;

    fn upstream(context: &str, e: impl std::fmt::Display) -> Error {
        Error::UpstreamUnavailable(format!("{}: {}", context, e))
    }

    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");
            for path in [&model_path, &tokenizer_path] {
                if !path.exists() {
                    return Err(Error::NotFound(format!("{}", path.display())));
                }
            }

            ort::init().commit();
            let session = Session::builder()
                .map_err(|e| upstream("creating session builder", e))?
                .with_intra_threads(2)
                .map_err(|e| upstream("setting threads", e))?
                .commit_from_file(&model_path)
                .map_err(|e| upstream("loading ONNX model", e))?;
            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| upstream("loading tokenizer", e))?;

            info!("ONNX embedder loaded: model={}", model_path.display());
            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                dimension: MODEL_DIM,
            })
        }

        fn infer(&self, text: &str) -> Result<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| upstream("tokenization", e))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let ids: Vec<i64> = encoding.get_ids()[..seq_len].iter().map(|&v| v as i64).collect();
            let mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
                .iter()
                .map(|&v| v as i64)
                .collect();
            let type_ids = vec![0i64; seq_len];

            let shape = [1usize, seq_len];
            let ids_tensor = Tensor::from_array((shape, ids)).map_err(|e| upstream("input ids", e))?;
            let mask_tensor =
                Tensor::from_array((shape, mask.clone())).map_err(|e| upstream("attention mask", e))?;
            let type_tensor =
                Tensor::from_array((shape, type_ids)).map_err(|e| upstream("token type ids", e))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| upstream("ONNX inference", e))?;
            let (out_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| upstream("reading model output", e))?;
            let dims: Vec<i64> = out_shape.iter().copied().collect();

            match dims.as_slice() {
                // Token embeddings [1, seq, dim]: mean-pool over attended tokens.
                [1, _, dim] => {
                    let dim = *dim as usize;
                    let attended = mask.iter().filter(|&&m| m > 0).count();
                    if attended == 0 {
                        return Err(Error::InvalidArgument("text produced no tokens".into()));
                    }
                    let mut pooled = Array1::<f32>::zeros(dim);
                    for (i, &m) in mask.iter().enumerate() {
                        if m == 0 {
                            continue;
                        }
                        let row = &data[i * dim..(i + 1) * dim];
                        pooled.iter_mut().zip(row).for_each(|(p, v)| *p += v);
                    }
                    Ok(pooled / attended as f32)
                }
                // Already pooled [1, dim].
                [1, dim] => Ok(Array1::from_vec(data[..*dim as usize].to_vec())),
                other => Err(Error::UpstreamUnavailable(format!(
                    "unexpected model output shape {:?}",
                    other
                ))),
            }
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<EmbeddingResult> {
            require_text(text)?;
            let mut embedding = self.infer(text)?;
            let norm = embedding.dot(&embedding).sqrt();
            if norm > 1e-9 {
                embedding /= norm;
            }
            Ok(EmbeddingResult {
                embedding,
                cached: false,
            })
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn is_available(&self) -> bool {
            true
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
