//! ONNX Runtime inference adapter.
//!
//! Runs an exported encoder via `ort`. Every output, whatever the export
//! emits, leaves through [`to_embedding_matrix`] as a plain `[batch, hidden]`
//! `f32` matrix.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::{EmbedError, EncodedBatch, InferenceEngine, Result};

/// Local ONNX-based inference engine.
pub struct OnnxEngine {
    session: Mutex<Session>,
    output_name: String,
    dimension: usize,
    needs_token_type_ids: bool,
}

// Safety: Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for OnnxEngine {}
unsafe impl Sync for OnnxEngine {}

impl OnnxEngine {
    pub fn from_file(model_path: &Path, intra_threads: usize) -> Result<Self> {
        if !model_path.exists() {
            return Err(EmbedError::ModelLoad(format!(
                "ONNX model not found at {}. Run `spark-embed model download` first.",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(EmbedError::model_load)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(EmbedError::model_load)?
            .with_intra_threads(intra_threads.max(1))
            .map_err(EmbedError::model_load)?
            .commit_from_file(model_path)
            .map_err(|e| EmbedError::model_load(format!("failed to load ONNX model: {e}")))?;

        let output = session
            .outputs()
            .first()
            .ok_or_else(|| EmbedError::model_load("ONNX model declares no outputs"))?;
        let output_name = output.name().to_string();
        let declared_dim = infer_dim(output.dtype());
        let needs_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut engine = Self {
            session: Mutex::new(session),
            output_name,
            dimension: declared_dim.unwrap_or(0),
            needs_token_type_ids,
        };

        if declared_dim.is_none() {
            // Dynamic hidden axis: learn it from a one-token forward pass.
            let probe = EncodedBatch {
                input_ids: Array2::zeros((1, 1)),
                attention_mask: Array2::ones((1, 1)),
            };
            let out = engine
                .run(&probe)
                .map_err(|e| EmbedError::model_load(format!("dimension probe failed: {e}")))?;
            engine.dimension = out.ncols();
        }

        tracing::info!(
            model = %model_path.display(),
            output = %engine.output_name,
            dim = engine.dimension,
            token_type_ids = engine.needs_token_type_ids,
            "ONNX model loaded"
        );

        Ok(engine)
    }

    fn run(&self, batch: &EncodedBatch) -> Result<Array2<f32>> {
        let (batch_size, seq_len) = (batch.batch_size(), batch.seq_len());
        let shape = vec![batch_size as i64, seq_len as i64];

        let input_ids: Vec<i64> = batch.input_ids.iter().copied().collect();
        let attention_mask: Vec<i64> = batch.attention_mask.iter().copied().collect();

        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
            .map_err(EmbedError::inference)?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.into_boxed_slice()))
                .map_err(EmbedError::inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedError::inference(format!("session lock poisoned: {e}")))?;

        let outputs = if self.needs_token_type_ids {
            // token_type_ids: all zeros (single sentence, no segment B)
            let token_type_ids = vec![0i64; batch_size * seq_len];
            let token_type_ids_tensor =
                Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
                    .map_err(EmbedError::inference)?;
            session.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            })
        } else {
            session.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
            })
        }
        .map_err(EmbedError::inference)?;

        let value = outputs
            .get(self.output_name.as_str())
            .unwrap_or_else(|| &outputs[0]);
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::inference(format!("failed to extract output tensor: {e}")))?;

        let dims: &[i64] = &shape;
        to_embedding_matrix(dims, data, &batch.attention_mask)
    }
}

impl InferenceEngine for OnnxEngine {
    fn infer(&self, batch: &EncodedBatch) -> Result<Array2<f32>> {
        let out = self.run(batch)?;
        if out.ncols() != self.dimension {
            return Err(EmbedError::Inference(format!(
                "output has {} columns, model dimension is {}",
                out.ncols(),
                self.dimension
            )));
        }
        Ok(out)
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }
}

/// Convert a raw engine output into one vector per batch row.
///
/// `[batch, hidden]` passes through. `[batch, seq, hidden]` is mean-pooled
/// over the positions where `attention_mask` is set.
pub fn to_embedding_matrix(
    dims: &[i64],
    data: &[f32],
    attention_mask: &Array2<i64>,
) -> Result<Array2<f32>> {
    let batch_size = attention_mask.nrows();
    let dims: Vec<usize> = dims
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| EmbedError::Inference(format!("negative output dimension in {dims:?}")))?;

    if dims.first() != Some(&batch_size) {
        return Err(EmbedError::Inference(format!(
            "output shape {dims:?} does not match batch size {batch_size}"
        )));
    }

    match dims.as_slice() {
        &[rows, hidden] => Array2::from_shape_vec((rows, hidden), data.to_vec())
            .map_err(EmbedError::inference),
        &[rows, seq_len, hidden] => {
            if seq_len != attention_mask.ncols() {
                return Err(EmbedError::Inference(format!(
                    "output sequence length {seq_len} does not match input length {}",
                    attention_mask.ncols()
                )));
            }
            if data.len() != rows * seq_len * hidden {
                return Err(EmbedError::Inference(format!(
                    "output holds {} values, shape {dims:?} needs {}",
                    data.len(),
                    rows * seq_len * hidden
                )));
            }

            let mut pooled = Array2::<f32>::zeros((rows, hidden));
            for b in 0..rows {
                let mut count = 0.0f32;
                for s in 0..seq_len {
                    let mask = attention_mask[[b, s]] as f32;
                    if mask > 0.0 {
                        let offset = (b * seq_len + s) * hidden;
                        for d in 0..hidden {
                            pooled[[b, d]] += data[offset + d] * mask;
                        }
                        count += mask;
                    }
                }
                if count > 0.0 {
                    pooled.row_mut(b).mapv_inplace(|x| x / count);
                }
            }
            Ok(pooled)
        }
        _ => Err(EmbedError::Inference(format!(
            "unexpected output shape {dims:?}, expected [batch, hidden] or [batch, seq, hidden]"
        ))),
    }
}

/// Try to infer the embedding dimension from the ONNX model output type.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
