//! Detector backend over ONNX Runtime.

use std::path::Path;

use ort::{inputs, session::Session as OrtSession, value::Tensor};

use crate::detect::{Detector, NetworkInput, ProposalTensor};
use crate::error::Error;

/// Network input edge length, fixed by the exported detection models.
const INPUT_SIZE: u32 = 640;

/// [`Detector`] backed by an exported ONNX detection model.
///
/// The model maps a (1, 3, 640, 640) RGB tensor to a (1, C ≥ 5, N)
/// channel-major proposal tensor.
pub struct OnnxDetector {
    session: OrtSession,
}

impl OnnxDetector {
    /// Load a model file.
    ///
    /// The caller has already verified existence; a failure here means the
    /// file is not a loadable model and surfaces as [`Error::Internal`].
    pub fn load(path: &Path) -> Result<Self, Error> {
        let session = OrtSession::builder()
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| Error::Internal(format!("failed to load model: {e}")))?;
        Ok(Self { session })
    }
}

impl Detector for OnnxDetector {
    fn input_size(&self) -> (u32, u32) {
        (INPUT_SIZE, INPUT_SIZE)
    }

    fn forward(&mut self, input: &NetworkInput) -> Result<ProposalTensor, Error> {
        let shape: Vec<usize> = input.shape().to_vec();
        let (data, _offset) = input.clone().into_raw_vec_and_offset();
        let tensor = Tensor::from_array(([shape[0], shape[1], shape[2], shape[3]], data))
            .map_err(|e| Error::Internal(format!("failed to build input tensor: {e}")))?;

        let outputs = self
            .session
            .run(inputs!["images" => tensor])
            .map_err(|e| Error::Internal(format!("inference failed: {e}")))?;

        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Internal(format!("failed to read model output: {e}")))?;

        let out_shape = output.0.clone();
        if out_shape.len() != 3 || out_shape[0] != 1 {
            return Err(Error::Internal(format!(
                "unexpected model output shape {out_shape:?}, expected [1, channels, proposals]"
            )));
        }
        let channels = out_shape[1] as usize;
        let proposals = out_shape[2] as usize;

        ProposalTensor::new(output.1.to_vec(), proposals, channels)
    }
}
