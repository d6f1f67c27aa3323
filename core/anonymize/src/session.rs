//! Session state and the detection-to-redaction pipeline.

use std::path::Path;

use tracing::Dispatch;

use crate::canonical::CanonicalImage;
use crate::detect::{letterbox, Detector};
use crate::error::Error;
use crate::proposals::{decode, non_max_suppression, Detection};
use crate::redact::{self, BlurType};

/// Which weight set a session loads at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizeType {
    /// Face detection weights.
    Face,
    /// License-plate detection weights.
    LicensePlate,
    /// Combined weights.
    All,
}

impl RecognizeType {
    /// Fixed model filename resolved under the model directory.
    pub fn model_file(self) -> &'static str {
        match self {
            RecognizeType::Face => "bestface.onnx",
            RecognizeType::LicensePlate => "bestplate.onnx",
            RecognizeType::All => "bestall.onnx",
        }
    }
}

/// Confidence threshold fixed at session creation.
const CONFIDENCE_THRESHOLD: f32 = 0.45;

/// IoU threshold for non-max suppression, fixed at session creation.
const NMS_THRESHOLD: f32 = 0.5;

/// A loaded detector plus the thresholds chosen at load time.
///
/// Immutable after construction apart from what the inference runtime
/// needs internally. The engine provides no locking: concurrent use of one
/// session requires the detector to be reentrant, which the `&mut`
/// receivers make a compile-time concern for safe Rust callers.
pub struct Session {
    detector: Box<dyn Detector>,
    confidence_threshold: f32,
    nms_threshold: f32,
    dispatch: Option<Dispatch>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("confidence_threshold", &self.confidence_threshold)
            .field("nms_threshold", &self.nms_threshold)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap a caller-provided detector with the fixed default thresholds.
    ///
    /// This is the collaborator seam for custom inference backends and for
    /// deterministic test doubles.
    pub fn with_detector(detector: Box<dyn Detector>) -> Self {
        Self {
            detector,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            nms_threshold: NMS_THRESHOLD,
            dispatch: None,
        }
    }

    /// Resolve and load the model for `recognize` under `model_dir`.
    pub(crate) fn load(
        model_dir: &Path,
        recognize: RecognizeType,
        dispatch: Dispatch,
    ) -> Result<Self, Error> {
        let model_path = model_dir.join(recognize.model_file());
        if !model_path.is_file() {
            tracing::error!(path = %model_path.display(), "model file not found");
            return Err(Error::ModelNotExist);
        }

        #[cfg(feature = "onnx")]
        {
            let detector = crate::onnx_backend::OnnxDetector::load(&model_path)?;
            tracing::info!(path = %model_path.display(), "model loaded");
            let mut session = Self::with_detector(Box::new(detector));
            session.dispatch = Some(dispatch);
            Ok(session)
        }
        #[cfg(not(feature = "onnx"))]
        {
            let _ = dispatch;
            tracing::error!("no detector backend compiled in");
            Err(Error::Internal(
                "no detector backend available; enable the `onnx` feature or \
                 inject a detector with Session::with_detector"
                    .into(),
            ))
        }
    }

    pub(crate) fn set_dispatch(&mut self, dispatch: Dispatch) {
        self.dispatch = Some(dispatch);
    }

    pub(crate) fn dispatch(&self) -> Option<Dispatch> {
        self.dispatch.clone()
    }

    /// Run detect → decode → suppress → redact on the canonical image,
    /// mutating it in place. Returns the final detections.
    pub fn process(
        &mut self,
        image: &mut CanonicalImage<'_>,
        blur: BlurType,
    ) -> Result<Vec<Detection>, Error> {
        let (input_w, input_h) = self.detector.input_size();
        let (tensor, geometry) = letterbox(image, input_w, input_h);
        let proposals = self.detector.forward(&tensor)?;

        let candidates = decode(
            &proposals,
            geometry,
            image.width(),
            image.height(),
            self.confidence_threshold,
        );
        let detections = non_max_suppression(&candidates, self.nms_threshold);
        tracing::debug!(
            candidates = candidates.len(),
            detections = detections.len(),
            "detection pass complete"
        );

        redact::apply(image, &detections, blur);
        Ok(detections)
    }
}
