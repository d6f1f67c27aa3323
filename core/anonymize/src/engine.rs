//! The public operation surface: an engine owning sessions behind
//! generational handles.
//!
//! The engine is an explicit object, not process-wide state; independent
//! engines have independent sessions and log sinks. Handles are index +
//! generation tokens, so a stale or double-released handle is a
//! deterministic [`Error::HandleInvalid`], never undefined behavior.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::canonical::CanonicalImage;
use crate::codec;
use crate::convert;
use crate::detect::Detector;
use crate::error::Error;
use crate::frame::FrameBuffer;
use crate::logging::{LogLevel, LogSink};
use crate::redact::BlurType;
use crate::session::{RecognizeType, Session};
use crate::video::{self, FrameSink, FrameSource};
use crate::writeback;

/// Opaque session token issued by [`Engine::init`].
///
/// Copyable; using it after [`Engine::uninit`] fails with
/// [`Error::HandleInvalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    index: usize,
    generation: u32,
}

struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// Owner of sessions and their shared log sink.
pub struct Engine {
    slots: Vec<Slot>,
    sink: LogSink,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine logging to stderr at `Info` level.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            sink: LogSink::stderr(LogLevel::Info),
        }
    }

    /// Redirect this engine's log output to an append-mode file.
    ///
    /// Must be called before [`Engine::init`] to affect the sessions
    /// created afterwards; already-created sessions keep their captured
    /// level. A failure leaves logging on stderr and never blocks later
    /// operations.
    pub fn set_log_file_level(
        &mut self,
        path: impl AsRef<Path>,
        level: LogLevel,
    ) -> Result<(), Error> {
        self.sink.set_file(path.as_ref(), level)
    }

    /// Load the model for `recognize` from `model_dir` and open a session.
    ///
    /// Fails with [`Error::ModelNotExist`] when the resolved model file is
    /// absent and [`Error::Internal`] when it cannot be loaded.
    pub fn init(
        &mut self,
        model_dir: impl AsRef<Path>,
        recognize: RecognizeType,
    ) -> Result<Handle, Error> {
        let dispatch = self.sink.dispatch().clone();
        let session = tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!(
                dir = %model_dir.as_ref().display(),
                ?recognize,
                "initializing session"
            );
            Session::load(model_dir.as_ref(), recognize, dispatch.clone())
        })?;
        Ok(self.insert(session))
    }

    /// Open a session around a caller-provided detector.
    ///
    /// The collaborator seam for custom inference backends; the session
    /// uses the same fixed thresholds as [`Engine::init`].
    pub fn init_with_detector(&mut self, detector: Box<dyn Detector>) -> Handle {
        let mut session = Session::with_detector(detector);
        session.set_dispatch(self.sink.dispatch().clone());
        self.insert(session)
    }

    /// Release a session.
    ///
    /// Not idempotent: releasing an already-released handle fails with
    /// [`Error::HandleInvalid`], as does any other stale or foreign token.
    pub fn uninit(&mut self, handle: Handle) -> Result<(), Error> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .ok_or(Error::HandleInvalid)?;
        if slot.generation != handle.generation || slot.session.is_none() {
            return Err(Error::HandleInvalid);
        }
        slot.session = None;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(())
    }

    /// Anonymize an image file into `output`.
    pub fn image_anonymization(
        &mut self,
        handle: Handle,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        blur: BlurType,
    ) -> Result<(), Error> {
        let session = self.session_mut(handle)?;
        let dispatch = session.dispatch();
        scoped(&dispatch, || {
            guard_panics(|| {
                tracing::info!(
                    input = %input.as_ref().display(),
                    output = %output.as_ref().display(),
                    ?blur,
                    "image anonymization"
                );
                let mut canonical = codec::load_image(input.as_ref())?;
                session.process(&mut canonical, blur)?;
                codec::save_image(output.as_ref(), &canonical)
            })
        })
    }

    /// Anonymize a raw frame in place.
    ///
    /// Tightly packed BGR input is processed directly in the caller's
    /// buffer; every other layout is converted to the canonical image and
    /// written back at the caller's strides.
    pub fn mem_anonymization(
        &mut self,
        handle: Handle,
        frame: &mut FrameBuffer<'_>,
        blur: BlurType,
    ) -> Result<(), Error> {
        let session = self.session_mut(handle)?;
        let dispatch = session.dispatch();
        scoped(&dispatch, || {
            guard_panics(|| {
                frame.validate()?;
                tracing::debug!(
                    format = frame.format_label(),
                    width = frame.width(),
                    height = frame.height(),
                    ?blur,
                    "in-memory anonymization"
                );

                let (width, height) = (frame.width(), frame.height());
                if let Some(view) = frame.as_tight_bgr_mut() {
                    let mut canonical = CanonicalImage::from_bgr_mut(width, height, view);
                    session.process(&mut canonical, blur)?;
                } else {
                    let mut canonical = convert::to_canonical(frame)?;
                    session.process(&mut canonical, blur)?;
                    writeback::write_back(&canonical, frame)?;
                }
                Ok(())
            })
        })
    }

    /// Anonymize a video file into `output` using the FFmpeg backend.
    ///
    /// The output is encoded with the input's codec when an encoder for it
    /// is available, falling back to the fixed default codec otherwise.
    #[cfg(feature = "ffmpeg")]
    pub fn video_anonymization(
        &mut self,
        handle: Handle,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        blur: BlurType,
    ) -> Result<(), Error> {
        let session = self.session_mut(handle)?;
        let dispatch = session.dispatch();
        scoped(&dispatch, || {
            guard_panics(|| {
                tracing::info!(
                    input = %input.as_ref().display(),
                    output = %output.as_ref().display(),
                    ?blur,
                    "video anonymization"
                );
                let mut source = crate::ffmpeg_backend::FfmpegSource::open(input.as_ref())?;
                let mut sink =
                    crate::ffmpeg_backend::FfmpegSink::create(output.as_ref(), &source)?;
                let frames = video::anonymize_stream(session, &mut source, &mut sink, blur)?;
                tracing::info!(frames, "video anonymization complete");
                Ok(())
            })
        })
    }

    /// Anonymize a video stream through caller-provided source and sink
    /// collaborators.
    pub fn video_anonymization_with(
        &mut self,
        handle: Handle,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        blur: BlurType,
    ) -> Result<u64, Error> {
        let session = self.session_mut(handle)?;
        let dispatch = session.dispatch();
        scoped(&dispatch, || {
            guard_panics(|| video::anonymize_stream(session, source, sink, blur))
        })
    }

    fn insert(&mut self, session: Session) -> Handle {
        if let Some(index) = self.slots.iter().position(|s| s.session.is_none()) {
            let slot = &mut self.slots[index];
            slot.session = Some(session);
            return Handle {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            session: Some(session),
        });
        Handle {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn session_mut(&mut self, handle: Handle) -> Result<&mut Session, Error> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.session.as_mut())
            .ok_or(Error::HandleInvalid)
    }
}

fn scoped<T>(dispatch: &Option<tracing::Dispatch>, f: impl FnOnce() -> T) -> T {
    match dispatch {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
        None => f(),
    }
}

/// Contain panics from detector or converter code at the API boundary.
fn guard_panics<T>(f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(panic = %message, "caught panic at the api boundary");
            Err(Error::Internal(message))
        }
    }
}
