use anonymize::{
    error_message, BlurType, Detector, Engine, Error, FrameBuffer, NetworkInput, PackedFormat,
    Plane, ProposalTensor, RecognizeType,
};

/// Deterministic detector stub: returns the configured proposals on every
/// forward pass, in network (letterboxed 640x640) coordinates.
struct StubDetector {
    proposals: Vec<[f32; 5]>,
}

impl StubDetector {
    fn empty() -> Self {
        Self {
            proposals: Vec::new(),
        }
    }
}

impl Detector for StubDetector {
    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }

    fn forward(&mut self, _input: &NetworkInput) -> Result<ProposalTensor, Error> {
        let n = self.proposals.len();
        let mut data = vec![0.0; n * 5];
        for (i, proposal) in self.proposals.iter().enumerate() {
            for c in 0..5 {
                data[c * n + i] = proposal[c];
            }
        }
        ProposalTensor::new(data, n, 5)
    }
}

/// A deterministic, textured BGR buffer with the given stride.
fn gradient_bgr(width: usize, height: usize, stride: usize) -> Vec<u8> {
    let mut data = vec![0u8; stride * height];
    for y in 0..height {
        for x in 0..width {
            let i = y * stride + x * 3;
            data[i] = (x * 7 + y * 3) as u8;
            data[i + 1] = (x * 5 + y * 11) as u8;
            data[i + 2] = (x * 13 + y * 2) as u8;
        }
    }
    data
}

fn region_variance(
    data: &[u8],
    stride: usize,
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
) -> f64 {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0.0f64;
    for y in top..=bottom {
        for x in left..=right {
            for c in 0..3 {
                let v = data[y * stride + x * 3 + c] as f64;
                sum += v;
                sum_sq += v * v;
                n += 1.0;
            }
        }
    }
    let mean = sum / n;
    sum_sq / n - mean * mean
}

#[test]
fn bgr_round_trip_is_bit_exact() {
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    // Padded stride: forces the row-copy conversion and write-back path.
    let mut data = gradient_bgr(30, 20, 96);
    let original = data.clone();
    let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 30, 20, &mut data, 96);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();

    assert_eq!(data, original);
}

#[test]
fn gray_round_trip_is_bit_exact() {
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    let mut data: Vec<u8> = (0..32 * 32).map(|i| (i % 251) as u8).collect();
    let original = data.clone();
    let mut frame = FrameBuffer::packed(PackedFormat::Gray, 32, 32, &mut data, 32);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();

    assert_eq!(data, original);
}

#[test]
fn argb_round_trip_preserves_alpha() {
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    let mut data = vec![0u8; 8 * 8 * 4];
    for (i, cell) in data.chunks_exact_mut(4).enumerate() {
        cell.copy_from_slice(&[i as u8, (i * 3) as u8, (i * 5) as u8, (255 - i) as u8]);
    }
    let original = data.clone();
    let mut frame = FrameBuffer::packed(PackedFormat::Argb, 8, 8, &mut data, 32);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();

    assert_eq!(data, original);
}

#[test]
fn gaussian_blur_lowers_variance_inside_box_only() {
    // 640x480 BGR at stride 1920 (tightly packed: processed in place) with
    // one injected detection at (100,100)-(200,200).
    //
    // The stub speaks network coordinates: the 640x480 image letterboxes to
    // 640x480 content with 80 rows of padding above, so the network-space
    // center is (150, 230).
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector {
        proposals: vec![[150.0, 230.0, 100.0, 100.0, 0.9]],
    }));

    let mut data = gradient_bgr(640, 480, 1920);
    let original = data.clone();
    let var_before = region_variance(&original, 1920, 100, 100, 200, 200);

    let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 640, 480, &mut data, 1920);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::Gaussian)
        .unwrap();

    let var_after = region_variance(&data, 1920, 100, 100, 200, 200);
    assert!(
        var_after < var_before,
        "variance inside the box must drop ({var_after} vs {var_before})"
    );

    // Every byte outside the box is unchanged.
    for y in 0..480usize {
        for x in 0..640usize {
            if (100..=200).contains(&x) && (100..=200).contains(&y) {
                continue;
            }
            let i = y * 1920 + x * 3;
            assert_eq!(&data[i..i + 3], &original[i..i + 3], "pixel {x},{y}");
        }
    }
}

#[test]
fn pipeline_is_deterministic() {
    let run = || {
        let mut engine = Engine::new();
        let handle = engine.init_with_detector(Box::new(StubDetector {
            proposals: vec![[150.0, 230.0, 100.0, 100.0, 0.9]],
        }));
        let mut data = gradient_bgr(640, 480, 1920);
        let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 640, 480, &mut data, 1920);
        engine
            .mem_anonymization(handle, &mut frame, BlurType::Gaussian)
            .unwrap();
        data
    };

    assert_eq!(run(), run());
}

#[test]
fn detection_touching_the_image_edge_is_safe() {
    // A box whose right/bottom edge sits exactly on the last pixel.
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector {
        proposals: vec![[600.0, 520.0, 200.0, 200.0, 0.9]],
    }));

    let mut data = gradient_bgr(640, 480, 1920);
    let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 640, 480, &mut data, 1920);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::Gaussian)
        .unwrap();
    engine
        .uninit(handle)
        .unwrap();
}

#[test]
fn odd_yuv420_dimensions_convert_with_floor_divided_chroma() {
    // 101x101 planar 4:2:0: chroma planes are exactly 50x50. Every buffer
    // is allocated at its exact size, so any out-of-range access panics.
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    let mut y = vec![128u8; 101 * 101];
    let mut u = vec![128u8; 50 * 50];
    let mut v = vec![128u8; 50 * 50];
    let mut frame = FrameBuffer::planar420(
        101,
        101,
        Plane::new(&mut y, 101),
        Plane::new(&mut u, 50),
        Plane::new(&mut v, 50),
    );
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();
}

#[test]
fn semi_planar_input_is_processed() {
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    let mut y = vec![100u8; 64 * 64];
    let mut uv = vec![128u8; 32 * 64];
    let mut frame =
        FrameBuffer::semi_planar420(64, 64, Plane::new(&mut y, 64), Plane::new(&mut uv, 64));
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();
}

#[test]
fn init_without_model_file_is_model_not_exist() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::new();
    let err = engine
        .init(dir.path(), RecognizeType::LicensePlate)
        .unwrap_err();
    assert!(matches!(err, Error::ModelNotExist));
}

#[test]
fn empty_primary_plane_is_invalid_parameter_and_touches_nothing() {
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    let mut y: Vec<u8> = Vec::new();
    let mut u = vec![0xEEu8; 8 * 8];
    let mut v = vec![0xEEu8; 8 * 8];
    let mut frame = FrameBuffer::planar420(
        16,
        16,
        Plane::new(&mut y, 16),
        Plane::new(&mut u, 8),
        Plane::new(&mut v, 8),
    );
    let err = engine
        .mem_anonymization(handle, &mut frame, BlurType::Gaussian)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    drop(frame);
    assert!(u.iter().all(|&b| b == 0xEE));
    assert!(v.iter().all(|&b| b == 0xEE));
}

#[test]
fn double_uninit_is_handle_invalid() {
    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));
    engine.uninit(handle).unwrap();
    assert!(matches!(engine.uninit(handle), Err(Error::HandleInvalid)));

    let mut data = vec![0u8; 4 * 4 * 3];
    let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 4, 4, &mut data, 12);
    assert!(matches!(
        engine.mem_anonymization(handle, &mut frame, BlurType::None),
        Err(Error::HandleInvalid)
    ));
}

#[test]
fn zero_frame_video_source_is_load_video_error() {
    use anonymize::{CanonicalImage, FrameSink, FrameSource};

    struct EmptySource;
    impl FrameSource for EmptySource {
        fn dimensions(&self) -> (u32, u32) {
            (16, 16)
        }
        fn frame_rate(&self) -> f64 {
            25.0
        }
        fn read_frame(&mut self) -> Result<Option<CanonicalImage<'static>>, Error> {
            Ok(None)
        }
    }

    struct NullSink;
    impl FrameSink for NullSink {
        fn write_frame(&mut self, _frame: &CanonicalImage<'_>) -> Result<(), Error> {
            Ok(())
        }
        fn finish(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));
    let err = engine
        .video_anonymization_with(handle, &mut EmptySource, &mut NullSink, BlurType::Gaussian)
        .unwrap_err();
    assert!(matches!(err, Error::LoadVideo(_)));
}

#[test]
fn log_file_receives_session_output() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("anonymize.log");

    let mut engine = Engine::new();
    engine
        .set_log_file_level(&log_path, anonymize::LogLevel::Debug)
        .unwrap();
    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));

    let mut data = gradient_bgr(16, 16, 48);
    let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 16, 16, &mut data, 48);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(
        contents.contains("in-memory anonymization"),
        "log file should carry the operation trace: {contents:?}"
    );
}

#[test]
fn failed_log_sink_does_not_block_operations() {
    let mut engine = Engine::new();
    let err = engine
        .set_log_file_level("/nonexistent-dir/anonymize.log", anonymize::LogLevel::Info)
        .unwrap_err();
    assert!(matches!(err, Error::LoadLog(_)));

    let handle = engine.init_with_detector(Box::new(StubDetector::empty()));
    let mut data = gradient_bgr(8, 8, 24);
    let mut frame = FrameBuffer::packed(PackedFormat::Bgr, 8, 8, &mut data, 24);
    engine
        .mem_anonymization(handle, &mut frame, BlurType::None)
        .unwrap();
}

#[test]
fn image_file_pipeline_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");

    // Build an input image via the codec itself.
    let canonical = {
        let data = gradient_bgr(64, 48, 192);
        anonymize::CanonicalImage::from_vec(64, 48, data)
    };
    anonymize::save_image(&input, &canonical).unwrap();

    let mut engine = Engine::new();
    let handle = engine.init_with_detector(Box::new(StubDetector {
        // Centered box in network space for the 64x48 input.
        proposals: vec![[320.0, 320.0, 200.0, 200.0, 0.9]],
    }));
    engine
        .image_anonymization(handle, &input, &output, BlurType::Outline)
        .unwrap();

    let result = anonymize::load_image(&output).unwrap();
    assert_eq!(result.width(), 64);
    assert_eq!(result.height(), 48);
}

#[test]
fn status_codes_have_messages() {
    assert_eq!(error_message(0), "Operation successful");
    assert_eq!(
        error_message(Error::ModelNotExist.code()),
        "Input model file does not exist"
    );
    assert_eq!(
        error_message(Error::HandleInvalid.code()),
        "The provided handle is invalid"
    );
    assert_eq!(error_message(424242), "Unknown error code");
}

#[test]
fn version_matches_crate() {
    assert_eq!(anonymize::version(), concat!("v", env!("CARGO_PKG_VERSION")));
}
