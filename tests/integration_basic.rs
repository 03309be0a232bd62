mod common;

use std::sync::Arc;

use npkcarve::classify::Category;
use npkcarve::container::RawContainer;
use npkcarve::pipeline::{ExtractionPipeline, RunState};

use common::{PNG_MAGIC, RecordingObserver, container_of, files_in, serial_config, write_input};

#[test]
fn identical_png_frames_dedup_to_one_artifact() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let (data, offsets) = container_of(&[PNG_MAGIC.to_vec(), PNG_MAGIC.to_vec()]);
    assert_eq!(offsets.len(), 2);
    let input = write_input(temp_dir.path(), "gui.npk", &data);

    let observer = Arc::new(RecordingObserver::default());
    let pipeline = ExtractionPipeline::new(serial_config("dedup_on"), observer.clone());
    let out = temp_dir.path().join("out");
    let result = pipeline.run(&input, &out).expect("run");

    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.total_frames_found, 2);
    assert_eq!(result.artifacts_extracted, 1);
    assert_eq!(result.duplicates_skipped, 1);
    assert_eq!(files_in(&out.join("image")), 1);
    assert!(out.join("image").join("extracted_frame_1.png").exists());

    let artifacts = observer.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].category, Category::Image);
    assert_eq!(artifacts[0].source_offset, offsets[0]);
    assert_eq!(observer.finished.lock().expect("lock").as_slice(), &[1]);
}

#[test]
fn identical_png_frames_without_dedup_give_two_artifacts() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let (data, _) = container_of(&[PNG_MAGIC.to_vec(), PNG_MAGIC.to_vec()]);

    let mut cfg = serial_config("dedup_off");
    cfg.enable_dedup = false;
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = ExtractionPipeline::new(cfg, observer.clone());
    let out = temp_dir.path().join("out");
    let result = pipeline
        .run_container(RawContainer::from_bytes("gui.npk", data), &out)
        .expect("run");

    assert_eq!(result.artifacts_extracted, 2);
    assert_eq!(result.duplicates_skipped, 0);
    assert!(observer
        .artifacts()
        .iter()
        .all(|a| a.category == Category::Image && a.detected_extension == "png"));
    assert!(out.join("image").join("extracted_frame_1.png").exists());
    assert!(out.join("image").join("extracted_frame_2.png").exists());
}

#[test]
fn payloads_are_bucketed_by_content() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let mut riff = b"RIFF\x10\0\0\0WAVEfmt ".to_vec();
    riff.extend_from_slice(&[0u8; 8]);
    let mut tga = vec![0u8; 32];
    tga.extend_from_slice(b"TRUEVISION-XFILE.\0");
    let payloads = vec![
        vec![0x34, 0x80, 0xC8, 0xBB, 1, 2, 3],
        riff,
        b"BKHD\x20\0\0\0".to_vec(),
        b"AKPK\0\0\0\0".to_vec(),
        b"DDS |header".to_vec(),
        vec![0xAB, b'K', b'T', b'X', b' ', b'1', b'1', 0xBB, 0x0D, 0x0A],
        tga,
        b"plain text".to_vec(),
    ];
    let (data, _) = container_of(&payloads);

    let observer = Arc::new(RecordingObserver::default());
    let pipeline = ExtractionPipeline::new(serial_config("types"), observer.clone());
    let out = temp_dir.path().join("out");
    let result = pipeline
        .run_container(RawContainer::from_bytes("mixed.npk", data), &out)
        .expect("run");
    assert_eq!(result.artifacts_extracted, 8);

    let expected = [
        ("mesh", "extracted_frame_1.mesh"),
        ("audio", "extracted_frame_2.wem"),
        ("audio", "extracted_frame_3.bnk"),
        ("package", "extracted_frame_4.npk"),
        ("image", "extracted_frame_5.dds"),
        ("image", "extracted_frame_6.ktx"),
        ("image", "extracted_frame_7.tga"),
        ("unknown", "extracted_frame_8"),
    ];
    for (category, name) in expected {
        assert!(out.join(category).join(name).exists(), "{category}/{name}");
    }
}

#[test]
fn type_detection_off_writes_everything_to_unknown() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let (data, _) = container_of(&[PNG_MAGIC.to_vec(), b"BKHD".to_vec()]);

    let mut cfg = serial_config("no_types");
    cfg.enable_type_detection = false;
    let pipeline = ExtractionPipeline::new(cfg, Arc::new(RecordingObserver::default()));
    let out = temp_dir.path().join("out");
    let result = pipeline
        .run_container(RawContainer::from_bytes("x.npk", data), &out)
        .expect("run");

    assert_eq!(result.artifacts_extracted, 2);
    assert_eq!(files_in(&out.join("unknown")), 2);
    assert!(!out.join("image").exists());
}

#[test]
fn repeated_runs_yield_same_hashes() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let payloads: Vec<Vec<u8>> = (0..12)
        .map(|i| common::tagged_payload(b"AKPK", i % 5, 64))
        .collect();
    let (data, _) = container_of(&payloads);
    let input = write_input(temp_dir.path(), "repeat.npk", &data);

    let mut runs = Vec::new();
    for (i, fast_mode) in [false, true].into_iter().enumerate() {
        let mut cfg = serial_config(&format!("repeat{i}"));
        cfg.fast_mode = fast_mode;
        cfg.max_threads = 3;
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = ExtractionPipeline::new(cfg, observer.clone());
        let result = pipeline
            .run(&input, &temp_dir.path().join(format!("out{i}")))
            .expect("run");
        assert!(result.artifacts_extracted <= result.total_frames_found);
        assert_eq!(result.artifacts_extracted, 5);
        runs.push(observer.hashes());
    }
    assert_eq!(runs[0], runs[1]);

    let unique: std::collections::HashSet<&String> = runs[0].iter().collect();
    assert_eq!(unique.len(), runs[0].len());
}

#[test]
fn progress_is_reported_in_dispatch_order_for_serial_runs() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let payloads: Vec<Vec<u8>> = (0..4)
        .map(|i| common::tagged_payload(b"BKHD", i, 32))
        .collect();
    let (data, _) = container_of(&payloads);

    let observer = Arc::new(RecordingObserver::default());
    let pipeline = ExtractionPipeline::new(serial_config("order"), observer.clone());
    pipeline
        .run_container(RawContainer::from_bytes("o.npk", data), temp_dir.path())
        .expect("run");

    assert_eq!(
        observer.progress(),
        vec![(0, 4), (1, 4), (2, 4), (3, 4), (4, 4)]
    );
    let indices: Vec<usize> = observer
        .artifacts()
        .iter()
        .map(|a| a.sequence_index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    let frame_logs = observer.frame_logs();
    assert_eq!(frame_logs.len(), 4);
    assert!(frame_logs[0].starts_with("[frame 0001 @ 0x00000000]"));
}
