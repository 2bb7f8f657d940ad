//! End-to-end capture sessions driven through the public API with the
//! mock backend and in-memory sinks.

use pcm_capture_core::mock::{BackendCall, FailingSink, MemorySink, MockBackend};
use pcm_capture_core::{
    AudioFormat, CaptureConfiguration, CaptureEngine, CaptureError, CaptureState, RunLoop,
};

fn started<S: pcm_capture_core::OutputSink>(
    sink: S,
    config: CaptureConfiguration,
) -> (CaptureEngine<MockBackend, S>, MockBackend, RunLoop) {
    let backend = MockBackend::new();
    let run_loop = RunLoop::new();
    let mut engine = CaptureEngine::new(backend.clone(), sink);
    engine.configure(config).unwrap();
    engine.start(run_loop.completion_sender()).unwrap();
    (engine, backend, run_loop)
}

#[test]
fn valid_formats_configure() {
    for rate in [8000, 16000, 24000, 44100, 48000, 96000] {
        for channels in [1u16, 2, 6] {
            for bits in [8u16, 16, 24, 32] {
                let format = AudioFormat::new(rate, channels, bits);
                let config = CaptureConfiguration::new(format)
                    .with_buffer_duration(std::time::Duration::from_millis(50));
                let backend = MockBackend::new();
                let mut engine = CaptureEngine::new(backend.clone(), MemorySink::new());

                engine.configure(config).unwrap();

                assert_eq!(format.bytes_per_frame(), channels as usize * bits as usize / 8);
                assert_eq!(engine.state(), CaptureState::Configured);
                assert!(backend.calls().is_empty());
            }
        }
    }
}

#[test]
fn invalid_formats_fail_without_backend_calls() {
    let invalid = [
        AudioFormat::new(0, 2, 16),
        AudioFormat::new(24000, 0, 16),
        AudioFormat::new(24000, 2, 0),
        AudioFormat::new(24000, 2, 12),
    ];
    for format in invalid {
        let backend = MockBackend::new();
        let mut engine = CaptureEngine::new(backend.clone(), MemorySink::new());

        let err = engine.configure(CaptureConfiguration::new(format)).unwrap_err();

        assert!(matches!(err, CaptureError::InvalidFormat(_)), "{:?}", format);
        assert!(backend.calls().is_empty());
    }
}

#[test]
fn start_submits_whole_pool() {
    for count in [1, 3, 8] {
        let config = CaptureConfiguration::default().with_buffer_count(count);
        let (engine, backend, _run_loop) = started(MemorySink::new(), config);

        assert_eq!(backend.submit_count(), count);
        assert_eq!(backend.queued(), count);
        assert_eq!(engine.pool().len(), count);
    }
}

#[test]
fn sink_receives_exact_payloads_in_order() {
    let (mut engine, backend, run_loop) = started(MemorySink::new(), CaptureConfiguration::default());
    let sizes = [4800usize, 1, 0, 4, 2400, 4800, 3000, 17];
    let mut expected = Vec::new();

    for (i, size) in sizes.iter().enumerate() {
        let payload: Vec<u8> = (0..*size).map(|b| (b + i * 31) as u8).collect();
        assert!(backend.complete_next(&payload));
        run_loop.dispatch_pending(&mut engine);
        expected.extend_from_slice(&payload);
    }

    assert_eq!(engine.sink().data(), expected);
    assert_eq!(engine.diagnostics().bytes_written, expected.len() as u64);
    assert_eq!(engine.diagnostics().callback_count, sizes.len() as u64);
}

#[test]
fn failing_sink_still_resubmits_every_buffer() {
    let (mut engine, backend, run_loop) =
        started(FailingSink::new("broken pipe"), CaptureConfiguration::default());
    let primed = backend.submit_count();

    for _ in 0..10 {
        assert!(backend.complete_next(&[0x55; 480]));
        run_loop.dispatch_pending(&mut engine);
    }

    assert_eq!(backend.submit_count() - primed, 10);
    assert_eq!(engine.sink().attempts(), 10);
    assert_eq!(engine.diagnostics().write_errors, 10);
    assert_eq!(engine.diagnostics().resubmit_count, 10);
    assert_eq!(backend.queued(), 3);
    assert_eq!(engine.state(), CaptureState::Running);
}

#[test]
fn stop_is_idempotent() {
    let (mut engine, backend, _run_loop) = started(MemorySink::new(), CaptureConfiguration::default());

    engine.stop().unwrap();
    engine.stop().unwrap();

    assert_eq!(backend.stop_count(), 1);
    assert_eq!(backend.dispose_count(), 1);
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(engine.state(), CaptureState::Stopped);
}

#[test]
fn full_and_partial_buffers_stream_through() {
    let format = AudioFormat::new(24000, 2, 16);
    let config = CaptureConfiguration::new(format);
    assert_eq!(config.buffer_capacity, 4800);
    let (mut engine, backend, run_loop) = started(MemorySink::new(), config);

    for size in [4800usize, 4800, 2400] {
        assert!(backend.complete_next(&vec![0x11; size]));
    }
    run_loop.dispatch_pending(&mut engine);

    assert_eq!(engine.sink().data().len(), 12000);
    assert_eq!(engine.sink().write_sizes(), vec![4800, 4800, 2400]);
}

#[test]
fn start_failure_leaks_nothing() {
    let backend = MockBackend::new();
    backend.fail_start(-42);
    let run_loop = RunLoop::new();
    let mut engine = CaptureEngine::new(backend.clone(), MemorySink::new());
    engine.configure(CaptureConfiguration::default()).unwrap();

    let err = engine.start(run_loop.completion_sender()).unwrap_err();

    assert_eq!(err, CaptureError::backend(-42));
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.dispose_count(), 1);
    assert_eq!(engine.state(), CaptureState::Configured);
    assert!(!backend.calls().contains(&BackendCall::Stop));
}

#[test]
fn completions_after_stop_are_freed() {
    let (mut engine, backend, run_loop) = started(MemorySink::new(), CaptureConfiguration::default());
    let held = backend.take_next().unwrap();

    engine.stop().unwrap();
    assert_eq!(backend.live_buffers(), 1);

    engine.on_buffer_filled(held, 4);
    run_loop.dispatch_pending(&mut engine);

    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(engine.diagnostics().late_completions, 1);
    assert!(engine.sink().chunks().is_empty());
}

#[test]
fn submit_failure_at_start_leaks_nothing() {
    let backend = MockBackend::new();
    backend.reject_submissions(-9);
    let run_loop = RunLoop::new();
    let mut engine = CaptureEngine::new(backend.clone(), MemorySink::new());
    engine.configure(CaptureConfiguration::default()).unwrap();

    let err = engine.start(run_loop.completion_sender()).unwrap_err();

    assert_eq!(err, CaptureError::backend(-9));
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.dispose_count(), 1);
    assert!(!backend.is_started());
    assert_eq!(engine.state(), CaptureState::Configured);
}

#[test]
fn buffer_from_another_session_is_refused() {
    let (mut a, backend_a, run_loop_a) = started(MemorySink::new(), CaptureConfiguration::default());
    let (_b, backend_b, _run_loop_b) = started(MemorySink::new(), CaptureConfiguration::default());
    let foreign = backend_b.take_next().unwrap();

    a.on_buffer_filled(foreign, 4);
    run_loop_a.dispatch_pending(&mut a);

    assert!(a.sink().chunks().is_empty());
    assert_eq!(a.diagnostics().unknown_buffers, 1);
    assert_eq!(a.diagnostics().resubmit_count, 0);
    assert_eq!(backend_a.queued(), 3);
    assert_eq!(a.pool().in_flight_count(), 3);
    assert!(matches!(backend_a.calls().last(), Some(BackendCall::Free(_))));
}

#[test]
fn dispose_failure_still_tears_down() {
    let (mut engine, backend, _run_loop) = started(MemorySink::new(), CaptureConfiguration::default());
    assert!(backend.is_started());
    backend.fail_dispose(-5);

    let err = engine.stop().unwrap_err();

    assert_eq!(err, CaptureError::backend(-5));
    assert!(!backend.is_started());
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(engine.state(), CaptureState::Stopped);
    engine.stop().unwrap();
    assert_eq!(backend.dispose_count(), 1);
}
