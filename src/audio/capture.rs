//! Audio capture sources: the device trait, a scriptable mock, and the
//! real CPAL backend (feature `cpal-audio`).

use crate::error::{MemovoxError, Result};

/// Trait for audio capture devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
/// Sources produce 16-bit PCM at the session sample rate; normalization to
/// float32 happens in the chunk assembler.
pub trait CaptureSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and release the device.
    ///
    /// Idempotent: safe to call when not running.
    fn stop(&mut self) -> Result<()>;

    /// Read and drain whatever samples have accumulated since the last read.
    ///
    /// An empty result from a live source is normal (device still warming
    /// up); an empty result from a finite source means it is exhausted.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Whether the source ends on its own (scripted/mock sources) rather
    /// than producing samples until stopped (microphones).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Mock capture source driven by a script of reads, for testing.
#[derive(Debug, Clone, Default)]
pub struct MockCaptureSource {
    script: std::collections::VecDeque<Vec<i16>>,
    is_started: bool,
    should_fail_start: bool,
    fail_reads_after: Option<usize>,
    reads: usize,
    error_message: String,
}

impl MockCaptureSource {
    /// Create a mock source with no scripted audio.
    pub fn new() -> Self {
        Self {
            script: std::collections::VecDeque::new(),
            is_started: false,
            should_fail_start: false,
            fail_reads_after: None,
            reads: 0,
            error_message: "mock capture error".to_string(),
        }
    }

    /// Append one scripted read to the source.
    pub fn with_read(mut self, samples: Vec<i16>) -> Self {
        self.script.push_back(samples);
        self
    }

    /// Append `count` scripted reads of constant-amplitude samples.
    pub fn with_constant_reads(mut self, count: usize, len: usize, amplitude: i16) -> Self {
        for _ in 0..count {
            self.script.push_back(vec![amplitude; len]);
        }
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail every read after the first `n` succeed.
    pub fn with_read_failure_after(mut self, n: usize) -> Self {
        self.fail_reads_after = Some(n);
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl CaptureSource for MockCaptureSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(MemovoxError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if let Some(limit) = self.fail_reads_after {
            if self.reads >= limit {
                return Err(MemovoxError::AudioCapture {
                    message: self.error_message.clone(),
                });
            }
        }
        self.reads += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }

    fn is_finite(&self) -> bool {
        true
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_backend::{list_devices, CpalCaptureSource};

#[cfg(feature = "cpal-audio")]
mod cpal_backend {
    use super::CaptureSource;
    use crate::defaults;
    use crate::error::{MemovoxError, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};

    /// Run a closure with stderr temporarily redirected to /dev/null.
    ///
    /// Suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers when
    /// probing audio backends. The messages are harmless but confusing.
    ///
    /// # Safety
    /// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
    /// Safe as long as no other thread is concurrently manipulating fd 2.
    #[cfg(unix)]
    fn with_suppressed_stderr<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        unsafe {
            let saved_fd = libc::dup(2);
            let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
            if saved_fd >= 0 && devnull >= 0 {
                libc::dup2(devnull, 2);
                libc::close(devnull);
            }

            let result = f();

            if saved_fd >= 0 {
                libc::dup2(saved_fd, 2);
                libc::close(saved_fd);
            }

            result
        }
    }

    #[cfg(not(unix))]
    fn with_suppressed_stderr<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        f()
    }

    /// Device name patterns to filter out (not useful for voice input).
    const FILTERED_PATTERNS: &[&str] = &[
        "surround", "front:", "rear:", "center:", "side:", "HDMI", "S/PDIF",
    ];

    fn should_filter_device(name: &str) -> bool {
        let lower = name.to_lowercase();
        FILTERED_PATTERNS
            .iter()
            .any(|pattern| lower.contains(&pattern.to_lowercase()))
    }

    /// List available audio input devices, filtering obviously unusable ones
    /// (surround channels, HDMI outputs).
    pub fn list_devices() -> Result<Vec<String>> {
        let (host, devices) = with_suppressed_stderr(|| {
            let host = cpal::default_host();
            let devices = host.input_devices();
            (host, devices)
        });
        let _ = host; // keep host alive while iterating devices
        let devices = devices.map_err(|e| MemovoxError::AudioCapture {
            message: format!("Failed to enumerate input devices: {}", e),
        })?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                if !should_filter_device(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Wrapper for cpal::Stream to make it Send.
    ///
    /// SAFETY: the stream is only accessed through the Mutex in
    /// CpalCaptureSource, guaranteeing exclusive single-threaded access.
    struct SendableStream(cpal::Stream);

    unsafe impl Send for SendableStream {}

    /// Real capture source backed by CPAL.
    ///
    /// Captures 16-bit PCM at 16kHz mono. Tries the preferred format first
    /// (i16/16kHz/mono), then f32/16kHz/mono, then the device's native
    /// config with software conversion (channel mixing + resampling).
    pub struct CpalCaptureSource {
        device: cpal::Device,
        stream: Arc<Mutex<Option<SendableStream>>>,
        buffer: Arc<Mutex<Vec<i16>>>,
        sample_rate: u32,
    }

    impl CpalCaptureSource {
        /// Create a capture source for the named device, or the default
        /// input device if `device_name` is None.
        pub fn new(device_name: Option<&str>) -> Result<Self> {
            let device = with_suppressed_stderr(|| {
                let host = cpal::default_host();

                if let Some(name) = device_name {
                    let devices =
                        host.input_devices()
                            .map_err(|e| MemovoxError::AudioCapture {
                                message: format!("Failed to enumerate devices: {}", e),
                            })?;

                    for dev in devices {
                        if let Ok(dev_name) = dev.name() {
                            if dev_name == name {
                                return Ok(dev);
                            }
                        }
                    }

                    Err(MemovoxError::AudioDeviceNotFound {
                        device: name.to_string(),
                    })
                } else {
                    host.default_input_device()
                        .ok_or_else(|| MemovoxError::AudioDeviceNotFound {
                            device: "default".to_string(),
                        })
                }
            })?;

            Ok(Self {
                device,
                stream: Arc::new(Mutex::new(None)),
                buffer: Arc::new(Mutex::new(Vec::new())),
                sample_rate: defaults::SAMPLE_RATE,
            })
        }

        /// Build the stream, preferring i16/16kHz/mono, then f32/16kHz/mono,
        /// then the native config with software conversion.
        fn build_stream(&self) -> Result<cpal::Stream> {
            let preferred_config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(self.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_callback = |err| {
                tracing::warn!("audio stream error: {}", err);
            };

            let buffer = Arc::clone(&self.buffer);
            if let Ok(stream) = self.device.build_input_stream(
                &preferred_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                err_callback,
                None,
            ) {
                return Ok(stream);
            }

            let buffer = Arc::clone(&self.buffer);
            if let Ok(stream) = self.device.build_input_stream(
                &preferred_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                        );
                    }
                },
                err_callback,
                None,
            ) {
                return Ok(stream);
            }

            self.build_stream_native()
        }

        /// Build a stream at the device's native config, mixing channels to
        /// mono and resampling to 16kHz in software.
        fn build_stream_native(&self) -> Result<cpal::Stream> {
            use cpal::SampleFormat;

            let default_config =
                self.device
                    .default_input_config()
                    .map_err(|e| MemovoxError::AudioCapture {
                        message: format!("Failed to query default input config: {}", e),
                    })?;

            let native_rate = default_config.sample_rate().0;
            let native_channels = default_config.channels() as usize;
            let target_rate = self.sample_rate;
            let stream_config: cpal::StreamConfig = default_config.clone().into();

            tracing::info!(
                "using native audio format ({}ch/{}Hz/{:?}), converting in software",
                native_channels,
                native_rate,
                default_config.sample_format(),
            );

            let err_callback = |err| {
                tracing::warn!("audio stream error: {}", err);
            };

            let buffer = Arc::clone(&self.buffer);

            match default_config.sample_format() {
                SampleFormat::I16 => self
                    .device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let converted = crate::audio::wav::to_mono_at_rate(
                                data,
                                native_channels,
                                native_rate,
                                target_rate,
                            );
                            if let Ok(mut buf) = buffer.lock() {
                                buf.extend_from_slice(&converted);
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| MemovoxError::AudioCapture {
                        message: format!("Failed to build native i16 stream: {}", e),
                    }),
                SampleFormat::F32 => self
                    .device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let i16_data: Vec<i16> = data
                                .iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                                .collect();
                            let converted = crate::audio::wav::to_mono_at_rate(
                                &i16_data,
                                native_channels,
                                native_rate,
                                target_rate,
                            );
                            if let Ok(mut buf) = buffer.lock() {
                                buf.extend_from_slice(&converted);
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| MemovoxError::AudioCapture {
                        message: format!("Failed to build native f32 stream: {}", e),
                    }),
                fmt => Err(MemovoxError::AudioCapture {
                    message: format!("Unsupported native sample format: {:?}", fmt),
                }),
            }
        }
    }

    impl CaptureSource for CpalCaptureSource {
        fn start(&mut self) -> Result<()> {
            {
                let stream_guard =
                    self.stream
                        .lock()
                        .map_err(|e| MemovoxError::AudioCapture {
                            message: format!("Failed to lock stream: {}", e),
                        })?;
                if stream_guard.is_some() {
                    return Ok(()); // Already started
                }
            }

            let stream = self.build_stream()?;
            stream.play().map_err(|e| MemovoxError::AudioCapture {
                message: format!("Failed to start audio stream: {}", e),
            })?;

            let mut stream_guard = self
                .stream
                .lock()
                .map_err(|e| MemovoxError::AudioCapture {
                    message: format!("Failed to lock stream: {}", e),
                })?;
            *stream_guard = Some(SendableStream(stream));
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            let mut stream_guard = self
                .stream
                .lock()
                .map_err(|e| MemovoxError::AudioCapture {
                    message: format!("Failed to lock stream: {}", e),
                })?;

            if let Some(sendable_stream) = stream_guard.take() {
                sendable_stream
                    .0
                    .pause()
                    .map_err(|e| MemovoxError::AudioCapture {
                        message: format!("Failed to stop audio stream: {}", e),
                    })?;
            }
            Ok(())
        }

        fn read_samples(&mut self) -> Result<Vec<i16>> {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|e| MemovoxError::AudioCapture {
                    message: format!("Failed to lock audio buffer: {}", e),
                })?;

            Ok(std::mem::take(&mut *buffer))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_replays_script_in_order() {
        let mut source = MockCaptureSource::new()
            .with_read(vec![1, 2, 3])
            .with_read(vec![4, 5]);

        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![1, 2, 3]);
        assert_eq!(source.read_samples().unwrap(), vec![4, 5]);
        // Exhausted script yields empty reads
        assert_eq!(source.read_samples().unwrap(), Vec::<i16>::new());
    }

    #[test]
    fn test_mock_source_constant_reads() {
        let mut source = MockCaptureSource::new().with_constant_reads(3, 160, 2000);
        for _ in 0..3 {
            let samples = source.read_samples().unwrap();
            assert_eq!(samples.len(), 160);
            assert!(samples.iter().all(|&s| s == 2000));
        }
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_mock_source_start_failure() {
        let mut source = MockCaptureSource::new()
            .with_start_failure()
            .with_error_message("device busy");

        match source.start() {
            Err(MemovoxError::AudioCapture { message }) => assert_eq!(message, "device busy"),
            _ => panic!("Expected AudioCapture error"),
        }
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_source_read_failure_after_n() {
        let mut source = MockCaptureSource::new()
            .with_read(vec![1])
            .with_read(vec![2])
            .with_read_failure_after(2);

        assert!(source.read_samples().is_ok());
        assert!(source.read_samples().is_ok());
        assert!(source.read_samples().is_err());
        // Failure persists
        assert!(source.read_samples().is_err());
    }

    #[test]
    fn test_mock_source_stop_is_idempotent() {
        let mut source = MockCaptureSource::new();
        source.start().unwrap();
        assert!(source.stop().is_ok());
        assert!(source.stop().is_ok());
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_source_is_finite() {
        let source = MockCaptureSource::new();
        assert!(source.is_finite());
    }

    #[test]
    fn test_capture_source_trait_is_object_safe() {
        let mut source: Box<dyn CaptureSource> =
            Box::new(MockCaptureSource::new().with_read(vec![7, 8, 9]));

        assert!(source.start().is_ok());
        assert_eq!(source.read_samples().unwrap(), vec![7, 8, 9]);
        assert!(source.stop().is_ok());
    }
}
