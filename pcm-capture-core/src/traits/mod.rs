pub mod audio_backend;
pub mod capture_delegate;
pub mod output_sink;
