pub mod stream_sink;
