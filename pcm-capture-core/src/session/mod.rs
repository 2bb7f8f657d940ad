pub mod engine;
pub mod run_loop;
