mod common;
mod kernel_tests;
mod run_tests;
