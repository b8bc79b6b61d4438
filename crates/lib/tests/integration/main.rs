mod common;

mod bundle_tests;
mod scheduler_tests;
