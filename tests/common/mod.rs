#![allow(dead_code)]

use songlang::interpreter::{run, run_seeded, RunOutcome, SongError};

pub fn run_ok(source: &str) -> RunOutcome {
    run(source).expect("program should succeed")
}

pub fn output_of(source: &str) -> Vec<String> {
    run_ok(source).output
}

pub fn output_seeded(source: &str, seed: u64) -> Vec<String> {
    run_seeded(source, seed)
        .expect("program should succeed")
        .output
}

pub fn error_of(source: &str) -> SongError {
    match run(source) {
        Ok(_) => panic!("program should fail: {}", source),
        Err(err) => err,
    }
}
