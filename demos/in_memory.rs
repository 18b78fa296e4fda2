//! A minimal, runnable example wiring an in-memory `Vec<RawRecord>` source
//! to the engine. Not a CLI — concrete stream drivers (CSV, CLI argument
//! parsing, synthetic generators) are external collaborators, out of scope
//! for this crate. Run with `cargo run --example in_memory`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use castle_core::driver::run_to_completion;
use castle_core::{Castle, Parameters, RawRecord};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn record(pid: u32, age: f64, disease: &'static str) -> RawRecord<u32, &'static str> {
    let mut quasi = HashMap::new();
    quasi.insert("age".to_string(), age);
    RawRecord::new(pid, disease, quasi, ())
}

fn main() {
    env_logger::init();

    let headers = vec!["age".to_string()];
    let params = Parameters {
        k: 3,
        delta: 3,
        beta: 4,
        l: 2,
        dp: false,
        ..Parameters::default()
    };

    let released = Arc::new(Mutex::new(Vec::new()));
    let released_sink = Arc::clone(&released);

    let mut castle = Castle::new(
        headers,
        "disease",
        params,
        ChaCha8Rng::seed_from_u64(42),
        move |generalized| released_sink.lock().unwrap().push(generalized),
    )
    .expect("valid configuration");

    let records = vec![
        record(1, 24.0, "flu"),
        record(2, 31.0, "cold"),
        record(3, 29.0, "flu"),
        record(4, 40.0, "cold"),
        record(5, 22.0, "flu"),
    ];

    let mut source = records.into_iter();
    let admitted = run_to_completion(&mut castle, &mut source).expect("no malformed records");

    println!("admitted {admitted} records");
    for generalized in released.lock().unwrap().iter() {
        let age = &generalized.quasi["age"];
        println!(
            "released pid={:?} sensitive={:?} age=[{:.1}, {:.1}] (specific {:.1})",
            generalized.pid, generalized.sensitive, age.lower, age.upper, age.specific
        );
    }
}
