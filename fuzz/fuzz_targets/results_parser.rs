#![no_main]

use libfuzzer_sys::fuzz_target;
use vatio::compare::compare;
use vatio::results::ProfileResults;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(results) = ProfileResults::from_json(input, "fuzz") {
            // Anything that parses must compare and re-serialize cleanly
            let _ = compare(&results, &results);
            let _ = results.to_json();
        }
    }
});
