#![no_main]

use libfuzzer_sys::fuzz_target;
use vatio::filter::IgnoreFilter;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // First line is the pattern list, the rest is a source path to test
        let (patterns, path) = input.split_once('\n').unwrap_or((input, ""));
        if let Ok(filter) = IgnoreFilter::from_patterns(patterns.split(',')) {
            let _ = filter.should_ignore(path);
        }
    }
});
