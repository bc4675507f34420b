#![no_main]

use arbitrary::Arbitrary;
use flocate::query::{MatchOptions, PathMatcher};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    pattern: &'a str,
    path: &'a str,
    ignore_case: bool,
    basename: bool,
    literal_substring: bool,
}

fuzz_target!(|input: Input| {
    // Compiling and matching must never panic, whatever the pattern and path
    let options = MatchOptions {
        ignore_case: input.ignore_case,
        basename: input.basename,
        regex: false,
        literal_substring: input.literal_substring,
    };
    if let Ok(matcher) = PathMatcher::new(input.pattern, &options) {
        let _ = matcher.is_match(input.path);
    }
});
