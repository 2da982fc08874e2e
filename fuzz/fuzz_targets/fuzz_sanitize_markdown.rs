#![no_main]

use libfuzzer_sys::fuzz_target;

use chitin::{MarkdownSanitizer, PolicyConfig};

fuzz_target!(|data: &str| {
    // The full pipeline must never panic on arbitrary input, and its output
    // must itself be sanitizable without panicking.
    let config = PolicyConfig {
        allowed_link_prefixes: vec!["*".to_string()],
        allowed_image_prefixes: vec!["*".to_string()],
        max_content_length: 16 * 1024,
        ..Default::default()
    };
    let sanitizer = MarkdownSanitizer::new(config).expect("wildcard config is valid");

    let output = sanitizer.sanitize(data);
    let _ = sanitizer.sanitize(&output);

    // The restrictive configuration takes different branches; cover it too.
    let strict = PolicyConfig {
        allowed_link_prefixes: vec!["https://github.com/".to_string()],
        allowed_image_prefixes: vec!["https://images.com/".to_string()],
        default_origin: Some("https://example.com".to_string()),
        max_content_length: 16 * 1024,
        ..Default::default()
    };
    let strict_sanitizer = MarkdownSanitizer::new(strict).expect("config is valid");
    let _ = strict_sanitizer.sanitize(data);
});
