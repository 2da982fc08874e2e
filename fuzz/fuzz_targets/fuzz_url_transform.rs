#![no_main]

use libfuzzer_sys::fuzz_target;

use chitin::{PolicyConfig, UrlKind, UrlPolicy};

fuzz_target!(|data: &str| {
    // Fuzz the URL policy engine with arbitrary strings.
    // This must never panic regardless of input.
    let config = PolicyConfig {
        allowed_link_prefixes: vec!["*".to_string()],
        allowed_image_prefixes: vec!["*".to_string()],
        ..Default::default()
    };
    let policy = UrlPolicy::new(&config);

    // Even under the wildcard, blocked protocols must never be admitted.
    if let Some(admitted) = policy.transform(data, UrlKind::Link) {
        let lower = admitted.to_ascii_lowercase();
        assert!(!lower.starts_with("javascript:"));
        assert!(!lower.starts_with("vbscript:"));
        assert!(!lower.starts_with("file:"));
        assert!(!lower.starts_with("data:"));
    }

    let _ = policy.transform(data, UrlKind::Image);
    let _ = policy.sanitize_url(data, UrlKind::Link);

    // Also cover the restrictive-prefix code path.
    let strict = PolicyConfig {
        allowed_link_prefixes: vec!["https://github.com/".to_string()],
        default_origin: Some("https://example.com".to_string()),
        ..Default::default()
    };
    let strict_policy = UrlPolicy::new(&strict);
    if let Some(admitted) = strict_policy.transform(data, UrlKind::Link) {
        // Web URLs admitted by the strict policy stay on the allowed prefix
        // or the relative form of it.
        if admitted.starts_with("https://") {
            assert!(admitted.starts_with("https://github.com/"));
        }
    }
});
