#![no_main]

use hybridfuse_search::fusion::fuse_json;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks k (including 0 to exercise rejection); the rest is JSON.
    let Some((&k_byte, json)) = data.split_first() else {
        return;
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(json) else {
        return;
    };

    let k = f64::from(k_byte);
    if let Ok(fused) = fuse_json(&value, k) {
        assert!(k > 0.0);
        for pair in fused.windows(2) {
            assert!(pair[0].rrf_score >= pair[1].rrf_score);
        }
        for result in &fused {
            assert!(result.rrf_score > 0.0);
            assert!(!result.document.contains_field("rrf_score"));
        }
    }
});
