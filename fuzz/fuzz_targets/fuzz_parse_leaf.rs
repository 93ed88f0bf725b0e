// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use libfuzzer_sys::fuzz_target;
use sct_issuer::MerkleTreeLeaf;

fuzz_target!(|data: &[u8]| {
    if let Ok(leaf) = MerkleTreeLeaf::from_bytes(data) {
        // Empty certificate fields parse but are rejected on encode.
        if let Ok(bytes) = leaf.to_bytes() {
            assert_eq!(bytes, data);
        }
    }
});
