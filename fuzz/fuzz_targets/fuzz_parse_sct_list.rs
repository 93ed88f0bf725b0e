// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use libfuzzer_sys::fuzz_target;
use sct_issuer::{sct_list_from_bytes, SignedCertificateTimestamp};

fuzz_target!(|data: &[u8]| {
    let _ = SignedCertificateTimestamp::from_bytes(data);
    let _ = sct_list_from_bytes(data);
});
