//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use avemu_escapecodec::{decode, encode};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_decode(c: &mut Criterion) {
    let text = r"\x02PWR ON\x0d\x0a".repeat(16);
    c.bench_function("decode_mixed_escapes", |b| {
        b.iter(|| decode(black_box(&text)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
    c.bench_function("encode_all_bytes", |b| b.iter(|| encode(black_box(&bytes))));
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
