use std::convert::Infallible;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures_util::StreamExt;
use serde_json::json;

use inference_gateway::stream::delta::extract_deltas;
use inference_gateway::stream::sse::{decode_lines, SseChunkStream};

fn sample_stream(chunks: usize) -> String {
    let mut out = String::new();
    for i in 0..chunks {
        let chunk = json!({
            "id": "chatcmpl-bench",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": format!("token-{i} ")}}]
        });
        out.push_str("data: ");
        out.push_str(&chunk.to_string());
        out.push_str("\n\n");
    }
    out.push_str("data: [DONE]\n\n");
    out
}

/// Split the body into fixed-size transport reads so lines straddle reads.
fn transport_reads(body: &str, read_size: usize) -> Vec<Result<Bytes, Infallible>> {
    body.as_bytes()
        .chunks(read_size)
        .map(|piece| Ok(Bytes::copy_from_slice(piece)))
        .collect()
}

fn bench_decode_lines(c: &mut Criterion) {
    let body = sample_stream(256);
    c.bench_function("decode_lines_256_chunks", |b| {
        b.iter(|| {
            let count = decode_lines(black_box(body.lines()))
                .filter(Result::is_ok)
                .count();
            black_box(count)
        });
    });
}

fn bench_chunk_stream(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("bench runtime");
    let body = sample_stream(256);

    for read_size in [64usize, 1024, 16 * 1024] {
        let reads = transport_reads(&body, read_size);
        c.bench_function(&format!("sse_chunk_stream_reads_{read_size}"), |b| {
            b.iter(|| {
                let reads = reads.clone();
                runtime.block_on(async {
                    let mut stream = SseChunkStream::new(futures_util::stream::iter(reads));
                    let mut fragments = 0usize;
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk.expect("chunk");
                        fragments += extract_deltas(&chunk).map_or(0, |d| d.len());
                    }
                    black_box(fragments)
                })
            });
        });
    }
}

criterion_group!(benches, bench_decode_lines, bench_chunk_stream);
criterion_main!(benches);
