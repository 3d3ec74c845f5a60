use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use chatstream::stream::{LineSplitter, StreamDecoder};

fn text_transcript(frames: usize) -> String {
    let mut out = String::new();
    for i in 0..frames {
        out.push_str(&format!(
            "data: {{\"id\":\"chatcmpl-bench\",\"object\":\"chat.completion.chunk\",\"created\":1727000000,\"model\":\"gpt-4o-mini\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"token {i} \"}},\"finish_reason\":null}}]}}\n\n"
        ));
    }
    out.push_str("data: [DONE]\n\n");
    out
}

fn tool_transcript(calls: usize, fragments_per_call: usize) -> String {
    let mut out = String::new();
    for call in 0..calls {
        out.push_str(&format!(
            "data: {{\"id\":\"chatcmpl-bench\",\"model\":\"gpt-4o-mini\",\"choices\":[{{\"index\":0,\"delta\":{{\"tool_calls\":[{{\"index\":{call},\"id\":\"call_{call}\",\"type\":\"function\",\"function\":{{\"name\":\"get_weather\",\"arguments\":\"\"}}}}]}}}}]}}\n\n"
        ));
        for fragment in 0..fragments_per_call {
            out.push_str(&format!(
                "data: {{\"id\":\"chatcmpl-bench\",\"model\":\"gpt-4o-mini\",\"choices\":[{{\"index\":0,\"delta\":{{\"tool_calls\":[{{\"index\":{call},\"function\":{{\"arguments\":\"part{fragment}\"}}}}]}}}}]}}\n\n"
            ));
        }
    }
    out.push_str(
        "data: {\"id\":\"chatcmpl-bench\",\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    );
    out.push_str("data: [DONE]\n\n");
    out
}

fn decode_all(body: &[u8], chunk_size: usize) -> usize {
    let mut splitter = LineSplitter::new();
    let mut decoder = StreamDecoder::new();
    let mut lines = Vec::new();
    let mut events = 0usize;
    for chunk in body.chunks(chunk_size) {
        lines.clear();
        splitter.feed_into(chunk, &mut lines);
        for line in &lines {
            events += decoder.push_line(line).len();
        }
    }
    if let Some(tail) = splitter.finish() {
        events += decoder.push_line(&tail).len();
    }
    events += usize::from(decoder.finish().is_some());
    events
}

fn bench_decode_text(c: &mut Criterion) {
    let body = text_transcript(256);
    let mut group = c.benchmark_group("decode_text");
    group.throughput(Throughput::Bytes(body.len() as u64));
    for chunk_size in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| black_box(decode_all(black_box(body.as_bytes()), chunk_size)));
            },
        );
    }
    group.finish();
}

fn bench_decode_tool_calls(c: &mut Criterion) {
    let body = tool_transcript(4, 64);
    let mut group = c.benchmark_group("decode_tool_calls");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("4x64", |b| {
        b.iter(|| black_box(decode_all(black_box(body.as_bytes()), 1024)));
    });
    group.finish();
}

criterion_group!(benches, bench_decode_text, bench_decode_tool_calls);
criterion_main!(benches);
