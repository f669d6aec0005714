//! Benchmarks for ffmpeg output handling
//!
//! Covers the per-line progress parser, which runs on every status line of
//! every conversion, and argument building.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;
use vidbatch::conversion::{
    build_args, Bitrate, BitrateMode, BitrateUnit, ConversionSettings, EncodeOptions, EncoderChoice, FrameRate,
    Resolution, VideoCodec,
};
use vidbatch_av::{HwBackend, ProgressParser};

/// Banner and stream info printed before encoding starts.
const HEADER: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mov':
  Metadata:
    major_brand     : qt
    creation_time   : 2024-03-01T10:00:00.000000Z
  Duration: 01:30:00.00, start: 0.000000, bitrate: 12050 kb/s
  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p(tv, bt709), 1920x1080, 11800 kb/s, 29.97 fps
  Stream #0:1[0x2](und): Audio: aac (LC) (mp4a / 0x6134706D), 48000 Hz, stereo, fltp, 250 kb/s
Stream mapping:
  Stream #0:0 -> #0:0 (h264 (native) -> h264 (libx264))
Press [q] to stop, [?] for help";

fn status_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let secs = i * 2;
            format!(
                "frame={:5} fps= 60 q=28.0 size={:8}kB time={:02}:{:02}:{:02}.00 bitrate=4194.3kbits/s speed=2.01x",
                i * 60,
                i * 512,
                secs / 3600,
                (secs / 60) % 60,
                secs % 60
            )
        })
        .collect()
}

fn bench_progress_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("progress_parser");

    for count in [100usize, 2_700] {
        let lines = status_lines(count);
        let bytes: usize = HEADER.len() + lines.iter().map(String::len).sum::<usize>();
        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::new("full_run", count), &lines, |b, lines| {
            b.iter(|| {
                let mut parser = ProgressParser::new();
                for line in HEADER.lines() {
                    black_box(parser.feed(black_box(line)));
                }
                for line in lines {
                    black_box(parser.feed(black_box(line)));
                }
            })
        });
    }

    let line = &status_lines(1_000)[999];
    group.bench_function("single_status_line", |b| {
        let mut parser = ProgressParser::new();
        parser.feed("  Duration: 01:30:00.00, start: 0.000000, bitrate: 12050 kb/s");
        b.iter(|| black_box(parser.feed(black_box(line))))
    });

    group.bench_function("diagnostic_line", |b| {
        let mut parser = ProgressParser::new();
        b.iter(|| {
            black_box(parser.feed(black_box(
                "[h264 @ 0x55d5c1a0] error while decoding MB 12 34, bytestream -5",
            )))
        })
    });

    group.finish();
}

fn bench_build_args(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_args");
    let input = Path::new("/videos/holiday.mov");
    let output = Path::new("/converted/holiday.mp4");
    let options = EncodeOptions::default();

    let simple = ConversionSettings::default();
    group.bench_function("defaults", |b| {
        b.iter(|| {
            build_args(
                black_box(input),
                black_box(output),
                &simple,
                EncoderChoice::Software,
                &options,
            )
        })
    });

    let full = ConversionSettings {
        codec: VideoCodec::Hevc,
        resolution: Resolution::fixed(1280, 720),
        bitrate: BitrateMode::Manual(Bitrate {
            value: 4000.0,
            unit: BitrateUnit::Kbps,
        }),
        frame_rate: FrameRate::Fixed(29.97),
        use_gpu: true,
        ..Default::default()
    };
    group.bench_function("hardware_all_flags", |b| {
        b.iter(|| {
            build_args(
                black_box(input),
                black_box(output),
                &full,
                EncoderChoice::Hardware(HwBackend::Nvenc),
                &options,
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_progress_parser, bench_build_args);
criterion_main!(benches);
