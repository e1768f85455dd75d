use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use scicam_rs::image_pipeline::raw::unpack::pack_samples;
use scicam_rs::image_pipeline::{
    BitDepth, BitUnpacker, CfaPattern, DemosaicMethod, FormatOptions, FrameBuffer, PackingOrder,
    RangePolicy, RawFormatSpec, RawFrameDecoder, SampleBuffer, demosaic,
};

fn generate_mock_codes(width: usize, height: usize, frames: usize) -> Vec<u16> {
    (0..width * height * frames)
        .map(|i| ((i % width + i / width) % 4096) as u16)
        .collect()
}

fn benchmark_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_12bit");

    for (width, height, label) in [(256, 256, "256x256"), (1280, 1024, "1280x1024")] {
        let packed = pack_samples(
            &generate_mock_codes(width, height, 1),
            BitDepth::Twelve,
            PackingOrder::Standard,
        );

        group.bench_with_input(BenchmarkId::from_parameter(label), &packed, |b, data| {
            let unpacker = BitUnpacker::new(BitDepth::Twelve, PackingOrder::Standard);
            b.iter(|| unpacker.unpack(black_box(data), 0, None));
        });
    }

    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let (width, height, frames) = (640, 480, 8);
    let packed = pack_samples(
        &generate_mock_codes(width, height, frames),
        BitDepth::Twelve,
        PackingOrder::Standard,
    );
    let spec = RawFormatSpec::from_identifier("chronos14_mono_12bit_noheader", &FormatOptions::default())
        .expect("known identifier");
    let RawFormatSpec::Packed(spec) = spec else {
        unreachable!("chronos identifiers are packed formats");
    };
    let decoder = RawFrameDecoder::new(spec, Some(width), Some(height)).expect("valid dimensions");

    c.bench_function("decode_chronos_8_frames", |b| {
        b.iter(|| decoder.decode(black_box(&packed), None, RangePolicy::Strict));
    });
}

fn benchmark_demosaic(c: &mut Criterion) {
    let mut group = c.benchmark_group("demosaic");
    let (width, height) = (640, 480);
    let frame = FrameBuffer::new(
        width,
        height,
        1,
        12,
        SampleBuffer::U16(generate_mock_codes(width, height, 1)),
    )
    .expect("valid frame");

    for method in [
        DemosaicMethod::Nearest,
        DemosaicMethod::Bilinear,
        DemosaicMethod::SmoothHue,
        DemosaicMethod::Downsample,
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(method.as_str()), &frame, |b, frame| {
            b.iter(|| demosaic(black_box(frame), CfaPattern::Grbg, method));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_unpack, benchmark_decode, benchmark_demosaic);
criterion_main!(benches);
