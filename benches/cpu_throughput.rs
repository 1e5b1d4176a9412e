use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use vcs_core::{Console, Settings};

/// 4K image running a VSYNC/WSYNC kernel with some ALU work per line.
fn kernel_image() -> Vec<u8> {
    let program: &[u8] = &[
        0xA9, 0x02, // LDA #$02
        0x85, 0x00, // STA VSYNC
        0x85, 0x02, // STA WSYNC
        0x85, 0x02, // STA WSYNC
        0x85, 0x02, // STA WSYNC
        0xA9, 0x00, // LDA #$00
        0x85, 0x00, // STA VSYNC
        0xA2, 0x00, // LDX #$00
        0x8A, // loop: TXA
        0x65, 0x80, // ADC $80
        0x85, 0x80, // STA $80
        0x85, 0x09, // STA COLUBK
        0x85, 0x02, // STA WSYNC
        0xCA, // DEX
        0xD0, 0xF4, // BNE loop
        0x4C, 0x00, 0x10, // JMP $1000
    ];
    let mut image = vec![0xEA; 4096];
    image[..program.len()].copy_from_slice(program);
    image[0xFFC] = 0x00;
    image[0xFFD] = 0x10;
    image
}

fn settings() -> Settings {
    let mut s = Settings {
        random_seed: Some(1),
        ..Settings::default()
    };
    s.audio.enabled = false;
    s
}

fn bench_frames(c: &mut Criterion) {
    let mut console = match Console::new(&kernel_image(), None, settings()) {
        Ok(c) => c,
        Err(e) => panic!("bench console: {e}"),
    };

    let mut group = c.benchmark_group("console");
    group.throughput(Throughput::Elements(1));
    group.bench_function("run_frame", |b| {
        b.iter(|| black_box(console.run_frame()));
    });
    group.finish();
}

fn bench_nops(c: &mut Criterion) {
    let image = {
        let mut image = vec![0xEA; 4096];
        // JMP $1000 at the end of the NOP sled.
        image[0xFF0..0xFF3].copy_from_slice(&[0x4C, 0x00, 0x10]);
        image[0xFFC] = 0x00;
        image[0xFFD] = 0x10;
        image
    };
    let mut console = match Console::new(&image, None, settings()) {
        Ok(c) => c,
        Err(e) => panic!("bench console: {e}"),
    };

    let mut group = c.benchmark_group("cpu");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("execute_10k_cycles", |b| {
        b.iter(|| black_box(console.execute(10_000)));
    });
    group.finish();
}

criterion_group!(benches, bench_frames, bench_nops);
criterion_main!(benches);
