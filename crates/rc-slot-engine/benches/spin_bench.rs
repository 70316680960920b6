//! Grid generation and evaluation benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rc_slot_engine::{
    GameConfig, GeneratorConfig, GridGenerator, MachineConfig, PaylineEvaluator, PaylineSet,
    SpinMachine,
};

fn bench_generate(c: &mut Criterion) {
    let generator = GridGenerator::new(GeneratorConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    for game in [GameConfig::classic_fruits(), GameConfig::jungle_wide()] {
        c.bench_function(&format!("generate_{}", game.id), |b| {
            b.iter(|| generator.generate(black_box(&game), false, 0, &mut rng))
        });
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let generator = GridGenerator::new(GeneratorConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    for game in [GameConfig::classic_fruits(), GameConfig::jungle_wide()] {
        let evaluator = PaylineEvaluator::for_game(&game, PaylineSet::for_game(&game));
        let grids: Vec<_> = (0..256)
            .map(|_| generator.generate(&game, false, 0, &mut rng).grid)
            .collect();
        let mut i = 0;

        c.bench_function(&format!("evaluate_{}", game.id), |b| {
            b.iter(|| {
                i = (i + 1) % grids.len();
                evaluator.evaluate(black_box(&grids[i]), 100)
            })
        });
    }
}

fn bench_headless_spin(c: &mut Criterion) {
    let mut machine = SpinMachine::seeded(
        GameConfig::classic_fruits(),
        MachineConfig::headless(),
        u64::MAX / 2,
        3,
    );

    c.bench_function("headless_spin", |b| {
        b.iter(|| {
            let _ = machine.request_spin();
            machine.advance(0);
            // Tier popups and summaries would block the next request
            let _ = machine.close_free_spin_popup();
            let _ = machine.close_win_popup();
            let _ = machine.close_free_spin_summary();
            machine.advance(0);
            machine.drain_events().len()
        })
    });
}

criterion_group!(benches, bench_generate, bench_evaluate, bench_headless_spin);
criterion_main!(benches);
