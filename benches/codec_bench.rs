use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use plurble_cache::cache::MAX_CACHED_FRONTABLES;
use plurble_cache::{
    Frontable, FrontableCache, Group, GroupId, InboundMessage, LogEngine, MemoryEngine,
    PaletteColor, SyncHandler,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const PRONOUNS: [&str; 5] = ["he/him", "she/her", "they/them", "it/its", ""];

fn random_cache(rng: &mut SmallRng) -> FrontableCache {
    let mut cache = FrontableCache::new();
    for g in 0..8 {
        cache
            .add_group(Group::create(&format!("group {}", g), PaletteColor::from_index(rng.gen()), None))
            .unwrap();
    }
    for i in 0..MAX_CACHED_FRONTABLES as u32 {
        let name = format!("frontable {}", i);
        let pronouns = PRONOUNS[rng.gen_range(0..PRONOUNS.len())];
        let custom = i % 10 == 0;
        cache
            .add_frontable(Frontable::create(i, &name, Some(pronouns), custom, PaletteColor::from_index(rng.gen())))
            .unwrap();
        cache.add_to_group(i, GroupId(rng.gen_range(0..8))).unwrap();
    }
    for hash in 0..4 {
        cache.add_current_fronter(hash).unwrap();
    }
    cache
}

fn store_load_bench(c: &mut Criterion) {
    let mut rng = SmallRng::from_seed([0; 32]);
    let cache = random_cache(&mut rng);

    let mut group = c.benchmark_group("persist");
    group.bench_function("memory_store", |b| {
        let mut engine = MemoryEngine::new();
        b.iter(|| cache.persist_store(black_box(&mut engine)).unwrap())
    });
    group.bench_function("memory_load", |b| {
        let mut engine = MemoryEngine::new();
        cache.persist_store(&mut engine).unwrap();
        let mut loaded = FrontableCache::new();
        b.iter(|| assert!(loaded.persist_load(black_box(&engine)).unwrap()))
    });
    group.bench_function("log_store", |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                (LogEngine::open(temp_dir.path()).unwrap(), temp_dir)
            },
            |(mut engine, _temp_dir)| cache.persist_store(&mut engine).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn sync_bench(c: &mut Criterion) {
    let mut rng = SmallRng::from_seed([1; 32]);
    let names: Vec<String> = (0..256).map(|i| format!("member {}", i)).collect();
    let messages: Vec<InboundMessage> = names
        .chunks(32)
        .enumerate()
        .map(|(batch, chunk)| {
            let records: Vec<(u32, &str, &str, bool, u8)> = chunk
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let hash = (batch * 32 + i) as u32;
                    let pronouns = PRONOUNS[rng.gen_range(0..PRONOUNS.len())];
                    (hash, name.as_str(), pronouns, false, 0xC0 | rng.gen_range(0..64u8))
                })
                .collect();
            let total = if batch == 0 { Some(names.len() as u32) } else { None };
            InboundMessage::frontable_batch(total, &records)
        })
        .collect();

    c.bench_function("sync_256_frontables", |b| {
        b.iter(|| {
            let mut cache = FrontableCache::new();
            let mut handler = SyncHandler::new();
            for msg in &messages {
                handler.receive(&mut cache, black_box(msg)).unwrap();
            }
            assert!(handler.frontables_loaded());
        })
    });
}

criterion_group!(benches, store_load_bench, sync_bench);
criterion_main!(benches);
