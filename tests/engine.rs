use plurble_cache::{
    CacheError, LogEngine, MemoryEngine, PersistEngine, Result, SledEngine, MAX_PAYLOAD,
};
use tempfile::TempDir;
use walkdir::WalkDir;

fn basic_operations<E: PersistEngine>(engine: &mut E) -> Result<()> {
    assert!(!engine.exists(1)?);
    assert_eq!(engine.read(1)?, None);

    engine.write(1, b"value1")?;
    engine.write(2, &[])?;
    assert!(engine.exists(1)?);
    assert_eq!(engine.read(1)?, Some(b"value1".to_vec()));
    assert_eq!(engine.read(2)?, Some(Vec::new()));

    // overwrite
    engine.write(1, b"value2")?;
    assert_eq!(engine.read(1)?, Some(b"value2".to_vec()));

    engine.delete(1)?;
    engine.delete(1)?;
    engine.delete(77)?;
    assert!(!engine.exists(1)?);
    assert_eq!(engine.read(1)?, None);

    engine.write_int(3, -12345)?;
    assert_eq!(engine.read_int(3)?, Some(-12345));
    assert_eq!(engine.read(3)?, Some((-12345i32).to_le_bytes().to_vec()));
    assert_eq!(engine.read_int(4)?, None);
    assert!(matches!(engine.read_int(2), Err(CacheError::Corrupt(_))));
    Ok(())
}

fn payload_limit<E: PersistEngine>(engine: &mut E) -> Result<()> {
    engine.write(5, &[7; MAX_PAYLOAD])?;
    let err = engine.write(5, &[8; MAX_PAYLOAD + 1]).unwrap_err();
    assert!(matches!(
        err,
        CacheError::PayloadTooLarge { key: 5, len, max: MAX_PAYLOAD } if len == MAX_PAYLOAD + 1
    ));
    // the previous value is untouched
    assert_eq!(engine.read(5)?, Some(vec![7; MAX_PAYLOAD]));
    Ok(())
}

#[test]
fn memory_engine_operations() -> Result<()> {
    let mut engine = MemoryEngine::new();
    basic_operations(&mut engine)?;
    payload_limit(&mut engine)?;
    assert_eq!(engine.len(), 3);
    assert_eq!(engine.bytes_used(), 4 + MAX_PAYLOAD);
    Ok(())
}

#[test]
fn log_engine_operations() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let mut engine = LogEngine::open(temp_dir.path())?;
    basic_operations(&mut engine)?;
    payload_limit(&mut engine)
}

#[test]
fn sled_engine_operations() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let mut engine = SledEngine::open(temp_dir.path())?;
    basic_operations(&mut engine)?;
    payload_limit(&mut engine)
}

// Should get previously stored value after the engine is reopened
#[test]
fn log_engine_values_survive_reopen() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let mut engine = LogEngine::open(temp_dir.path())?;
    engine.write(1, b"one")?;
    engine.write(2, b"two")?;
    engine.delete(2)?;
    drop(engine);

    let engine = LogEngine::open(temp_dir.path())?;
    assert_eq!(engine.read(1)?, Some(b"one".to_vec()));
    assert!(!engine.exists(2)?);
    Ok(())
}

#[test]
fn sled_engine_values_survive_reopen() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let mut engine = SledEngine::open(temp_dir.path())?;
    engine.write(9, b"nine")?;
    drop(engine);

    let engine = SledEngine::open(temp_dir.path())?;
    assert_eq!(engine.read(9)?, Some(b"nine".to_vec()));
    Ok(())
}

#[test]
fn log_engine_ignores_unrelated_files() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    std::fs::write(temp_dir.path().join("engine"), "log")?;
    std::fs::write(temp_dir.path().join("notes.log"), "not a log generation")?;

    let mut engine = LogEngine::open(temp_dir.path())?;
    engine.write(1, b"x")?;
    drop(engine);
    let engine = LogEngine::open(temp_dir.path())?;
    assert_eq!(engine.read(1)?, Some(b"x".to_vec()));
    Ok(())
}

#[test]
fn log_engine_compaction() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let mut engine = LogEngine::open(temp_dir.path())?;

    let dir_size = || {
        let entries = WalkDir::new(temp_dir.path()).into_iter();
        let len: walkdir::Result<u64> = entries
            .map(|res| {
                res.and_then(|entry| entry.metadata())
                    .map(|metadata| metadata.len())
            })
            .sum();
        len.expect("fail to get directory size")
    };

    let mut current_size = dir_size();
    for iter in 0..1000u32 {
        for key in 0..20u32 {
            let value = vec![(iter % 256) as u8; 200];
            engine.write(key, &value)?;
        }

        let new_size = dir_size();
        if new_size > current_size {
            current_size = new_size;
            continue;
        }
        // compaction triggered

        drop(engine);
        // reopen and check content
        let engine = LogEngine::open(temp_dir.path())?;
        for key in 0..20u32 {
            assert_eq!(engine.read(key)?, Some(vec![(iter % 256) as u8; 200]));
        }
        return Ok(());
    }

    panic!("No compaction detected");
}
