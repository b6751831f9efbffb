//! Pools built from configuration files.

use std::fs;

use ivarpool::util::config::{load_config, load_config_or_default, save_config, Config};
use ivarpool::{params, FaultPolicy, IVar, PoolBuilder, TaskPool};

#[test]
fn test_pool_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivarpool.toml");
    fs::write(
        &path,
        r#"
[pool]
num_workers = 2
max_queue_size = 8
thread_name_prefix = "cfg-worker"

[log]
level = "warn"
"#,
    )
    .unwrap();

    let config = load_config_or_default(Some(&path)).unwrap();
    assert_eq!(config.pool.max_queue_size, 8);
    assert_eq!(config.pool.fault_policy, FaultPolicy::AbortTask);

    let pool = TaskPool::new(config.pool).unwrap();
    assert_eq!(pool.num_workers(), 2);
    assert_eq!(pool.config().thread_name_prefix, "cfg-worker");

    let out: IVar<u32> = IVar::new();
    pool.spawn_core(
        |v: u32, out: IVar<u32>| async move { out.put(v * v) },
        params![12u32, out.clone()],
    )
    .unwrap();
    assert_eq!(out.get_blocking().unwrap(), 144);
}

#[test]
fn test_saved_config_builds_same_pool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.pool.num_workers = 3;
    config.pool.use_work_stealing = false;
    save_config(&path, &config).unwrap();

    let loaded = load_config(&path).unwrap();
    let pool = PoolBuilder::from_config(loaded.pool).build().unwrap();
    assert_eq!(pool.num_workers(), 3);
    assert!(!pool.config().use_work_stealing);
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[pool]\nnum_workers = \"many\"\n").unwrap();

    assert!(load_config(&path).is_err());
}
