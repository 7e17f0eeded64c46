use serde::Deserialize;

use crate::buffer::replacer::ReplacerType;
use crate::error::Result;
use crate::storage::StorageType;

/// Benchmark driver configuration, assembled from the defaults, an
/// optional config file and `BUFPOOL_*` environment variables.
#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: String,

    pub storage_type: StorageType,
    pub data_file: String,

    pub pool_size: usize,
    pub replacer: ReplacerType,
    pub replacer_k: usize,

    pub preload_pages: u64,
    pub workload: String,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("storage_type", "file")?
            .set_default("data_file", "data.dbf")?
            .set_default("pool_size", 1024)?
            .set_default("replacer", "lruk")?
            .set_default("replacer_k", 2)?
            .set_default("preload_pages", 50000)?
            .set_default("workload", "workload.txt")?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("BUFPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(StorageType::File, cfg.storage_type);
        assert_eq!(ReplacerType::LruK, cfg.replacer);
        assert_eq!(1024, cfg.pool_size);
        assert_eq!(2, cfg.replacer_k);
        assert_eq!(50000, cfg.preload_pages);
        Ok(())
    }
}
