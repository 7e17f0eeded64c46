use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use log::info;

use bufpool::buffer::bufferpool::AccessMode;
use bufpool::buffer::bufferpool::BufferPool;
use bufpool::config::Config;
use bufpool::error::Error;
use bufpool::error::Result;
use bufpool::storage::new_storage;
use bufpool::storage::PageId;

fn main() -> Result<()> {
    let args = clap::command!()
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .help("Configuration file path for the benchmark")
                .default_value("config/bufpool.yaml"),
        )
        .get_matches();
    let cfg = Config::new(args.get_one::<String>("config").unwrap().as_ref())?;
    env_logger::Builder::new().parse_filters(&cfg.log_level).init();

    let storage = new_storage(cfg.storage_type, Path::new(&cfg.data_file))?;
    let mut pool = BufferPool::new(storage, cfg.replacer, cfg.pool_size, cfg.replacer_k);

    info!("preloading {} pages into {}", cfg.preload_pages, cfg.data_file);
    for _ in 0..cfg.preload_pages {
        pool.allocate_page()?;
    }

    info!("replaying workload {}", cfg.workload);
    let workload = File::open(&cfg.workload)?;
    let mut requests = 0u64;
    let start = Instant::now();
    for line in BufReader::new(workload).lines() {
        let (page_id, mode) = parse_request(&line?)?;
        pool.fix(page_id, mode)?;
        requests += 1;
    }
    let elapsed = start.elapsed();

    println!("requests:    {}", requests);
    println!("hit count:   {}", pool.hit_count());
    println!("read bytes:  {}", pool.read_bytes());
    println!("write bytes: {}", pool.write_bytes());
    println!("free frames: {}", pool.free_frames());
    println!("elapsed:     {:.3}s", elapsed.as_secs_f64());

    pool.shutdown()
}

/// One workload line is `<mode>,<pageID>`; mode 0 is a read, anything
/// else a write.
fn parse_request(line: &str) -> Result<(PageId, AccessMode)> {
    let (mode, page_id) = line
        .trim()
        .split_once(',')
        .ok_or_else(|| Error::Internal(format!("malformed workload line {:?}", line)))?;
    let page_id = page_id
        .trim()
        .parse()
        .map_err(|_| Error::Internal(format!("malformed page id in workload line {:?}", line)))?;
    let mode = if mode.trim() == "0" { AccessMode::Read } else { AccessMode::Write };
    Ok((page_id, mode))
}
