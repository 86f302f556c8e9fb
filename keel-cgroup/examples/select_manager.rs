//! Show which cgroup manager this host would get
//!
//! Run with: cargo run --example select_manager -p keel-cgroup

use keel_cgroup::{CgroupConfig, ManagerFactory, MockProvider, PathSet};
use keel_core::{ServiceManager, Systemd};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let systemd = Systemd::new();
    let factory = ManagerFactory::detect(MockProvider::new(), &systemd)?;

    println!("cgroup mode: {}", factory.mode());
    println!("systemd running: {}", systemd.is_running());

    for use_systemd in [false, true] {
        let config = CgroupConfig::new().with_systemd(use_systemd);
        match factory.create(Some(&config), &PathSet::new()) {
            Ok(manager) => println!("systemd={use_systemd}: {}", manager.kind()),
            Err(e) => println!("systemd={use_systemd}: {e}"),
        }
    }

    Ok(())
}
