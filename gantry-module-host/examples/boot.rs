//! Minimal console host: reconcile, load, invoke.
//!
//! Usage: boot <root-dir> [module] [service] [method]

use gantry_module_host::{init_tracing, Bootstrap, EntryPoint, InstallLayout, ProcessShell};

fn main() {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| ".".to_string());
    let module = args.next().unwrap_or_else(|| "inspector".to_string());
    let service = args
        .next()
        .unwrap_or_else(|| "demo.inspector.Overlay".to_string());
    let method = args.next().unwrap_or_else(|| "create_instance".to_string());

    let entry = EntryPoint::static_niladic(module, service, method);
    let mut bootstrap = match Bootstrap::new(InstallLayout::new(root), entry, ProcessShell) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to initialize module host: {}", e);
            std::process::exit(1);
        }
    };

    bootstrap.early_load();
    if let Some(result) = bootstrap.main_load() {
        println!("{:?}", result);
    }
}
