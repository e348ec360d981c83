use crate::config::AppConfig;
use crate::models::PersistentState;
use crate::services::OutputStore;

/// Print the current watermark state of both pipelines.
pub fn run(config: &AppConfig) {
    println!("📊 TVS Tracker Status — {}\n", config.oracle);

    let store = OutputStore::new(config.output_dir.clone(), false);
    print_state("Primary pipeline", &store.load_state());
    println!();
    print_state("Protocol TVL pipeline", &store.load_protocol_tvl_state());
}

fn print_state(label: &str, state: &PersistentState) {
    println!("{}", label);
    if state.is_first_run() {
        println!("  No committed state yet (first run pending)");
        return;
    }
    println!(
        "  Last updated:   {} ({})",
        state.last_updated_date, state.last_updated
    );
    println!("  Protocols:      {}", state.protocol_count);
    println!("  Total TVS:      ${:.2}", state.total_tvs);
    println!("  Snapshots:      {}", state.snapshot_count);
}
