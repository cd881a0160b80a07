//! Show the relay list.

use profile_client::ResolverConfig;

/// Run the relays command.
pub fn run(config: &ResolverConfig) {
    for (i, url) in config.relays.iter().enumerate() {
        let label = if i == 0 { "primary" } else { "fallback" };
        println!("{}. {} ({})", i + 1, url, label);
    }
    println!();
    println!(
        "Timeouts: {}s response, {}s connect",
        config.response_timeout_secs, config.connect_timeout_secs
    );
}
