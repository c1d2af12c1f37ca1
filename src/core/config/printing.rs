use crate::core::config::data::{Config, DEFAULT_CONNECT_TIMEOUT_SECS};

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

impl Config {
    /// Print the stored values and what is in effect for `base_url`.
    pub fn print_all(&self, effective_base_url: &str) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset)"),
        }
        println!("    in effect: {effective_base_url}");
        println!("  use-query-engine: {}", on_off(self.use_query_engine()));
        println!(
            "  history-header-row: {}",
            on_off(self.history_header_row.unwrap_or(true))
        );
        match self.connect_timeout_secs {
            Some(secs) => println!("  connect-timeout-secs: {secs}"),
            None => println!("  connect-timeout-secs: (default {DEFAULT_CONNECT_TIMEOUT_SECS})"),
        }
    }
}
