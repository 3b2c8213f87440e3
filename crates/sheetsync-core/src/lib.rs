//! sheetsync-core: configuration and logging bootstrap shared by the
//! sheet synchronization crates.

pub mod config;
pub mod logging;

/// Crate identity label.
pub fn crate_label() -> &'static str {
    "sheetsync-core"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "sheetsync-core");
    }

    #[test]
    fn modules_are_accessible() {
        let _ = config::Config::default();
        let _ = config::LoggingConfig::default();
    }
}
