//! Terminal output helpers shared by subcommands.

/// Whether `--quiet` was passed (propagated via env by main).
pub fn is_quiet() -> bool {
    std::env::var("PAGESNAP_QUIET").is_ok()
}

/// Whether `--verbose` was passed.
pub fn is_verbose() -> bool {
    std::env::var("PAGESNAP_VERBOSE").is_ok()
}
