use clap::Parser;

/// Process flags. Each one can also come from the environment.
#[derive(Debug, Parser, Clone)]
#[command(name = "schoold", version, about = "School management sidecar speaking JSON lines over stdio")]
pub struct Config {
    /// Default level for this crate's logs when RUST_LOG is unset.
    #[arg(long, env = "SCHOOLD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Load the demo teachers, courses, students and payments at startup.
    #[arg(long, env = "SCHOOLD_SEED_SAMPLE", default_value_t = false)]
    pub seed_sample: bool,
}
