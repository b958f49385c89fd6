use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "inviterole", about = "Grant guild roles based on the invite a member joined with")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/inviterole.toml")]
    pub config: String,

    /// Load environment overrides from this dotenv file instead of ./.env
    #[arg(long)]
    pub env_file: Option<String>,
}
