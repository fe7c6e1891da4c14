use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "churn-etl")]
#[command(about = "Batch churn prediction: validate, infer, label, summarize and persist a CSV upload")]
pub struct CliArgs {
    /// Path to the configuration file (TOML, or JSON when it ends in .json)
    #[arg(short, long, default_value = "churn-config.toml")]
    pub config: String,

    /// CSV file to score
    #[arg(short, long)]
    pub input: String,

    /// Field delimiter of the input file
    #[arg(long, default_value = ",")]
    pub delimiter: char,

    /// Override the configured sink (bigquery or csv)
    #[arg(long)]
    pub sink: Option<String>,

    /// Validate configuration and input without calling remote services
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_args() {
        let args = CliArgs::parse_from(["churn-etl", "--input", "customers.csv"]);
        assert_eq!(args.config, "churn-config.toml");
        assert_eq!(args.delimiter, ',');
        assert!(!args.dry_run);
        assert!(args.sink.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let args = CliArgs::parse_from([
            "churn-etl",
            "-c",
            "config.json",
            "-i",
            "customers.tsv",
            "--delimiter",
            ";",
            "--sink",
            "csv",
            "--dry-run",
            "-v",
        ]);
        assert_eq!(args.config, "config.json");
        assert_eq!(args.delimiter, ';');
        assert_eq!(args.sink.as_deref(), Some("csv"));
        assert!(args.dry_run);
        assert!(args.verbose);
    }
}
