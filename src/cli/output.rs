use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputFormat::Human)
    }

    /// Print `payload` as pretty JSON or YAML. Human output is the
    /// caller's job; this is a no-op for it.
    pub fn emit<T: Serialize>(&self, payload: &T) -> Result<()> {
        match self {
            OutputFormat::Human => {}
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
            OutputFormat::Yaml => println!("{}", serde_yaml::to_string(payload)?),
        }
        Ok(())
    }
}
