use std::path::PathBuf;

use taxxat_client::ClientConfig;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub api_url: Option<String>,
    pub session_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--api-url" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    options.api_url = Some(value);
                }
                "--session-dir" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    options.session_dir = Some(PathBuf::from(value));
                }
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(options)
    }

    /// Flags win over the environment.
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(api_url) = &self.api_url {
            config = config.with_api_base_url(api_url.clone());
        }
        if let Some(session_dir) = &self.session_dir {
            config = config.with_session_dir(session_dir.clone());
        }
        config
    }
}
