use crate::{errors::ConfigError, services::migrator::MigrateOptions};
use clap::{Parser, Subcommand};
use std::{env, fmt, path::PathBuf};

const DEFAULT_V1_URL: &str = "http://localhost:8087";
const DEFAULT_V1_USER: &str = "admin";
const DEFAULT_V1_PASSWORD: &str = "changeit";
const DEFAULT_V2_URL: &str = "http://localhost:9999";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub target: TargetSettings,
    pub trace: bool,
}

/// Connection settings for the v1 source.
#[derive(Clone)]
pub struct SourceConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    /// Snapshot file to read instead of querying the source.
    pub meta_dump_file: Option<PathBuf>,
}

/// Target settings as given; token and org are checked by [`TargetSettings::require`].
#[derive(Clone)]
pub struct TargetSettings {
    pub url: String,
    pub token: Option<String>,
    pub org: Option<String>,
}

/// Validated connection settings for the v2 target.
#[derive(Clone)]
pub struct TargetConfig {
    pub url: String,
    pub token: String,
    pub org: String,
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Migrate {
        dry_run: bool,
        options: MigrateOptions,
    },
    DeleteBuckets {
        names: Vec<String>,
    },
    DeleteAuthorizations,
    SetPassword {
        users_file: PathBuf,
        default_password: Option<String>,
    },
    Dump {
        output: PathBuf,
    },
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Migrates InfluxDB v1 metadata into InfluxDB v2")]
pub struct Args {
    /// Source base URL (overrides V1_INFLUX_URL)
    #[arg(long, global = true)]
    pub v1_url: Option<String>,

    /// Source user (overrides V1_INFLUX_USER)
    #[arg(long, global = true)]
    pub v1_user: Option<String>,

    /// Source password (overrides V1_INFLUX_PASSWORD)
    #[arg(long, global = true)]
    pub v1_password: Option<String>,

    /// Snapshot file to read v1 metadata from (overrides V1_META_DUMP_FILE)
    #[arg(long, global = true)]
    pub v1_meta: Option<PathBuf>,

    /// Target base URL (overrides INFLUX_URL)
    #[arg(long, global = true)]
    pub v2_url: Option<String>,

    /// Target token (overrides INFLUX_TOKEN)
    #[arg(long, global = true)]
    pub v2_token: Option<String>,

    /// Target organization name (overrides INFLUX_ORG)
    #[arg(long, global = true)]
    pub v2_org: Option<String>,

    /// Turn on trace logging (or set TRACE=true)
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create buckets, DBRP mappings and legacy authorizations (default)
    Migrate(MigrateArgs),
    /// Delete buckets by name, or those migrated from the source policies
    DeleteBuckets {
        /// Bucket names; when empty the names derive from the source
        names: Vec<String>,
    },
    /// Delete the legacy authorizations of the source users
    DeleteAuthorizations,
    /// Set passwords of migrated users from a users file
    SetPassword {
        /// Users file (overrides USERS_FILE)
        #[arg(long)]
        users_file: Option<PathBuf>,

        /// Password for entries without one (overrides DEFAULT_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },
    /// Write the source metadata to a snapshot file
    Dump {
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Plan against an in-memory copy of the target without writing to it
    #[arg(long)]
    pub dry_run: bool,

    /// Write the pairing results to this JSON file
    #[arg(long)]
    pub report_file: Option<PathBuf>,

    /// Write created authorizations to this JSON file
    #[arg(long)]
    pub users_file: Option<PathBuf>,

    /// Put a random password for every created authorization into the users file
    #[arg(long, requires = "users_file")]
    pub generate_passwords: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the task to run.
    pub fn from_env_and_args() -> Result<(Self, Task), ConfigError> {
        Self::from_args(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge parsed arguments with an environment lookup. CLI wins over
    /// environment, environment over defaults. Empty values count as unset.
    pub fn from_args<F>(args: Args, lookup: F) -> Result<(Self, Task), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let trace = args.trace
            || match var("TRACE") {
                Some(value) => parse_flag("TRACE", &value)?,
                None => false,
            };

        let cfg = Self {
            source: SourceConfig {
                url: args
                    .v1_url
                    .or_else(|| var("V1_INFLUX_URL"))
                    .unwrap_or_else(|| DEFAULT_V1_URL.into()),
                user: args
                    .v1_user
                    .or_else(|| var("V1_INFLUX_USER"))
                    .unwrap_or_else(|| DEFAULT_V1_USER.into()),
                password: args
                    .v1_password
                    .or_else(|| var("V1_INFLUX_PASSWORD"))
                    .unwrap_or_else(|| DEFAULT_V1_PASSWORD.into()),
                meta_dump_file: args
                    .v1_meta
                    .or_else(|| var("V1_META_DUMP_FILE").map(PathBuf::from)),
            },
            target: TargetSettings {
                url: args
                    .v2_url
                    .or_else(|| var("INFLUX_URL"))
                    .unwrap_or_else(|| DEFAULT_V2_URL.into()),
                token: args.v2_token.or_else(|| var("INFLUX_TOKEN")),
                org: args.v2_org.or_else(|| var("INFLUX_ORG")),
            },
            trace,
        };

        let task = match args.command.unwrap_or(Command::Migrate(MigrateArgs::default())) {
            Command::Migrate(m) => Task::Migrate {
                dry_run: m.dry_run,
                options: MigrateOptions {
                    report_file: m.report_file,
                    users_file: m.users_file,
                    generate_passwords: m.generate_passwords,
                },
            },
            Command::DeleteBuckets { names } => Task::DeleteBuckets { names },
            Command::DeleteAuthorizations => Task::DeleteAuthorizations,
            Command::SetPassword {
                users_file,
                password,
            } => Task::SetPassword {
                users_file: users_file
                    .or_else(|| var("USERS_FILE").map(PathBuf::from))
                    .ok_or(ConfigError::Missing {
                        option: "users-file",
                        env: "USERS_FILE",
                    })?,
                default_password: password.or_else(|| var("DEFAULT_PASSWORD")),
            },
            Command::Dump { output } => Task::Dump { output },
        };

        Ok((cfg, task))
    }
}

impl TargetSettings {
    /// Check that everything needed to talk to the target is present.
    pub fn require(&self) -> Result<TargetConfig, ConfigError> {
        let token = self.token.clone().ok_or(ConfigError::Missing {
            option: "v2-token",
            env: "INFLUX_TOKEN",
        })?;
        let org = self.org.clone().ok_or(ConfigError::Missing {
            option: "v2-org",
            env: "INFLUX_ORG",
        })?;
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                option: "v2-url",
                value: self.url.clone(),
                reason: "expected an http:// or https:// URL".into(),
            });
        }
        Ok(TargetConfig {
            url: self.url.clone(),
            token,
            org,
        })
    }
}

fn parse_flag(option: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            option,
            value: value.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "***" }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("trace", &self.trace)
            .finish()
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("meta_dump_file", &self.meta_dump_file)
            .finish()
    }
}

impl fmt::Debug for TargetSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSettings")
            .field("url", &self.url)
            .field("token", &self.token.as_deref().map(redact))
            .field("org", &self.org)
            .finish()
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("url", &self.url)
            .field("token", &redact(&self.token))
            .field("org", &self.org)
            .finish()
    }
}
