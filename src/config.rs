use std::{fs::File, path::PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::api::problems::ProblemForm;

fn get_default_address() -> String {
    "127.0.0.1".into()
}

fn get_default_port() -> u16 {
    12345
}

fn get_default_database() -> String {
    "judgeboard.db".into()
}

fn get_default_api_url() -> String {
    "https://emkc.org/api/v2/piston".into()
}

fn get_default_timeout() -> u64 {
    15000
}

fn get_default_compile_timeout() -> u64 {
    10000
}

fn get_default_run_timeout() -> u64 {
    5000
}

/// Server config
#[derive(Clone, Deserialize)]
pub struct Server {
    #[serde(default = "get_default_address")]
    pub bind_address: String,
    #[serde(default = "get_default_port")]
    pub bind_port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind_address: get_default_address(),
            bind_port: get_default_port(),
        }
    }
}

/// Remote execution API config, timeouts in milliseconds
#[derive(Clone, Debug, Deserialize)]
pub struct Executor {
    #[serde(default = "get_default_api_url")]
    pub api_url: String,
    /// Total time allowed for one request to the execution API
    #[serde(default = "get_default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "get_default_compile_timeout")]
    pub compile_timeout_ms: u64,
    #[serde(default = "get_default_run_timeout")]
    pub run_timeout_ms: u64,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            api_url: get_default_api_url(),
            timeout_ms: get_default_timeout(),
            compile_timeout_ms: get_default_compile_timeout(),
            run_timeout_ms: get_default_run_timeout(),
        }
    }
}

/// An available programming language
#[derive(Clone, Debug, Deserialize)]
pub struct Language {
    /// Name used by clients
    pub name: String,
    /// Name understood by the execution API
    pub runtime: String,
    pub file_name: String,
}

/// Startup configuration
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default = "get_default_database")]
    pub database: String,
    #[serde(default)]
    pub executor: Executor,
    pub languages: Vec<Language>,
    /// Inserted into an empty database on startup
    #[serde(default)]
    pub problems: Vec<ProblemForm>,
}

impl Config {
    /// Get the config for a specified language
    pub fn get_lang(&self, lang: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.name == lang)
    }
}

#[derive(Parser)]
#[clap(about = "Contest judging service with a live leaderboard")]
pub struct Args {
    /// Path of the configuration file in JSON format
    #[clap(short, long, value_parser = parse_config)]
    pub config: Config,

    /// Whether to flush persistent data
    #[clap(short, long)]
    pub flush_data: bool,
}

fn parse_config(path: &str) -> Result<Config, std::io::Error> {
    let file = File::open(PathBuf::from(path))?;
    let config: Config = serde_json::from_reader(file)?;
    Ok(config)
}
