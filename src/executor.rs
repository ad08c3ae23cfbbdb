//! Client for the remote code execution API (Piston).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{self, Language};

/// What happened when a program was run against one input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Exited normally, with trimmed standard output
    Output(String),
    CompilationError(String),
    RuntimeError(String),
    TimeLimitExceeded,
    /// The execution API itself failed
    ApiError(String),
}

impl Outcome {
    /// Error text reported to the user, `None` on normal exit
    pub fn error(&self) -> Option<String> {
        match self {
            Outcome::Output(_) => None,
            Outcome::CompilationError(msg) => Some(format!("Compilation Error:\n{msg}")),
            Outcome::RuntimeError(msg) => Some(format!("Runtime Error:\n{msg}")),
            Outcome::TimeLimitExceeded => Some("Time Limit Exceeded".to_string()),
            Outcome::ApiError(msg) => Some(format!("API Error: {msg}")),
        }
    }

    /// Name of the failure without any program output, `None` on normal exit
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Outcome::Output(_) => None,
            Outcome::CompilationError(_) => Some("Compilation Error"),
            Outcome::RuntimeError(_) => Some("Runtime Error"),
            Outcome::TimeLimitExceeded => Some("Time Limit Exceeded"),
            Outcome::ApiError(_) => Some("API Error"),
        }
    }
}

/// Runs untrusted code somewhere else
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, language: &Language, code: &str, stdin: &str) -> Outcome;
}

#[derive(Serialize)]
struct File<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<File<'a>>,
    stdin: &'a str,
    compile_timeout: u64,
    run_timeout: u64,
    compile_memory_limit: i64,
    run_memory_limit: i64,
}

/// One stage (compile or run) of an execution
#[derive(Debug, Deserialize)]
struct Stage {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    output: String,
    code: Option<i32>,
    signal: Option<String>,
}

impl Stage {
    fn message(self) -> String {
        if !self.stderr.is_empty() {
            self.stderr
        } else {
            self.output
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    compile: Option<Stage>,
    run: Stage,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// Map a finished execution to its outcome
fn interpret(response: ExecuteResponse) -> Outcome {
    if let Some(compile) = response.compile {
        if compile.code != Some(0) {
            return Outcome::CompilationError(compile.message());
        }
    }

    let run = response.run;
    if run.code == Some(0) {
        return Outcome::Output(run.stdout.trim().to_string());
    }
    if run.signal.as_deref() == Some("SIGKILL") {
        return Outcome::TimeLimitExceeded;
    }
    let message = run.message();
    if message.is_empty() {
        Outcome::RuntimeError("Unknown error".to_string())
    } else {
        Outcome::RuntimeError(message)
    }
}

/// Executor backed by a Piston deployment
pub struct Piston {
    client: reqwest::Client,
    config: config::Executor,
}

impl Piston {
    pub fn new(config: config::Executor) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    async fn request(
        &self,
        language: &Language,
        code: &str,
        stdin: &str,
    ) -> Result<Outcome, reqwest::Error> {
        let url = format!("{}/execute", self.config.api_url.trim_end_matches('/'));
        let body = ExecuteRequest {
            language: &language.runtime,
            version: "*",
            files: vec![File {
                name: &language.file_name,
                content: code,
            }],
            stdin,
            compile_timeout: self.config.compile_timeout_ms,
            run_timeout: self.config.run_timeout_ms,
            compile_memory_limit: -1,
            run_memory_limit: -1,
        };

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiMessage>().await {
                Ok(body) => body.message,
                Err(_) => status.to_string(),
            };
            return Ok(Outcome::ApiError(message));
        }

        Ok(interpret(response.json().await?))
    }
}

#[async_trait]
impl Executor for Piston {
    async fn execute(&self, language: &Language, code: &str, stdin: &str) -> Outcome {
        match self.request(language, code, stdin).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_timeout() => {
                log::info!(target: "executor", "Execution timed out");
                Outcome::TimeLimitExceeded
            }
            Err(err) => {
                log::error!(target: "executor", "Execution API request failed: {err}");
                Outcome::ApiError(format!("Execution failed: {err}"))
            }
        }
    }
}
