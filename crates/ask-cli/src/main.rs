//! `ask`: one question, one streamed answer.

use std::process::ExitCode;

use ask_harness::config::{API_ENDPOINT, API_KEY_ENV_VAR, MODEL};
use ask_harness::{
    AskConfig, Diagnostics, EXIT_FAILURE, Question, SYSTEM_PROMPT, init_observability, report, run,
};
use clap::{CommandFactory as _, FromArgMatches as _, Parser};

#[derive(Debug, Parser)]
#[command(name = "ask", version)]
struct Cli {
    #[arg(
        required = true,
        num_args = 1..,
        value_name = "QUESTION",
        help = "The question to ask the LLM."
    )]
    question: Vec<String>,
}

fn command() -> clap::Command {
    Cli::command().about(format!(
        "Ask a question to the LLM ({MODEL} model via {API_ENDPOINT}). Requires {API_KEY_ENV_VAR} env var."
    ))
}

fn parse_cli() -> Result<Cli, clap::Error> {
    let matches = command().try_get_matches()?;
    Cli::from_arg_matches(&matches)
}

/// Help and version go to stdout with status 0; real usage errors exit 1.
fn exit_for_clap(err: &clap::Error) -> ExitCode {
    let _ = err.print();
    if err.use_stderr() {
        ExitCode::from(EXIT_FAILURE)
    } else {
        ExitCode::SUCCESS
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_observability();

    let cli = match parse_cli() {
        Ok(cli) => cli,
        Err(err) => return exit_for_clap(&err),
    };

    let config = match AskConfig::from_env() {
        Ok(config) => config,
        Err(err) => return ExitCode::from(report(&err, &mut Diagnostics::stderr())),
    };

    let question = match Question::from_words(cli.question) {
        Ok(question) => question,
        Err(err) => {
            let usage = command().error(clap::error::ErrorKind::ValueValidation, err);
            let _ = usage.print();
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    ExitCode::from(run(config, SYSTEM_PROMPT, question).await)
}
