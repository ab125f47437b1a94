use std::io;

use anyhow::bail;
use anyhow::Result;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_serve() -> Command {
    return Command::new("serve")
        .about("Start the web server. This is the default when no subcommand is given.");
}

fn arg_with_env(key: ConfigKey, env: &'static str) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("agrichat")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .subcommand(subcommand_serve())
        .subcommand(subcommand_config())
        .subcommand(subcommand_completions())
        .arg(
            arg_with_env(ConfigKey::ConfigFile, "AGRICHAT_CONFIG_FILE")
                .short('c')
                .help(format!("Path to configuration file [default: {}]", Config::default_value(ConfigKey::ConfigFile)))
        )
        .arg(
            arg_with_env(ConfigKey::Host, "AGRICHAT_HOST")
                .help(format!("Address to listen on. [default: {}]", Config::default_value(ConfigKey::Host)))
        )
        .arg(
            arg_with_env(ConfigKey::Port, "AGRICHAT_PORT")
                .short('p')
                .help(format!("Port to listen on. [default: {}]", Config::default_value(ConfigKey::Port)))
        )
        .arg(
            arg_with_env(ConfigKey::SecretKey, "AGRICHAT_SECRET_KEY")
                .help("Secret used to sign session cookies. The built in development value must be replaced in production.")
        )
        .arg(
            arg_with_env(ConfigKey::SessionTtl, "AGRICHAT_SESSION_TTL")
                .help(format!("Seconds a sign in stays valid. [default: {}]", Config::default_value(ConfigKey::SessionTtl)))
        )
        .arg(
            arg_with_env(ConfigKey::GeminiToken, "GEMINI_API_KEY")
                .help("Google Gemini API key. Required.")
                .hide_env_values(true)
        )
        .arg(
            arg_with_env(ConfigKey::GeminiURL, "AGRICHAT_GEMINI_URL")
                .help(format!("Gemini API URL. Can be swapped to a compatible proxy. [default: {}]", Config::default_value(ConfigKey::GeminiURL)))
        )
        .arg(
            arg_with_env(ConfigKey::Model, "AGRICHAT_MODEL")
                .short('m')
                .help(format!("The Gemini model answering questions. [default: {}]", Config::default_value(ConfigKey::Model)))
        )
        .arg(
            arg_with_env(ConfigKey::FallbackModel, "AGRICHAT_FALLBACK_MODEL")
                .help(format!("Model used when the primary model fails its startup health check. [default: {}]", Config::default_value(ConfigKey::FallbackModel)))
        )
        .arg(
            arg_with_env(ConfigKey::BackendHealthCheckTimeout, "AGRICHAT_BACKEND_HEALTH_CHECK_TIMEOUT")
                .help(format!("Time to wait in milliseconds before timing out when health checking a model at startup. [default: {}]", Config::default_value(ConfigKey::BackendHealthCheckTimeout)))
        )
        .arg(
            arg_with_env(ConfigKey::GenerationTimeout, "AGRICHAT_GENERATION_TIMEOUT")
                .help(format!("Time to wait in milliseconds for the model to answer a question. [default: {}]", Config::default_value(ConfigKey::GenerationTimeout)))
        )
        .arg(
            arg_with_env(ConfigKey::LogDir, "AGRICHAT_LOG_DIR")
                .help("Directory to write JSON logs to, rotated daily. Logs go to stdout when unset.")
        );
}

/// Parses the command line. Returns the config to serve with, or `None` when
/// the command was fully handled here.
pub async fn parse() -> Result<Option<Config>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("completions", subcmd_matches)) => {
            match subcmd_matches.get_one::<Shell>("shell") {
                Some(shell) => print_completions(*shell, &mut build()),
                None => bail!("A shell is required to generate completions"),
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default_value(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_help()?;
            }
        },
        Some(("serve", subcmd_matches)) => {
            return Ok(Some(Config::load(vec![&matches, subcmd_matches]).await?));
        }
        _ => {
            return Ok(Some(Config::load(vec![&matches]).await?));
        }
    }

    return Ok(None);
}
