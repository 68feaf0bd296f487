mod cli;
mod client;
mod completion;
mod logging;
mod markdown;
mod settings;
mod source_watcher;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use settings::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Render { input, output } => {
            cli::handle_render(input.as_deref(), &output, &settings)?;
        }
        Commands::Response { input, output } => {
            cli::handle_response(input.as_deref(), &output, &settings)?;
        }
        Commands::Ask { prompt, output } => {
            cli::handle_ask(&prompt, &output, &settings)?;
        }
        Commands::Request { prompt } => {
            cli::handle_request(&prompt, &settings)?;
        }
        Commands::Watch {
            inputs,
            out_dir,
            document,
            title,
        } => {
            cli::handle_watch(&inputs, out_dir.as_deref(), document, title, &settings)?;
        }
    }

    Ok(())
}
