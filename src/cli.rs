//! CLI entry point and command definitions.

use crate::client::CompletionClient;
use crate::completion::{fallback_reply, GenerateRequest, GenerateResponse, ResponseMode};
use crate::markdown;
use crate::settings::Settings;
use crate::source_watcher::SourceWatcher;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use serde_json::Value;
use tracing::{info, warn};

/// Markdown Reply - render AI replies to HTML.
#[derive(Parser)]
#[command(name = "markdown-reply")]
#[command(version = "0.1.0")]
#[command(about = "Render AI replies written in a small markdown subset to HTML")]
pub struct Cli {
    /// Path to a JSON settings file
    #[arg(long, global = true, env = "MARKDOWN_REPLY_CONFIG")]
    pub config: Option<PathBuf>,
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a markdown reply to HTML
    Render {
        /// Markdown file to read (stdin if omitted or "-")
        input: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render the reply text found in a completion response body
    Response {
        /// JSON response file to read (stdin if omitted or "-")
        input: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Send a prompt to the completion endpoint and render the reply
    Ask {
        #[command(flatten)]
        prompt: PromptArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the request body that `ask` would send
    Request {
        #[command(flatten)]
        prompt: PromptArgs,
    },
    /// Re-render markdown files to HTML whenever they change
    Watch {
        /// Markdown files to watch
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for rendered files (defaults to each input's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Wrap output in a standalone HTML page
        #[arg(long)]
        document: bool,
        /// Page title used with --document
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write HTML to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Wrap output in a standalone HTML page
    #[arg(long)]
    pub document: bool,
    /// Page title used with --document
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PromptArgs {
    /// User prompt
    #[arg(short, long)]
    pub prompt: String,
    /// System prompt (defaults to the preset, then the configured one)
    #[arg(short, long)]
    pub system: Option<String>,
    /// Built-in assistant persona
    #[arg(long, value_enum, conflicts_with = "system")]
    pub preset: Option<Preset>,
    /// Ask for a JSON reply instead of markdown text
    #[arg(long)]
    pub json: bool,
}

impl PromptArgs {
    fn mode(&self) -> ResponseMode {
        if self.json {
            ResponseMode::Json
        } else {
            ResponseMode::Text
        }
    }

    fn system_prompt<'a>(&'a self, settings: &'a Settings) -> &'a str {
        match (&self.system, self.preset) {
            (Some(system), _) => system.as_str(),
            (None, Some(preset)) => preset.system_prompt(),
            (None, None) => settings.default_system_prompt.as_str(),
        }
    }
}

/// Assistant personas offered by the dashboard.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Life coach for finance, productivity, habits and goals
    Coach,
    /// Technical support for the Counter Hub app
    Support,
    /// Spending analysis
    Finance,
    /// Savings planning
    Savings,
    /// Websites, books and apps for a goal
    Resources,
}

impl Preset {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Preset::Coach => {
                "You are a friendly and encouraging AI Life Coach. Your goal is to provide helpful \
                 advice on finance, productivity, habits, and goals. Use the data context provided \
                 when available, but also offer general wisdom. Keep your answers concise and \
                 actionable."
            }
            Preset::Support => {
                "You are an AI technical support agent for an application called 'Counter Hub'. \
                 You are helpful and knowledgeable about web application issues. You can guide \
                 users on how to solve common problems like 'the page is not loading' or 'a button \
                 is not working'. Be polite and clear."
            }
            Preset::Finance => {
                "You are a financial analyst AI. Provide clear, concise, and helpful analysis of \
                 user spending data. Use markdown for formatting (e.g., **Heading** and lists \
                 with -)."
            }
            Preset::Savings => {
                "You are a helpful savings planner AI. Provide a clear, actionable savings plan. \
                 Use markdown for formatting."
            }
            Preset::Resources => {
                "You are a helpful AI assistant that finds resources. Use markdown for formatting."
            }
        }
    }
}

/// Handle the render command.
pub fn handle_render(
    input: Option<&Path>,
    output: &OutputArgs,
    settings: &Settings,
) -> Result<()> {
    let text = read_input(input)?;
    write_output(output.output.as_deref(), &to_html(&text, output, settings))
}

/// Handle the response command.
pub fn handle_response(
    input: Option<&Path>,
    output: &OutputArgs,
    settings: &Settings,
) -> Result<()> {
    let body = read_input(input)?;
    let text = reply_text(&body)?;
    write_output(output.output.as_deref(), &to_html(&text, output, settings))
}

/// Handle the ask command.
pub fn handle_ask(prompt: &PromptArgs, output: &OutputArgs, settings: &Settings) -> Result<()> {
    let client = CompletionClient::new(settings).context("Failed to build HTTP client")?;
    info!(url = client.url(), "Sending completion request");

    let mode = prompt.mode();
    let reply = client.ask(&prompt.prompt, prompt.system_prompt(settings), mode);
    let rendered = match mode {
        ResponseMode::Json => {
            check_json_reply(&reply)?;
            reply
        }
        ResponseMode::Text => to_html(&reply, output, settings),
    };
    write_output(output.output.as_deref(), &rendered)
}

/// Handle the request command.
pub fn handle_request(prompt: &PromptArgs, settings: &Settings) -> Result<()> {
    let request = build_request(prompt, settings);
    let body = serde_json::to_string_pretty(&request).context("Failed to encode request")?;
    write_output(None, &body)
}

/// Handle the watch command. Runs until interrupted.
pub fn handle_watch(
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    document: bool,
    title: Option<String>,
    settings: &Settings,
) -> Result<()> {
    let mut targets = Vec::with_capacity(inputs.len());
    for input in inputs {
        let target = output_path_for(input, out_dir);
        if target == *input {
            anyhow::bail!(
                "Refusing to overwrite input {} with its rendered output",
                input.display()
            );
        }
        targets.push((input.clone(), target));
    }

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let output = OutputArgs {
        output: None,
        document,
        title,
    };

    let (update_tx, update_rx) = mpsc::channel();
    let mut watcher = SourceWatcher::new(settings.poll_interval());
    watcher.start(update_tx);
    for (input, _) in &targets {
        watcher.add_file(input);
    }

    println!("Watching {} file(s). Press Ctrl+C to stop.", targets.len());

    for update in update_rx {
        let Some((_, target)) = targets.iter().find(|(input, _)| *input == update.path) else {
            warn!(path = %update.path.display(), "Update for unknown source");
            continue;
        };
        let html = to_html(&update.content, &output, settings);
        std::fs::write(target, html)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        info!(source = %update.path.display(), target = %target.display(), "Rendered");
        println!("Rendered {} -> {}", update.path.display(), target.display());
    }

    Ok(())
}

/// Parse a JSON reply, failing when it is not JSON or carries an `error` field.
fn check_json_reply(reply: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(reply).context("Reply is not valid JSON")?;
    if let Some(error) = value.get("error").filter(|e| is_truthy(e)) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        anyhow::bail!("Completion failed: {}", message);
    }
    Ok(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn build_request(prompt: &PromptArgs, settings: &Settings) -> GenerateRequest {
    GenerateRequest::new(&prompt.prompt, prompt.system_prompt(settings), prompt.mode())
        .with_limits(settings.temperature, settings.max_output_tokens)
}

/// Extract the reply text from a completion response body.
///
/// A body without text renders as the usual error reply.
fn reply_text(body: &str) -> Result<String> {
    let response: GenerateResponse =
        serde_json::from_str(body).context("Input is not a completion response")?;
    Ok(match response.first_text() {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(error = %e, "Response carries no reply text");
            fallback_reply(&e, ResponseMode::Text)
        }
    })
}

fn to_html(markdown_text: &str, output: &OutputArgs, settings: &Settings) -> String {
    let fragment = markdown::render(markdown_text);
    if output.document {
        let title = output.title.as_deref().unwrap_or(&settings.document_title);
        wrap_document(title, &fragment)
    } else {
        fragment
    }
}

/// Wrap an HTML fragment in a minimal standalone page.
fn wrap_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn output_path_for(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let rendered = input.with_extension("html");
    match (out_dir, rendered.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => rendered,
    }
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", content).context("Failed to write stdout")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(json: bool, system: Option<&str>) -> PromptArgs {
        PromptArgs {
            prompt: "Plan my savings".to_string(),
            system: system.map(str::to_string),
            preset: None,
            json,
        }
    }

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::parse_from([
            "markdown-reply",
            "render",
            "reply.md",
            "-o",
            "out.html",
            "--document",
        ]);
        match cli.command {
            Commands::Render { input, output } => {
                assert_eq!(input, Some(PathBuf::from("reply.md")));
                assert_eq!(output.output, Some(PathBuf::from("out.html")));
                assert!(output.document);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_cli_requires_watch_inputs() {
        assert!(Cli::try_parse_from(["markdown-reply", "watch"]).is_err());
    }

    #[test]
    fn test_to_html_fragment_and_document() {
        let settings = Settings::default();
        let fragment = to_html("**hi**", &OutputArgs::default(), &settings);
        assert_eq!(fragment, "<p><strong>hi</strong></p>");

        let output = OutputArgs {
            document: true,
            title: Some("Tips & <Tricks>".to_string()),
            ..OutputArgs::default()
        };
        let page = to_html("- a", &output, &settings);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Tips &amp; &lt;Tricks&gt;</title>"));
        assert!(page.contains("<body>\n<ul><li>a</li></ul>\n</body>"));
    }

    #[test]
    fn test_document_uses_configured_title() {
        let settings = Settings {
            document_title: "Savings Plan".to_string(),
            ..Settings::default()
        };
        let output = OutputArgs {
            document: true,
            ..OutputArgs::default()
        };
        assert!(to_html("x", &output, &settings).contains("<title>Savings Plan</title>"));
    }

    #[test]
    fn test_reply_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"- save"}]}}]}"#;
        assert_eq!(reply_text(body).unwrap(), "- save");

        assert_eq!(
            reply_text(r#"{"candidates":[]}"#).unwrap(),
            "Error: No text content returned from API.. Please check your server console."
        );
        assert!(reply_text("not json").is_err());
    }

    #[test]
    fn test_build_request_uses_settings() {
        let settings = Settings {
            max_output_tokens: 200,
            ..Settings::default()
        };
        let request = build_request(&prompt(true, None), &settings);
        assert_eq!(request.generation_config.max_output_tokens, 200);
        assert_eq!(request.generation_config.response_mime_type, "application/json");
        assert_eq!(
            request.system_instruction.parts[0].text.as_deref(),
            Some(settings.default_system_prompt.as_str())
        );

        let request = build_request(&prompt(false, Some("Be a coach")), &settings);
        assert_eq!(
            request.system_instruction.parts[0].text.as_deref(),
            Some("Be a coach")
        );
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("notes/reply.md"), None),
            PathBuf::from("notes/reply.html")
        );
        assert_eq!(
            output_path_for(Path::new("notes/reply.md"), Some(Path::new("site"))),
            PathBuf::from("site/reply.html")
        );
        assert_eq!(
            output_path_for(Path::new("page.html"), None),
            PathBuf::from("page.html")
        );
    }

    #[test]
    fn test_render_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reply.md");
        let out = dir.path().join("reply.html");
        std::fs::write(&input, "Hello\n- *one*\n- two").unwrap();

        let output = OutputArgs {
            output: Some(out.clone()),
            ..OutputArgs::default()
        };
        handle_render(Some(&input), &output, &Settings::default()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "<p>Hello</p><ul><li><em>one</em></li><li>two</li></ul>"
        );
    }

    #[test]
    fn test_watch_refuses_to_overwrite_input() {
        let err = handle_watch(
            &[PathBuf::from("page.html")],
            None,
            false,
            None,
            &Settings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Refusing to overwrite"));
    }

    #[test]
    fn test_read_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_input(Some(&dir.path().join("missing.md"))).is_err());
    }

    #[test]
    fn test_preset_selects_system_prompt() {
        let settings = Settings::default();
        let cli = Cli::parse_from([
            "markdown-reply",
            "request",
            "-p",
            "Plan",
            "--preset",
            "savings",
        ]);
        let Commands::Request { prompt } = cli.command else {
            panic!("expected request");
        };
        assert_eq!(prompt.preset, Some(Preset::Savings));
        assert_eq!(
            prompt.system_prompt(&settings),
            "You are a helpful savings planner AI. Provide a clear, actionable savings plan. \
             Use markdown for formatting."
        );

        let request = build_request(&prompt, &settings);
        assert_eq!(
            request.system_instruction.parts[0].text.as_deref(),
            Some(Preset::Savings.system_prompt())
        );
    }

    #[test]
    fn test_preset_prompts_match_dashboard() {
        assert!(Preset::Finance
            .system_prompt()
            .ends_with("(e.g., **Heading** and lists with -)."));
        assert!(Preset::Support.system_prompt().contains("'Counter Hub'"));
        assert!(Preset::Coach.system_prompt().ends_with("concise and actionable."));
        for preset in Preset::value_variants() {
            assert!(!preset.system_prompt().contains("  "), "{:?}", preset);
        }
    }

    #[test]
    fn test_preset_conflicts_with_system() {
        assert!(Cli::try_parse_from([
            "markdown-reply",
            "ask",
            "-p",
            "hi",
            "--system",
            "custom",
            "--preset",
            "coach",
        ])
        .is_err());
    }

    #[test]
    fn test_check_json_reply() {
        let tasks = check_json_reply(r#"["Task 1", "Task 2"]"#).unwrap();
        assert_eq!(tasks.as_array().map(Vec::len), Some(2));
        assert!(check_json_reply(r#"{"milestones": [], "error": null}"#).is_ok());
        assert!(check_json_reply(r#"{"error": ""}"#).is_ok());

        let fallback = r#"{"error": "AI Service Unavailable. Please check API Key."}"#;
        let err = check_json_reply(fallback).unwrap_err();
        assert!(err.to_string().contains("AI Service Unavailable"));
        assert!(check_json_reply("Sure! Here are your tasks:").is_err());
    }

    #[test]
    fn test_ask_json_fails_when_service_is_down() {
        let settings = Settings {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 5,
            ..Settings::default()
        };
        let err = handle_ask(&prompt(true, None), &OutputArgs::default(), &settings).unwrap_err();
        assert!(err.to_string().contains("AI Service Unavailable"));
    }
}
