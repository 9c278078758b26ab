use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log::{debug, LevelFilter};
use std::path::{Path, PathBuf};
use std::process;

use fuzzreq_core::{
    create_fuzzable_request_from_request, parse_raw_request, read_lines, ClassifyConfig,
    FuzzableRequest, HttpRequest,
};

const EXIT_ERROR: i32 = 1;
const EXIT_UNCLASSIFIED: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "fuzzreq",
    version,
    about = "Classify HTTP requests into fuzzable request types",
    override_usage = "fuzzreq <url>  <options>",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Query string:        fuzzreq \"http://target.com/?id=1&q=x\"
  Form post:           fuzzreq http://target.com/login -X POST -H \"Content-Type: application/x-www-form-urlencoded\" -d \"user=a&pass=b\"
  JSON post:           fuzzreq http://target.com/api -X POST -H \"Content-Type: application/json\" -d '{\"id\":1}'
  Raw request file:    fuzzreq -r request.txt
  Many raw requests:   fuzzreq -l requests.txt --json
  Rebuild as curl:     fuzzreq -r request.txt --curl"
)]
pub struct Args {
    #[arg(required_unless_present_any = ["raw", "list"])]
    pub url: Option<String>,

    #[arg(short = 'X', long, default_value = "GET", help = "HTTP method")]
    pub method: String,

    #[arg(short = 'H', long = "header", help = "Request header (e.g. \"Content-Type: application/json\")")]
    pub headers: Vec<String>,

    #[arg(short = 'd', long, help = "Request body")]
    pub data: Option<String>,

    #[arg(short = 'r', long = "raw", help = "File holding a raw HTTP request")]
    pub raw: Option<String>,

    #[arg(short = 'l', long = "list", help = "File listing raw request files (one per line)")]
    pub list: Option<String>,

    #[arg(long, default_value = "https", help = "Scheme for raw requests with an origin-form target")]
    pub scheme: String,

    #[arg(long, default_value_t = false, help = "Print one JSON object per request")]
    pub json: bool,

    #[arg(long, default_value_t = false, help = "Print a curl command rebuilding each request")]
    pub curl: bool,

    #[arg(short = 'v', long, default_value_t = false, help = "Show classification details (Verbose Mode)")]
    pub verbose: bool,
}

impl Args {
    fn to_config(&self) -> ClassifyConfig {
        ClassifyConfig {
            url: self.url.clone().unwrap_or_default(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            data: self.data.clone().unwrap_or_default(),
            raw_file: self.raw.clone().unwrap_or_default(),
            list_file: self.list.clone().unwrap_or_default(),
            default_scheme: self.scheme.clone(),
            json_output: self.json,
            verbose: self.verbose,
        }
    }
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();
    let config = args.to_config();

    env_logger::Builder::new()
        .filter_level(if config.verbose { LevelFilter::Debug } else { LevelFilter::Warn })
        .parse_default_env()
        .init();

    match run(&config, args.curl) {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_UNCLASSIFIED),
        Err(e) => {
            eprintln!("{}", format!("[!] {:#}", e).red());
            process::exit(EXIT_ERROR);
        }
    }
}

/// Classifies every configured request. Returns `false` if any of them is
/// not a fuzzable request.
fn run(config: &ClassifyConfig, curl: bool) -> Result<bool> {
    let requests = collect_requests(config)?;
    if requests.is_empty() {
        eprintln!("{}", "[!] No requests specified. Provide a URL, -r <file> or -l <file>.".red());
        Args::command().print_help().ok();
        process::exit(EXIT_ERROR);
    }

    let mut all_classified = true;
    for (source, request) in &requests {
        debug!("Classifying {} from {}", request.url, source);
        match create_fuzzable_request_from_request(request) {
            Some(fr) => print_request(&fr, config.json_output, curl)?,
            None => {
                all_classified = false;
                if config.json_output {
                    println!("{}", serde_json::json!({ "source": source, "kind": null }));
                } else {
                    println!("{}", format!("[-] {}: not a fuzzable request", source).red());
                }
            }
        }
    }
    Ok(all_classified)
}

/// Gathers requests from the list file, the raw file and the command line,
/// in that order.
fn collect_requests(config: &ClassifyConfig) -> Result<Vec<(String, HttpRequest)>> {
    let mut requests = Vec::new();

    if !config.list_file.is_empty() {
        let lines = read_lines(&config.list_file)
            .with_context(|| format!("failed to read '{}'", config.list_file))?;
        debug!("Loaded {} raw request file(s) from {}", lines.len(), config.list_file);
        let base = Path::new(&config.list_file).parent().unwrap_or_else(|| Path::new(""));
        for line in lines {
            let path = resolve(base, &line);
            requests.push((line, load_raw_request(&path, &config.default_scheme)?));
        }
    }

    if !config.raw_file.is_empty() {
        let request = load_raw_request(Path::new(&config.raw_file), &config.default_scheme)?;
        requests.push((config.raw_file.clone(), request));
    }

    if !config.url.is_empty() {
        requests.push((config.url.clone(), config.to_http_request()?));
    }

    Ok(requests)
}

/// Relative entries of a list file are relative to the list file itself.
fn resolve(base: &Path, entry: &str) -> PathBuf {
    let path = Path::new(entry);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_raw_request(path: &Path, scheme: &str) -> Result<HttpRequest> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    parse_raw_request(&raw, scheme).with_context(|| format!("invalid raw request in '{}'", path.display()))
}

fn print_request(fr: &FuzzableRequest, json: bool, curl: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(fr)?);
    } else {
        println!("{}", format!("[+] {}", fr.kind()).green().bold());
        println!("{}", format!("    {} {}", fr.method(), fr.url()).blue());
        for (name, value) in fr.parameters().pairs() {
            println!("    {} = {}", name.yellow(), value);
        }
        if fr.parameters().is_empty() {
            println!("{}", "    (no parameters)".dimmed());
        }
    }
    if curl {
        println!("{}", fr.to_curl());
    }
    Ok(())
}
