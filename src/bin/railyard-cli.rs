use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use railyard::config::{build_route_set, load_config};
use railyard::routing::params::{param_map, Params};
use railyard::routing::url::rewrite_url;
use railyard::routing::{RequestEnv, RouteSet, UrlOptions};

#[derive(Parser)]
#[command(name = "railyard-cli")]
#[command(about = "Inspect a railyard route file offline", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "routes.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes in priority order
    Routes {
        /// Also list the URL helper names of named routes
        #[arg(long)]
        helpers: bool,
    },
    /// Recognize a path
    Recognize {
        path: String,

        #[arg(short, long, default_value = "get")]
        method: String,

        #[arg(long)]
        host: Option<String>,
    },
    /// Generate a path from key=value parameters
    Generate {
        params: Vec<String>,

        /// Use this named route
        #[arg(short, long)]
        name: Option<String>,

        /// Emit a full URL for this host
        #[arg(long)]
        host: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    let routes = build_route_set(&config)?;

    match cli.command {
        Commands::Routes { helpers } => print_routes(&routes, helpers),
        Commands::Recognize { path, method, host } => {
            let mut env = RequestEnv::with_method(&method);
            if let Some(host) = host {
                env = env.host(host);
            }
            let recognized = routes.recognize(&path, &env)?;
            println!("{}", serde_json::to_string_pretty(&recognized)?);
        }
        Commands::Generate { params, name, host } => {
            let options = parse_params(&params)?;
            let path = match name {
                Some(name) => routes.named_path(&name, &options)?,
                None => routes.generate(&options, &Params::new())?,
            };
            let output = match host {
                Some(host) => rewrite_url(&path, &UrlOptions::with_host(host))?,
                None => path,
            };
            println!("{output}");
        }
    }
    Ok(())
}

fn print_routes(routes: &RouteSet, helpers: bool) {
    for line in routes.describe() {
        println!("{line}");
    }
    if helpers {
        println!();
        for helper in routes.named_routes().helpers() {
            println!("{helper}");
        }
    }
}

fn parse_params(pairs: &[String]) -> Result<Params, String> {
    let parsed = pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| format!("expected key=value, got {pair:?}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(param_map(parsed))
}
