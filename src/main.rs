use recipe_ai_server::api::{self, AppState};
use recipe_ai_server::commands;
use recipe_ai_server::config::AppConfig;
use recipe_ai_server::database::Database;
use recipe_ai_server::food::api::SpoonacularClient;
use recipe_ai_server::food::config::FoodConfig;
use recipe_ai_server::food::generation::RecipeAssembler;
use recipe_ai_server::providers;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Overrides DATABASE_PATH.
    #[arg(long)]
    database: Option<String>,

    /// Generate one recipe from comma-separated ingredients and exit.
    #[arg(long)]
    generate: Option<String>,

    #[arg(long, requires = "generate")]
    preferences: Option<String>,

    /// Persist the recipe produced by --generate.
    #[arg(long, requires = "generate")]
    save: bool,

    /// Look up recipes that use the comma-separated ingredients and exit.
    #[arg(long, conflicts_with = "generate")]
    search: Option<String>,

    #[arg(long, default_value = "5")]
    number: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(ingredients) = &args.search {
        return run_search(ingredients, args.number).await;
    }

    let mut config = AppConfig::from_env()?;
    if let Some(path) = &args.database {
        config.database_path = path.clone();
    }

    if let Some(ingredients) = &args.generate {
        run_generate(&config, &args, ingredients).await
    } else {
        run_api_server(config, args.port).await
    }
}

async fn run_generate(config: &AppConfig, args: &Args, ingredients: &str) -> Result<()> {
    let assembler = RecipeAssembler::new(providers::build_client(&config.provider)?, config.generation.clone());

    let db = if args.save {
        Some(Database::new(&config.database_path).await?)
    } else {
        None
    };

    match commands::generate(&assembler, db.as_ref(), ingredients, args.preferences.clone()).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            Err(e)
        }
    }
}

async fn run_search(ingredients: &str, number: u32) -> Result<()> {
    let api_key = FoodConfig::from_env()
        .spoonacular_api_key
        .ok_or_else(|| anyhow!("SPOONACULAR_API_KEY environment variable not set"))?;
    let client = SpoonacularClient::new(api_key);

    println!("{}", commands::search(&client, ingredients, number).await?);
    Ok(())
}

async fn run_api_server(config: AppConfig, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Starting API server on {}", addr);

    let db = Database::new(&config.database_path).await?;
    let assembler = RecipeAssembler::new(providers::build_client(&config.provider)?, config.generation.clone());
    let spoonacular = config.food.spoonacular_api_key.clone().map(SpoonacularClient::new);
    if spoonacular.is_none() {
        log::warn!("SPOONACULAR_API_KEY not set; ingredient search is disabled");
    }

    let state = AppState::new(assembler, db, spoonacular, config.generation_timeout);
    let app = api::create_api(state, config.max_concurrent_requests);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    log::info!("Ready to accept connections on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
