use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::info;

use cgpa_predictor::auth::{CredentialGate, CredentialStore, FileStore, SecretsStore};
use cgpa_predictor::config::{Config, CredentialSource};
use cgpa_predictor::model::LinearModel;
use cgpa_predictor::routes::{self, AppState};

fn credential_store(config: &Config) -> anyhow::Result<Box<dyn CredentialStore>> {
    match config.credentials {
        CredentialSource::Secrets => {
            let store = SecretsStore::load(&config.secrets_path)
                .context("failed to load credential secrets")?;
            Ok(Box::new(store))
        }
        CredentialSource::File => {
            info!("Using users file {}", config.users_path.display());
            Ok(Box::new(FileStore::new(&config.users_path)))
        }
    }
}

async fn start_api(config: &Config, state: AppState) -> std::io::Result<()> {
    let state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .workers(config.workers)
    .bind(config.bind_addr())?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    info!("Loading CGPA model from {}", config.model_path.display());
    let model = LinearModel::load(&config.model_path).context("model artifact is required")?;

    let gate = CredentialGate::new(credential_store(&config)?);
    let state = AppState::new(model, gate);

    info!("Starting CGPA Predictor on http://{}", config.bind_addr());
    start_api(&config, state).await?;

    Ok(())
}
