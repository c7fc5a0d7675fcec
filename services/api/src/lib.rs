mod cli;
mod infra;
mod routes;
mod score;
mod server;

use probation_risk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
