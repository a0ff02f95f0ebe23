#[tokio::main]
async fn main() {
    sea_orm_migration::cli::run_cli(lighthouse_orchestrator_migration::Migrator).await;
}
