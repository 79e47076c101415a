//! CLI subcommands.

pub mod admin;
pub mod migrate;

use secrecy::SecretString;

/// Read `BAZAAR_DATABASE_URL` (or `DATABASE_URL`), loading `.env` first.
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var("BAZAAR_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
