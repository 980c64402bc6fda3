//! Basic usage example for `boxoffice`.

use std::path::PathBuf;
use std::sync::Arc;

use boxoffice::prelude::*;
use boxoffice::token::TokenError;
use boxoffice_key_file::FileKeySource;
use secrecy::SecretString;

/// Stand-in for a real JWT issuer.
struct DemoIssuer;

impl TokenIssuer for DemoIssuer {
    fn issue_pair(&self, identity: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair { access: format!("demo-access-{identity}"), refresh: format!("demo-refresh-{identity}") })
    }

    fn issue_access(&self, identity: &str) -> Result<String, TokenError> {
        Ok(format!("demo-access-{identity}"))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("boxoffice Basic Usage Example");
    println!("=============================\n");

    let work_dir = PathBuf::from("./example_data");
    let key_path = work_dir.join("boxoffice.key");

    if !key_path.exists() {
        println!("Generating key at {}...", key_path.display());
        FileKeySource::init(&key_path)?;
    }
    let key = FileKeySource::new(&key_path)?.encryption_key()?;

    let cipher = FieldCipher::new(key, CipherMode::default());
    cipher.validate_key()?;
    println!("✓ Field cipher ready ({:?})\n", cipher.mode());

    // A light profile keeps the example quick; production uses the default.
    let profile = HashingProfile::default().with_memory_cost(19 * 1024).with_time_cost(2).with_parallelism(1);
    let guardian = Arc::new(PasswordGuardian::new(profile)?);

    let backend = Arc::new(SqliteBackend::open(work_dir.join("boxoffice.sqlite"))?);
    let accounts = AccountService::new(Arc::clone(&backend), guardian, cipher, DemoIssuer);
    let tickets = TicketService::new(backend);

    let email = "alice@example.com";
    let signup = NewAccount {
        lastname: Some("Liddell".into()),
        firstname: Some("Alice".into()),
        age: Some(21),
        email: Some(email.into()),
        password: Some(SecretString::new("correct horse battery staple".into())),
        tariff: Some("student".into()),
        ..NewAccount::default()
    };

    match accounts.create(signup) {
        Ok(uuid) => println!("✓ Account created: {uuid}"),
        Err(ServiceError::Conflict) => println!("• Account already exists"),
        Err(e) => return Err(e.into()),
    }

    let tokens = accounts.login(LoginRequest {
        email: Some("  ALICE@example.com".into()),
        password: Some(SecretString::new("correct horse battery staple".into())),
    })?;
    println!("✓ Logged in, access token: {}", tokens.access);

    let identity = tokens.access.trim_start_matches("demo-access-");
    let profile = accounts.me(identity)?;
    println!(
        "✓ Profile: {} {} <{}>",
        profile.firstname.as_deref().unwrap_or("?"),
        profile.lastname.as_deref().unwrap_or("?"),
        profile.email.as_deref().unwrap_or("?"),
    );

    let ticket = tickets.create(identity, NewTicket { showing: Some("Metropolis 20:30".into()), tariff: None })?;
    println!("✓ Booked {} at {} ({} cents)\n", ticket.showing, ticket.tariff, ticket.price_cents);

    println!("Example completed successfully!");
    Ok(())
}
