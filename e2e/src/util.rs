use rand::distr::Alphanumeric;
use rand::{rng, Rng};
use tap::TapFallible;

use client::client::Client;
use types::domain::{LoginRequest, SignupRequest};

use crate::domain::{TestUser, PASSWORD};

pub async fn register_user() -> eyre::Result<TestUser> {
    let mut client = Client::new();

    let email = random_email();
    let auth = client
        .sign_up(SignupRequest {
            email: email.clone(),
            password: PASSWORD.to_string(),
            name: "E2E User".to_string(),
        })
        .await
        .tap_err(|e| println!("Error: {:?}", e))?;

    Ok(TestUser {
        email,
        user: auth.user,
        client,
    })
}

/// A second device for the same account, with its own cookie jar.
pub async fn sign_in_again(email: &str) -> eyre::Result<Client> {
    let mut client = Client::new();
    client
        .sign_in(LoginRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .tap_err(|e| println!("Error: {:?}", e))?;
    Ok(client)
}

pub fn random_email() -> String {
    let random_string: String = rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    format!("{}@example.com", random_string.to_lowercase())
}
