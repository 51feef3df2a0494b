use eyre::Result;

use client::client::Client;
use types::domain::User;

use crate::util::register_user;

pub const PASSWORD: &str = "password123";

pub struct TestUser {
    pub email: String,
    pub user: User,
    pub client: Client,
}

impl TestUser {
    pub async fn new() -> Result<Self> {
        register_user().await
    }
}
