use crate::backend::{Directory, StoreError};
use crate::models::{OnlyFansAccount, User};

/// Signed-in operator state. One per process, passed to whoever needs it
/// instead of living in globals.
pub struct Session<D> {
    directory: D,
    current_user: Option<User>,
    accounts: Vec<OnlyFansAccount>,
}

impl<D: Directory> Session<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            current_user: None,
            accounts: Vec::new(),
        }
    }

    /// Look the operator up by email and load their linked accounts.
    /// Returns false when no such user exists.
    pub async fn sign_in(&mut self, email: &str) -> Result<bool, StoreError> {
        let Some(user) = self.directory.find_user(email).await? else {
            return Ok(false);
        };
        self.accounts.clear();
        for account_id in &user.onlyfans_account_ids {
            match self.directory.find_account(account_id).await {
                Ok(Some(account)) => self.accounts.push(account),
                Ok(None) => log::warn!("account {account_id} not found"),
                Err(e) => log::error!("failed to load account {account_id}: {e}"),
            }
        }
        self.current_user = Some(user);
        Ok(true)
    }

    pub fn sign_out(&mut self) {
        self.current_user = None;
        self.accounts.clear();
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn accounts(&self) -> &[OnlyFansAccount] {
        &self.accounts
    }
}
