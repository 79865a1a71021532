use rolodex_db::models::NewUser;
use rolodex_db::{Database, StoreError};
use rolodex_types::models::User;

/// The user operations the directory needs from the relational store.
/// Blocking; the directory runs these off the async runtime.
pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    fn insert(&self, user: &NewUser) -> Result<User, StoreError>;
    fn confirm(&self, email: &str) -> Result<bool, StoreError>;
    fn set_avatar(&self, email: &str, url: &str) -> Result<Option<User>, StoreError>;
    fn set_refresh_token(&self, email: &str, token: Option<&str>) -> Result<bool, StoreError>;
    fn delete(&self, email: &str) -> Result<Option<User>, StoreError>;
}

impl UserStore for Database {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.get_user_by_email(email)
    }

    fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        self.create_user(user)
    }

    fn confirm(&self, email: &str) -> Result<bool, StoreError> {
        self.set_user_confirmed(email)
    }

    fn set_avatar(&self, email: &str, url: &str) -> Result<Option<User>, StoreError> {
        self.set_user_avatar(email, url)
    }

    fn set_refresh_token(&self, email: &str, token: Option<&str>) -> Result<bool, StoreError> {
        self.set_user_refresh_token(email, token)
    }

    fn delete(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.delete_user_by_email(email)
    }
}
