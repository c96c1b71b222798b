//! In-memory `UserStore` used by the test suite.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repo::UserStore;
use super::repo_types::{InsertError, NewUser, ProfileUpdate, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    counter: Mutex<i64>,
    /// Set to make every call fail like an unreachable database.
    pub broken: std::sync::atomic::AtomicBool,
}

impl MemoryUserStore {
    /// Store pre-populated with rows, counter left at zero (rows issued by
    /// an older scheme).
    pub async fn with_users(users: Vec<User>) -> Self {
        let st = Self::default();
        *st.users.lock().await = users;
        st
    }

    pub async fn all(&self) -> Vec<User> {
        self.users.lock().await.clone()
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.broken.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.users.lock().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.users.lock().await.iter().find(|u| u.code == code).cloned())
    }

    async fn next_code_sequence(&self) -> anyhow::Result<i64> {
        self.check()?;
        let mut counter = self.counter.lock().await;
        *counter += 1;
        Ok(*counter)
    }

    async fn insert(&self, user: NewUser) -> Result<User, InsertError> {
        self.check()?;
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(InsertError::DuplicateEmail);
        }
        if users.iter().any(|u| u.code == user.code) {
            return Err(InsertError::DuplicateCode);
        }
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            code: user.code,
            name: String::new(),
            last_name: String::new(),
            image_url: String::new(),
            created_at: user.now,
            updated_at: user.now,
        };
        users.push(row.clone());
        Ok(row)
    }

    async fn update_fields(&self, code: &str, fields: ProfileUpdate) -> anyhow::Result<u64> {
        self.check()?;
        let mut users = self.users.lock().await;
        let Some(u) = users.iter_mut().find(|u| u.code == code) else {
            return Ok(0);
        };
        u.name = fields.name;
        u.last_name = fields.last_name;
        if let Some(url) = fields.image_url {
            u.image_url = url;
        }
        u.updated_at = fields.updated_at;
        Ok(1)
    }
}
