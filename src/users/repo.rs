use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::repo_types::{InsertError, NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, code, name, last_name, image_url, created_at, updated_at";

pub(crate) const EMAIL_CONSTRAINT: &str = "users_email_key";
pub(crate) const CODE_CONSTRAINT: &str = "users_code_key";

/// Persistent collection of user records, unique on email and on code.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<User>>;
    /// Atomically reserves the next code sequence number (1-based).
    async fn next_code_sequence(&self) -> anyhow::Result<i64>;
    async fn insert(&self, user: NewUser) -> Result<User, InsertError>;
    /// Returns the number of matched records (0 or 1).
    async fn update_fields(&self, code: &str, fields: ProfileUpdate) -> anyhow::Result<u64>;
}

/// Maps the constraint named by a unique violation on `users` to the
/// matching insert error.
fn classify_unique_violation(constraint: Option<&str>) -> InsertError {
    match constraint {
        Some(CODE_CONSTRAINT) => InsertError::DuplicateCode,
        Some(EMAIL_CONSTRAINT) => InsertError::DuplicateEmail,
        other => InsertError::Other(anyhow::anyhow!("unique violation on {:?}", other)),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await
        .context("find user by code")?;
        Ok(user)
    }

    async fn next_code_sequence(&self) -> anyhow::Result<i64> {
        let (value,): (i64,) = sqlx::query_as(
            r#"
            UPDATE user_code_counter
               SET value = value + 1
             WHERE id = 1
            RETURNING value
            "#,
        )
        .fetch_one(&self.db)
        .await
        .context("reserve code sequence")?;
        Ok(value)
    }

    async fn insert(&self, user: NewUser) -> Result<User, InsertError> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, code, name, last_name, image_url, created_at, updated_at)
            VALUES ($1, $2, '', '', '', $3, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.code)
        .bind(user.now)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(classify_unique_violation(e.constraint()))
            }
            Err(e) => Err(InsertError::Other(anyhow::Error::new(e).context("insert user"))),
        }
    }

    async fn update_fields(&self, code: &str, fields: ProfileUpdate) -> anyhow::Result<u64> {
        // COALESCE keeps the stored URL when no image came with the update.
        let res = sqlx::query(
            r#"
            UPDATE users
               SET name = $2,
                   last_name = $3,
                   image_url = COALESCE($4, image_url),
                   updated_at = $5
             WHERE code = $1
            "#,
        )
        .bind(code)
        .bind(&fields.name)
        .bind(&fields.last_name)
        .bind(fields.image_url.as_deref())
        .bind(fields.updated_at)
        .execute(&self.db)
        .await
        .context("update user fields")?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    #[test]
    fn unique_violations_split_by_constraint() {
        assert!(matches!(
            classify_unique_violation(Some("users_email_key")),
            InsertError::DuplicateEmail
        ));
        assert!(matches!(
            classify_unique_violation(Some("users_code_key")),
            InsertError::DuplicateCode
        ));
        assert!(matches!(
            classify_unique_violation(Some("users_pkey")),
            InsertError::Other(_)
        ));
        assert!(matches!(classify_unique_violation(None), InsertError::Other(_)));
    }

    fn new_user(email: &str, code: &str) -> NewUser {
        NewUser {
            email: email.into(),
            code: code.into(),
            now: OffsetDateTime::now_utc(),
        }
    }

    // The tests below need a Postgres server:
    // DATABASE_URL=postgres://... cargo test -- --ignored

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn pg_insert_reports_which_key_collided(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let user = store.insert(new_user("a@x.com", "A01-1")).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.created_at, user.updated_at);

        assert!(matches!(
            store.insert(new_user("a@x.com", "A02-2")).await,
            Err(InsertError::DuplicateEmail)
        ));
        assert!(matches!(
            store.insert(new_user("b@x.com", "A01-1")).await,
            Err(InsertError::DuplicateCode)
        ));
        assert_eq!(store.next_code_sequence().await.unwrap(), 1);
        assert_eq!(store.next_code_sequence().await.unwrap(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn pg_update_keeps_image_when_none_given(pool: PgPool) {
        let store = PgUserStore::new(pool);
        store.insert(new_user("a@x.com", "A01-1")).await.unwrap();

        let update = |name: &str, image_url: Option<&str>| ProfileUpdate {
            name: name.into(),
            last_name: String::new(),
            image_url: image_url.map(str::to_string),
            updated_at: OffsetDateTime::now_utc(),
        };
        let url = "http://localhost:8080/uploads/A01-1.png";
        assert_eq!(store.update_fields("A01-1", update("Ana", Some(url))).await.unwrap(), 1);
        assert_eq!(store.update_fields("A01-1", update("", None)).await.unwrap(), 1);
        assert_eq!(store.update_fields("A77-77", update("Eve", None)).await.unwrap(), 0);

        let user = store.find_by_code("A01-1").await.unwrap().unwrap();
        assert!(user.name.is_empty());
        assert_eq!(user.image_url, url);
        assert_eq!(store.find_by_email("a@x.com").await.unwrap(), Some(user));
    }
}
