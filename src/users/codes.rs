use anyhow::Context;

use super::repo::UserStore;

/// Formats the n-th access code: `A{n:02}-{n}`.
pub fn format_code(n: i64) -> String {
    format!("A{:02}-{}", n, n)
}

/// Reserves the next sequence number and turns it into a code.
pub async fn issue(store: &dyn UserStore) -> anyhow::Result<String> {
    let n = store
        .next_code_sequence()
        .await
        .context("issue access code")?;
    Ok(format_code(n))
}
