// src/engine/progress.rs

use sqlx::PgConnection;

use crate::error::AppError;

/// Rounded completion percentage. A certificate with no topics can never
/// show progress, so zero topics yields zero instead of dividing by zero.
pub fn percent(passed_topics: i64, total_topics: i64) -> i32 {
    if total_topics <= 0 {
        return 0;
    }
    ((passed_topics as f64 / total_topics as f64) * 100.0).round() as i32
}

/// Computes a guide's completion percentage for a certificate: the share of
/// its topics with a passing retained attempt.
///
/// Side-effect-free and idempotent; callers persist the result themselves.
/// Takes `&mut PgConnection` so it can run on a pooled connection or inside
/// the attempt recorder's open transaction.
pub async fn compute_progress(
    conn: &mut PgConnection,
    user_id: i64,
    certificate_id: i64,
) -> Result<i32, AppError> {
    let total_topics: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM certificate_topics WHERE certificate_id = $1")
            .bind(certificate_id)
            .fetch_one(&mut *conn)
            .await?;

    let passed_topics: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT qa.topic_id)
        FROM quiz_attempts qa
        JOIN certificate_topics ct ON qa.topic_id = ct.id
        WHERE qa.user_id = $1
          AND ct.certificate_id = $2
          AND qa.passed
        "#,
    )
    .bind(user_id)
    .bind(certificate_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(percent(passed_topics, total_topics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_topics_guard() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn never_negative() {
        assert_eq!(percent(0, 7), 0);
    }
}
