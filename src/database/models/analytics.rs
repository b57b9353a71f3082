use chrono::{Duration, NaiveDate, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use serde::Serialize;

use crate::app::{AppError, DbConn};
use crate::schema::{comments, likes, post_analytics, posts, users};

/// One per-post, per-calendar-day rollup row. The `(post_id, date)` pair is
/// unique; all increments go through upserts so concurrent identical events
/// land on the same row.
#[derive(Debug, Queryable, Clone, Serialize)]
pub struct PostAnalytic {
    pub id: i32,
    pub post_id: i32,
    pub date: NaiveDate,
    pub views_count: i32,
    pub likes_count: i32,
    pub comments_count: i32,
}

#[derive(Insertable)]
#[table_name = "post_analytics"]
struct PostAnalyticInsert {
    post_id: i32,
    date: NaiveDate,
    views_count: i32,
    likes_count: i32,
    comments_count: i32,
}

impl PostAnalytic {
    /// Records one page view in today's bucket.
    pub fn track_view(conn: &DbConn, post_id: i32) -> Result<(), AppError> {
        let today = Utc::now().naive_utc().date();
        diesel::insert_into(post_analytics::table)
            .values(&PostAnalyticInsert {
                post_id,
                date: today,
                views_count: 1,
                likes_count: 0,
                comments_count: 0,
            })
            .on_conflict((post_analytics::post_id, post_analytics::date))
            .do_update()
            .set(post_analytics::views_count.eq(post_analytics::views_count + 1))
            .execute(conn)?;
        Ok(())
    }

    /// Mirrors a like/unlike into the daily bucket. Decrements only touch an
    /// existing bucket and never drive it below zero.
    pub fn bump_likes(
        conn: &DbConn,
        post_id: i32,
        day: NaiveDate,
        delta: i32,
    ) -> Result<(), AppError> {
        if delta >= 0 {
            diesel::insert_into(post_analytics::table)
                .values(&PostAnalyticInsert {
                    post_id,
                    date: day,
                    views_count: 0,
                    likes_count: delta,
                    comments_count: 0,
                })
                .on_conflict((post_analytics::post_id, post_analytics::date))
                .do_update()
                .set(post_analytics::likes_count.eq(post_analytics::likes_count + delta))
                .execute(conn)?;
        } else {
            diesel::update(
                post_analytics::table
                    .filter(post_analytics::post_id.eq(post_id))
                    .filter(post_analytics::date.eq(day))
                    .filter(post_analytics::likes_count.gt(0)),
            )
            .set(post_analytics::likes_count.eq(post_analytics::likes_count + delta))
            .execute(conn)?;
        }
        Ok(())
    }

    /// Same shape as [`PostAnalytic::bump_likes`], for the comments counter.
    pub fn bump_comments(
        conn: &DbConn,
        post_id: i32,
        day: NaiveDate,
        delta: i32,
    ) -> Result<(), AppError> {
        if delta >= 0 {
            diesel::insert_into(post_analytics::table)
                .values(&PostAnalyticInsert {
                    post_id,
                    date: day,
                    views_count: 0,
                    likes_count: 0,
                    comments_count: delta,
                })
                .on_conflict((post_analytics::post_id, post_analytics::date))
                .do_update()
                .set(
                    post_analytics::comments_count
                        .eq(post_analytics::comments_count + delta),
                )
                .execute(conn)?;
        } else {
            diesel::update(
                post_analytics::table
                    .filter(post_analytics::post_id.eq(post_id))
                    .filter(post_analytics::date.eq(day))
                    .filter(post_analytics::comments_count.gt(0)),
            )
            .set(post_analytics::comments_count.eq(post_analytics::comments_count + delta))
            .execute(conn)?;
        }
        Ok(())
    }

    pub fn views_for_post(conn: &DbConn, post_id: i32) -> Result<i64, AppError> {
        let total: Option<i64> = post_analytics::table
            .filter(post_analytics::post_id.eq(post_id))
            .select(sum(post_analytics::views_count))
            .first(conn)?;
        Ok(total.unwrap_or(0))
    }
}

/// Period-over-period comparison for one metric.
#[derive(Debug, Serialize, PartialEq)]
pub struct MetricWindow {
    pub current: i64,
    pub previous: i64,
    pub change_pct: i64,
}

impl MetricWindow {
    pub fn new(current: i64, previous: i64) -> Self {
        Self {
            current,
            previous,
            change_pct: percent_change(current, previous),
        }
    }
}

/// Rounded percent change between two window totals.
/// Growth from zero is pinned at 100 and zero-to-zero at 0, so the result is
/// never NaN or infinite.
pub fn percent_change(current: i64, previous: i64) -> i64 {
    if previous == 0 {
        if current > 0 {
            100
        } else {
            0
        }
    } else {
        (((current - previous) as f64 / previous as f64) * 100.0).round() as i64
    }
}

/// One point of the charting series: bucket rows of a day summed across the
/// scoped posts. Days without any bucket are absent, not zero-filled.
#[derive(Debug, Serialize, PartialEq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

#[derive(Serialize)]
pub struct AnalyticsSummary {
    pub period_days: i64,
    pub posts_published: MetricWindow,
    pub likes: MetricWindow,
    pub comments: MetricWindow,
    pub new_users: MetricWindow,
    pub views: MetricWindow,
    pub daily_trend: Vec<DailyPoint>,
}

/// Folds raw bucket rows (ordered ascending by date) into the daily series.
pub fn fold_daily(rows: Vec<PostAnalytic>) -> Vec<DailyPoint> {
    let mut series: Vec<DailyPoint> = Vec::new();
    for row in rows {
        match series.last_mut() {
            Some(point) if point.date == row.date => {
                point.views += row.views_count as i64;
                point.likes += row.likes_count as i64;
                point.comments += row.comments_count as i64;
            }
            _ => series.push(DailyPoint {
                date: row.date,
                views: row.views_count as i64,
                likes: row.likes_count as i64,
                comments: row.comments_count as i64,
            }),
        }
    }
    series
}

/// Global reporting window: each metric counted independently for the current
/// window (`now - days`) and the immediately preceding window of equal length.
pub fn summarize(conn: &DbConn, days: i64) -> Result<AnalyticsSummary, AppError> {
    let now = Utc::now().naive_utc();
    let start = now - Duration::days(days);
    let prev_start = start - Duration::days(days);
    let start_day = start.date();
    let prev_start_day = prev_start.date();

    let posts_current: i64 = posts::table
        .filter(posts::status.eq("published"))
        .filter(posts::published_at.ge(start))
        .count()
        .get_result(conn)?;
    let posts_previous: i64 = posts::table
        .filter(posts::status.eq("published"))
        .filter(posts::published_at.ge(prev_start))
        .filter(posts::published_at.lt(start))
        .count()
        .get_result(conn)?;

    let likes_current: i64 = likes::table
        .filter(likes::created_at.ge(start))
        .count()
        .get_result(conn)?;
    let likes_previous: i64 = likes::table
        .filter(likes::created_at.ge(prev_start))
        .filter(likes::created_at.lt(start))
        .count()
        .get_result(conn)?;

    let comments_current: i64 = comments::table
        .filter(comments::created_at.ge(start))
        .count()
        .get_result(conn)?;
    let comments_previous: i64 = comments::table
        .filter(comments::created_at.ge(prev_start))
        .filter(comments::created_at.lt(start))
        .count()
        .get_result(conn)?;

    let users_current: i64 = users::table
        .filter(users::created_at.ge(start))
        .count()
        .get_result(conn)?;
    let users_previous: i64 = users::table
        .filter(users::created_at.ge(prev_start))
        .filter(users::created_at.lt(start))
        .count()
        .get_result(conn)?;

    let views_current: Option<i64> = post_analytics::table
        .filter(post_analytics::date.ge(start_day))
        .select(sum(post_analytics::views_count))
        .first(conn)?;
    let views_previous: Option<i64> = post_analytics::table
        .filter(post_analytics::date.ge(prev_start_day))
        .filter(post_analytics::date.lt(start_day))
        .select(sum(post_analytics::views_count))
        .first(conn)?;

    let trend_rows = post_analytics::table
        .filter(post_analytics::date.ge(start_day))
        .order(post_analytics::date.asc())
        .load::<PostAnalytic>(conn)?;

    Ok(AnalyticsSummary {
        period_days: days,
        posts_published: MetricWindow::new(posts_current, posts_previous),
        likes: MetricWindow::new(likes_current, likes_previous),
        comments: MetricWindow::new(comments_current, comments_previous),
        new_users: MetricWindow::new(users_current, users_previous),
        views: MetricWindow::new(views_current.unwrap_or(0), views_previous.unwrap_or(0)),
        daily_trend: fold_daily(trend_rows),
    })
}

/// All-time totals shown on the admin dashboard, scoped to one author's
/// posts for admins and global for superadmins.
#[derive(Serialize)]
pub struct DashboardTotals {
    pub posts: i64,
    pub published_posts: i64,
    pub likes: i64,
    pub comments: i64,
    pub views: i64,
}

pub fn dashboard_totals(
    conn: &DbConn,
    author: Option<&str>,
) -> Result<DashboardTotals, AppError> {
    let post_ids: Vec<i32> = match author {
        Some(author) => posts::table
            .filter(posts::author_id.eq(author))
            .select(posts::id)
            .load(conn)?,
        None => posts::table.select(posts::id).load(conn)?,
    };

    let published: i64 = posts::table
        .filter(posts::id.eq_any(&post_ids[..]))
        .filter(posts::status.eq("published"))
        .count()
        .get_result(conn)?;
    let likes: i64 = likes::table
        .filter(likes::post_id.eq_any(&post_ids[..]))
        .count()
        .get_result(conn)?;
    let comments: i64 = comments::table
        .filter(comments::post_id.eq_any(&post_ids[..]))
        .count()
        .get_result(conn)?;
    let views: Option<i64> = post_analytics::table
        .filter(post_analytics::post_id.eq_any(&post_ids[..]))
        .select(sum(post_analytics::views_count))
        .first(conn)?;

    Ok(DashboardTotals {
        posts: post_ids.len() as i64,
        published_posts: published,
        likes,
        comments,
        views: views.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn percent_change_regular_cases() {
        assert_eq!(percent_change(150, 100), 50);
        assert_eq!(percent_change(50, 100), -50);
        assert_eq!(percent_change(100, 100), 0);
        assert_eq!(percent_change(3, 2), 50);
    }

    #[test]
    fn percent_change_rounds_to_nearest() {
        assert_eq!(percent_change(100, 75), 33);
        assert_eq!(percent_change(1, 3), -67);
    }

    #[test]
    fn percent_change_zero_previous_never_divides() {
        // Any growth from zero is a flat 100, zero-to-zero is 0.
        assert_eq!(percent_change(5, 0), 100);
        assert_eq!(percent_change(1, 0), 100);
        assert_eq!(percent_change(0, 0), 0);
    }

    #[test]
    fn metric_window_carries_both_totals() {
        let window = MetricWindow::new(10, 0);
        assert_eq!(window.current, 10);
        assert_eq!(window.previous, 0);
        assert_eq!(window.change_pct, 100);
    }

    fn bucket(post_id: i32, day: u32, views: i32, likes: i32, comments: i32) -> PostAnalytic {
        PostAnalytic {
            id: 0,
            post_id,
            date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            views_count: views,
            likes_count: likes,
            comments_count: comments,
        }
    }

    #[test]
    fn fold_daily_sums_same_day_across_posts() {
        let series = fold_daily(vec![
            bucket(1, 1, 5, 1, 0),
            bucket(2, 1, 3, 0, 2),
            bucket(1, 3, 7, 0, 0),
        ]);
        assert_eq!(
            series,
            vec![
                DailyPoint {
                    date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                    views: 8,
                    likes: 1,
                    comments: 2,
                },
                DailyPoint {
                    date: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
                    views: 7,
                    likes: 0,
                    comments: 0,
                },
            ]
        );
    }

    #[test]
    fn fold_daily_keeps_missing_days_absent() {
        let series = fold_daily(vec![bucket(1, 1, 1, 0, 0), bucket(1, 5, 1, 0, 0)]);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn same_day_views_share_one_bucket_row() {
        use crate::auth::permissions::Role;
        use crate::database::models::post::{NewPostData, Post, PostStatus};
        use crate::database::models::test_support;
        use crate::database::models::user::User;
        use uuid::Uuid;

        let conn = match test_support::checkout() {
            Some(conn) => conn,
            None => return,
        };
        let user = User::new(
            &conn,
            &format!("{}@example.com", Uuid::new_v4()),
            "view-tracker",
            "longenoughpassword",
            Role::Admin,
            None,
        )
        .unwrap();
        let post = Post::new(
            &conn,
            &user,
            NewPostData {
                title: format!("Viewable {}", Uuid::new_v4()),
                content: "Plenty of content to satisfy the minimum length check."
                    .to_string(),
                excerpt: None,
                status: PostStatus::Published,
                category_id: None,
                tags: Vec::new(),
                thumbnail: None,
                images: Vec::new(),
            },
        )
        .unwrap();

        PostAnalytic::track_view(&conn, post.id).unwrap();
        PostAnalytic::track_view(&conn, post.id).unwrap();

        let rows = post_analytics::table
            .filter(post_analytics::post_id.eq(post.id))
            .load::<PostAnalytic>(&conn)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].views_count, 2);

        user.delete(&conn).unwrap();
    }
}
