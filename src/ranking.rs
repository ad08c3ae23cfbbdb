use std::{cmp::Ordering, collections::HashMap};

use diesel::SqliteConnection;
use serde::Serialize;

use crate::api::err::Error;
use crate::persistent::models::{self, BestScore, User};

/// A row of the leaderboard
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub user_id: i32,
    pub user_name: String,
    pub profile_image_url: Option<String>,
    pub total_score: i64,
    pub problems_solved: u32,
    pub rank: u32,
}

/// Sum the best score of every problem per user and rank users by it.
///
/// Users without submissions are listed with zero. Equal totals are ordered by
/// ascending user id and still take consecutive positions.
pub fn rank(users: &[User], best: &[BestScore]) -> Vec<Entry> {
    let mut totals: HashMap<i32, (i64, u32)> = HashMap::new();
    for score in best {
        let (total, solved) = totals.entry(score.user_id).or_default();
        *total += score.score as i64;
        *solved += 1;
    }

    let mut entries: Vec<Entry> = users
        .iter()
        .map(|user| {
            let (total_score, problems_solved) =
                totals.get(&user.id).copied().unwrap_or_default();
            Entry {
                user_id: user.id,
                user_name: user.user_name.clone(),
                profile_image_url: user.profile_image_url.clone(),
                total_score,
                problems_solved,
                rank: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| match b.total_score.cmp(&a.total_score) {
        Ordering::Equal => a.user_id.cmp(&b.user_id),
        ord => ord,
    });

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }

    entries
}

/// Compute the current leaderboard from the database
pub fn leaderboard(conn: &mut SqliteConnection) -> Result<Vec<Entry>, Error> {
    let users = models::get_users(conn)?;
    let best = models::get_best_scores(conn)?;
    Ok(rank(&users, &best))
}
