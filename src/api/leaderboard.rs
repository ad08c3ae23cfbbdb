use std::convert::Infallible;

use actix_web::{
    get,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    web::{self, Bytes, Data, Json},
    HttpResponse,
};
use diesel::SqliteConnection;
use futures::stream;

use super::err::Error;
use crate::broadcast::{Event, Hub};
use crate::persistent::DbPool;
use crate::ranking::{self, Entry};

/// Recompute the leaderboard and push it to every connected client
pub fn announce(target: &str, conn: &mut SqliteConnection, hub: &Hub) -> Result<(), Error> {
    let board = ranking::leaderboard(conn)?;
    let receivers = hub.publish(Event::LeaderboardUpdated(board));
    log::info!(target: target, "Leaderboard sent to {receivers} client(s)");
    Ok(())
}

#[get("/leaderboard")]
pub async fn get_leaderboard(pool: Data<DbPool>) -> Result<Json<Vec<Entry>>, Error> {
    const TARGET: &str = "GET /leaderboard";
    log::info!(target: TARGET, "Request received");

    let pool = pool.clone();
    let board = web::block(move || -> Result<_, Error> {
        let mut conn = pool.get()?;
        ranking::leaderboard(&mut conn)
    })
    .await??;

    log::info!(target: TARGET, "Request done");
    Ok(Json(board))
}

#[get("/leaderboard/events")]
/// Live stream of leaderboard updates and connected client counts
pub async fn events(hub: Data<Hub>) -> HttpResponse {
    const TARGET: &str = "GET /leaderboard/events";

    let hub = hub.into_inner();
    let subscription = hub.clone().subscribe();
    log::info!(target: TARGET, "Client connected, {} active", hub.active_clients());

    let body = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        Some((
            Ok::<_, Infallible>(Bytes::from(event.to_sse())),
            subscription,
        ))
    });

    HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(body)
}
