use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::command::{self, Command, ParseError};
use crate::engine::{Engine, EngineError};
use crate::grid::SlotView;
use crate::identity::{Caller, IdentitySource};
use crate::model::SlotTime;
use crate::observability;

const MAX_LINE_LEN: usize = 1024;

/// Default LIST range, matching the club's overview hours.
const DAY_START_MINUTES: u16 = 7 * 60;
const DAY_END_MINUTES: u16 = 21 * 60;

type WireError = Box<dyn std::error::Error + Send + Sync>;

/// One LIST output line: a time row across the requested courts.
#[derive(Serialize)]
struct GridRow<'a> {
    time: String,
    cells: &'a [SlotView],
}

/// Serve one client connection: newline-delimited commands in, one `OK ...`
/// or `ERR <Code> ...` line per command out (LIST additionally streams one
/// JSON row per time step). The session starts unauthenticated; AUTH
/// upgrades it for the mutating commands.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    identity: Arc<dyn IdentitySource>,
) -> Result<(), WireError> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    framed.send("OK courtbook ready").await?;

    let mut caller = Caller::Unauthenticated;

    while let Some(line) = framed.next().await {
        let line = line?;
        let cmd = match command::parse(&line) {
            Ok(cmd) => cmd,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                metrics::counter!(
                    observability::COMMANDS_TOTAL,
                    "command" => "invalid",
                    "status" => "bad_request"
                )
                .increment(1);
                framed.send(format!("ERR BadRequest {e}")).await?;
                continue;
            }
        };

        let label = observability::command_label(&cmd);
        let started = std::time::Instant::now();
        let quit = matches!(cmd, Command::Quit);
        let status = execute(&mut framed, &engine, &identity, &mut caller, cmd).await?;

        metrics::counter!(
            observability::COMMANDS_TOTAL,
            "command" => label,
            "status" => status
        )
        .increment(1);
        metrics::histogram!(observability::COMMAND_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());

        if quit {
            break;
        }
    }

    Ok(())
}

async fn execute(
    framed: &mut Framed<TcpStream, LinesCodec>,
    engine: &Engine,
    identity: &Arc<dyn IdentitySource>,
    caller: &mut Caller,
    cmd: Command,
) -> Result<&'static str, WireError> {
    match cmd {
        Command::Auth { user, password } => match identity.resolve(&user, &password).await {
            Some(id) => {
                tracing::info!(user = %id.user, "authenticated");
                let reply = format!("OK user {}", id.user);
                *caller = Caller::Known(id);
                framed.send(reply).await?;
                Ok("ok")
            }
            None => {
                metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
                tracing::debug!(user = %user, "auth rejected");
                framed.send("ERR NotAuthorized bad credentials").await?;
                Ok("denied")
            }
        },
        Command::WhoAmI => {
            match caller.authorized_user() {
                Some(user) => framed.send(format!("OK user {user}")).await?,
                None => framed.send("OK anonymous").await?,
            }
            Ok("ok")
        }
        Command::List { date, start, end } => {
            // Viewing is never window-gated; any date may be listed.
            let start = start.unwrap_or_else(|| day_edge(DAY_START_MINUTES));
            let end = end.unwrap_or_else(|| day_edge(DAY_END_MINUTES));
            if end < start {
                framed.send("ERR BadRequest end before start").await?;
                return Ok("bad_request");
            }
            let grid = engine.day_grid(date, start, end, &[]).await;
            for (i, &time) in grid.times.iter().enumerate() {
                let row = GridRow { time: time.to_string(), cells: grid.row(i) };
                framed.send(serde_json::to_string(&row)?).await?;
            }
            framed.send(format!("OK rows {}", grid.times.len())).await?;
            Ok("ok")
        }
        Command::Book { key } => reply_mutation(framed, engine.book(key, caller).await).await,
        Command::Lock { key } => reply_mutation(framed, engine.lock(key, caller).await).await,
        Command::Unlock { key } => reply_mutation(framed, engine.unlock(key, caller).await).await,
        Command::Quit => {
            framed.send("OK bye").await?;
            Ok("ok")
        }
    }
}

async fn reply_mutation(
    framed: &mut Framed<TcpStream, LinesCodec>,
    result: Result<(), EngineError>,
) -> Result<&'static str, WireError> {
    match result {
        Ok(()) => {
            framed.send("OK").await?;
            Ok("ok")
        }
        Err(e) if e.is_denial() => {
            tracing::debug!(code = e.code(), "denied: {e}");
            framed.send(format!("ERR {} {e}", e.code())).await?;
            Ok("denied")
        }
        Err(e) => {
            tracing::error!(code = e.code(), "mutation failed: {e}");
            framed.send(format!("ERR {} {e}", e.code())).await?;
            Ok("error")
        }
    }
}

fn day_edge(minutes: u16) -> SlotTime {
    // Both defaults are on the 30-minute grid.
    SlotTime::from_minutes(minutes).expect("default hours are on the slot grid")
}
