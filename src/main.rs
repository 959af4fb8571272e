use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_booking_client::{
    config::{Config, LogFormat},
    models::SeatId,
    AppState,
};

fn init_tracing(config: &Config) {
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));

    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [movie_id, show_id, seats @ ..] = args.as_slice() else {
        bail!("usage: ticket_booking_client <movie_id> <show_id> <seat_id>...");
    };
    if seats.is_empty() {
        bail!("select at least one seat");
    }

    info!("Starting booking client ({})", config.app.environment);
    let state = AppState::new(config).map_err(|e| anyhow::anyhow!("{}", e))?;

    // Load the show with its pricing, the way the movie page does
    let shows = state.inventory.movie_shows(movie_id).await?;
    let show = shows
        .into_iter()
        .find(|show| show.id.as_str() == show_id)
        .with_context(|| format!("show {} not found for movie {}", show_id, movie_id))?;

    let workflow = state.workflow();
    info!("Session {} started", workflow.session_id());

    let result = async {
        workflow.select_show(show).await?;
        for seat in seats {
            workflow.toggle_seat(&SeatId::new(seat.as_str()))?;
        }
        info!("Selected {} seats, total {}", seats.len(), workflow.total_amount());

        workflow.request_lock().await?;
        workflow.confirm_booking().await
    }
    .await;

    match result {
        Ok(booking) => {
            println!(
                "Booking {} confirmed, amount {}",
                booking.id,
                booking.amount.unwrap_or_else(|| workflow.total_amount())
            );
            if let Some(ticket) = booking.ticket_id {
                println!("Ticket {}", ticket);
            }
            Ok(())
        }
        Err(e) => {
            let snapshot = workflow.snapshot();
            let (breaker, failures) = state.inventory.circuit_breaker_status();
            error!(
                "Booking failed in phase {}: {} (circuit {:?}, failures={})",
                snapshot.phase, e, breaker, failures
            );
            bail!("booking failed ({}): {}", snapshot.phase, e)
        }
    }
}
