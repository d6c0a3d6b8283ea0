use chrono::{DateTime, TimeZone};
use log::debug;
use once_cell::sync::Lazy;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::events::AppEvent;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn spawn_async<F>(fut: F) -> tokio::task::JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    RUNTIME.spawn(fut)
}

/// Run `fut` in the background and deliver its event to the UI loop.
/// If the loop has already shut down the event is dropped.
pub fn run_async_to_loop<Fut>(tx: UnboundedSender<AppEvent>, fut: Fut) -> tokio::task::JoinHandle<()>
where
    Fut: std::future::Future<Output = AppEvent> + Send + 'static,
{
    spawn_async(async move {
        let event = fut.await;
        if let Err(e) = tx.send(event) {
            debug!("UI loop gone, dropping {:?}", e.0);
        }
    })
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// `3:07 PM`
pub fn format_clock<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format("%-I:%M %p").to_string()
}

const FALLBACK_COLUMNS: u16 = 80;

/// Current width of the attached terminal.
pub fn terminal_width() -> u16 {
    columns_from(crossterm::terminal::size())
}

fn columns_from(size: std::io::Result<(u16, u16)>) -> u16 {
    match size {
        Ok((cols, _)) if cols > 0 => cols,
        _ => FALLBACK_COLUMNS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn normalize_adds_scheme_and_drops_trailing_slash() {
        assert_eq!(normalize_url(" localhost:8000/ "), "https://localhost:8000");
        assert_eq!(normalize_url("http://localhost:8000"), "http://localhost:8000");
    }

    #[test]
    fn clock_is_twelve_hour() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 15, 7, 0).unwrap();
        assert_eq!(format_clock(&ts), "3:07 PM");
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 0, 30, 0).unwrap();
        assert_eq!(format_clock(&ts), "12:30 AM");
    }

    #[tokio::test]
    async fn background_result_reaches_the_loop() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        run_async_to_loop(tx, async { AppEvent::Connectivity(false) });
        assert!(matches!(rx.recv().await, Some(AppEvent::Connectivity(false))));
    }

    #[tokio::test]
    async fn late_result_after_teardown_is_dropped() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let handle = run_async_to_loop(tx, async move {
            let _ = wait.await;
            AppEvent::Connectivity(true)
        });
        drop(rx);
        release.send(()).unwrap();
        assert!(handle.await.is_ok());
    }

    #[test]
    fn terminal_width_uses_reported_size() {
        assert_eq!(columns_from(Ok((60, 24))), 60);
        assert_eq!(columns_from(Ok((0, 0))), FALLBACK_COLUMNS);
        let not_a_tty = std::io::Error::new(std::io::ErrorKind::Other, "not a tty");
        assert_eq!(columns_from(Err(not_a_tty)), FALLBACK_COLUMNS);
    }
}
