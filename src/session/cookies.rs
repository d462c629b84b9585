use std::time::Duration;
use tracing::{debug, info};

use super::{Deadline, Locator, Pace, PageSession, Pacing};

/// Click the consent button if a banner shows up within `wait`.
///
/// Returns whether a button was clicked. A banner that never appears is the
/// normal case, so every failure here is swallowed.
pub async fn accept_cookies<S: PageSession + ?Sized>(
    session: &mut S,
    button: &Locator,
    label: &str,
    wait: Duration,
    pacing: &Pacing,
) -> bool {
    let deadline = Deadline::after(wait);
    loop {
        if let Ok(candidates) = session.find_all(button).await {
            for candidate in candidates {
                let Ok(text) = session.text(&candidate).await else {
                    continue;
                };
                if text.trim() != label {
                    continue;
                }
                match session.click(&candidate).await {
                    Ok(()) => {
                        info!("Cookie banner appeared, clicked '{label}'");
                        pacing.pause(Pace::Cookie).await;
                        return true;
                    }
                    Err(e) => debug!("Cookie button not clickable yet: {}", e.short_message()),
                }
            }
        }
        if !deadline.tick().await {
            debug!("No cookie banner within {:?}", wait);
            return false;
        }
    }
}
