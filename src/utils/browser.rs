use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Open `url` in the platform browser after `delay`, in the background.
pub fn open_after(url: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        open(&url).await;
    });
}

async fn open(url: &str) {
    let mut cmd = browser_command(url);
    debug!("Launching browser: {:?}", cmd);

    match cmd.status().await {
        Ok(status) if status.success() => info!("Opened {} in the browser", url),
        Ok(status) => warn!("Browser launcher exited with {}; open {} manually", status, url),
        Err(e) => warn!("Could not launch a browser ({}); open {} manually", e, url),
    }
}

fn browser_command(url: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}
