use std::env;
use std::fs;

use anyhow::{Context, Result, bail};

const SERVICE_PATH: &str = "/etc/systemd/system/poolswap.service";
const TIMER_PATH: &str = "/etc/systemd/system/poolswap.timer";

/// Accepts the systemd time spans the timer unit takes: digits plus one of
/// s, m, h, d or min.
fn valid_interval(interval: &str) -> bool {
    let digits: String = interval.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.parse::<u64>().map(|n| n == 0).unwrap_or(true) {
        return false;
    }
    matches!(&interval[digits.len()..], "s" | "m" | "h" | "d" | "min")
}

/// Writes a oneshot service plus timer so the sync runs on a cadence. The
/// service reads DATABASE_URL and POOLSWAP_* settings from .env next to the
/// working directory, same as a manual run.
pub fn install_timer(interval: &str) -> Result<()> {
    if !valid_interval(interval) {
        bail!("invalid interval '{interval}', expected forms like 30s, 10m, 1h");
    }

    // Check if running as root
    if unsafe { libc::getuid() } != 0 {
        bail!("this command must be run as root (sudo) to install systemd units");
    }

    let exe_path = env::current_exe()?;
    let working_dir = env::current_dir()?;

    let service_content = format!(
        r#"[Unit]
Description=Proxy pool table sync
After=network-online.target
Wants=network-online.target

[Service]
Type=oneshot
User=root
WorkingDirectory={}
ExecStart={} sync
EnvironmentFile={}/.env

[Install]
WantedBy=multi-user.target
"#,
        working_dir.display(),
        exe_path.display(),
        working_dir.display()
    );

    let timer_content = format!(
        r#"[Unit]
Description=Periodic proxy pool sync

[Timer]
OnBootSec=1m
OnUnitActiveSec={interval}
Persistent=true

[Install]
WantedBy=timers.target
"#
    );

    fs::write(SERVICE_PATH, service_content)
        .context(format!("Failed to write service file to {SERVICE_PATH}"))?;
    fs::write(TIMER_PATH, timer_content)
        .context(format!("Failed to write timer file to {TIMER_PATH}"))?;

    println!("Systemd units created:");
    println!("  {SERVICE_PATH}");
    println!("  {TIMER_PATH}");
    println!(
        "Put DATABASE_URL and POOLSWAP_SOURCE into {}/.env, then:",
        working_dir.display()
    );
    println!("  systemctl daemon-reload");
    println!("  systemctl enable --now poolswap.timer");

    Ok(())
}
